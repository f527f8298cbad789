use application::{CollaboratorError, InvitationMailer};
use async_trait::async_trait;
use domain::RoomId;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

/// 一封已“发出”的邀请
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invitation {
    pub recipients: Vec<String>,
    pub sender_name: String,
    pub room_id: RoomId,
    pub link: String,
}

/// 只记录日志的邀请发送方，不连接真实邮件服务
#[derive(Default)]
pub struct LoggingInvitationMailer {
    outbox: RwLock<Vec<Invitation>>,
}

impl LoggingInvitationMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 参会者入口链接
    pub fn attendee_link(address: &str, room_id: &RoomId) -> String {
        format!("http://{address}/room/a/{room_id}")
    }

    pub async fn outbox(&self) -> Vec<Invitation> {
        self.outbox.read().await.clone()
    }
}

#[async_trait]
impl InvitationMailer for LoggingInvitationMailer {
    async fn send_invitation(
        &self,
        recipients: &[String],
        sender_name: &str,
        room_id: &RoomId,
        address: &str,
    ) -> Result<Value, CollaboratorError> {
        let recipients: Vec<String> = recipients
            .iter()
            .map(|recipient| recipient.trim())
            .filter(|recipient| !recipient.is_empty())
            .map(str::to_owned)
            .collect();
        if recipients.is_empty() {
            return Err(CollaboratorError::rejected("no recipients"));
        }
        if let Some(bad) = recipients.iter().find(|recipient| !recipient.contains('@')) {
            return Err(CollaboratorError::rejected(format!("invalid address {bad}")));
        }

        let invitation = Invitation {
            recipients,
            sender_name: sender_name.to_owned(),
            room_id: room_id.clone(),
            link: Self::attendee_link(address, room_id),
        };
        for recipient in &invitation.recipients {
            info!(room_id = %room_id, %recipient, link = %invitation.link, "sending room invitation");
        }

        let receipt = serde_json::to_value(&invitation)
            .map_err(|err| CollaboratorError::rejected(err.to_string()))?;
        self.outbox.write().await.push(invitation);
        Ok(receipt)
    }
}
