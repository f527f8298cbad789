use serde::{Deserialize, Serialize};

use crate::entities::{ChatDraft, ChatEvent, Participant};
use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ConnectionId, RoomId, Timestamp};

/// 一个活跃的协作房间。
///
/// 成员列表按加入顺序排列；聊天历史在第一条消息到达时才创建。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "userList", default)]
    members: Vec<Participant>,
    #[serde(
        rename = "instructorName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    instructor_name: Option<String>,
    #[serde(rename = "chatHistory", default, skip_serializing_if = "Option::is_none")]
    chat_history: Option<Vec<ChatEvent>>,
    #[serde(skip)]
    last_sequence: u64,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            name: None,
            members: Vec::new(),
            instructor_name: None,
            chat_history: None,
            last_sequence: 0,
        }
    }

    pub fn with_details(
        id: RoomId,
        name: Option<String>,
        instructor_name: Option<String>,
    ) -> Self {
        Self {
            name,
            instructor_name,
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn instructor_name(&self) -> Option<&str> {
        self.instructor_name.as_deref()
    }

    pub fn members(&self) -> &[Participant] {
        &self.members
    }

    pub fn chat_history(&self) -> Option<&[ChatEvent]> {
        self.chat_history.as_deref()
    }

    pub fn has_member(&self, connection_id: ConnectionId) -> bool {
        self.members
            .iter()
            .any(|member| member.connection_id() == connection_id)
    }

    /// 追加参与者；同一连接在一个房间内至多一条记录。
    pub fn add_participant(&mut self, participant: Participant) -> DomainResult<()> {
        if self.has_member(participant.connection_id()) {
            return Err(DomainError::AlreadyJoined {
                room_id: self.id.clone(),
                connection_id: participant.connection_id(),
            });
        }
        self.members.push(participant);
        Ok(())
    }

    pub fn remove_participant(&mut self, connection_id: ConnectionId) -> Option<Participant> {
        let index = self
            .members
            .iter()
            .position(|member| member.connection_id() == connection_id)?;
        Some(self.members.remove(index))
    }

    /// 翻转指定连接的举手状态，找不到参与者时返回 `None`。
    pub fn toggle_hand(&mut self, connection_id: ConnectionId) -> Option<bool> {
        self.members
            .iter_mut()
            .find(|member| member.connection_id() == connection_id)
            .map(Participant::toggle_hand)
    }

    pub fn append_chat(&mut self, draft: ChatDraft, sent_at: Timestamp) -> &ChatEvent {
        self.last_sequence += 1;
        let event = ChatEvent {
            room_id: self.id.clone(),
            sender_name: draft.sender_name,
            sender_is_presenter: draft.sender_is_presenter,
            message: draft.message,
            sent_at,
            sequence: self.last_sequence,
        };
        let history = self.chat_history.get_or_insert_with(Vec::new);
        history.push(event);
        &history[history.len() - 1]
    }
}
