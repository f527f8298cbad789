//! 房间生命周期：创建、重建、删除和重发邀请。
//!
//! 外部登记表调用期间不持有注册表锁；最终结果只回给发起请求的连接。
//! 请求方中途断开不影响流程走完。

use domain::{ConnectionId, Feedback, HostPayload, ResendEmailPayload, Room, RoomId, ServerEvent};
use serde_json::Value;
use tracing::{info, warn};

use super::SessionRouter;
use crate::error::{ApplicationError, ApplicationResult};

impl SessionRouter {
    pub async fn create_room(
        &self,
        connection_id: ConnectionId,
        payload: HostPayload,
    ) -> ApplicationResult<()> {
        let room_id = RoomId::from_host(&payload.host)?;

        match self.gateway.check_room_id_unique(&room_id).await {
            Ok(()) => {}
            Err(ApplicationError::NotUnique(_)) => {
                info!(room_id = %room_id, "another room already exists for this host");
                return self
                    .reply(connection_id, ServerEvent::Duplicate(Feedback::ok(false)))
                    .await;
            }
            Err(err) => {
                warn!(room_id = %room_id, error = %err, "uniqueness check failed");
                return self
                    .reply(
                        connection_id,
                        ServerEvent::CompleteDbAdd(Feedback::error(&err).with_room(room_id)),
                    )
                    .await;
            }
        }

        // 外部检查与插入之间可能有同 ID 的并发创建
        let inserted = self.registry.lock().await.insert(Room::new(room_id.clone()));
        if let Err(err) = inserted {
            info!(room_id = %room_id, error = %err, "room id taken while checking");
            return self
                .reply(connection_id, ServerEvent::Duplicate(Feedback::ok(false)))
                .await;
        }
        info!(room_id = %room_id, "creating room");

        let added = self
            .gateway
            .upsert_room_entry(room_id.as_str(), &room_id)
            .await;
        let added_ok = added.is_ok();
        self.notify(
            connection_id,
            ServerEvent::CompleteDbAdd(Feedback::from_result(added).with_room(room_id.clone())),
        )
        .await;

        if added_ok {
            let queue = self
                .gateway
                .create_message_queue(&room_id)
                .await
                .map(Value::String);
            return self
                .reply(
                    connection_id,
                    ServerEvent::CompleteQueueCreation(Feedback::from_result(queue)),
                )
                .await;
        }
        Ok(())
    }

    /// 先删除外部条目，再以同一 ID 重新登记；内存中的房间被替换为空房间。
    pub async fn redo_room(
        &self,
        connection_id: ConnectionId,
        payload: HostPayload,
    ) -> ApplicationResult<()> {
        let room_id = RoomId::from_host(&payload.host)?;
        info!(room_id = %room_id, "redoing room creation");

        let deleted = self
            .gateway
            .delete_room_entry(room_id.as_str(), &room_id)
            .await;
        {
            let mut registry = self.registry.lock().await;
            if registry.remove(&room_id).is_some() {
                self.broadcaster.dissolve(&room_id).await;
            }
            registry.insert(Room::new(room_id.clone()))?;
        }
        self.notify(
            connection_id,
            ServerEvent::CompleteDeleteDb(Feedback::from_result(deleted)),
        )
        .await;

        let added = self
            .gateway
            .upsert_room_entry(room_id.as_str(), &room_id)
            .await;
        self.reply(
            connection_id,
            ServerEvent::CompleteDbAdd(Feedback::from_result(added).with_room(room_id)),
        )
        .await
    }

    /// 主讲人离开房间。外部删除得到最终结果后才从注册表移除房间。
    pub async fn delete_room(
        &self,
        connection_id: ConnectionId,
        payload: HostPayload,
    ) -> ApplicationResult<()> {
        let room_id = RoomId::from_host(&payload.host)?;

        let deleted = self
            .gateway
            .delete_room_entry(room_id.as_str(), &room_id)
            .await;
        {
            let mut registry = self.registry.lock().await;
            if registry.remove(&room_id).is_some() {
                self.broadcaster.dissolve(&room_id).await;
                info!(room_id = %room_id, "room closed");
            }
        }

        self.reply(
            connection_id,
            ServerEvent::DeleteDbAdd(Feedback::from_result(deleted)),
        )
        .await
    }

    pub async fn resend_email(
        &self,
        connection_id: ConnectionId,
        payload: ResendEmailPayload,
    ) -> ApplicationResult<()> {
        let sent = self
            .gateway
            .send_invitation(
                &payload.emails,
                &payload.instructor_name,
                &payload.room_id,
                &self.settings.public_address,
            )
            .await;
        if let Err(err) = &sent {
            warn!(room_id = %payload.room_id, error = %err, "invitation email failed");
        }

        self.reply(
            connection_id,
            ServerEvent::CompleteSendEmail(Feedback::from_result(sent)),
        )
        .await
    }
}
