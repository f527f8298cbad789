// 内存聊天记录队列
use std::collections::HashMap;

use application::{ChatQueue, CollaboratorError};
use async_trait::async_trait;
use domain::{ChatEvent, RoomId};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
pub struct InMemoryChatQueue {
    queues: RwLock<HashMap<RoomId, Vec<ChatEvent>>>,
}

impl InMemoryChatQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_name(room_id: &RoomId) -> String {
        format!("chat-{room_id}")
    }

    /// 队列中已记录的聊天事件
    pub async fn records(&self, room_id: &RoomId) -> Option<Vec<ChatEvent>> {
        self.queues.read().await.get(room_id).cloned()
    }
}

#[async_trait]
impl ChatQueue for InMemoryChatQueue {
    async fn create_message_queue(&self, room_id: &RoomId) -> Result<String, CollaboratorError> {
        self.queues
            .write()
            .await
            .entry(room_id.clone())
            .or_default();
        info!(room_id = %room_id, "chat queue ready");
        Ok(Self::queue_name(room_id))
    }

    async fn enqueue_chat_record(
        &self,
        room_id: &RoomId,
        event: &ChatEvent,
    ) -> Result<(), CollaboratorError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(room_id)
            .ok_or_else(|| CollaboratorError::NotFound(Self::queue_name(room_id)))?;
        queue.push(event.clone());
        debug!(room_id = %room_id, sequence = event.sequence, "chat record queued");
        Ok(())
    }

    async fn recover_chat_history(&self, room_id: &RoomId) -> Result<(), CollaboratorError> {
        let queues = self.queues.read().await;
        match queues.get(room_id) {
            Some(records) => {
                debug!(room_id = %room_id, records = records.len(), "chat history recovered");
                Ok(())
            }
            None => Err(CollaboratorError::NotFound(Self::queue_name(room_id))),
        }
    }
}
