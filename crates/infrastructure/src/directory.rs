use std::collections::HashMap;

use application::{CollaboratorError, RoomDirectory};
use async_trait::async_trait;
use domain::RoomId;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

/// 登记表中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomEntry {
    #[serde(rename = "hostKey")]
    pub host_key: String,
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
}

/// 内存键值表，以主机标识为键
///
/// 写入为 upsert，删除不存在的键也返回成功，两者都可以安全重发。
#[derive(Default)]
pub struct InMemoryRoomDirectory {
    entries: RwLock<HashMap<String, RoomEntry>>,
}

impl InMemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry(&self, host_key: &str) -> Option<RoomEntry> {
        self.entries.read().await.get(host_key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn ack(entry: &RoomEntry) -> Result<Value, CollaboratorError> {
    serde_json::to_value(entry).map_err(|err| CollaboratorError::rejected(err.to_string()))
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn check_room_id_unique(&self, room_id: &RoomId) -> Result<bool, CollaboratorError> {
        let entries = self.entries.read().await;
        let taken = entries
            .values()
            .any(|entry| &entry.room_id == room_id || entry.host_key == room_id.as_str());
        Ok(!taken)
    }

    async fn upsert_room_entry(
        &self,
        host_key: &str,
        room_id: &RoomId,
    ) -> Result<Value, CollaboratorError> {
        let entry = RoomEntry {
            host_key: host_key.to_owned(),
            room_id: room_id.clone(),
        };
        let ack = ack(&entry)?;
        self.entries.write().await.insert(host_key.to_owned(), entry);
        debug!(host_key, room_id = %room_id, "room entry stored");
        Ok(ack)
    }

    async fn delete_room_entry(
        &self,
        host_key: &str,
        room_id: &RoomId,
    ) -> Result<Value, CollaboratorError> {
        let removed = self.entries.write().await.remove(host_key);
        debug!(host_key, room_id = %room_id, existed = removed.is_some(), "room entry deleted");
        match removed {
            Some(entry) => ack(&entry),
            None => Ok(Value::Null),
        }
    }
}
