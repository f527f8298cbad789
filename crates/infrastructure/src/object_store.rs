use std::collections::HashMap;

use application::{CollaboratorError, FileBlob, ObjectMetadata, ObjectRef, ObjectStore};
use async_trait::async_trait;
use domain::RoomId;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone)]
struct StoredObject {
    name: String,
    bytes: Vec<u8>,
    is_main: bool,
}

/// 按房间分桶的内存对象存储，同名上传覆盖旧对象但保留其位置。
#[derive(Default)]
pub struct InMemoryObjectStore {
    buckets: RwLock<HashMap<RoomId, Vec<StoredObject>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object_bytes(&self, room_id: &RoomId, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .read()
            .await
            .get(room_id)?
            .iter()
            .find(|object| object.name == key)
            .map(|object| object.bytes.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload_object(
        &self,
        room_id: &RoomId,
        file: FileBlob,
        is_main: bool,
    ) -> Result<ObjectRef, CollaboratorError> {
        if file.name.trim().is_empty() {
            return Err(CollaboratorError::rejected("object name cannot be empty"));
        }
        let object = StoredObject {
            name: file.name,
            bytes: file.bytes,
            is_main,
        };
        let reference = ObjectRef {
            key: object.name.clone(),
            size: object.bytes.len(),
        };

        let mut buckets = self.buckets.write().await;
        let bucket = buckets.entry(room_id.clone()).or_default();
        match bucket.iter_mut().find(|existing| existing.name == object.name) {
            Some(existing) => *existing = object,
            None => bucket.push(object),
        }
        info!(room_id = %room_id, key = %reference.key, size = reference.size, "object stored");
        Ok(reference)
    }

    async fn list_objects(&self, room_id: &RoomId) -> Result<Vec<String>, CollaboratorError> {
        Ok(self
            .buckets
            .read()
            .await
            .get(room_id)
            .map(|bucket| bucket.iter().map(|object| object.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn fetch_object_metadata(
        &self,
        room_id: &RoomId,
        key: &str,
    ) -> Result<ObjectMetadata, CollaboratorError> {
        self.buckets
            .read()
            .await
            .get(room_id)
            .and_then(|bucket| bucket.iter().find(|object| object.name == key))
            .map(|object| ObjectMetadata {
                name: object.name.clone(),
                is_main: object.is_main,
            })
            .ok_or_else(|| CollaboratorError::NotFound(format!("{room_id}/{key}")))
    }
}
