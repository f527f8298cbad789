//! 存储网关
//!
//! 把每个外部存储操作包装成单次异步调用。登记表写入、删除和队列创建走有界
//! 重试；其余操作失败一次即上报。网关本身不去重，幂等性由协作方保证。

use std::sync::Arc;

use domain::{ChatEvent, RoomId};
use serde_json::Value;
use tracing::{debug, error};

use crate::collaborators::{
    ChatQueue, FileBlob, InvitationMailer, ObjectMetadata, ObjectRef, ObjectStore, RoomDirectory,
};
use crate::error::{ApplicationError, ApplicationResult};
use crate::retry::{retry_async, RetryPolicy, TerminalOutcome};

pub struct StoreGatewayDependencies {
    pub directory: Arc<dyn RoomDirectory>,
    pub queue: Arc<dyn ChatQueue>,
    pub objects: Arc<dyn ObjectStore>,
    pub mailer: Arc<dyn InvitationMailer>,
    pub policy: RetryPolicy,
}

#[derive(Clone)]
pub struct StoreGateway {
    directory: Arc<dyn RoomDirectory>,
    queue: Arc<dyn ChatQueue>,
    objects: Arc<dyn ObjectStore>,
    mailer: Arc<dyn InvitationMailer>,
    policy: RetryPolicy,
}

impl StoreGateway {
    pub fn new(deps: StoreGatewayDependencies) -> Self {
        Self {
            directory: deps.directory,
            queue: deps.queue,
            objects: deps.objects,
            mailer: deps.mailer,
            policy: deps.policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 唯一性检查不重试；ID 已存在返回 `NotUnique`。
    pub async fn check_room_id_unique(&self, room_id: &RoomId) -> ApplicationResult<()> {
        match self.directory.check_room_id_unique(room_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ApplicationError::NotUnique(room_id.clone())),
            Err(err) => Err(ApplicationError::collaborator("check_room_id_unique", err)),
        }
    }

    pub async fn upsert_room_entry(
        &self,
        host_key: &str,
        room_id: &RoomId,
    ) -> ApplicationResult<Value> {
        let outcome = retry_async(self.policy, "upsert_room_entry", || {
            self.directory.upsert_room_entry(host_key, room_id)
        })
        .await;
        terminal("upsert_room_entry", room_id, outcome)
    }

    pub async fn delete_room_entry(
        &self,
        host_key: &str,
        room_id: &RoomId,
    ) -> ApplicationResult<Value> {
        let outcome = retry_async(self.policy, "delete_room_entry", || {
            self.directory.delete_room_entry(host_key, room_id)
        })
        .await;
        terminal("delete_room_entry", room_id, outcome)
    }

    pub async fn create_message_queue(&self, room_id: &RoomId) -> ApplicationResult<String> {
        let outcome = retry_async(self.policy, "create_message_queue", || {
            self.queue.create_message_queue(room_id)
        })
        .await;
        terminal("create_message_queue", room_id, outcome)
    }

    pub async fn enqueue_chat_record(
        &self,
        room_id: &RoomId,
        event: &ChatEvent,
    ) -> ApplicationResult<()> {
        self.queue
            .enqueue_chat_record(room_id, event)
            .await
            .map_err(|err| ApplicationError::collaborator("enqueue_chat_record", err))
    }

    pub async fn recover_chat_history(&self, room_id: &RoomId) -> ApplicationResult<()> {
        self.queue
            .recover_chat_history(room_id)
            .await
            .map_err(|err| ApplicationError::collaborator("recover_chat_history", err))
    }

    pub async fn upload_object(
        &self,
        room_id: &RoomId,
        file: FileBlob,
        is_main: bool,
    ) -> ApplicationResult<ObjectRef> {
        self.objects
            .upload_object(room_id, file, is_main)
            .await
            .map_err(|err| ApplicationError::collaborator("upload_object", err))
    }

    pub async fn list_objects(&self, room_id: &RoomId) -> ApplicationResult<Vec<String>> {
        self.objects
            .list_objects(room_id)
            .await
            .map_err(|err| ApplicationError::collaborator("list_objects", err))
    }

    pub async fn fetch_object_metadata(
        &self,
        room_id: &RoomId,
        key: &str,
    ) -> ApplicationResult<ObjectMetadata> {
        self.objects
            .fetch_object_metadata(room_id, key)
            .await
            .map_err(|err| ApplicationError::collaborator("fetch_object_metadata", err))
    }

    pub async fn send_invitation(
        &self,
        recipients: &[String],
        sender_name: &str,
        room_id: &RoomId,
        address: &str,
    ) -> ApplicationResult<Value> {
        self.mailer
            .send_invitation(recipients, sender_name, room_id, address)
            .await
            .map_err(|err| ApplicationError::collaborator("send_invitation", err))
    }
}

fn terminal<T>(
    operation: &'static str,
    room_id: &RoomId,
    outcome: TerminalOutcome<T>,
) -> ApplicationResult<T> {
    let TerminalOutcome { result, attempts } = outcome;
    match result {
        Ok(value) => {
            debug!(operation, room_id = %room_id, attempts, "store call completed");
            Ok(value)
        }
        Err(source) => {
            error!(operation, room_id = %room_id, attempts, error = %source, "store call exhausted its retry budget");
            Err(ApplicationError::TerminalStoreFailure {
                operation,
                attempts,
                source,
            })
        }
    }
}
