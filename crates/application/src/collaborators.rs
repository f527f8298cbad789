//! 外部协作方契约
//!
//! 键值表、消息队列、对象存储、邮件发送以及公网地址探测。核心只依赖这里的
//! 接口，具体实现位于基础设施层。

use async_trait::async_trait;
use domain::{ChatEvent, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 协作方调用失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl CollaboratorError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// 待上传的文件内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// 上传完成后对象存储返回的引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    pub size: usize,
}

/// 对象元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub name: String,
    pub is_main: bool,
}

/// 房间登记表（键值表）
///
/// 写入与删除会被原样重发，实现方必须保证幂等：写入为 upsert，
/// 删除不存在的条目视为成功。
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn check_room_id_unique(&self, room_id: &RoomId) -> Result<bool, CollaboratorError>;

    async fn upsert_room_entry(
        &self,
        host_key: &str,
        room_id: &RoomId,
    ) -> Result<Value, CollaboratorError>;

    async fn delete_room_entry(
        &self,
        host_key: &str,
        room_id: &RoomId,
    ) -> Result<Value, CollaboratorError>;
}

/// 聊天记录队列
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ChatQueue: Send + Sync {
    /// 创建房间的聊天队列，返回队列引用
    async fn create_message_queue(&self, room_id: &RoomId) -> Result<String, CollaboratorError>;

    async fn enqueue_chat_record(
        &self,
        room_id: &RoomId,
        event: &ChatEvent,
    ) -> Result<(), CollaboratorError>;

    /// 历史从内存房间读取，这里只关心调用是否完成
    async fn recover_chat_history(&self, room_id: &RoomId) -> Result<(), CollaboratorError>;
}

/// 房间文件的对象存储
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload_object(
        &self,
        room_id: &RoomId,
        file: FileBlob,
        is_main: bool,
    ) -> Result<ObjectRef, CollaboratorError>;

    async fn list_objects(&self, room_id: &RoomId) -> Result<Vec<String>, CollaboratorError>;

    async fn fetch_object_metadata(
        &self,
        room_id: &RoomId,
        key: &str,
    ) -> Result<ObjectMetadata, CollaboratorError>;
}

/// 邀请邮件发送
#[async_trait]
pub trait InvitationMailer: Send + Sync {
    async fn send_invitation(
        &self,
        recipients: &[String],
        sender_name: &str,
        room_id: &RoomId,
        address: &str,
    ) -> Result<Value, CollaboratorError>;
}

/// 公网地址探测，进程启动时调用一次
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn discover_public_address(&self) -> Result<String, CollaboratorError>;
}
