//! 领域模型错误定义

use thiserror::Error;

use crate::value_objects::{ConnectionId, RoomId};

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 参数非法
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 房间 ID 已被占用
    #[error("room {0} already exists")]
    RoomAlreadyExists(RoomId),

    /// 房间不存在
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// 同一连接在房间中已有参与者
    #[error("connection {connection_id} already joined room {room_id}")]
    AlreadyJoined {
        room_id: RoomId,
        connection_id: ConnectionId,
    },
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
