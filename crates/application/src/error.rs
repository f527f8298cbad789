use domain::{DomainError, RoomId};
use thiserror::Error;

use crate::broadcaster::BroadcastError;
use crate::collaborators::CollaboratorError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 房间 ID 冲突，属于正常结果，不重试
    #[error("room id {0} already exists")]
    NotUnique(RoomId),
    /// 重试预算耗尽
    #[error("{operation} failed after {attempts} attempts: {source}")]
    TerminalStoreFailure {
        operation: &'static str,
        attempts: u32,
        source: CollaboratorError,
    },
    /// 房间或参与者已不存在
    #[error("{0} not found")]
    NotFound(String),
    /// 不重试的协作方调用失败
    #[error("{operation} failed: {source}")]
    CollaboratorFailure {
        operation: &'static str,
        source: CollaboratorError,
    },
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("domain error: {0}")]
    Domain(DomainError),
    #[error("broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),
}

impl ApplicationError {
    pub fn collaborator(operation: &'static str, source: CollaboratorError) -> Self {
        Self::CollaboratorFailure { operation, source }
    }

    pub fn room_not_found(room_id: &RoomId) -> Self {
        Self::NotFound(format!("room {room_id}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<DomainError> for ApplicationError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::RoomNotFound(room_id) => Self::room_not_found(&room_id),
            DomainError::RoomAlreadyExists(room_id) => Self::NotUnique(room_id),
            other => Self::Domain(other),
        }
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
