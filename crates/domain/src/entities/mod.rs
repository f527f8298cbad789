//! 领域实体定义
//!
//! 包含系统的核心实体：房间、参与者、聊天事件。

pub mod chat;
pub mod participant;
pub mod room;

pub use chat::{ChatDraft, ChatEvent};
pub use participant::{Participant, ParticipantRole};
pub use room::Room;
