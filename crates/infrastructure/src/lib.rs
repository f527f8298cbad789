//! 基础设施层实现。
//!
//! 提供应用层协作方接口的进程内实现：房间登记表、聊天队列、对象存储、
//! 邀请邮件，以及公网地址探测。

pub mod address;
pub mod builder;
pub mod chat_queue;
pub mod directory;
pub mod mailer;
pub mod object_store;

pub use address::{HttpAddressResolver, ResolveError, StaticAddressResolver};
pub use builder::{address_resolver, Infrastructure};
pub use chat_queue::InMemoryChatQueue;
pub use directory::{InMemoryRoomDirectory, RoomEntry};
pub use mailer::{Invitation, LoggingInvitationMailer};
pub use object_store::InMemoryObjectStore;
