//! 应用层实现。
//!
//! 房间注册表、带重试的存储网关、广播扇出，以及把连接事件转成注册表修改
//! 和广播的会话路由器。外部系统只以 trait 形式出现，具体实现在基础设施层。

pub mod broadcaster;
pub mod clock;
pub mod collaborators;
pub mod error;
pub mod gateway;
pub mod local_broadcast;
pub mod registry;
pub mod retry;
pub mod services;

pub use broadcaster::{BroadcastError, RoomBroadcaster};
pub use clock::{Clock, SystemClock};
pub use collaborators::{
    AddressResolver, ChatQueue, CollaboratorError, FileBlob, InvitationMailer, ObjectMetadata,
    ObjectRef, ObjectStore, RoomDirectory,
};
pub use error::{ApplicationError, ApplicationResult};
pub use gateway::{StoreGateway, StoreGatewayDependencies};
pub use local_broadcast::LocalRoomBroadcaster;
pub use registry::RoomRegistry;
pub use retry::{retry_async, RetryPolicy, RetryState, TerminalOutcome};
pub use services::{RouterSettings, SessionRouter, SessionRouterDependencies};

#[cfg(any(test, feature = "testing"))]
pub use collaborators::{MockChatQueue, MockRoomDirectory};
