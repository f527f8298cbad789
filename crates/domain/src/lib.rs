//! 课堂协作系统核心领域模型
//!
//! 包含房间、参与者、聊天事件等核心实体，以及连接上收发的事件协议。

pub mod entities;
pub mod errors;
pub mod events;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use value_objects::*;
