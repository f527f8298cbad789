//! 连接事件协议
//!
//! 客户端与服务端之间按事件名收发的消息定义。

pub mod session_event;

// 重新导出事件类型
pub use session_event::*;
