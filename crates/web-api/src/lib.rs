//! Web API 层。
//!
//! 提供 Axum 路由：房间入口页、健康检查，以及承载会话事件的 WebSocket 端点。

mod error;
mod routes;
mod state;
mod ws_connection;

pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
pub use ws_connection::SessionConnection;
