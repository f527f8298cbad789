use async_trait::async_trait;
use domain::{ConnectionId, RoomId, ServerEvent};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),
    #[error("outbound queue of connection {0} is full")]
    QueueFull(ConnectionId),
}

/// 房间范围的事件扇出。
///
/// 加入与离开广播组必须和许可它的注册表修改处在同一临界区内。
#[async_trait]
pub trait RoomBroadcaster: Send + Sync {
    async fn join(&self, room_id: &RoomId, connection_id: ConnectionId);

    async fn leave(&self, room_id: &RoomId, connection_id: ConnectionId);

    /// 解散整个广播组
    async fn dissolve(&self, room_id: &RoomId);

    /// 发给房间内每条连接，返回实际送达的连接数
    async fn broadcast_to_room(&self, room_id: &RoomId, event: ServerEvent) -> usize;

    async fn send_to(
        &self,
        connection_id: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), BroadcastError>;
}
