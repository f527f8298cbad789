// 进程内广播器实现
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{ConnectionId, RoomId, ServerEvent};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::broadcaster::{BroadcastError, RoomBroadcaster};

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    groups: HashMap<RoomId, Vec<ConnectionId>>,
}

/// 每条连接一个有界发送队列，同一连接上的事件按入队顺序送达。
/// 队列满时丢弃新事件，不阻塞其他连接。
#[derive(Clone)]
pub struct LocalRoomBroadcaster {
    inner: Arc<RwLock<Inner>>,
    capacity: usize,
}

impl Default for LocalRoomBroadcaster {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl LocalRoomBroadcaster {
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            capacity: capacity.max(1),
        }
    }

    /// 登记新连接，返回该连接的事件接收端
    pub async fn register(&self, connection_id: ConnectionId) -> mpsc::Receiver<ServerEvent> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.inner
            .write()
            .await
            .connections
            .insert(connection_id, sender);
        receiver
    }

    /// 注销连接并把它从所有广播组中移除
    pub async fn unregister(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.write().await;
        inner.connections.remove(&connection_id);
        inner.groups.retain(|_, members| {
            members.retain(|member| *member != connection_id);
            !members.is_empty()
        });
    }

    pub async fn group_members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.inner
            .read()
            .await
            .groups
            .get(room_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoomBroadcaster for LocalRoomBroadcaster {
    async fn join(&self, room_id: &RoomId, connection_id: ConnectionId) {
        let mut inner = self.inner.write().await;
        let members = inner.groups.entry(room_id.clone()).or_default();
        if !members.contains(&connection_id) {
            members.push(connection_id);
        }
    }

    async fn leave(&self, room_id: &RoomId, connection_id: ConnectionId) {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.groups.get_mut(room_id) {
            members.retain(|member| *member != connection_id);
            if members.is_empty() {
                inner.groups.remove(room_id);
            }
        }
    }

    async fn dissolve(&self, room_id: &RoomId) {
        self.inner.write().await.groups.remove(room_id);
    }

    async fn broadcast_to_room(&self, room_id: &RoomId, event: ServerEvent) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.groups.get(room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for connection_id in members {
            let Some(sender) = inner.connections.get(connection_id) else {
                debug!(room_id = %room_id, connection_id = %connection_id, "skipping unregistered connection");
                continue;
            };
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => warn!(
                    room_id = %room_id,
                    connection_id = %connection_id,
                    event = event.name(),
                    "outbound queue full, event dropped"
                ),
                Err(TrySendError::Closed(_)) => debug!(
                    room_id = %room_id,
                    connection_id = %connection_id,
                    event = event.name(),
                    "skipping closed connection"
                ),
            }
        }
        delivered
    }

    async fn send_to(
        &self,
        connection_id: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), BroadcastError> {
        let inner = self.inner.read().await;
        let sender = inner
            .connections
            .get(&connection_id)
            .ok_or(BroadcastError::UnknownConnection(connection_id))?;
        sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => BroadcastError::QueueFull(connection_id),
            TrySendError::Closed(_) => BroadcastError::ConnectionClosed(connection_id),
        })
    }
}
