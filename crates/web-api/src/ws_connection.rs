use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{ClientEvent, ConnectionId};
use futures_util::{stream::SplitStream, SinkExt, StreamExt};

use crate::state::AppState;

/// 单条 WebSocket 连接上的会话
///
/// 出站事件由独立任务写入套接字；入站事件在当前任务内按到达顺序逐条分发，
/// 不同连接之间互不阻塞。
pub struct SessionConnection {
    socket: WebSocket,
    state: AppState,
    connection_id: ConnectionId,
}

impl SessionConnection {
    pub fn new(socket: WebSocket, state: AppState) -> Self {
        Self {
            socket,
            state,
            connection_id: ConnectionId::new(),
        }
    }

    pub async fn run(self) {
        let Self {
            socket,
            state,
            connection_id,
        } = self;
        tracing::info!(%connection_id, "session connection opened");

        let mut outbound = state.broadcaster.register(connection_id).await;
        let (mut sender, incoming) = socket.split();

        let send_task = tokio::spawn(async move {
            while let Some(event) = outbound.recv().await {
                let payload = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(error = %err, event = event.name(), "failed to serialize server event");
                        continue;
                    }
                };
                if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                    tracing::debug!(%connection_id, "socket closed while sending");
                    break;
                }
            }
            let _ = sender.close().await;
        });

        Self::receive_loop(&state, connection_id, incoming).await;

        // 断开总是走一遍离开流程，无论是否显式发送过 disconnect
        state
            .router
            .dispatch(connection_id, ClientEvent::Disconnect)
            .await;
        state.broadcaster.unregister(connection_id).await;

        if let Err(err) = send_task.await {
            tracing::warn!(%connection_id, error = %err, "send task aborted");
        }
        tracing::info!(%connection_id, "session connection closed");
    }

    async fn receive_loop(
        state: &AppState,
        connection_id: ConnectionId,
        mut incoming: SplitStream<WebSocket>,
    ) {
        while let Some(message) = incoming.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(%connection_id, error = %err, "socket read failed");
                    break;
                }
            };
            let text = match message {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => break,
                // axum 自动回复 ping
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Binary(_) => continue,
            };

            let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(%connection_id, error = %err, "malformed client event skipped");
                    continue;
                }
            };
            if matches!(event, ClientEvent::Disconnect) {
                break;
            }
            tracing::debug!(%connection_id, event = event.name(), "client event received");
            state.router.dispatch(connection_id, event).await;
        }
    }
}

