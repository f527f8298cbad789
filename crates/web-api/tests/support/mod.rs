use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{
    LocalRoomBroadcaster, RetryPolicy, RouterSettings, SessionRouter, SessionRouterDependencies,
    StoreGateway, SystemClock,
};
use futures_util::{SinkExt, StreamExt};
use infrastructure::Infrastructure;
use serde_json::Value;
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub infrastructure: Infrastructure,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let infrastructure = Infrastructure::in_memory();
        let broadcaster = LocalRoomBroadcaster::new();
        let session_router = SessionRouter::new(SessionRouterDependencies {
            gateway: StoreGateway::new(infrastructure.gateway_dependencies(RetryPolicy::default())),
            broadcaster: Arc::new(broadcaster.clone()),
            clock: Arc::new(SystemClock),
            settings: RouterSettings {
                object_base_url: "http://files.test/bucket-".into(),
                public_address: "127.0.0.1:8888".into(),
            },
        });
        let app = router(AppState::new(session_router, broadcaster));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            infrastructure,
            _shutdown: shutdown_tx,
        }
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self) -> Client {
        let (ws, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .expect("ws connect");
        ws
    }
}

pub async fn send(ws: &mut Client, frame: Value) {
    ws.send(TungsteniteMessage::Text(frame.to_string().into()))
        .await
        .expect("ws send");
}

pub async fn send_raw(ws: &mut Client, text: &str) {
    ws.send(TungsteniteMessage::Text(text.to_owned().into()))
        .await
        .expect("ws send");
}

/// 读取下一条文本帧并解析为 JSON
pub async fn next_event(ws: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("ws error");
        if let TungsteniteMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("event json");
        }
    }
}

/// 跳过其他事件，直到收到指定名称的事件
pub async fn next_named(ws: &mut Client, name: &str) -> Value {
    loop {
        let event = next_event(ws).await;
        if event["event"] == name {
            return event;
        }
    }
}
