use std::sync::Arc;

use domain::{
    AddToRoomPayload, ChatDraft, ChatEvent, ChatHistoryPayload, ChatSendPayload, ClientEvent,
    ConnectionId, Participant, Room, RoomId, RoomRef, ServerEvent,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    broadcaster::RoomBroadcaster,
    clock::Clock,
    error::{ApplicationError, ApplicationResult},
    gateway::StoreGateway,
    registry::RoomRegistry,
};

/// 路由器运行参数
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// 对象链接前缀，链接格式为 `{前缀}{房间ID}/{文件名}`
    pub object_base_url: String,
    /// 启动时探测到的公网地址，随邀请邮件发出
    pub public_address: String,
}

impl RouterSettings {
    pub fn object_url(&self, room_id: &RoomId, name: &str) -> String {
        format!("{}{}/{}", self.object_base_url, room_id, name)
    }
}

pub struct SessionRouterDependencies {
    pub gateway: StoreGateway,
    pub broadcaster: Arc<dyn RoomBroadcaster>,
    pub clock: Arc<dyn Clock>,
    pub settings: RouterSettings,
}

/// 连接事件路由器
///
/// 注册表由单把锁保护。每个“修改注册表 → 读取广播负载 → 广播”的序列都在
/// 锁内完成；调用外部协作方时不持锁，其他连接的事件可以在此期间穿插执行。
#[derive(Clone)]
pub struct SessionRouter {
    pub(super) registry: Arc<Mutex<RoomRegistry>>,
    pub(super) gateway: StoreGateway,
    pub(super) broadcaster: Arc<dyn RoomBroadcaster>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) settings: Arc<RouterSettings>,
}

impl SessionRouter {
    pub fn new(deps: SessionRouterDependencies) -> Self {
        Self {
            registry: Arc::new(Mutex::new(RoomRegistry::new())),
            gateway: deps.gateway,
            broadcaster: deps.broadcaster,
            clock: deps.clock,
            settings: Arc::new(deps.settings),
        }
    }

    /// 处理一条入站事件。查找不到房间或参与者时记录日志后忽略。
    pub async fn dispatch(&self, connection_id: ConnectionId, event: ClientEvent) {
        let name = event.name();
        debug!(connection_id = %connection_id, event = name, "dispatching client event");

        let result = match event {
            ClientEvent::CreateRoom(payload) => self.create_room(connection_id, payload).await,
            ClientEvent::RedoRoom(payload) => self.redo_room(connection_id, payload).await,
            ClientEvent::ResendEmail(payload) => self.resend_email(connection_id, payload).await,
            ClientEvent::AddToRoom(payload) => self.add_to_room(connection_id, payload).await,
            ClientEvent::DeleteRoom(payload) => self.delete_room(connection_id, payload).await,
            ClientEvent::ChatSendMessage(payload) => {
                self.chat_send_message(connection_id, payload).await
            }
            ClientEvent::ReqRoomInfo(payload) => self.req_room_info(connection_id, payload).await,
            ClientEvent::ToggleHand(payload) => self.toggle_hand(connection_id, payload).await,
            ClientEvent::UploadFile(payload) => self.upload_file(connection_id, payload).await,
            ClientEvent::Disconnect => self.disconnect(connection_id).await,
        };

        match result {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                warn!(connection_id = %connection_id, event = name, error = %err, "lookup miss, event ignored");
            }
            Err(err) => {
                error!(connection_id = %connection_id, event = name, error = %err, "event handling failed");
            }
        }
    }

    pub async fn add_to_room(
        &self,
        connection_id: ConnectionId,
        payload: AddToRoomPayload,
    ) -> ApplicationResult<()> {
        let AddToRoomPayload {
            username,
            user_is_presenter,
            room_id,
        } = payload;
        let participant = Participant::new(username, user_is_presenter, connection_id);
        let role = participant.role();

        {
            let mut registry = self.registry.lock().await;
            let members = registry
                .add_participant(&room_id, participant)?
                .members()
                .to_vec();
            info!(room_id = %room_id, connection_id = %connection_id, %role, "participant entered room");

            self.broadcaster.join(&room_id, connection_id).await;
            self.broadcaster
                .broadcast_to_room(&room_id, ServerEvent::Update(members))
                .await;
        }

        let (_, history) = tokio::join!(
            self.refresh_file_list(&room_id),
            self.send_chat_history(connection_id, &room_id)
        );
        history
    }

    /// 等待历史恢复调用结束后，从内存房间发送聊天记录给加入者。
    async fn send_chat_history(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
    ) -> ApplicationResult<()> {
        if let Err(err) = self.gateway.recover_chat_history(room_id).await {
            debug!(room_id = %room_id, error = %err, "chat history recovery failed");
        }

        let messages = {
            let registry = self.registry.lock().await;
            registry
                .find(room_id)
                .map(|room| room.chat_history().map(<[ChatEvent]>::to_vec))
        }
        .ok_or_else(|| ApplicationError::room_not_found(room_id))?;

        self.reply(
            connection_id,
            ServerEvent::ChatHistory(ChatHistoryPayload { messages }),
        )
        .await
    }

    pub async fn chat_send_message(
        &self,
        connection_id: ConnectionId,
        payload: ChatSendPayload,
    ) -> ApplicationResult<()> {
        let ChatSendPayload {
            room_id,
            username,
            user_is_presenter,
            message,
        } = payload;
        let draft = ChatDraft {
            sender_name: username,
            sender_is_presenter: user_is_presenter,
            message,
        };

        let event = {
            let mut registry = self.registry.lock().await;
            let event = registry.append_chat(&room_id, draft, self.clock.now())?;
            self.broadcaster
                .broadcast_to_room(&room_id, ServerEvent::ChatReceiveMessage(event.clone()))
                .await;
            event
        };
        debug!(
            room_id = %room_id,
            connection_id = %connection_id,
            sequence = event.sequence,
            "chat message accepted"
        );

        if let Err(err) = self.gateway.enqueue_chat_record(&room_id, &event).await {
            warn!(room_id = %room_id, error = %err, "failed to log chat record");
        }
        Ok(())
    }

    pub async fn req_room_info(
        &self,
        connection_id: ConnectionId,
        payload: RoomRef,
    ) -> ApplicationResult<()> {
        let snapshot = self
            .room_snapshot(&payload.room_id)
            .await
            .ok_or_else(|| ApplicationError::room_not_found(&payload.room_id))?;
        self.reply(connection_id, ServerEvent::ResRoomInfo(snapshot))
            .await
    }

    pub async fn toggle_hand(
        &self,
        connection_id: ConnectionId,
        payload: RoomRef,
    ) -> ApplicationResult<()> {
        let room_id = payload.room_id;
        let mut registry = self.registry.lock().await;
        let index = registry.toggle_hand(&room_id, connection_id).ok_or_else(|| {
            ApplicationError::NotFound(format!("participant {connection_id} in room {room_id}"))
        })?;
        let members = registry
            .get(index)
            .map(|room| room.members().to_vec())
            .unwrap_or_default();

        self.broadcaster
            .broadcast_to_room(&room_id, ServerEvent::Update(members))
            .await;
        Ok(())
    }

    /// 连接断开：移除它在每个房间中的座位，每个房间向剩余成员广播一次。
    pub async fn disconnect(&self, connection_id: ConnectionId) -> ApplicationResult<()> {
        let mut registry = self.registry.lock().await;
        let mut rooms_left = 0usize;
        while let Some(room_id) = registry.remove_participant_by_connection(connection_id) {
            let members = registry
                .find(&room_id)
                .map(|room| room.members().to_vec())
                .unwrap_or_default();
            info!(room_id = %room_id, connection_id = %connection_id, "participant left room");

            self.broadcaster.leave(&room_id, connection_id).await;
            self.broadcaster
                .broadcast_to_room(&room_id, ServerEvent::Update(members))
                .await;
            rooms_left += 1;
        }
        if rooms_left == 0 {
            debug!(connection_id = %connection_id, "connection held no seat");
        }
        Ok(())
    }

    pub async fn room_exists(&self, room_id: &RoomId) -> bool {
        self.registry.lock().await.contains(room_id)
    }

    pub async fn room_snapshot(&self, room_id: &RoomId) -> Option<Room> {
        self.registry.lock().await.find(room_id).cloned()
    }

    /// 清空注册表（测试用）
    pub async fn reset_registry(&self) {
        let mut registry = self.registry.lock().await;
        for room_id in registry.room_ids() {
            self.broadcaster.dissolve(&room_id).await;
        }
        registry.reset();
    }

    /// 发送中间结果。请求方已离开时只记录日志，流程继续。
    pub(super) async fn notify(&self, connection_id: ConnectionId, event: ServerEvent) {
        let name = event.name();
        if let Err(err) = self.broadcaster.send_to(connection_id, event).await {
            warn!(connection_id = %connection_id, event = name, error = %err, "requester unreachable, continuing");
        }
    }

    pub(super) async fn reply(
        &self,
        connection_id: ConnectionId,
        event: ServerEvent,
    ) -> ApplicationResult<()> {
        self.broadcaster
            .send_to(connection_id, event)
            .await
            .map_err(Into::into)
    }
}
