//! 会话路由器集成测试
//!
//! 用可编排的内存协作方驱动路由器，通过每条连接的接收端观察广播。

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use application::{
    ChatQueue, Clock, CollaboratorError, FileBlob, InvitationMailer, LocalRoomBroadcaster,
    ObjectMetadata, ObjectRef, ObjectStore, RetryPolicy, RoomDirectory, RouterSettings,
    SessionRouter, SessionRouterDependencies, StoreGateway, StoreGatewayDependencies,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use data_encoding::BASE64;
use domain::{
    AddToRoomPayload, ChatEvent, ChatSendPayload, ClientEvent, ConnectionId, FilePayload,
    FileListing, HostPayload, ResendEmailPayload, RoomId, RoomRef, ServerEvent, Timestamp,
    UploadFilePayload,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc::Receiver, Notify};

#[derive(Default)]
struct StoreState {
    entries: HashSet<String>,
    taken: HashSet<String>,
    check_fails: bool,
    upsert_failures: u32,
    delete_failures: u32,
    upsert_calls: u32,
    delete_calls: u32,
    queue_calls: u32,
    enqueue_fails: bool,
    chat_log: Vec<ChatEvent>,
    objects: Vec<(String, bool)>,
    invitations: Vec<(Vec<String>, String)>,
}

/// 同时充当登记表、队列、对象存储和邮件发送方
#[derive(Default)]
struct FakeStore {
    state: StdMutex<StoreState>,
    delete_gate: Option<Arc<Notify>>,
}

impl FakeStore {
    fn with(configure: impl FnOnce(&mut StoreState)) -> Self {
        let store = Self::default();
        configure(&mut store.state.lock().unwrap());
        store
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

#[async_trait]
impl RoomDirectory for FakeStore {
    async fn check_room_id_unique(&self, room_id: &RoomId) -> Result<bool, CollaboratorError> {
        let state = self.state.lock().unwrap();
        if state.check_fails {
            return Err(CollaboratorError::unavailable("table offline"));
        }
        Ok(!state.taken.contains(room_id.as_str()))
    }

    async fn upsert_room_entry(
        &self,
        host_key: &str,
        _room_id: &RoomId,
    ) -> Result<Value, CollaboratorError> {
        let mut state = self.state.lock().unwrap();
        state.upsert_calls += 1;
        if state.upsert_failures > 0 {
            state.upsert_failures -= 1;
            return Err(CollaboratorError::unavailable("throttled"));
        }
        state.entries.insert(host_key.to_owned());
        Ok(json!({}))
    }

    async fn delete_room_entry(
        &self,
        host_key: &str,
        _room_id: &RoomId,
    ) -> Result<Value, CollaboratorError> {
        if let Some(gate) = &self.delete_gate {
            gate.notified().await;
        }
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        if state.delete_failures > 0 {
            state.delete_failures -= 1;
            return Err(CollaboratorError::unavailable("throttled"));
        }
        // 条目不存在同样视为删除成功
        state.entries.remove(host_key);
        Ok(json!({}))
    }
}

#[async_trait]
impl ChatQueue for FakeStore {
    async fn create_message_queue(&self, room_id: &RoomId) -> Result<String, CollaboratorError> {
        self.state.lock().unwrap().queue_calls += 1;
        Ok(format!("queue-{room_id}"))
    }

    async fn enqueue_chat_record(
        &self,
        _room_id: &RoomId,
        event: &ChatEvent,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock().unwrap();
        if state.enqueue_fails {
            return Err(CollaboratorError::unavailable("queue full"));
        }
        state.chat_log.push(event.clone());
        Ok(())
    }

    async fn recover_chat_history(&self, _room_id: &RoomId) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::NotFound("no queue".into()))
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn upload_object(
        &self,
        _room_id: &RoomId,
        file: FileBlob,
        is_main: bool,
    ) -> Result<ObjectRef, CollaboratorError> {
        let size = file.bytes.len();
        self.state
            .lock()
            .unwrap()
            .objects
            .push((file.name.clone(), is_main));
        Ok(ObjectRef {
            key: file.name,
            size,
        })
    }

    async fn list_objects(&self, _room_id: &RoomId) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.read(|state| state.objects.iter().map(|(name, _)| name.clone()).collect()))
    }

    async fn fetch_object_metadata(
        &self,
        _room_id: &RoomId,
        key: &str,
    ) -> Result<ObjectMetadata, CollaboratorError> {
        self.read(|state| {
            state
                .objects
                .iter()
                .find(|(name, _)| name == key)
                .map(|(name, is_main)| ObjectMetadata {
                    name: name.clone(),
                    is_main: *is_main,
                })
                .ok_or_else(|| CollaboratorError::NotFound(key.to_owned()))
        })
    }
}

#[async_trait]
impl InvitationMailer for FakeStore {
    async fn send_invitation(
        &self,
        recipients: &[String],
        _sender_name: &str,
        _room_id: &RoomId,
        address: &str,
    ) -> Result<Value, CollaboratorError> {
        self.state
            .lock()
            .unwrap()
            .invitations
            .push((recipients.to_vec(), address.to_owned()));
        Ok(json!({"sent": recipients.len()}))
    }
}

struct FixedClock(Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

const BASE_URL: &str = "http://files.test/bucket-";

struct Harness {
    router: SessionRouter,
    broadcaster: LocalRoomBroadcaster,
    store: Arc<FakeStore>,
}

impl Harness {
    fn new(store: FakeStore) -> Self {
        let store = Arc::new(store);
        let broadcaster = LocalRoomBroadcaster::new();
        let gateway = StoreGateway::new(StoreGatewayDependencies {
            directory: store.clone(),
            queue: store.clone(),
            objects: store.clone(),
            mailer: store.clone(),
            policy: RetryPolicy::default(),
        });
        let router = SessionRouter::new(SessionRouterDependencies {
            gateway,
            broadcaster: Arc::new(broadcaster.clone()),
            clock: Arc::new(FixedClock(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())),
            settings: RouterSettings {
                object_base_url: BASE_URL.into(),
                public_address: "203.0.113.7".into(),
            },
        });
        Self {
            router,
            broadcaster,
            store,
        }
    }

    async fn connect(&self) -> (ConnectionId, Receiver<ServerEvent>) {
        let connection_id = ConnectionId::new();
        let rx = self.broadcaster.register(connection_id).await;
        (connection_id, rx)
    }

    /// 创建房间并清空创建者收到的回执
    async fn open_room(&self, host: &str) -> RoomId {
        let (creator, mut rx) = self.connect().await;
        self.router.dispatch(creator, create(host)).await;
        drain(&mut rx);
        room(host)
    }

    async fn join(
        &self,
        name: &str,
        presenter: bool,
        room_id: &RoomId,
    ) -> (ConnectionId, Receiver<ServerEvent>) {
        let (connection_id, rx) = self.connect().await;
        self.router
            .dispatch(connection_id, add(name, presenter, room_id))
            .await;
        (connection_id, rx)
    }
}

fn room(value: &str) -> RoomId {
    RoomId::parse(value).unwrap()
}

fn create(host: &str) -> ClientEvent {
    ClientEvent::CreateRoom(HostPayload { host: host.into() })
}

fn add(name: &str, presenter: bool, room_id: &RoomId) -> ClientEvent {
    ClientEvent::AddToRoom(AddToRoomPayload {
        username: name.into(),
        user_is_presenter: presenter,
        room_id: room_id.clone(),
    })
}

fn chat(room_id: &RoomId, name: &str, message: &str) -> ClientEvent {
    ClientEvent::ChatSendMessage(ChatSendPayload {
        room_id: room_id.clone(),
        username: name.into(),
        user_is_presenter: false,
        message: message.into(),
    })
}

fn info(room_id: &RoomId) -> ClientEvent {
    ClientEvent::ReqRoomInfo(RoomRef {
        room_id: room_id.clone(),
    })
}

fn toggle(room_id: &RoomId) -> ClientEvent {
    ClientEvent::ToggleHand(RoomRef {
        room_id: room_id.clone(),
    })
}

fn drain(rx: &mut Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn named<'a>(events: &'a [ServerEvent], name: &str) -> Vec<&'a ServerEvent> {
    events.iter().filter(|event| event.name() == name).collect()
}

fn member_names(event: &ServerEvent) -> Vec<String> {
    match event {
        ServerEvent::Update(members) => members
            .iter()
            .map(|member| member.display_name().to_owned())
            .collect(),
        other => panic!("expected update, got {other:?}"),
    }
}

#[tokio::test]
async fn example_session_end_to_end() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;

    let (alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    let (bob, mut bob_rx) = harness.join("Bob", false, &h1).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness
        .router
        .dispatch(
            alice,
            ClientEvent::ChatSendMessage(ChatSendPayload {
                room_id: h1.clone(),
                username: "Alice".into(),
                user_is_presenter: true,
                message: "hi".into(),
            }),
        )
        .await;

    for rx in [&mut alice_rx, &mut bob_rx] {
        let events = drain(rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::ChatReceiveMessage(event) => {
                assert_eq!(event.sender_name, "Alice");
                assert_eq!(event.message, "hi");
                assert!(event.sender_is_presenter);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    harness.router.dispatch(bob, info(&h1)).await;
    let events = drain(&mut bob_rx);
    let ServerEvent::ResRoomInfo(snapshot) = &events[0] else {
        panic!("expected res-room-info, got {events:?}");
    };
    let roster: Vec<_> = snapshot
        .members()
        .iter()
        .map(|m| (m.display_name(), m.is_presenter()))
        .collect();
    assert_eq!(roster, vec![("Alice", true), ("Bob", false)]);

    let history = snapshot.chat_history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sender_name, "Alice");
    assert_eq!(history[0].message, "hi");
    assert_eq!(harness.store.read(|s| s.chat_log.len()), 1);
}

#[tokio::test]
async fn create_room_reports_add_then_queue_creation() {
    let harness = Harness::new(FakeStore::default());
    let (creator, mut rx) = harness.connect().await;

    harness.router.dispatch(creator, create("H1")).await;

    let events = drain(&mut rx);
    let names: Vec<_> = events.iter().map(ServerEvent::name).collect();
    assert_eq!(names, vec!["complete-db-add", "complete-queue-creation"]);
    match &events[0] {
        ServerEvent::CompleteDbAdd(feedback) => {
            assert!(feedback.is_ok());
            assert_eq!(feedback.room_id, Some(room("H1")));
        }
        other => panic!("unexpected event {other:?}"),
    }
    match &events[1] {
        ServerEvent::CompleteQueueCreation(feedback) => {
            assert_eq!(feedback.data, json!("queue-H1"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(harness.router.room_exists(&room("H1")).await);
    assert!(harness.store.read(|s| s.entries.contains("H1")));
}

#[tokio::test]
async fn externally_taken_id_yields_duplicate_without_mutation() {
    let harness = Harness::new(FakeStore::with(|s| {
        s.taken.insert("H1".into());
    }));
    let (creator, mut rx) = harness.connect().await;

    harness.router.dispatch(creator, create("H1")).await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::Duplicate(feedback) => {
            assert_eq!(feedback.err, None);
            assert_eq!(feedback.data, json!(false));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(!harness.router.room_exists(&room("H1")).await);
    assert_eq!(harness.store.read(|s| s.upsert_calls), 0);
}

#[tokio::test]
async fn second_create_for_active_room_is_duplicate() {
    let harness = Harness::new(FakeStore::default());
    harness.open_room("H1").await;
    let (creator, mut rx) = harness.connect().await;

    harness.router.dispatch(creator, create("H1")).await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "duplicate");
    assert_eq!(harness.store.read(|s| s.upsert_calls), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_never_share_an_id() {
    let harness = Arc::new(Harness::new(FakeStore::default()));
    let mut receivers = Vec::new();
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let (creator, rx) = harness.connect().await;
        receivers.push(rx);
        let router = harness.router.clone();
        tasks.push(tokio::spawn(async move {
            router.dispatch(creator, create("H1")).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut added = 0;
    let mut duplicates = 0;
    for rx in &mut receivers {
        let events = drain(rx);
        added += named(&events, "complete-db-add").len();
        duplicates += named(&events, "duplicate").len();
    }
    assert_eq!(added, 1);
    assert_eq!(duplicates, 7);
    assert!(harness.router.room_exists(&room("H1")).await);
}

#[tokio::test]
async fn add_entry_succeeds_after_transient_failures() {
    let harness = Harness::new(FakeStore::with(|s| s.upsert_failures = 4));
    let (creator, mut rx) = harness.connect().await;

    harness.router.dispatch(creator, create("H1")).await;

    let events = drain(&mut rx);
    let ServerEvent::CompleteDbAdd(feedback) = &events[0] else {
        panic!("expected complete-db-add, got {events:?}");
    };
    assert!(feedback.is_ok());
    assert_eq!(harness.store.read(|s| s.upsert_calls), 5);
    assert_eq!(named(&events, "complete-queue-creation").len(), 1);
}

#[tokio::test]
async fn exhausted_add_entry_reports_last_error_once() {
    let harness = Harness::new(FakeStore::with(|s| s.upsert_failures = u32::MAX));
    let (creator, mut rx) = harness.connect().await;

    harness.router.dispatch(creator, create("H1")).await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    let ServerEvent::CompleteDbAdd(feedback) = &events[0] else {
        panic!("expected complete-db-add, got {events:?}");
    };
    let err = feedback.err.as_deref().unwrap();
    assert!(err.contains("5 attempts"), "{err}");
    assert!(err.contains("throttled"), "{err}");
    assert_eq!(feedback.room_id, Some(room("H1")));
    assert_eq!(harness.store.read(|s| s.upsert_calls), 5);
    assert_eq!(harness.store.read(|s| s.queue_calls), 0);
}

#[tokio::test]
async fn uniqueness_check_error_is_reported_as_failed_add() {
    let harness = Harness::new(FakeStore::with(|s| s.check_fails = true));
    let (creator, mut rx) = harness.connect().await;

    harness.router.dispatch(creator, create("H1")).await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    let ServerEvent::CompleteDbAdd(feedback) = &events[0] else {
        panic!("expected complete-db-add, got {events:?}");
    };
    assert!(feedback.err.is_some());
    assert!(!harness.router.room_exists(&room("H1")).await);
}

#[tokio::test]
async fn redo_without_existing_entry_still_adds() {
    let harness = Harness::new(FakeStore::default());
    let (creator, mut rx) = harness.connect().await;

    harness
        .router
        .dispatch(creator, ClientEvent::RedoRoom(HostPayload { host: "H1".into() }))
        .await;

    let events = drain(&mut rx);
    let names: Vec<_> = events.iter().map(ServerEvent::name).collect();
    assert_eq!(names, vec!["complete-delete-db", "complete-db-add"]);
    assert!(events.iter().all(|event| match event {
        ServerEvent::CompleteDeleteDb(feedback) | ServerEvent::CompleteDbAdd(feedback) =>
            feedback.is_ok(),
        _ => false,
    }));
    assert!(harness.store.read(|s| s.entries.contains("H1")));
    assert!(harness.router.room_exists(&room("H1")).await);
}

#[tokio::test]
async fn redo_replaces_room_with_an_empty_one() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (_bob, mut bob_rx) = harness.join("Bob", false, &h1).await;
    drain(&mut bob_rx);

    let (creator, _rx) = harness.connect().await;
    harness
        .router
        .dispatch(creator, ClientEvent::RedoRoom(HostPayload { host: "H1".into() }))
        .await;

    let snapshot = harness.router.room_snapshot(&h1).await.unwrap();
    assert!(snapshot.members().is_empty());
    assert!(harness.broadcaster.group_members(&h1).await.is_empty());
}

#[tokio::test]
async fn redo_uses_separate_budgets_for_delete_and_add() {
    let harness = Harness::new(FakeStore::with(|s| {
        s.delete_failures = 4;
        s.upsert_failures = 4;
    }));
    let (creator, mut rx) = harness.connect().await;

    harness
        .router
        .dispatch(creator, ClientEvent::RedoRoom(HostPayload { host: "H1".into() }))
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], ServerEvent::CompleteDeleteDb(f) if f.is_ok()));
    assert!(matches!(&events[1], ServerEvent::CompleteDbAdd(f) if f.is_ok()));
    assert_eq!(harness.store.read(|s| (s.delete_calls, s.upsert_calls)), (5, 5));
}

#[tokio::test]
async fn create_runs_to_completion_after_requester_left() {
    let harness = Harness::new(FakeStore::default());
    let (creator, rx) = harness.connect().await;
    drop(rx);

    harness.router.dispatch(creator, create("H1")).await;

    assert!(harness.router.room_exists(&room("H1")).await);
    assert_eq!(harness.store.read(|s| (s.upsert_calls, s.queue_calls)), (1, 1));
    assert!(harness.store.read(|s| s.entries.contains("H1")));
}

#[tokio::test]
async fn redo_re_adds_entry_after_requester_left() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (creator, rx) = harness.connect().await;
    drop(rx);

    harness
        .router
        .dispatch(creator, ClientEvent::RedoRoom(HostPayload { host: "H1".into() }))
        .await;

    assert_eq!(harness.store.read(|s| (s.delete_calls, s.upsert_calls)), (1, 2));
    assert!(harness.store.read(|s| s.entries.contains("H1")));
    assert!(harness.router.room_exists(&h1).await);
}

#[tokio::test]
async fn delete_room_removes_room_and_later_events_are_no_ops() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    let (bob, mut bob_rx) = harness.join("Bob", false, &h1).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness
        .router
        .dispatch(alice, ClientEvent::DeleteRoom(HostPayload { host: "H1".into() }))
        .await;
    let events = drain(&mut alice_rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ServerEvent::DeleteDbAdd(f) if f.is_ok()));
    assert!(!harness.router.room_exists(&h1).await);

    harness.router.dispatch(bob, toggle(&h1)).await;
    harness.router.dispatch(bob, chat(&h1, "Bob", "anyone?")).await;
    harness.router.dispatch(bob, info(&h1)).await;
    harness
        .router
        .dispatch(
            bob,
            ClientEvent::UploadFile(UploadFilePayload {
                room_id: h1.clone(),
                file: FilePayload {
                    name: "late.pdf".into(),
                    data: BASE64.encode(b"late"),
                },
            }),
        )
        .await;
    harness.router.dispatch(bob, ClientEvent::Disconnect).await;

    assert!(drain(&mut bob_rx).is_empty());
    assert!(drain(&mut alice_rx).is_empty());
    assert!(harness.store.read(|s| s.chat_log.is_empty() && s.objects.is_empty()));
}

#[tokio::test]
async fn room_stays_visible_while_delete_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let harness = Arc::new(Harness::new(FakeStore {
        delete_gate: Some(gate.clone()),
        ..FakeStore::default()
    }));
    let h1 = harness.open_room("H1").await;
    let (presenter, mut presenter_rx) = harness.join("Alice", true, &h1).await;
    let (observer, mut observer_rx) = harness.connect().await;
    drain(&mut presenter_rx);

    let deleting = {
        let router = harness.router.clone();
        tokio::spawn(async move {
            router
                .dispatch(presenter, ClientEvent::DeleteRoom(HostPayload { host: "H1".into() }))
                .await;
        })
    };
    tokio::task::yield_now().await;

    harness.router.dispatch(observer, info(&h1)).await;
    let events = drain(&mut observer_rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "res-room-info");

    gate.notify_one();
    deleting.await.unwrap();

    harness.router.dispatch(observer, info(&h1)).await;
    assert!(drain(&mut observer_rx).is_empty());
    assert_eq!(named(&drain(&mut presenter_rx), "delete-db-add").len(), 1);
}

#[tokio::test]
async fn joined_participant_appears_exactly_once() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (bob, mut bob_rx) = harness.join("Bob", false, &h1).await;

    // 同一连接重复加入被拒绝
    harness.router.dispatch(bob, add("Bob", false, &h1)).await;
    drain(&mut bob_rx);

    harness.router.dispatch(bob, info(&h1)).await;
    let events = drain(&mut bob_rx);
    let ServerEvent::ResRoomInfo(snapshot) = &events[0] else {
        panic!("expected res-room-info, got {events:?}");
    };
    let seats = snapshot
        .members()
        .iter()
        .filter(|member| member.connection_id() == bob)
        .count();
    assert_eq!(seats, 1);
    assert!(!snapshot.members()[0].hand_raised());
}

#[tokio::test]
async fn join_sends_update_file_list_and_history_to_joiner() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    harness.router.dispatch(alice, chat(&h1, "Alice", "welcome")).await;
    drain(&mut alice_rx);

    let (_bob, mut bob_rx) = harness.join("Bob", false, &h1).await;

    let bob_events = drain(&mut bob_rx);
    let updates = named(&bob_events, "update");
    assert_eq!(updates.len(), 1);
    assert_eq!(member_names(updates[0]), vec!["Alice", "Bob"]);
    assert_eq!(
        named(&bob_events, "update-file-list"),
        vec![&ServerEvent::UpdateFileList(FileListing::empty())]
    );
    let history = named(&bob_events, "chat-history");
    assert_eq!(history.len(), 1);
    match history[0] {
        ServerEvent::ChatHistory(payload) => {
            let messages = payload.messages.as_ref().unwrap();
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].message, "welcome");
        }
        other => panic!("unexpected event {other:?}"),
    }

    // 历史只发给加入者
    let alice_events = drain(&mut alice_rx);
    assert!(named(&alice_events, "chat-history").is_empty());
    assert_eq!(named(&alice_events, "update").len(), 1);
}

#[tokio::test]
async fn add_to_unknown_room_is_ignored() {
    let harness = Harness::new(FakeStore::default());
    let (bob, mut bob_rx) = harness.join("Bob", false, &room("nowhere")).await;

    assert!(drain(&mut bob_rx).is_empty());
    assert!(harness.broadcaster.group_members(&room("nowhere")).await.is_empty());
    harness.router.dispatch(bob, ClientEvent::Disconnect).await;
}

#[tokio::test]
async fn toggle_hand_broadcasts_one_fresh_update_to_everyone() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (_alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    let (bob, mut bob_rx) = harness.join("Bob", false, &h1).await;
    let (_carol, mut carol_rx) = harness.join("Carol", false, &h1).await;
    for rx in [&mut alice_rx, &mut bob_rx, &mut carol_rx] {
        drain(rx);
    }

    harness.router.dispatch(bob, toggle(&h1)).await;

    for rx in [&mut alice_rx, &mut bob_rx, &mut carol_rx] {
        let events = drain(rx);
        assert_eq!(events.len(), 1);
        let ServerEvent::Update(members) = &events[0] else {
            panic!("expected update, got {events:?}");
        };
        let raised: Vec<_> = members
            .iter()
            .map(|m| (m.display_name(), m.hand_raised()))
            .collect();
        assert_eq!(
            raised,
            vec![("Alice", false), ("Bob", true), ("Carol", false)]
        );
    }

    harness.router.dispatch(bob, toggle(&h1)).await;
    let events = drain(&mut carol_rx);
    let ServerEvent::Update(members) = &events[0] else {
        panic!("expected update, got {events:?}");
    };
    assert!(!members[1].hand_raised());
}

#[tokio::test]
async fn toggle_hand_by_non_member_broadcasts_nothing() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (_alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    drain(&mut alice_rx);
    let (stranger, mut stranger_rx) = harness.connect().await;

    harness.router.dispatch(stranger, toggle(&h1)).await;

    assert!(drain(&mut alice_rx).is_empty());
    assert!(drain(&mut stranger_rx).is_empty());
}

#[tokio::test]
async fn disconnect_outside_any_room_is_silent() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (_alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    drain(&mut alice_rx);
    let (loner, mut loner_rx) = harness.connect().await;

    harness.router.dispatch(loner, ClientEvent::Disconnect).await;

    assert!(drain(&mut alice_rx).is_empty());
    assert!(drain(&mut loner_rx).is_empty());
}

#[tokio::test]
async fn disconnect_removes_one_participant_and_updates_the_rest() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (_alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    let (bob, mut bob_rx) = harness.join("Bob", false, &h1).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.router.dispatch(bob, ClientEvent::Disconnect).await;

    let events = drain(&mut alice_rx);
    assert_eq!(events.len(), 1);
    assert_eq!(member_names(&events[0]), vec!["Alice"]);
    assert!(drain(&mut bob_rx).is_empty());

    // 第二次断开不再移除任何人
    harness.router.dispatch(bob, ClientEvent::Disconnect).await;
    assert!(drain(&mut alice_rx).is_empty());
    assert_eq!(harness.router.room_snapshot(&h1).await.unwrap().members().len(), 1);
}

#[tokio::test]
async fn closing_connection_frees_every_seat_it_held() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let h2 = harness.open_room("H2").await;
    let (_alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    let (_dave, mut dave_rx) = harness.join("Dave", true, &h2).await;
    let (carol, _carol_rx) = harness.connect().await;
    harness.router.dispatch(carol, add("Carol", false, &h1)).await;
    harness.router.dispatch(carol, add("Carol", false, &h2)).await;
    drain(&mut alice_rx);
    drain(&mut dave_rx);

    // 与传输层关闭时的顺序一致
    harness.router.dispatch(carol, ClientEvent::Disconnect).await;
    harness.broadcaster.unregister(carol).await;

    for (room_id, rx, remaining) in [(&h1, &mut alice_rx, "Alice"), (&h2, &mut dave_rx, "Dave")] {
        let snapshot = harness.router.room_snapshot(room_id).await.unwrap();
        assert_eq!(snapshot.members().len(), 1);
        assert!(!snapshot.has_member(carol));

        let events = drain(rx);
        assert_eq!(events.len(), 1);
        assert_eq!(member_names(&events[0]), vec![remaining]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chat_history_follows_acceptance_order() {
    let harness = Arc::new(Harness::new(FakeStore::default()));
    let h1 = harness.open_room("H1").await;
    let (_alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    drain(&mut alice_rx);

    let mut tasks = Vec::new();
    for sender in 0..4 {
        let router = harness.router.clone();
        let h1 = h1.clone();
        tasks.push(tokio::spawn(async move {
            for n in 0..10 {
                router
                    .dispatch(ConnectionId::new(), chat(&h1, &format!("user{sender}"), &n.to_string()))
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let received: Vec<_> = drain(&mut alice_rx)
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::ChatReceiveMessage(event) => Some(event),
            _ => None,
        })
        .collect();
    let snapshot = harness.router.room_snapshot(&h1).await.unwrap();
    let history = snapshot.chat_history().unwrap();

    assert_eq!(history.len(), 40);
    assert_eq!(received.as_slice(), history);
    let sequences: Vec<_> = history.iter().map(|event| event.sequence).collect();
    assert_eq!(sequences, (1..=40).collect::<Vec<u64>>());

    // 同一发送者的消息保持发送顺序
    for sender in 0..4 {
        let name = format!("user{sender}");
        let mine: Vec<_> = history
            .iter()
            .filter(|event| event.sender_name == name)
            .map(|event| event.message.clone())
            .collect();
        assert_eq!(mine, (0..10).map(|n| n.to_string()).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn chat_queue_failure_does_not_block_broadcast() {
    let harness = Harness::new(FakeStore::with(|s| s.enqueue_fails = true));
    let h1 = harness.open_room("H1").await;
    let (alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    drain(&mut alice_rx);

    harness.router.dispatch(alice, chat(&h1, "Alice", "hi")).await;

    let events = drain(&mut alice_rx);
    assert_eq!(named(&events, "chat-receive-message").len(), 1);
    let snapshot = harness.router.room_snapshot(&h1).await.unwrap();
    assert_eq!(snapshot.chat_history().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_acknowledges_sender_then_refreshes_room() {
    let harness = Harness::new(FakeStore::with(|s| {
        s.objects.push(("slides.pdf".into(), true));
    }));
    let h1 = harness.open_room("H1").await;
    let (alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    let (_bob, mut bob_rx) = harness.join("Bob", false, &h1).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness
        .router
        .dispatch(
            alice,
            ClientEvent::UploadFile(UploadFilePayload {
                room_id: h1.clone(),
                file: FilePayload {
                    name: "notes.txt".into(),
                    data: BASE64.encode(b"lecture notes"),
                },
            }),
        )
        .await;

    let alice_events = drain(&mut alice_rx);
    let names: Vec<_> = alice_events.iter().map(ServerEvent::name).collect();
    assert_eq!(
        names,
        vec!["complete-file-upload", "update-file-list", "update-main-file"]
    );
    match &alice_events[0] {
        ServerEvent::CompleteFileUpload(feedback) => {
            assert_eq!(feedback.data, json!({"key": "notes.txt", "size": 13}));
        }
        other => panic!("unexpected event {other:?}"),
    }

    let bob_events = drain(&mut bob_rx);
    assert!(named(&bob_events, "complete-file-upload").is_empty());
    assert_eq!(
        named(&bob_events, "update-file-list"),
        vec![&ServerEvent::UpdateFileList(FileListing::files(vec![
            ("slides.pdf".into(), format!("{BASE_URL}H1/slides.pdf")),
            ("notes.txt".into(), format!("{BASE_URL}H1/notes.txt")),
        ]))]
    );
    match named(&bob_events, "update-main-file")[0] {
        ServerEvent::UpdateMainFile(feedback) => {
            assert_eq!(feedback.data, json!(format!("{BASE_URL}H1/slides.pdf")));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_upload_is_reported_to_sender_only() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    let (alice, mut alice_rx) = harness.join("Alice", true, &h1).await;
    drain(&mut alice_rx);

    harness
        .router
        .dispatch(
            alice,
            ClientEvent::UploadFile(UploadFilePayload {
                room_id: h1.clone(),
                file: FilePayload {
                    name: "broken.bin".into(),
                    data: "***".into(),
                },
            }),
        )
        .await;

    let events = drain(&mut alice_rx);
    assert_eq!(events.len(), 1);
    let ServerEvent::CompleteFileUpload(feedback) = &events[0] else {
        panic!("expected complete-file-upload, got {events:?}");
    };
    assert!(feedback.err.is_some());
    assert!(harness.store.read(|s| s.objects.is_empty()));
}

#[tokio::test]
async fn resend_email_uses_discovered_address() {
    let harness = Harness::new(FakeStore::default());
    let (presenter, mut rx) = harness.connect().await;

    harness
        .router
        .dispatch(
            presenter,
            ClientEvent::ResendEmail(ResendEmailPayload {
                emails: vec!["a@example.com".into(), "b@example.com".into()],
                instructor_name: "Alice".into(),
                room_id: room("H1"),
            }),
        )
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    let ServerEvent::CompleteSendEmail(feedback) = &events[0] else {
        panic!("expected complete-send-email, got {events:?}");
    };
    assert_eq!(feedback.data, json!({"sent": 2}));
    let invitations = harness.store.read(|s| s.invitations.clone());
    assert_eq!(invitations.len(), 1);
    assert_eq!(invitations[0].1, "203.0.113.7");
}

#[tokio::test]
async fn reset_registry_drops_all_rooms() {
    let harness = Harness::new(FakeStore::default());
    let h1 = harness.open_room("H1").await;
    harness.open_room("H2").await;

    harness.router.reset_registry().await;

    assert!(!harness.router.room_exists(&h1).await);
    assert!(!harness.router.room_exists(&room("H2")).await);
}
