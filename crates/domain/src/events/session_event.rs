use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::{ChatEvent, Participant, Room};
use crate::value_objects::RoomId;

/// 没有文件时 `update-file-list` 的负载
pub const NO_FILES_NOTICE: &str = "No files to view";

/// 客户端发往服务端的事件。
///
/// 线上格式为 `{"event": "<名称>", "data": <负载>}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    CreateRoom(HostPayload),
    RedoRoom(HostPayload),
    ResendEmail(ResendEmailPayload),
    AddToRoom(AddToRoomPayload),
    DeleteRoom(HostPayload),
    ChatSendMessage(ChatSendPayload),
    ReqRoomInfo(RoomRef),
    ToggleHand(RoomRef),
    UploadFile(UploadFilePayload),
    Disconnect,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom(_) => "create-room",
            Self::RedoRoom(_) => "redo-room",
            Self::ResendEmail(_) => "resend-email",
            Self::AddToRoom(_) => "add-to-room",
            Self::DeleteRoom(_) => "delete-room",
            Self::ChatSendMessage(_) => "chat-send-message",
            Self::ReqRoomInfo(_) => "req-room-info",
            Self::ToggleHand(_) => "toggle-hand",
            Self::UploadFile(_) => "upload-file",
            Self::Disconnect => "disconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPayload {
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendEmailPayload {
    pub emails: Vec<String>,
    #[serde(rename = "instructorName")]
    pub instructor_name: String,
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddToRoomPayload {
    pub username: String,
    #[serde(rename = "userIsPresenter")]
    pub user_is_presenter: bool,
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSendPayload {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
    pub username: String,
    #[serde(rename = "userIsPresenter")]
    pub user_is_presenter: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFilePayload {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
    pub file: FilePayload,
}

/// 上传的文件，`data` 为 base64 编码内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    pub name: String,
    pub data: String,
}

/// 服务端发往客户端的事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Duplicate(Feedback),
    CompleteDbAdd(Feedback),
    CompleteDeleteDb(Feedback),
    DeleteDbAdd(Feedback),
    CompleteQueueCreation(Feedback),
    CompleteSendEmail(Feedback),
    Update(Vec<Participant>),
    ChatHistory(ChatHistoryPayload),
    ChatReceiveMessage(ChatEvent),
    ResRoomInfo(Room),
    CompleteFileUpload(Feedback),
    UpdateMainFile(Feedback),
    UpdateFileList(FileListing),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "duplicate",
            Self::CompleteDbAdd(_) => "complete-db-add",
            Self::CompleteDeleteDb(_) => "complete-delete-db",
            Self::DeleteDbAdd(_) => "delete-db-add",
            Self::CompleteQueueCreation(_) => "complete-queue-creation",
            Self::CompleteSendEmail(_) => "complete-send-email",
            Self::Update(_) => "update",
            Self::ChatHistory(_) => "chat-history",
            Self::ChatReceiveMessage(_) => "chat-receive-message",
            Self::ResRoomInfo(_) => "res-room-info",
            Self::CompleteFileUpload(_) => "complete-file-upload",
            Self::UpdateMainFile(_) => "update-main-file",
            Self::UpdateFileList(_) => "update-file-list",
        }
    }
}

/// 外部操作的最终结果：`{err, data}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub err: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(rename = "roomID", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

impl Feedback {
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            err: None,
            data: data.into(),
            room_id: None,
        }
    }

    pub fn error(err: impl Display) -> Self {
        Self {
            err: Some(err.to_string()),
            data: Value::Null,
            room_id: None,
        }
    }

    pub fn from_result<E: Display>(result: Result<Value, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::error(err),
        }
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistoryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatEvent>>,
}

/// `update-file-list` 的负载：文件列表或“无文件”提示。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileListing {
    Files {
        err: Option<String>,
        /// `[名称, 链接]` 对
        data: Vec<(String, String)>,
    },
    Empty(String),
}

impl FileListing {
    pub fn files(data: Vec<(String, String)>) -> Self {
        Self::Files { err: None, data }
    }

    pub fn empty() -> Self {
        Self::Empty(NO_FILES_NOTICE.to_owned())
    }
}
