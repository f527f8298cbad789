use serde::{Deserialize, Serialize};

use crate::value_objects::{RoomId, Timestamp};

/// 待追加的聊天内容，发送者身份取自客户端请求。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatDraft {
    pub sender_name: String,
    pub sender_is_presenter: bool,
    pub message: String,
}

/// 已追加到房间历史中的聊天事件，追加后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
    #[serde(rename = "username")]
    pub sender_name: String,
    #[serde(rename = "userIsPresenter")]
    pub sender_is_presenter: bool,
    pub message: String,
    /// 服务端分配的发送时间（毫秒时间戳）
    #[serde(rename = "sentTime", with = "chrono::serde::ts_milliseconds")]
    pub sent_at: Timestamp,
    /// 房间内的追加序号，从 1 开始
    pub sequence: u64,
}
