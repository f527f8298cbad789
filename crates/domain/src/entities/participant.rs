use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::ConnectionId;

/// 参与者角色，加入时确定，之后不可变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Presenter,
    Attendee,
}

impl ParticipantRole {
    pub fn from_flag(is_presenter: bool) -> Self {
        if is_presenter {
            Self::Presenter
        } else {
            Self::Attendee
        }
    }

    pub fn is_presenter(self) -> bool {
        matches!(self, Self::Presenter)
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Presenter => f.write_str("presenter"),
            Self::Attendee => f.write_str("attendee"),
        }
    }
}

impl FromStr for ParticipantRole {
    type Err = DomainError;

    /// 路由参数同时接受完整名称和单字母缩写（`p` / `a`）。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "presenter" | "p" => Ok(Self::Presenter),
            "attendee" | "a" => Ok(Self::Attendee),
            other => Err(DomainError::invalid_argument(
                "role",
                format!("unknown role `{other}`"),
            )),
        }
    }
}

/// 连接用户在房间内的成员记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "name")]
    display_name: String,
    #[serde(rename = "isPresenter")]
    is_presenter: bool,
    #[serde(rename = "socketID")]
    connection_id: ConnectionId,
    #[serde(rename = "handRaised")]
    hand_raised: bool,
}

impl Participant {
    /// 新参与者总是以未举手状态创建。
    pub fn new(
        display_name: impl Into<String>,
        is_presenter: bool,
        connection_id: ConnectionId,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            is_presenter,
            connection_id,
            hand_raised: false,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_presenter(&self) -> bool {
        self.is_presenter
    }

    pub fn role(&self) -> ParticipantRole {
        ParticipantRole::from_flag(self.is_presenter)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn hand_raised(&self) -> bool {
        self.hand_raised
    }

    /// 翻转举手状态，返回翻转后的值。
    pub fn toggle_hand(&mut self) -> bool {
        self.hand_raised = !self.hand_raised;
        self.hand_raised
    }
}
