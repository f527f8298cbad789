//! 有界重试
//!
//! 每个逻辑操作从固定的尝试预算开始，失败即以相同参数重发，不做退避延迟；
//! 两次尝试之间让出调度器。成功或预算耗尽时给出唯一的最终结果。

use std::future::Future;

use tracing::warn;

use crate::collaborators::CollaboratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// 预算至少为一次尝试
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// 单个逻辑操作的重试状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// 下一次尝试仍可发出，`attempts_left` 含这一次
    Pending { attempts_left: u32 },
    Succeeded,
    Failed,
}

impl RetryState {
    pub fn start(policy: RetryPolicy) -> Self {
        Self::Pending {
            attempts_left: policy.max_attempts.max(1),
        }
    }

    /// 根据一次尝试的结果推进状态；终态不再变化。
    pub fn on_response(self, succeeded: bool) -> Self {
        match self {
            Self::Pending { .. } if succeeded => Self::Succeeded,
            Self::Pending { attempts_left } if attempts_left <= 1 => Self::Failed,
            Self::Pending { attempts_left } => Self::Pending {
                attempts_left: attempts_left - 1,
            },
            terminal => terminal,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

/// 重试结束时的结果，附带实际尝试次数
#[derive(Debug)]
pub struct TerminalOutcome<T> {
    pub result: Result<T, CollaboratorError>,
    pub attempts: u32,
}

pub async fn retry_async<F, Fut, T>(
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> TerminalOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let mut state = RetryState::start(policy);
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let result = op().await;
        state = state.on_response(result.is_ok());
        match (state, &result) {
            (RetryState::Pending { attempts_left }, Err(err)) => {
                warn!(operation, attempts, attempts_left, error = %err, "store call failed, retrying");
                tokio::task::yield_now().await;
            }
            _ => return TerminalOutcome { result, attempts },
        }
    }
}
