//! Ctrl+C 分派：有在途轮次时只取消该轮，空闲时请求退出

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// 一次中断信号的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    CancelledTurn,
    Shutdown,
}

/// 由长期存活的信号任务持有；主循环每轮调用 start_turn
#[derive(Debug, Clone, Default)]
pub struct TurnInterrupter {
    current: Arc<Mutex<Option<CancellationToken>>>,
    shutdown: CancellationToken,
}

impl TurnInterrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新一轮；返回的 guard drop 时该轮结束
    pub fn start_turn(&self) -> TurnGuard {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        TurnGuard {
            token,
            current: self.current.clone(),
        }
    }

    pub fn interrupt(&self) -> Interrupt {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                tracing::info!("in-flight turn cancelled");
                Interrupt::CancelledTurn
            }
            None => {
                self.shutdown.cancel();
                tracing::info!("shutdown requested");
                Interrupt::Shutdown
            }
        }
    }

    /// 空闲时收到中断后触发
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct TurnGuard {
    token: CancellationToken,
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl TurnGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
