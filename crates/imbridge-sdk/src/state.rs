//! 原生绑定的生命周期状态
//!
//! `Uninitialized -> Initializing -> Listening -> Ready -> TornDown`
//!
//! 只有 `Ready` 接受业务调用；`TornDown` 是终态。

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::error::{BridgeError, Result};

/// 绑定状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingState {
    /// 未初始化
    Uninitialized,
    /// 原生库已加载，正在 init_sdk
    Initializing,
    /// 监听回调已注册到原生侧
    Listening,
    /// 可以接受调用
    Ready,
    /// 已调用 un_init_sdk
    TornDown,
}

impl BindingState {
    /// 状态迁移是否合法
    pub fn can_transition_to(self, next: BindingState) -> bool {
        use BindingState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Uninitialized)
                | (Initializing, Listening)
                | (Listening, Ready)
                | (Uninitialized, TornDown)
                | (Initializing, TornDown)
                | (Listening, TornDown)
                | (Ready, TornDown)
        )
    }

    pub fn accepts_calls(self) -> bool {
        self == BindingState::Ready
    }

    /// 不接受调用时对应的错误
    pub fn gate(self) -> Result<()> {
        match self {
            BindingState::Ready => Ok(()),
            BindingState::TornDown => Err(BridgeError::TornDown),
            _ => Err(BridgeError::NotInitialized),
        }
    }
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingState::Uninitialized => write!(f, "Uninitialized"),
            BindingState::Initializing => write!(f, "Initializing"),
            BindingState::Listening => write!(f, "Listening"),
            BindingState::Ready => write!(f, "Ready"),
            BindingState::TornDown => write!(f, "TornDown"),
        }
    }
}

/// 线程安全的状态机
#[derive(Debug)]
pub struct StateMachine {
    state: RwLock<BindingState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BindingState::Uninitialized),
        }
    }

    pub fn current(&self) -> BindingState {
        *self.state.read()
    }

    /// 迁移到下一个状态，返回之前的状态
    pub fn transition(&self, next: BindingState) -> Result<BindingState> {
        let mut state = self.state.write();
        let prev = *state;
        if !prev.can_transition_to(next) {
            return Err(BridgeError::InvalidState { from: prev, to: next });
        }
        *state = next;
        info!("binding state: {} -> {}", prev, next);
        Ok(prev)
    }

    pub fn ensure_ready(&self) -> Result<()> {
        self.current().gate()
    }

    /// 在 Ready 状态下执行 `f`
    ///
    /// 执行期间持有读锁，迁移到 TornDown 要等 `f` 返回，
    /// 因此 `f` 中登记的挂起条目一定会被 teardown 看到。
    pub fn while_ready<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let state = self.state.read();
        state.gate()?;
        f()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let sm = StateMachine::new();
        assert!(matches!(sm.ensure_ready(), Err(BridgeError::NotInitialized)));
        sm.transition(BindingState::Initializing).unwrap();
        sm.transition(BindingState::Listening).unwrap();
        assert!(matches!(sm.ensure_ready(), Err(BridgeError::NotInitialized)));
        sm.transition(BindingState::Ready).unwrap();
        assert!(sm.ensure_ready().is_ok());
        assert_eq!(sm.transition(BindingState::TornDown).unwrap(), BindingState::Ready);
        assert!(matches!(sm.ensure_ready(), Err(BridgeError::TornDown)));
    }

    #[test]
    fn test_while_ready_gates_closure() {
        let sm = StateMachine::new();
        let mut ran = false;
        assert!(matches!(
            sm.while_ready(|| {
                ran = true;
                Ok(())
            }),
            Err(BridgeError::NotInitialized)
        ));
        assert!(!ran);

        sm.transition(BindingState::Initializing).unwrap();
        sm.transition(BindingState::Listening).unwrap();
        sm.transition(BindingState::Ready).unwrap();
        assert_eq!(sm.while_ready(|| Ok(7)).unwrap(), 7);

        sm.transition(BindingState::TornDown).unwrap();
        assert!(matches!(sm.while_ready(|| Ok(7)), Err(BridgeError::TornDown)));
    }

    #[test]
    fn test_torn_down_is_terminal() {
        let sm = StateMachine::new();
        sm.transition(BindingState::TornDown).unwrap();
        for next in [
            BindingState::Uninitialized,
            BindingState::Initializing,
            BindingState::Ready,
            BindingState::TornDown,
        ] {
            assert!(matches!(
                sm.transition(next),
                Err(BridgeError::InvalidState { from: BindingState::TornDown, .. })
            ));
        }
    }

    #[test]
    fn test_cannot_skip_listening() {
        let sm = StateMachine::new();
        sm.transition(BindingState::Initializing).unwrap();
        assert!(sm.transition(BindingState::Ready).is_err());
        assert_eq!(sm.current(), BindingState::Initializing);
    }
}
