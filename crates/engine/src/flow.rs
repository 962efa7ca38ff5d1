//! Lock flow: the transient state of one challenge episode.
//!
//! ```text
//! Idle ──► Presenting ──► Unlocked  ──► Idle
//!                    └──► Abandoned ──► Idle
//! ```
//!
//! `Idle` is represented by an empty flow slot in the arbiter; a `LockFlow`
//! value only exists while an episode is in progress or being closed.

use applock_events::{AppId, TriggerSource};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    Presenting,
    Unlocked,
    Abandoned,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Unlocked | FlowState::Abandoned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFlow {
    pub id: Uuid,
    pub app: AppId,
    pub trigger_source: TriggerSource,
    pub started_at_ms: i64,
    pub state: FlowState,
}

impl LockFlow {
    /// Open a new episode in `Presenting`.
    pub fn open(app: AppId, trigger_source: TriggerSource, started_at_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            app,
            trigger_source,
            started_at_ms,
            state: FlowState::Presenting,
        }
    }

    pub fn is_presenting(&self) -> bool {
        self.state == FlowState::Presenting
    }

    pub fn is_for(&self, app: &AppId) -> bool {
        &self.app == app
    }

    /// Move a presenting flow to a terminal state.
    ///
    /// Returns false, leaving the flow untouched, if it already resolved or
    /// `outcome` is not terminal.
    pub fn resolve(&mut self, outcome: FlowState) -> bool {
        if !self.is_presenting() || !outcome.is_terminal() {
            return false;
        }
        self.state = outcome;
        true
    }

    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.started_at_ms).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_is_presenting() {
        let flow = LockFlow::open(AppId::from("bank.app"), TriggerSource::Push, 100);
        assert!(flow.is_presenting());
        assert!(flow.is_for(&AppId::from("bank.app")));
        assert_eq!(flow.elapsed_ms(350), 250);
    }

    #[test]
    fn test_resolve_only_once() {
        let mut flow = LockFlow::open(AppId::from("bank.app"), TriggerSource::Poll, 0);
        assert!(!flow.resolve(FlowState::Idle));
        assert!(!flow.resolve(FlowState::Presenting));
        assert!(flow.resolve(FlowState::Unlocked));
        assert!(!flow.resolve(FlowState::Abandoned));
        assert_eq!(flow.state, FlowState::Unlocked);
    }
}
