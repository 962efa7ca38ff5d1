//! Foreground-app lock arbitration engine.
//!
//! Decides, for every foreground observation, whether the user must
//! authenticate before using the app. Each unlocked episode produces at most
//! one lock screen, even when the push detector and the poll sampler both
//! report the same switch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌─────────────────────┐
//! │  FocusDetector   │   │  ForegroundSampler  │   (applock-detect)
//! │  (push, Push)    │   │  (poll thread, Poll)│
//! └────────┬─────────┘   └──────────┬──────────┘
//!          │  EngineHandle::observe │
//!          └───────────┬────────────┘
//!                      ▼
//!            ┌───────────────────┐      LockPolicy (applock-policy)
//!            │   arbiter task    │◄──── is_locked(app)
//!            │  Arbiter          │
//!            │   ├ GraceLedger   │────► Presenter
//!            │   └ LockFlow slot │      present / bring_to_foreground / dismiss
//!            └─────────┬─────────┘
//!                      ▼
//!              EventBus (applock-events)
//! ```
//!
//! The arbiter task is the single owner of grace and flow state; hosts and
//! sources reach it only through [`EngineHandle`].

mod arbiter;
mod clock;
mod config;
mod error;
mod flow;
mod grace;
mod presenter;
mod runtime;

pub use arbiter::{Arbiter, Decision};
pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::{ConfigError, EngineError, Result};
pub use flow::{FlowState, LockFlow};
pub use grace::GraceLedger;
pub use presenter::{
    ChannelPresenter, PresentError, Presenter, PresenterCommand, PresenterRef, RecordingPresenter,
};
pub use runtime::{EngineCapabilities, EngineCommand, EngineHandle, LockEngine};

pub use applock_events::{AbandonReason, AppId, EngineEvent, TriggerSource};
