//! Foreground-application sources for the app-lock engine.
//!
//! Two independent producers report which application is in front:
//! - **Push**: `FocusDetector` forwards window-focus notifications as they
//!   arrive. Low latency, but the platform may delay or drop events.
//! - **Poll**: `ForegroundSampler` periodically asks a usage-ranking
//!   service for the most recently used app. Slower, but keeps working
//!   when push delivery is unreliable.
//!
//! Both feed the same `ObservationSink`; deduplication across sources is the
//! arbiter's job, not theirs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Domain Layer                             │
//! │  exclusion.rs  - Identifiers that never participate         │
//! │  provider.rs   - Traits for platform event/usage sources    │
//! │  capability.rs - Degraded-capability reporting              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Infrastructure Layer                        │
//! │  platform/macos.rs - Frontmost-app usage provider           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Application Layer                          │
//! │  focus.rs   - Push detector                                 │
//! │  sampler.rs - Poll sampler (background thread)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod capability;
mod error;
mod exclusion;
mod focus;
mod provider;
mod sampler;

pub mod platform;

pub use capability::{CapabilityListener, CapabilityStatus};
pub use error::{DetectError, Result};
pub use exclusion::{ExclusionFilter, DEFAULT_EXCLUDED_PREFIXES};
pub use focus::FocusDetector;
pub use provider::{NullProvider, UsageRanking, WindowEvent, WindowEventCallback, WindowEventSource};
pub use sampler::{ForegroundSampler, SamplerConfig, DEFAULT_POLL_INTERVAL, DEFAULT_USAGE_WINDOW};

use applock_events::{AppId, TriggerSource};
use std::sync::Arc;

/// Receiver of filtered foreground observations.
pub type ObservationSink = Arc<dyn Fn(AppId, TriggerSource) + Send + Sync + 'static>;

pub fn new_sink<F>(f: F) -> ObservationSink
where
    F: Fn(AppId, TriggerSource) + Send + Sync + 'static,
{
    Arc::new(f)
}
