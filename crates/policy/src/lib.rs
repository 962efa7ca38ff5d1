//! Lock policy oracle.
//!
//! Answers a single question for the arbiter: is this application protected?
//! The engine treats the policy as read-only. Hosts mutate it through
//! `LockedAppSet` or by writing the shared preference store directly.

mod error;
mod preferences;
mod set;

pub use error::{PolicyError, Result};
pub use preferences::{
    decode_locked_apps, encode_locked_apps, MemoryPreferences, PreferenceStore,
    PreferencesPolicy, KEY_LOCKED_APPS, KEY_SERVICE_ENABLED,
};
pub use set::LockedAppSet;

use applock_events::AppId;
use std::sync::Arc;

/// Policy lookup consulted on every foreground observation.
///
/// Implementations must be cheap: the arbiter calls this synchronously on
/// its decision path.
pub trait LockPolicy: Send + Sync {
    /// Whether `app` currently requires authentication.
    fn is_locked(&self, app: &AppId) -> Result<bool>;
}

/// Type alias for a shared policy reference.
pub type LockPolicyRef = Arc<dyn LockPolicy>;

impl<T: LockPolicy + ?Sized> LockPolicy for Arc<T> {
    fn is_locked(&self, app: &AppId) -> Result<bool> {
        (**self).is_locked(app)
    }
}

/// Policy that locks nothing.
pub struct NullPolicy;

impl LockPolicy for NullPolicy {
    fn is_locked(&self, _app: &AppId) -> Result<bool> {
        Ok(false)
    }
}
