//! Grace ledger: short-lived per-app exemptions from the lock screen.
//!
//! Grace exists so that the observation following a successful unlock (the
//! user being returned to the app) does not re-trigger a challenge. Every
//! foreground switch clears grace held by other apps, which bounds grace to
//! "the app you just returned to".
//!
//! The ledger has a single owner. Its methods take `&mut self`; the runtime
//! reaches it only through the arbiter task's command channel.

use crate::clock::{duration_ms, ClockRef};
use applock_events::AppId;
use std::collections::HashMap;
use std::time::Duration;

pub struct GraceLedger {
    /// Expiry (epoch ms, inclusive) per app.
    allowed_until: HashMap<AppId, i64>,
    /// Foreground app seen by the last `on_app_switch`.
    last_foreground: Option<AppId>,
    clock: ClockRef,
}

impl GraceLedger {
    pub fn new(clock: ClockRef) -> Self {
        Self {
            allowed_until: HashMap::new(),
            last_foreground: None,
            clock,
        }
    }

    /// Let `app` re-enter the foreground without a challenge until
    /// `now + duration`. A later call for the same app overwrites the expiry.
    pub fn allow(&mut self, app: &AppId, duration: Duration) {
        let until = self.clock.now_ms().saturating_add(duration_ms(duration));
        tracing::debug!(app = %app, until_ms = until, "grace granted");
        self.allowed_until.insert(app.clone(), until);
    }

    /// Whether `app` holds live grace. Expired entries are evicted here.
    pub fn is_allowed(&mut self, app: &AppId) -> bool {
        let Some(&until) = self.allowed_until.get(app) else {
            return false;
        };
        if self.clock.now_ms() <= until {
            return true;
        }
        self.allowed_until.remove(app);
        tracing::debug!(app = %app, "grace expired");
        false
    }

    /// Record a foreground observation.
    ///
    /// When `new_app` differs from the tracked foreground app, every entry
    /// for another app is evicted and returned (sorted). Repeated
    /// observations of the current app are a no-op.
    pub fn on_app_switch(&mut self, new_app: &AppId) -> Vec<AppId> {
        if self.last_foreground.as_ref() == Some(new_app) {
            return Vec::new();
        }
        self.last_foreground = Some(new_app.clone());

        let mut evicted: Vec<AppId> = self
            .allowed_until
            .keys()
            .filter(|app| *app != new_app)
            .cloned()
            .collect();
        for app in &evicted {
            self.allowed_until.remove(app);
        }
        evicted.sort();
        evicted
    }

    pub fn current_foreground(&self) -> Option<&AppId> {
        self.last_foreground.as_ref()
    }

    /// Number of stored entries, live or not yet lazily evicted.
    pub fn len(&self) -> usize {
        self.allowed_until.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed_until.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn ledger() -> (GraceLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        (GraceLedger::new(clock.clone()), clock)
    }

    fn app(id: &str) -> AppId {
        AppId::from(id)
    }

    #[test]
    fn test_allow_expires_after_duration() {
        let (mut ledger, clock) = ledger();
        ledger.allow(&app("bank.app"), Duration::from_millis(3000));

        assert!(ledger.is_allowed(&app("bank.app")));
        clock.set(3000);
        assert!(ledger.is_allowed(&app("bank.app")));
        clock.set(3001);
        assert!(!ledger.is_allowed(&app("bank.app")));
        // Lazily evicted on the failed read.
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_grace_is_isolated_per_app() {
        let (mut ledger, _clock) = ledger();
        ledger.allow(&app("bank.app"), Duration::from_millis(3000));

        assert!(!ledger.is_allowed(&app("mail.app")));
        assert!(ledger.is_allowed(&app("bank.app")));
    }

    #[test]
    fn test_last_writer_wins() {
        let (mut ledger, clock) = ledger();
        ledger.allow(&app("bank.app"), Duration::from_millis(10_000));
        ledger.allow(&app("bank.app"), Duration::from_millis(1_000));

        clock.set(2_000);
        assert!(!ledger.is_allowed(&app("bank.app")));
    }

    #[test]
    fn test_switch_evicts_other_apps() {
        let (mut ledger, _clock) = ledger();
        ledger.on_app_switch(&app("bank.app"));
        ledger.allow(&app("bank.app"), Duration::from_millis(3000));
        ledger.allow(&app("mail.app"), Duration::from_millis(3000));

        let evicted = ledger.on_app_switch(&app("other.app"));
        assert_eq!(evicted, vec![app("bank.app"), app("mail.app")]);
        assert!(!ledger.is_allowed(&app("bank.app")));
        assert_eq!(ledger.current_foreground(), Some(&app("other.app")));
    }

    #[test]
    fn test_switch_keeps_new_app_grace() {
        let (mut ledger, _clock) = ledger();
        ledger.on_app_switch(&app("launcher.app"));
        ledger.allow(&app("bank.app"), Duration::from_millis(3000));
        ledger.allow(&app("mail.app"), Duration::from_millis(3000));

        let evicted = ledger.on_app_switch(&app("bank.app"));
        assert_eq!(evicted, vec![app("mail.app")]);
        assert!(ledger.is_allowed(&app("bank.app")));
    }

    #[test]
    fn test_repeated_switch_to_same_app_is_noop() {
        let (mut ledger, _clock) = ledger();
        ledger.on_app_switch(&app("bank.app"));
        ledger.allow(&app("mail.app"), Duration::from_millis(3000));
        ledger.allow(&app("bank.app"), Duration::from_millis(3000));

        assert!(ledger.on_app_switch(&app("bank.app")).is_empty());
        assert!(ledger.on_app_switch(&app("bank.app")).is_empty());
        assert!(ledger.is_allowed(&app("bank.app")));
        assert!(ledger.is_allowed(&app("mail.app")));
    }
}
