//! In-memory locked-app set.

use crate::{LockPolicy, Result};
use applock_events::AppId;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Thread-safe set of protected applications.
///
/// The host may lock or unlock apps at any time; the arbiter reads the
/// current membership on every query, so no cache invalidation is needed.
#[derive(Debug, Default)]
pub struct LockedAppSet {
    apps: RwLock<HashSet<AppId>>,
}

impl LockedAppSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_apps<I, A>(apps: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AppId>,
    {
        Self {
            apps: RwLock::new(apps.into_iter().map(Into::into).collect()),
        }
    }

    /// Add an app to the locked set. Returns false if it was already locked.
    pub fn lock(&self, app: impl Into<AppId>) -> bool {
        let app = app.into();
        tracing::debug!(app = %app, "app locked");
        self.apps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(app)
    }

    /// Remove an app from the locked set. Returns false if it was not locked.
    pub fn unlock(&self, app: &AppId) -> bool {
        tracing::debug!(app = %app, "app unlocked");
        self.apps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(app)
    }

    /// Replace the whole set.
    pub fn replace<I, A>(&self, apps: I)
    where
        I: IntoIterator<Item = A>,
        A: Into<AppId>,
    {
        let next: HashSet<AppId> = apps.into_iter().map(Into::into).collect();
        *self.apps.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Locked apps, sorted for stable output.
    pub fn locked_apps(&self) -> Vec<AppId> {
        let mut apps: Vec<AppId> = self
            .apps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        apps.sort();
        apps
    }

    pub fn contains(&self, app: &AppId) -> bool {
        self.apps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(app)
    }
}

impl LockPolicy for LockedAppSet {
    fn is_locked(&self, app: &AppId) -> Result<bool> {
        Ok(self.contains(app))
    }
}
