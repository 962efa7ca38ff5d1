//! Policy backed by a shared key-value preference store.
//!
//! The locked set is persisted by the host as a single comma-joined string
//! under `locked_apps`. A `service_enabled` flag switches protection off
//! without clearing the set.

use crate::{LockPolicy, PolicyError, Result};
use applock_events::AppId;
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

/// Key holding the comma-joined locked-app list.
pub const KEY_LOCKED_APPS: &str = "locked_apps";

/// Key holding the protection on/off switch.
pub const KEY_SERVICE_ENABLED: &str = "service_enabled";

/// Read access to a host-owned preference store.
pub trait PreferenceStore: Send + Sync {
    fn get_string(&self, key: &str) -> Result<Option<String>>;
    fn get_bool(&self, key: &str) -> Result<Option<bool>>;
}

/// Parse the persisted comma-joined list. Blank entries are skipped.
pub fn decode_locked_apps(raw: &str) -> BTreeSet<AppId> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(AppId::from)
        .collect()
}

/// Serialize a locked set into the persisted comma-joined form.
pub fn encode_locked_apps<'a, I>(apps: I) -> String
where
    I: IntoIterator<Item = &'a AppId>,
{
    let sorted: BTreeSet<&str> = apps.into_iter().map(AppId::as_str).collect();
    sorted.into_iter().collect::<Vec<_>>().join(",")
}

/// Lock policy reading the preference store on every query.
pub struct PreferencesPolicy<S> {
    store: S,
}

impl<S: PreferenceStore> PreferencesPolicy<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether protection is switched on. Defaults to true when unset.
    pub fn is_service_enabled(&self) -> Result<bool> {
        Ok(self.store.get_bool(KEY_SERVICE_ENABLED)?.unwrap_or(true))
    }

    pub fn locked_apps(&self) -> Result<BTreeSet<AppId>> {
        let raw = self.store.get_string(KEY_LOCKED_APPS)?.unwrap_or_default();
        Ok(decode_locked_apps(&raw))
    }
}

impl<S: PreferenceStore> LockPolicy for PreferencesPolicy<S> {
    fn is_locked(&self, app: &AppId) -> Result<bool> {
        if !self.is_service_enabled()? {
            return Ok(false);
        }
        Ok(self.locked_apps()?.contains(app))
    }
}

/// Stored preference value.
#[derive(Debug, Clone, PartialEq)]
enum PrefValue {
    Str(String),
    Bool(bool),
}

/// In-process preference store.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, PrefValue>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_string(&self, key: &str, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), PrefValue::Str(value.into()));
    }

    pub fn set_bool(&self, key: &str, value: bool) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), PrefValue::Bool(value));
    }

    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(PrefValue::Str(s)) => Ok(Some(s)),
            Some(PrefValue::Bool(_)) => Err(PolicyError::InvalidValue {
                key: key.to_string(),
                message: "expected string, found bool".to_string(),
            }),
        }
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(PrefValue::Bool(b)) => Ok(Some(b)),
            Some(PrefValue::Str(_)) => Err(PolicyError::InvalidValue {
                key: key.to_string(),
                message: "expected bool, found string".to_string(),
            }),
        }
    }
}

impl<T: PreferenceStore + ?Sized> PreferenceStore for std::sync::Arc<T> {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        (**self).get_string(key)
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        (**self).get_bool(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_decode_empty_and_blank_entries() {
        assert!(decode_locked_apps("").is_empty());
        let apps = decode_locked_apps("bank.app, ,mail.app,");
        assert_eq!(apps.len(), 2);
        assert!(apps.contains(&AppId::from("bank.app")));
        assert!(apps.contains(&AppId::from("mail.app")));
    }

    #[test]
    fn test_encode_is_sorted_and_comma_joined() {
        let apps = [AppId::from("mail.app"), AppId::from("bank.app")];
        assert_eq!(encode_locked_apps(&apps), "bank.app,mail.app");
        assert_eq!(encode_locked_apps(Vec::<AppId>::new().iter()), "");
    }

    #[test]
    fn test_policy_reads_store_on_every_query() {
        let prefs = Arc::new(MemoryPreferences::new());
        let policy = PreferencesPolicy::new(Arc::clone(&prefs));
        let bank = AppId::from("bank.app");

        assert!(!policy.is_locked(&bank).unwrap());

        prefs.set_string(KEY_LOCKED_APPS, "bank.app,mail.app");
        assert!(policy.is_locked(&bank).unwrap());

        prefs.set_string(KEY_LOCKED_APPS, "mail.app");
        assert!(!policy.is_locked(&bank).unwrap());
    }

    #[test]
    fn test_service_disabled_locks_nothing() {
        let prefs = Arc::new(MemoryPreferences::new());
        prefs.set_string(KEY_LOCKED_APPS, "bank.app");
        prefs.set_bool(KEY_SERVICE_ENABLED, false);

        let policy = PreferencesPolicy::new(Arc::clone(&prefs));
        assert!(!policy.is_locked(&AppId::from("bank.app")).unwrap());

        prefs.set_bool(KEY_SERVICE_ENABLED, true);
        assert!(policy.is_locked(&AppId::from("bank.app")).unwrap());
    }

    #[test]
    fn test_wrong_value_type_is_an_error() {
        let prefs = MemoryPreferences::new();
        prefs.set_bool(KEY_LOCKED_APPS, true);

        let policy = PreferencesPolicy::new(prefs);
        let err = policy.is_locked(&AppId::from("bank.app")).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidValue { .. }));
    }
}
