//! Identifiers that never participate in locking.

use applock_events::AppId;

/// Shell and launcher prefixes excluded by default.
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
    "com.android.systemui",
    "com.android.launcher",
    "com.google.android.apps.nexuslauncher",
];

/// Filter applied by both foreground sources before anything reaches the
/// arbiter. Supplied at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    own_app: AppId,
    prefixes: Vec<String>,
}

impl ExclusionFilter {
    pub fn new<I, S>(own_app: impl Into<AppId>, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            own_app: own_app.into(),
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Filter with the default shell/launcher prefixes.
    pub fn with_defaults(own_app: impl Into<AppId>) -> Self {
        Self::new(own_app, DEFAULT_EXCLUDED_PREFIXES.iter().copied())
    }

    pub fn own_app(&self) -> &AppId {
        &self.own_app
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_excluded(&self, raw: &str) -> bool {
        raw.is_empty()
            || raw == self.own_app.as_str()
            || self.prefixes.iter().any(|p| raw.starts_with(p.as_str()))
    }

    /// Returns the identifier if it may be evaluated for locking.
    pub fn admit(&self, raw: &str) -> Option<AppId> {
        if self.is_excluded(raw) {
            None
        } else {
            Some(AppId::from(raw))
        }
    }
}
