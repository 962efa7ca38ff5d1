//! Provider traits for platform foreground sources.
//!
//! These traits abstract platform-specific implementations,
//! allowing the detector and sampler to remain pure and testable.

use crate::{DetectError, Result};
use std::sync::Arc;
use std::time::Duration;

/// A window-focus notification as delivered by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowEvent {
    /// Package / bundle id of the window's owner, when the platform knows it.
    pub app_id: Option<String>,
    /// Window or activity class, for diagnostics only.
    pub class_name: Option<String>,
}

impl WindowEvent {
    pub fn for_app(app_id: impl Into<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
            class_name: None,
        }
    }
}

/// Callback type for window-focus notifications.
pub type WindowEventCallback = Arc<dyn Fn(WindowEvent) + Send + Sync + 'static>;

/// Event-driven source of window-focus changes.
pub trait WindowEventSource: Send + Sync {
    /// Begin delivering events to `callback`.
    ///
    /// Fails when the platform permission backing the subscription is absent.
    fn subscribe(&self, callback: WindowEventCallback) -> Result<()>;

    /// Stop delivering events.
    fn unsubscribe(&self);
}

/// Usage-ranking service queried by the sampler.
pub trait UsageRanking: Send + Sync {
    /// Whether usage access has been granted.
    fn has_access(&self) -> bool {
        true
    }

    /// Most recently used application within the trailing `window`.
    fn most_recent_app(&self, window: Duration) -> Result<Option<String>>;
}

impl<T: UsageRanking + ?Sized> UsageRanking for Arc<T> {
    fn has_access(&self) -> bool {
        (**self).has_access()
    }

    fn most_recent_app(&self, window: Duration) -> Result<Option<String>> {
        (**self).most_recent_app(window)
    }
}

/// Null implementation for testing or unsupported platforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProvider;

impl NullProvider {
    pub fn new() -> Self {
        Self
    }
}

impl WindowEventSource for NullProvider {
    fn subscribe(&self, _callback: WindowEventCallback) -> Result<()> {
        Err(DetectError::SubscriptionFailed(
            "window events are not supported on this platform".to_string(),
        ))
    }

    fn unsubscribe(&self) {}
}

impl UsageRanking for NullProvider {
    fn has_access(&self) -> bool {
        false
    }

    fn most_recent_app(&self, _window: Duration) -> Result<Option<String>> {
        Ok(None)
    }
}
