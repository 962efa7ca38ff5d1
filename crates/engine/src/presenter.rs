//! Outbound commands to the presentation layer.
//!
//! Every command is fire-and-forget: the arbiter issues it and moves on
//! without waiting for UI completion.

use applock_events::AppId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum PresentError {
    /// The platform refused to launch the lock screen or the app.
    #[error("launch rejected: {0}")]
    Rejected(String),

    /// The presentation layer is gone.
    #[error("presentation layer disconnected")]
    Disconnected,
}

/// Presentation layer as seen by the arbiter.
pub trait Presenter: Send + Sync {
    /// Show the authentication challenge for `app`.
    ///
    /// Must tolerate repeated calls; the arbiter deduplicates per episode but
    /// the layer should not crash on a repeat.
    fn present_lock_screen(&self, app: &AppId) -> Result<(), PresentError>;

    /// Ask the platform to bring `app` back to the foreground.
    fn bring_to_foreground(&self, app: &AppId) -> Result<(), PresentError>;

    /// Remove the challenge shown for `app`.
    fn dismiss_lock_screen(&self, app: &AppId);
}

/// Type alias for a shared presenter reference.
pub type PresenterRef = Arc<dyn Presenter>;

/// Commands the engine sends to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "app", rename_all = "snake_case")]
pub enum PresenterCommand {
    PresentLockScreen(AppId),
    BringToForeground(AppId),
    DismissLockScreen(AppId),
}

/// Presenter forwarding commands over a channel to a UI loop.
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<PresenterCommand>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PresenterCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, command: PresenterCommand) -> Result<(), PresentError> {
        self.tx.send(command).map_err(|_| PresentError::Disconnected)
    }
}

impl Presenter for ChannelPresenter {
    fn present_lock_screen(&self, app: &AppId) -> Result<(), PresentError> {
        self.send(PresenterCommand::PresentLockScreen(app.clone()))
    }

    fn bring_to_foreground(&self, app: &AppId) -> Result<(), PresentError> {
        self.send(PresenterCommand::BringToForeground(app.clone()))
    }

    fn dismiss_lock_screen(&self, app: &AppId) {
        if self.send(PresenterCommand::DismissLockScreen(app.clone())).is_err() {
            tracing::debug!(app = %app, "dismiss dropped, presentation layer gone");
        }
    }
}

/// Presenter that records every command, for tests.
///
/// Lock screen launches can be made to fail to exercise the abandon path.
#[derive(Default)]
pub struct RecordingPresenter {
    commands: Mutex<Vec<PresenterCommand>>,
    reject_presentations: AtomicBool,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `present_lock_screen` calls fail (they are still recorded).
    pub fn reject_presentations(&self, reject: bool) {
        self.reject_presentations.store(reject, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<PresenterCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of lock screens requested for `app`.
    pub fn presentations_for(&self, app: &AppId) -> usize {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| matches!(c, PresenterCommand::PresentLockScreen(a) if a == app))
            .count()
    }

    pub fn presentation_count(&self) -> usize {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| matches!(c, PresenterCommand::PresentLockScreen(_)))
            .count()
    }

    fn record(&self, command: PresenterCommand) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}

impl Presenter for RecordingPresenter {
    fn present_lock_screen(&self, app: &AppId) -> Result<(), PresentError> {
        self.record(PresenterCommand::PresentLockScreen(app.clone()));
        if self.reject_presentations.load(Ordering::SeqCst) {
            return Err(PresentError::Rejected("overlay permission missing".to_string()));
        }
        Ok(())
    }

    fn bring_to_foreground(&self, app: &AppId) -> Result<(), PresentError> {
        self.record(PresenterCommand::BringToForeground(app.clone()));
        Ok(())
    }

    fn dismiss_lock_screen(&self, app: &AppId) {
        self.record(PresenterCommand::DismissLockScreen(app.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_presenter_forwards_commands() {
        let (presenter, mut rx) = ChannelPresenter::new();
        let bank = AppId::from("bank.app");

        presenter.present_lock_screen(&bank).unwrap();
        presenter.dismiss_lock_screen(&bank);

        assert_eq!(
            rx.try_recv().unwrap(),
            PresenterCommand::PresentLockScreen(bank.clone())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PresenterCommand::DismissLockScreen(bank)
        );
    }

    #[test]
    fn test_channel_presenter_disconnected() {
        let (presenter, rx) = ChannelPresenter::new();
        drop(rx);

        let err = presenter
            .present_lock_screen(&AppId::from("bank.app"))
            .unwrap_err();
        assert!(matches!(err, PresentError::Disconnected));
    }

    #[test]
    fn test_command_wire_shape() {
        let json =
            serde_json::to_value(PresenterCommand::PresentLockScreen(AppId::from("bank.app")))
                .unwrap();
        assert_eq!(json["command"], "present_lock_screen");
        assert_eq!(json["app"], "bank.app");
    }

    #[test]
    fn test_recording_presenter_rejects_on_demand() {
        let presenter = RecordingPresenter::new();
        let bank = AppId::from("bank.app");

        presenter.reject_presentations(true);
        assert!(presenter.present_lock_screen(&bank).is_err());
        presenter.reject_presentations(false);
        assert!(presenter.present_lock_screen(&bank).is_ok());

        assert_eq!(presenter.presentations_for(&bank), 2);
        assert_eq!(presenter.presentation_count(), 2);
    }
}
