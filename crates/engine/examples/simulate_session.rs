//! Simulated session: a scripted window-event source and usage ranking feed
//! the engine while a fake lock screen authenticates every challenge.
//!
//! Run with `RUST_LOG=applock=debug,simulate_session=info`.

use anyhow::Result;
use applock_detect::{UsageRanking, WindowEvent, WindowEventCallback, WindowEventSource};
use applock_engine::{
    AppId, ChannelPresenter, EngineConfig, LockEngine, PresenterCommand, SystemClock,
};
use applock_events::EventBus;
use applock_policy::LockedAppSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Window source driven by the script below.
#[derive(Default)]
struct ScriptedWindows {
    callback: Mutex<Option<WindowEventCallback>>,
}

impl ScriptedWindows {
    fn focus(&self, app: &str) {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(WindowEvent::for_app(app));
        }
    }
}

impl WindowEventSource for ScriptedWindows {
    fn subscribe(&self, callback: WindowEventCallback) -> applock_detect::Result<()> {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
        Ok(())
    }

    fn unsubscribe(&self) {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Usage ranking that reports whatever the script last put in front.
#[derive(Default)]
struct ScriptedUsage {
    front: Mutex<Option<String>>,
}

impl ScriptedUsage {
    fn set_front(&self, app: &str) {
        *self.front.lock().unwrap_or_else(PoisonError::into_inner) = Some(app.to_string());
    }
}

impl UsageRanking for ScriptedUsage {
    fn most_recent_app(&self, _window: Duration) -> applock_detect::Result<Option<String>> {
        Ok(self.front.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// Bus that writes every engine event to the log.
struct LogBus;

impl EventBus for LogBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        tracing::info!(topic, %payload, "engine event");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_json_str(
        r#"{ "own_app_id": "com.example.applock", "poll_interval_ms": 100 }"#,
    )?;
    let policy = Arc::new(LockedAppSet::from_apps(["com.bank.mobile", "com.mail"]));
    let (presenter, mut commands) = ChannelPresenter::new();

    let mut engine = LockEngine::start(
        config,
        policy,
        Arc::new(presenter),
        Arc::new(SystemClock),
        Arc::new(LogBus),
    )?;
    let handle = engine.handle();

    // Fake lock screen: authenticate every challenge after a short delay.
    let ui_handle = handle.clone();
    let ui = tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            tracing::info!(?command, "presentation layer");
            if let PresenterCommand::PresentLockScreen(app) = command {
                tokio::time::sleep(Duration::from_millis(150)).await;
                match ui_handle.grant_unlock(app, None).await {
                    Ok(app) => tracing::info!(app = %app, "user authenticated"),
                    Err(e) => tracing::warn!("unlock rejected: {}", e),
                }
            }
        }
    });

    let windows = Arc::new(ScriptedWindows::default());
    let usage = Arc::new(ScriptedUsage::default());
    engine.attach_detector(windows.clone());
    engine.attach_sampler(usage.clone());
    tracing::info!(capabilities = ?engine.capabilities(), "sources attached");

    let script = [
        "com.android.launcher3",
        "com.bank.mobile",
        "com.notes",
        "com.mail",
        "com.bank.mobile",
    ];
    for app in script {
        tracing::info!(app, "switching foreground");
        windows.focus(app);
        usage.set_front(app);
        tokio::time::sleep(Duration::from_millis(600)).await;
    }

    let allowed = handle.is_allowed(AppId::from("com.bank.mobile")).await?;
    tracing::info!(allowed, "bank app grace at end of script");

    engine.shutdown().await;
    drop(handle);
    ui.abort();
    Ok(())
}
