//! Foreground sampler - background thread that polls the usage ranking.

use crate::capability::CapabilityStatus;
use crate::exclusion::ExclusionFilter;
use crate::provider::UsageRanking;
use crate::ObservationSink;
use applock_events::{AppId, Capability, Component, TriggerSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default trailing window for the usage-ranking query.
pub const DEFAULT_USAGE_WINDOW: Duration = Duration::from_millis(5000);

/// Log every Nth consecutive query failure.
const QUERY_ERROR_LOG_EVERY: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Trailing window passed to the usage-ranking query.
    pub window: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            window: DEFAULT_USAGE_WINDOW,
        }
    }
}

/// Per-thread sampler state.
struct SamplerState {
    /// Last raw identifier returned by the query, admitted or not.
    last_seen: Option<String>,
    consecutive_errors: u64,
}

impl SamplerState {
    fn new() -> Self {
        Self {
            last_seen: None,
            consecutive_errors: 0,
        }
    }

    /// Run one tick. Returns the app to report, if any.
    fn tick<P>(
        &mut self,
        provider: &P,
        filter: &ExclusionFilter,
        window: Duration,
        status: &CapabilityStatus,
    ) -> Option<AppId>
    where
        P: UsageRanking + ?Sized,
    {
        if !provider.has_access() {
            status.degrade("usage access not granted");
            return None;
        }
        status.set(Capability::Available);

        let current = match provider.most_recent_app(window) {
            Ok(current) => {
                if self.consecutive_errors > 0 {
                    tracing::debug!(
                        failures = self.consecutive_errors,
                        "usage query recovered"
                    );
                }
                self.consecutive_errors = 0;
                current?
            }
            Err(e) => {
                self.consecutive_errors += 1;
                // Rate-limit logging: the query is retried on every tick
                if self.consecutive_errors % QUERY_ERROR_LOG_EVERY == 1 {
                    tracing::warn!(failures = self.consecutive_errors, "usage query failed: {}", e);
                }
                return None;
            }
        };

        if current.is_empty() || self.last_seen.as_deref() == Some(current.as_str()) {
            return None;
        }

        let admitted = filter.admit(&current);
        self.last_seen = Some(current);
        admitted
    }
}

/// Background poller for the most recently used application.
pub struct ForegroundSampler {
    filter: Arc<ExclusionFilter>,
    status: CapabilityStatus,
    running: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ForegroundSampler {
    pub fn new(filter: ExclusionFilter) -> Self {
        Self::with_status(filter, CapabilityStatus::new(Component::Sampler))
    }

    pub fn with_status(filter: ExclusionFilter, status: CapabilityStatus) -> Self {
        Self {
            filter: Arc::new(filter),
            status,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start polling with the default configuration.
    pub fn start<P>(&mut self, provider: Arc<P>, sink: ObservationSink)
    where
        P: UsageRanking + ?Sized + 'static,
    {
        self.start_with_config(provider, sink, SamplerConfig::default());
    }

    /// Start polling with a custom interval and window.
    pub fn start_with_config<P>(
        &mut self,
        provider: Arc<P>,
        sink: ObservationSink,
        config: SamplerConfig,
    ) where
        P: UsageRanking + ?Sized + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("ForegroundSampler already running");
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let filter = Arc::clone(&self.filter);
        let status = self.status.clone();

        let handle = std::thread::spawn(move || {
            tracing::info!(
                interval = ?config.interval,
                window = ?config.window,
                "ForegroundSampler started"
            );

            let mut state = SamplerState::new();

            while running.load(Ordering::SeqCst) {
                if let Some(app) = state.tick(&*provider, &filter, config.window, &status) {
                    // Re-check so a stop racing with a slow query emits nothing.
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    tracing::debug!(app = %app, "sampled foreground change");
                    sink(app, TriggerSource::Poll);
                }

                let deadline = Instant::now() + config.interval;
                while running.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    std::thread::park_timeout(deadline - now);
                }
            }

            tracing::info!("ForegroundSampler stopped");
        });

        self.handle = Some(handle);
    }

    /// Stop the sampler. No observation is emitted once this returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn capability(&self) -> Capability {
        self.status.get()
    }
}

impl Drop for ForegroundSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::NullProvider;
    use crate::DetectError;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Usage ranking replaying a script, then repeating its last answer.
    struct ScriptedRanking {
        answers: Mutex<VecDeque<crate::Result<Option<String>>>>,
        last: Mutex<Option<String>>,
    }

    impl ScriptedRanking {
        fn new(answers: Vec<crate::Result<Option<String>>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                last: Mutex::new(None),
            }
        }
    }

    impl UsageRanking for ScriptedRanking {
        fn most_recent_app(&self, _window: Duration) -> crate::Result<Option<String>> {
            match self.answers.lock().unwrap().pop_front() {
                Some(Ok(answer)) => {
                    *self.last.lock().unwrap() = answer.clone();
                    Ok(answer)
                }
                Some(Err(e)) => Err(e),
                None => Ok(self.last.lock().unwrap().clone()),
            }
        }
    }

    fn some(app: &str) -> crate::Result<Option<String>> {
        Ok(Some(app.to_string()))
    }

    #[test]
    fn test_tick_emits_only_on_change() {
        let filter = ExclusionFilter::with_defaults("self.app");
        let status = CapabilityStatus::new(Component::Sampler);
        let ranking = ScriptedRanking::new(vec![
            some("bank.app"),
            some("bank.app"),
            some("other.app"),
            some("bank.app"),
        ]);
        let mut state = SamplerState::new();
        let window = DEFAULT_USAGE_WINDOW;

        let emitted: Vec<Option<AppId>> = (0..4)
            .map(|_| state.tick(&ranking, &filter, window, &status))
            .collect();

        assert_eq!(
            emitted,
            vec![
                Some(AppId::from("bank.app")),
                None,
                Some(AppId::from("other.app")),
                Some(AppId::from("bank.app")),
            ]
        );
    }

    #[test]
    fn test_tick_skips_excluded_and_errors() {
        let filter = ExclusionFilter::with_defaults("self.app");
        let status = CapabilityStatus::new(Component::Sampler);
        let ranking = ScriptedRanking::new(vec![
            some("bank.app"),
            some("com.android.launcher3"),
            Err(DetectError::QueryFailed("binder died".to_string())),
            Ok(None),
            some("bank.app"),
        ]);
        let mut state = SamplerState::new();
        let window = DEFAULT_USAGE_WINDOW;

        assert_eq!(
            state.tick(&ranking, &filter, window, &status),
            Some(AppId::from("bank.app"))
        );
        // Launcher is tracked but never reported.
        assert_eq!(state.tick(&ranking, &filter, window, &status), None);
        // Query errors are swallowed.
        assert_eq!(state.tick(&ranking, &filter, window, &status), None);
        assert_eq!(state.consecutive_errors, 1);
        assert_eq!(state.tick(&ranking, &filter, window, &status), None);
        assert_eq!(state.consecutive_errors, 0);
        // Returning from the launcher is a fresh transition.
        assert_eq!(
            state.tick(&ranking, &filter, window, &status),
            Some(AppId::from("bank.app"))
        );
    }

    #[test]
    fn test_tick_without_access_degrades() {
        let filter = ExclusionFilter::with_defaults("self.app");
        let status = CapabilityStatus::new(Component::Sampler);
        let mut state = SamplerState::new();

        assert_eq!(
            state.tick(&NullProvider, &filter, DEFAULT_USAGE_WINDOW, &status),
            None
        );
        assert!(!status.get().is_available());
    }

    #[test]
    fn test_sampler_lifecycle() {
        let mut sampler = ForegroundSampler::new(ExclusionFilter::with_defaults("self.app"));
        assert!(!sampler.is_running());

        let provider = Arc::new(ScriptedRanking::new(vec![some("bank.app")]));
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = Arc::clone(&call_count);

        let sink = crate::new_sink(move |app, source| {
            assert_eq!(app, AppId::from("bank.app"));
            assert_eq!(source, TriggerSource::Poll);
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        sampler.start_with_config(
            provider,
            sink,
            SamplerConfig {
                interval: Duration::from_millis(20),
                window: DEFAULT_USAGE_WINDOW,
            },
        );
        assert!(sampler.is_running());

        // Wait for a few polls
        std::thread::sleep(Duration::from_millis(150));

        sampler.stop();
        assert!(!sampler.is_running());

        // Same app on every tick: reported exactly once.
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_is_prompt_with_long_interval() {
        let mut sampler = ForegroundSampler::new(ExclusionFilter::with_defaults("self.app"));
        let sink = crate::new_sink(|_app, _source| {});

        sampler.start_with_config(
            Arc::new(ScriptedRanking::new(vec![])),
            sink,
            SamplerConfig {
                interval: Duration::from_secs(30),
                window: DEFAULT_USAGE_WINDOW,
            },
        );
        std::thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        sampler.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
