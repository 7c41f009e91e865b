//! Monitor configuration and the builder that assembles a [`Monitor`].

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::event::{Callbacks, CheckEvent, LinkChangeEvent};
use crate::link::LinkSource;
use crate::monitor::Monitor;
use crate::probe::{HttpProber, Prober};
use crate::signal::NativeSignal;
use chrono::{DateTime, Utc};

/// Default probe interval while online. Default: 10 seconds.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(10);
/// Default ceiling on the backed-off interval. Default: 60 seconds.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
/// Default multiplier applied to the interval after each failed check.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
/// Default instance name used in log fields.
pub const DEFAULT_NAME: &str = "netwatch";

/// Tunables for a [`Monitor`].
///
/// Invalid values never abort construction; [`sanitized`](Self::sanitized)
/// clamps them to workable defaults with a warning, so a bad host config
/// degrades instead of disabling monitoring.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// URL probed for reachability. With no target the monitor falls back to
    /// the native signal alone.
    pub probe_target: Option<Url>,
    /// Interval between checks while online, and the floor after recovery.
    pub base_interval: Duration,
    /// Ceiling the backed-off interval never exceeds.
    pub max_interval: Duration,
    /// Interval multiplier per consecutive failure. Must exceed 1.0.
    pub backoff_factor: f64,
    /// Instance name carried in every log line.
    pub name: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_target: None,
            base_interval: DEFAULT_BASE_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            name: DEFAULT_NAME.to_string(),
        }
    }
}

impl MonitorConfig {
    pub(crate) fn sanitized(mut self) -> Self {
        if self.base_interval.is_zero() {
            warn!(
                monitor = %self.name,
                default_ms = DEFAULT_BASE_INTERVAL.as_millis() as u64,
                "base interval of zero replaced with default"
            );
            self.base_interval = DEFAULT_BASE_INTERVAL;
        }
        if self.max_interval < self.base_interval {
            warn!(
                monitor = %self.name,
                base_ms = self.base_interval.as_millis() as u64,
                max_ms = self.max_interval.as_millis() as u64,
                "max interval below base raised to base"
            );
            self.max_interval = self.base_interval;
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor <= 1.0 {
            warn!(
                monitor = %self.name,
                factor = self.backoff_factor,
                "backoff factor must exceed 1.0, using default"
            );
            self.backoff_factor = DEFAULT_BACKOFF_FACTOR;
        }
        self
    }
}

/// Fluent assembly of a [`Monitor`].
///
/// ```rust,ignore
/// let monitor = Monitor::builder()
///     .probe_target("https://connectivity.example.com/ping")
///     .base_interval(Duration::from_secs(10))
///     .on_offline(|at| eprintln!("offline at {at}"))
///     .build();
/// monitor.start().await;
/// ```
pub struct MonitorBuilder {
    config: MonitorConfig,
    callbacks: Callbacks,
    prober: Option<Arc<dyn Prober>>,
    native: Option<Arc<dyn NativeSignal>>,
    link: Option<Arc<dyn LinkSource>>,
}

impl MonitorBuilder {
    pub(crate) fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
            callbacks: Callbacks::default(),
            prober: None,
            native: None,
            link: None,
        }
    }

    /// Sets the probe target. An unparsable URL is logged and ignored,
    /// leaving the monitor in native-signal-only mode.
    pub fn probe_target(mut self, target: impl AsRef<str>) -> Self {
        match Url::parse(target.as_ref()) {
            Ok(url) => self.config.probe_target = Some(url),
            Err(err) => {
                warn!(target = target.as_ref(), %err, "ignoring unparsable probe target");
            }
        }
        self
    }

    pub fn base_interval(mut self, interval: Duration) -> Self {
        self.config.base_interval = interval;
        self
    }

    pub fn max_interval(mut self, interval: Duration) -> Self {
        self.config.max_interval = interval;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.backoff_factor = factor;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Called after every check with the outcome.
    pub fn on_check(mut self, f: impl Fn(&CheckEvent) + Send + Sync + 'static) -> Self {
        self.callbacks.on_check = Arc::new(f);
        self
    }

    /// Called once per offline-to-online transition.
    pub fn on_online(mut self, f: impl Fn(DateTime<Utc>) + Send + Sync + 'static) -> Self {
        self.callbacks.on_online = Arc::new(f);
        self
    }

    /// Called once per online-to-offline transition.
    pub fn on_offline(mut self, f: impl Fn(DateTime<Utc>) + Send + Sync + 'static) -> Self {
        self.callbacks.on_offline = Arc::new(f);
        self
    }

    /// Called when the link's effective type actually changes.
    pub fn on_link_change(mut self, f: impl Fn(&LinkChangeEvent) + Send + Sync + 'static) -> Self {
        self.callbacks.on_link_change = Arc::new(f);
        self
    }

    /// Replaces the default HTTP prober, e.g. with a mock in tests.
    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn native_signal(mut self, signal: Arc<dyn NativeSignal>) -> Self {
        self.native = Some(signal);
        self
    }

    pub fn link_source(mut self, source: Arc<dyn LinkSource>) -> Self {
        self.link = Some(source);
        self
    }

    /// Builds the monitor. Never fails: bad tunables are sanitized instead.
    pub fn build(self) -> Monitor {
        let config = self.config.sanitized();
        let prober = self
            .prober
            .unwrap_or_else(|| Arc::new(HttpProber::new()) as Arc<dyn Prober>);
        Monitor::new(config, self.callbacks, prober, self.native, self.link)
    }
}
