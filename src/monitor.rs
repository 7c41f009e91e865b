// SPDX-License-Identifier: MIT
//! The connectivity monitor: one state machine, three inputs, one timer.
//!
//! # Signal flow
//!
//! ```text
//! native transitions ──┐
//! link change events ──┼──► observation merge ──► status, callbacks, events
//! probe timer ─────────┘            │
//!         ▲                        │ re-arm after current interval
//!         └────────────────────────┘
//! ```
//!
//! All three inputs wake one task that exclusively owns the mutable state, so
//! merges never interleave and the probe timer can never double up. While
//! offline the probe interval grows by the configured factor up to the
//! maximum; any status flip snaps it back to the base. Transition callbacks
//! are edge-triggered: a sustained outage fires on-offline exactly once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::backoff;
use crate::config::{MonitorBuilder, MonitorConfig};
use crate::event::{Callbacks, ChangeSource, CheckEvent, LinkChangeEvent, MonitorEvent, Status};
use crate::link::{self, EffectiveType, LinkSnapshot, LinkSource};
use crate::probe::{ProbeError, Prober, PROBE_TIMEOUT};
use crate::signal::NativeSignal;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Edge-triggered connectivity monitor.
///
/// Construct through [`Monitor::builder`], then drive with [`start`](Self::start)
/// and [`stop`](Self::stop). Instances are independent: each owns its own
/// state, timer, and subscriptions, so hosts may run several against
/// different targets.
///
/// # Example
/// ```rust,ignore
/// use netwatch::Monitor;
/// use std::time::Duration;
///
/// let monitor = Monitor::builder()
///     .probe_target("https://connectivity.example.com/ping")
///     .base_interval(Duration::from_secs(10))
///     .on_offline(|at| eprintln!("offline at {at}"))
///     .on_online(|at| eprintln!("back online at {at}"))
///     .build();
///
/// monitor.start().await;
/// // ... monitor.status(), monitor.subscribe(), ...
/// monitor.stop().await;
/// ```
pub struct Monitor {
    config: Arc<MonitorConfig>,
    callbacks: Callbacks,
    prober: Arc<dyn Prober>,
    native: Option<Arc<dyn NativeSignal>>,
    link: Option<Arc<dyn LinkSource>>,
    events: broadcast::Sender<MonitorEvent>,
    status: Arc<watch::Sender<Status>>,
    running: Mutex<Option<Running>>,
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Monitor {
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    pub(crate) fn new(
        config: MonitorConfig,
        callbacks: Callbacks,
        prober: Arc<dyn Prober>,
        native: Option<Arc<dyn NativeSignal>>,
        link: Option<Arc<dyn LinkSource>>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status, _) = watch::channel(Status::Online);
        Self {
            config: Arc::new(config),
            callbacks,
            prober,
            native,
            link,
            events,
            status: Arc::new(status),
            running: Mutex::new(None),
        }
    }

    /// Begins monitoring: subscribes to the native signal and link source
    /// (when present), captures the link baseline, and schedules the first
    /// probe one base interval out.
    ///
    /// Calling `start` while already running is a no-op; the existing
    /// schedule and subscriptions are untouched.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!(monitor = %self.config.name, "start ignored, already running");
            return;
        }

        // Fresh state per run: optimistic until the first observation, and
        // the link baseline is re-captured so a restart does not replay a
        // stale comparison.
        let baseline = self
            .link
            .as_ref()
            .and_then(|source| source.snapshot().effective_type);
        self.status.send_replace(Status::Online);

        let native_rx = self.native.as_ref().map(|signal| signal.transitions());
        let link_rx = self.link.as_ref().map(|source| source.changes());

        let cancel = CancellationToken::new();
        let task = MonitorTask {
            state: MonitorState {
                status: Status::Online,
                interval: self.config.base_interval,
                last_effective_type: baseline,
            },
            config: Arc::clone(&self.config),
            callbacks: self.callbacks.clone(),
            prober: Arc::clone(&self.prober),
            native: self.native.clone(),
            link: self.link.clone(),
            events: self.events.clone(),
            status: Arc::clone(&self.status),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run(native_rx, link_rx));

        info!(
            monitor = %self.config.name,
            target = self.config.probe_target.as_ref().map_or("<none>", Url::as_str),
            base_ms = self.config.base_interval.as_millis() as u64,
            max_ms = self.config.max_interval.as_millis() as u64,
            link_metadata = self.link.is_some(),
            "monitor started"
        );
        *running = Some(Running {
            cancel,
            task: handle,
        });
    }

    /// Ends monitoring: cancels the pending timer and any in-flight probe,
    /// drops the subscriptions, and waits for the task to finish.
    ///
    /// Once `stop` returns, no callback fires from work scheduled before the
    /// call. Idempotent, and safe without a prior [`start`](Self::start).
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(Running { cancel, task }) = running.take() else {
            return;
        };
        cancel.cancel();
        if let Err(err) = task.await {
            if !err.is_cancelled() {
                warn!(monitor = %self.config.name, %err, "monitor task ended abnormally");
            }
        }
        info!(monitor = %self.config.name, "monitor stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Last known status. `Online` before the first observation.
    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    /// Watch channel over [`status`](Self::status), for hosts that prefer
    /// awaiting changes over polling.
    pub fn watch_status(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Subscribes to the event stream mirroring every callback delivery.
    /// Slow subscribers miss events rather than stalling the monitor.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
            running.task.abort();
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// State owned by the running task. Exists only between `start` and `stop`.
struct MonitorState {
    status: Status,
    /// Current probe interval, always within `[base_interval, max_interval]`.
    interval: Duration,
    /// Last seen link classification, for change dedup.
    last_effective_type: Option<EffectiveType>,
}

struct MonitorTask {
    state: MonitorState,
    config: Arc<MonitorConfig>,
    callbacks: Callbacks,
    prober: Arc<dyn Prober>,
    native: Option<Arc<dyn NativeSignal>>,
    link: Option<Arc<dyn LinkSource>>,
    events: broadcast::Sender<MonitorEvent>,
    status: Arc<watch::Sender<Status>>,
    cancel: CancellationToken,
}

enum Wake {
    Tick,
    Transition(bool),
    Link(LinkSnapshot),
    SourceClosed(&'static str),
    Cancelled,
}

impl MonitorTask {
    async fn run(
        mut self,
        mut native_rx: Option<broadcast::Receiver<bool>>,
        mut link_rx: Option<broadcast::Receiver<LinkSnapshot>>,
    ) {
        // The single probe timer. Re-armed in place after every observation,
        // so a second pending tick cannot exist.
        let timer = time::sleep(self.state.interval);
        tokio::pin!(timer);

        loop {
            let wake = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Wake::Cancelled,
                _ = timer.as_mut() => Wake::Tick,
                online = recv_or_park(&self.config.name, "native signal", &mut native_rx) => {
                    match online {
                        Some(online) => Wake::Transition(online),
                        None => Wake::SourceClosed("native signal"),
                    }
                }
                snapshot = recv_or_park(&self.config.name, "link source", &mut link_rx) => {
                    match snapshot {
                        Some(snapshot) => Wake::Link(snapshot),
                        None => Wake::SourceClosed("link source"),
                    }
                }
            };

            match wake {
                Wake::Cancelled => break,
                Wake::Tick => {
                    self.check().await;
                    timer.as_mut().reset(next_deadline(self.state.interval));
                }
                Wake::Transition(online) => {
                    debug!(monitor = %self.config.name, online, "native transition, checking now");
                    self.check().await;
                    timer.as_mut().reset(next_deadline(self.state.interval));
                }
                // Link changes update metadata only; the probe schedule is
                // not disturbed.
                Wake::Link(snapshot) => self.link_change(snapshot, ChangeSource::Event),
                Wake::SourceClosed(source) => {
                    warn!(monitor = %self.config.name, source, "input channel closed");
                }
            }
        }
    }

    /// One check: obtain an observation, then merge it.
    async fn check(&mut self) {
        let observation = match self.config.probe_target.clone() {
            Some(target) => self.probe_once(&target).await,
            // No target: trust the native flag. Without that either, there
            // is nothing to contradict the optimistic default.
            None => Some((
                self.native.as_ref().map_or(true, |signal| signal.is_online()),
                None,
            )),
        };
        let Some((observed_online, latency)) = observation else {
            return; // shutdown raced the probe, deliver nothing
        };
        self.apply(observed_online, latency);
    }

    /// Runs a single probe attempt under the fixed timeout. Returns `None`
    /// when cancelled mid-flight.
    async fn probe_once(&self, target: &Url) -> Option<(bool, Option<Duration>)> {
        let started = Instant::now();
        let attempt = time::timeout(PROBE_TIMEOUT, self.prober.probe(target));
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            outcome = attempt => outcome,
        };
        let outcome = match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(ProbeError::Timeout(PROBE_TIMEOUT)),
        };
        match outcome {
            Ok(()) => Some((true, Some(started.elapsed()))),
            Err(err) => {
                debug!(monitor = %self.config.name, %err, "probe failed");
                Some((false, None))
            }
        }
    }

    /// The observation merge. Sole writer of [`MonitorState`].
    fn apply(&mut self, observed_online: bool, latency: Option<Duration>) {
        let now = Utc::now();
        let observed = Status::from_observation(observed_online);

        if observed != self.state.status {
            // Edge: notify once and snap the interval back to base.
            self.state.status = observed;
            self.state.interval = self.config.base_interval;
            self.status.send_replace(observed);
            match observed {
                Status::Online => {
                    info!(monitor = %self.config.name, "connectivity restored");
                    (self.callbacks.on_online)(now);
                    self.emit(MonitorEvent::Online { timestamp: now });
                }
                Status::Offline => {
                    warn!(monitor = %self.config.name, "connectivity lost");
                    (self.callbacks.on_offline)(now);
                    self.emit(MonitorEvent::Offline { timestamp: now });
                }
            }
        } else if observed == Status::Offline {
            self.state.interval = backoff::grow(
                self.state.interval,
                self.config.backoff_factor,
                self.config.max_interval,
            );
        } else {
            self.state.interval = self.config.base_interval;
        }

        let connection = self.link.as_ref().map(|source| source.snapshot());
        let check = CheckEvent {
            timestamp: now,
            interval: self.state.interval,
            latency,
            status: self.state.status,
            connection: connection.clone(),
        };
        debug!(
            monitor = %self.config.name,
            status = %check.status,
            interval_ms = check.interval.as_millis() as u64,
            latency_ms = check.latency.map(|l| l.as_millis() as u64),
            "check complete"
        );
        (self.callbacks.on_check)(&check);
        self.emit(MonitorEvent::Check(check));

        if let Some(snapshot) = connection {
            self.link_change(snapshot, ChangeSource::Poll);
        }
    }

    /// Compares the link classification against the last seen one and
    /// notifies on an actual change. Identical readings are dropped.
    fn link_change(&mut self, snapshot: LinkSnapshot, source: ChangeSource) {
        if snapshot.effective_type == self.state.last_effective_type {
            return;
        }
        let previous = self.state.last_effective_type;
        self.state.last_effective_type = snapshot.effective_type;
        info!(
            monitor = %self.config.name,
            from = link::label(previous),
            to = link::label(snapshot.effective_type),
            %source,
            "link quality changed"
        );
        let event = LinkChangeEvent {
            timestamp: Utc::now(),
            effective_type: snapshot.effective_type,
            previous_effective_type: previous,
            source,
            // The full snapshot rides along only on host-pushed changes.
            link: match source {
                ChangeSource::Event => Some(snapshot),
                ChangeSource::Poll => None,
            },
        };
        (self.callbacks.on_link_change)(&event);
        self.emit(MonitorEvent::LinkChange(event));
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is fine; callbacks are the primary contract.
        let _ = self.events.send(event);
    }
}

/// Deadline `interval` after now. An interval too large for instant
/// arithmetic parks the timer far in the future instead of overflowing.
fn next_deadline(interval: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(interval)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

/// Receives from an optional subscription. Lagged receivers skip ahead;
/// a closed channel parks the slot so the select arm goes quiet instead of
/// spinning.
async fn recv_or_park<T: Clone>(
    name: &str,
    source: &'static str,
    rx: &mut Option<broadcast::Receiver<T>>,
) -> Option<T> {
    let Some(receiver) = rx.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(value) => return Some(value),
            Err(RecvError::Lagged(skipped)) => {
                warn!(monitor = %name, source, skipped, "input receiver lagged, catching up");
            }
            Err(RecvError::Closed) => break,
        }
    }
    *rx = None;
    None
}
