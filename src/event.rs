//! Callback payloads and the mirrored event stream.
//!
//! Every notification the monitor delivers through a callback slot is also
//! sent as a [`MonitorEvent`] on the broadcast channel handed out by
//! `Monitor::subscribe`, so hosts can consume either a callback or an
//! async stream without changing the callback contract.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Duration;

use crate::link::{EffectiveType, LinkSnapshot};

/// Connectivity status tracked by the monitor.
///
/// The monitor starts optimistically `Online` and only flips on an actual
/// observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Online,
    Offline,
}

impl Status {
    /// `true` for [`Status::Online`].
    pub fn is_online(self) -> bool {
        matches!(self, Status::Online)
    }

    pub(crate) fn from_observation(online: bool) -> Self {
        if online {
            Status::Online
        } else {
            Status::Offline
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Online => write!(f, "online"),
            Status::Offline => write!(f, "offline"),
        }
    }
}

/// Which path noticed a link-quality change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// Seen while applying a scheduled or one-shot check.
    Poll,
    /// Pushed by the host's link-quality change event.
    Event,
}

impl std::fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeSource::Poll => write!(f, "poll"),
            ChangeSource::Event => write!(f, "event"),
        }
    }
}

/// Payload of the on-check callback, delivered once per observation.
#[derive(Debug, Clone, Serialize)]
pub struct CheckEvent {
    pub timestamp: DateTime<Utc>,
    /// Probe interval in force after this observation.
    #[serde(rename = "interval_ms", serialize_with = "ser_ms")]
    pub interval: Duration,
    /// Round-trip time of a successful probe. `None` on failure and in
    /// native-signal-only mode.
    #[serde(
        rename = "latency_ms",
        serialize_with = "ser_opt_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub latency: Option<Duration>,
    /// Status after merging this observation.
    pub status: Status,
    /// Link metadata at observation time. `None` when the capability is
    /// absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<LinkSnapshot>,
}

/// Payload of the on-link-change callback.
#[derive(Debug, Clone, Serialize)]
pub struct LinkChangeEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_type: Option<EffectiveType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_effective_type: Option<EffectiveType>,
    pub source: ChangeSource,
    /// Full snapshot, carried only for host-pushed ([`ChangeSource::Event`])
    /// changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkSnapshot>,
}

/// Everything the monitor reports, mirrored on the broadcast channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorEvent {
    Check(CheckEvent),
    Online { timestamp: DateTime<Utc> },
    Offline { timestamp: DateTime<Utc> },
    LinkChange(LinkChangeEvent),
}

pub type CheckCallback = Arc<dyn Fn(&CheckEvent) + Send + Sync>;
pub type TransitionCallback = Arc<dyn Fn(DateTime<Utc>) + Send + Sync>;
pub type LinkChangeCallback = Arc<dyn Fn(&LinkChangeEvent) + Send + Sync>;

/// The four notification slots. Every slot defaults to a no-op, so a host
/// wires up only what it cares about.
#[derive(Clone)]
pub(crate) struct Callbacks {
    pub on_check: CheckCallback,
    pub on_online: TransitionCallback,
    pub on_offline: TransitionCallback,
    pub on_link_change: LinkChangeCallback,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            on_check: Arc::new(|_| {}),
            on_online: Arc::new(|_| {}),
            on_offline: Arc::new(|_| {}),
            on_link_change: Arc::new(|_| {}),
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

fn ser_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn ser_opt_ms<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&(d.as_millis() as u64)),
        None => s.serialize_none(),
    }
}
