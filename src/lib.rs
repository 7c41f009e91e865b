//! netwatch: embeddable connectivity monitoring.
//!
//! Tracks whether the host currently has usable internet access by merging
//! three inputs into one status stream: the platform's own online/offline
//! signal, optional link-quality metadata, and active reachability probes
//! against a configured target. Hosts get edge-triggered online/offline
//! callbacks, a per-check callback with latency and link data, and an async
//! event stream mirroring all of it.
//!
//! ```rust,ignore
//! use netwatch::Monitor;
//! use std::time::Duration;
//!
//! let monitor = Monitor::builder()
//!     .probe_target("https://connectivity.example.com/ping")
//!     .base_interval(Duration::from_secs(10))
//!     .max_interval(Duration::from_secs(60))
//!     .on_offline(|at| eprintln!("offline at {at}"))
//!     .on_online(|at| eprintln!("back online at {at}"))
//!     .build();
//!
//! monitor.start().await;
//! // ...
//! monitor.stop().await;
//! ```

pub mod backoff;
pub mod config;
pub mod event;
pub mod link;
pub mod monitor;
pub mod probe;
pub mod signal;

pub use config::{MonitorBuilder, MonitorConfig};
pub use event::{ChangeSource, CheckEvent, LinkChangeEvent, MonitorEvent, Status};
pub use link::{EffectiveType, LinkSnapshot, LinkSource, ManualLink, TransportKind};
pub use monitor::Monitor;
pub use probe::{HttpProber, ProbeError, Prober, PROBE_TIMEOUT};
pub use signal::{ManualSignal, NativeSignal};
