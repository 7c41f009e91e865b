//! Link-quality metadata: snapshots, the source trait, and a manual source.
//!
//! Link information is an optional capability. A host that can observe its
//! network link (effective type, downlink estimate, metered hints) plugs in
//! a [`LinkSource`]; everything here degrades to `None` when it cannot.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Coarse link-speed classification, ordered slowest to fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    Type2g,
    #[serde(rename = "3g")]
    Type3g,
    #[serde(rename = "4g")]
    Type4g,
}

impl EffectiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            EffectiveType::Slow2g => "slow-2g",
            EffectiveType::Type2g => "2g",
            EffectiveType::Type3g => "3g",
            EffectiveType::Type4g => "4g",
        }
    }

    /// Parses the wire labels (`"slow-2g"`, `"2g"`, `"3g"`, `"4g"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "slow-2g" => Some(EffectiveType::Slow2g),
            "2g" => Some(EffectiveType::Type2g),
            "3g" => Some(EffectiveType::Type3g),
            "4g" => Some(EffectiveType::Type4g),
            _ => None,
        }
    }
}

impl std::fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log-friendly label for an optional effective type.
pub fn label(effective_type: Option<EffectiveType>) -> &'static str {
    effective_type.map_or("unknown", EffectiveType::as_str)
}

/// Physical transport backing the link, when the host knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Wifi,
    Cellular,
    Ethernet,
    Unknown,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Wifi => write!(f, "wifi"),
            TransportKind::Cellular => write!(f, "cellular"),
            TransportKind::Ethernet => write!(f, "ethernet"),
            TransportKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Point-in-time view of link quality. Every field is optional: hosts
/// report what they can measure and omit the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    /// Downstream bandwidth estimate in megabits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downlink_mbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_type: Option<EffectiveType>,
    /// Estimated round-trip time of the link itself, not of a probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_ms: Option<u64>,
    /// Host requested reduced data usage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportKind>,
}

/// Provider of link-quality metadata.
///
/// `snapshot` must be cheap; the monitor calls it on every check. Receivers
/// from `changes` unsubscribe by being dropped.
pub trait LinkSource: Send + Sync {
    fn snapshot(&self) -> LinkSnapshot;
    fn changes(&self) -> broadcast::Receiver<LinkSnapshot>;
}

/// In-process [`LinkSource`] driven by explicit [`update`](ManualLink::update)
/// calls. Useful for embedding hosts that receive link data over their own
/// channel, and for tests.
pub struct ManualLink {
    current: RwLock<LinkSnapshot>,
    tx: broadcast::Sender<LinkSnapshot>,
}

impl ManualLink {
    pub fn new(initial: LinkSnapshot) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            current: RwLock::new(initial),
            tx,
        }
    }

    /// Replaces the snapshot and notifies subscribers. Dedup happens at the
    /// consumer, so every call is forwarded.
    pub fn update(&self, snapshot: LinkSnapshot) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot.clone();
        let _ = self.tx.send(snapshot);
    }
}

impl Default for ManualLink {
    fn default() -> Self {
        Self::new(LinkSnapshot::default())
    }
}

impl LinkSource for ManualLink {
    fn snapshot(&self) -> LinkSnapshot {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn changes(&self) -> broadcast::Receiver<LinkSnapshot> {
        self.tx.subscribe()
    }
}

impl std::fmt::Debug for ManualLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualLink")
            .field("current", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_type_wire_names_round_trip() {
        for (ty, name) in [
            (EffectiveType::Slow2g, "slow-2g"),
            (EffectiveType::Type2g, "2g"),
            (EffectiveType::Type3g, "3g"),
            (EffectiveType::Type4g, "4g"),
        ] {
            assert_eq!(ty.as_str(), name);
            assert_eq!(EffectiveType::parse(name), Some(ty));
            assert_eq!(serde_json::to_value(ty).unwrap(), name);
        }
        assert_eq!(EffectiveType::parse("5g"), None);
    }

    #[test]
    fn effective_type_orders_slow_to_fast() {
        assert!(EffectiveType::Slow2g < EffectiveType::Type2g);
        assert!(EffectiveType::Type2g < EffectiveType::Type3g);
        assert!(EffectiveType::Type3g < EffectiveType::Type4g);
    }

    #[test]
    fn label_handles_absent_capability() {
        assert_eq!(label(None), "unknown");
        assert_eq!(label(Some(EffectiveType::Type4g)), "4g");
    }

    #[test]
    fn snapshot_omits_unset_fields() {
        let json = serde_json::to_value(LinkSnapshot::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let json = serde_json::to_value(LinkSnapshot {
            effective_type: Some(EffectiveType::Type4g),
            rtt_ms: Some(40),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"effective_type": "4g", "rtt_ms": 40}));
    }

    #[tokio::test]
    async fn manual_link_delivers_updates() {
        let link = ManualLink::default();
        let mut rx = link.changes();

        let snapshot = LinkSnapshot {
            effective_type: Some(EffectiveType::Type3g),
            ..Default::default()
        };
        link.update(snapshot.clone());

        assert_eq!(rx.recv().await.unwrap(), snapshot);
        assert_eq!(link.snapshot(), snapshot);
    }
}
