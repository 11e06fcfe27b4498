//! Public data model: broker identity, metric inputs, and the anomaly
//! records this crate emits.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, equality-comparable, hashable broker identifier.
///
/// The host's broker ids are rendered as strings upstream of this crate's
/// boundary (Kafka broker ids are small integers, but nothing here depends
/// on that); a newtype keeps them from being confused with other string
/// data flowing through the detector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrokerId(pub String);

impl BrokerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BrokerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BrokerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Current-round metric snapshot for one broker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// 99.9th-percentile log flush latency, milliseconds, latest sample.
    pub log_flush_p999_ms: f64,
    /// Bytes/sec ingress as leader.
    pub leader_bytes_in: f64,
    /// Bytes/sec ingress from replication.
    pub replication_bytes_in: f64,
}

impl MetricSnapshot {
    /// Total ingress rate used by the negligible-traffic skip gate.
    pub fn bytes_in_rate(&self) -> f64 {
        self.leader_bytes_in + self.replication_bytes_in
    }
}

/// Historical metric series for one broker. All three sequences are the
/// same length; index `i` is the same historical sample across all three.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricHistory {
    pub log_flush_p999_ms: Vec<f64>,
    pub leader_bytes_in: Vec<f64>,
    pub replication_bytes_in: Vec<f64>,
}

impl MetricHistory {
    /// Number of historical samples (the three series share a length).
    pub fn len(&self) -> usize {
        self.log_flush_p999_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether an emitted anomaly calls for demotion or full removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemediationKind {
    Demote,
    Remove,
}

/// One round's emitted anomaly: a set of co-escalated brokers sharing a
/// remediation type, fixability, and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowBrokerAnomaly {
    /// Broker id -> first-detected-at epoch ms, drawn from the scoreboard.
    pub brokers: HashMap<BrokerId, i64>,
    pub fixable: bool,
    pub remediation: RemediationKind,
    pub description: String,
    pub detection_time_ms: i64,
}

impl SlowBrokerAnomaly {
    /// True iff `remediation == Remove`, mirroring the host's
    /// `removeSlowBroker` boolean field.
    pub fn remove_slow_broker(&self) -> bool {
        matches!(self.remediation, RemediationKind::Remove)
    }
}
