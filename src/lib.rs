//! Slow-broker anomaly detector for a Kafka cluster management control
//! plane.
//!
//! The crate's only entry point is [`SlowBrokerDetector`]: construct one
//! with [`SlowBrokerDetector::new`], optionally call
//! [`SlowBrokerDetector::configure`] with overrides, then call
//! [`SlowBrokerDetector::detect_round`] once per scheduling tick with the
//! host's per-broker metric history and current snapshots. Everything
//! else — metric collection, scheduling, and acting on the emitted
//! [`SlowBrokerAnomaly`] records — belongs to the host.
//!
//! ```
//! use std::collections::HashMap;
//! use slow_broker_detector::{MetricHistory, MetricSnapshot, SlowBrokerDetector};
//!
//! let detector = SlowBrokerDetector::new();
//! let history: HashMap<_, MetricHistory> = HashMap::new();
//! let current: HashMap<_, MetricSnapshot> = HashMap::new();
//! let anomalies = detector.detect_round(&history, &current, 0);
//! assert!(anomalies.is_empty());
//! ```

mod classifier;
mod config;
mod detector;
mod error;
mod escalation;
mod extractor;
mod percentile;
mod scoreboard;
mod types;

pub use config::{ConfigValue, DetectorConfig};
pub use detector::SlowBrokerDetector;
pub use error::{ConfigRejected, RoundFailed};
pub use extractor::SkipReason;
pub use scoreboard::{BrokerState, ScoreEntry, SlownessScoreboard};
pub use types::{BrokerId, MetricHistory, MetricSnapshot, RemediationKind, SlowBrokerAnomaly};
