//! `MetricExtractor`: derive the two metrics of interest per broker from
//! raw snapshots and history, filtering brokers with negligible ingress.

use std::collections::HashMap;

use crate::config::DetectorConfig;
use crate::types::{BrokerId, MetricHistory, MetricSnapshot};

/// Why a broker was excluded from this round's classification entirely.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// `leaderBytesIn + replicationBytesIn` fell below the configured
    /// threshold (or was non-positive, which would otherwise make the
    /// per-byte ratio non-finite).
    NegligibleIngress { bytes_in_rate: f64, threshold: f64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NegligibleIngress {
                bytes_in_rate,
                threshold,
            } => write!(
                f,
                "negligible ingress ({bytes_in_rate:.2} B/s < {threshold:.2} B/s threshold)"
            ),
        }
    }
}

/// The four per-broker mappings `spec.md` §4.1 calls for, plus the list of
/// brokers skipped this round (for logging by `detector.rs`).
#[derive(Debug, Default)]
pub struct RoundInputs {
    pub current_flush_by_broker: HashMap<BrokerId, f64>,
    pub history_flush_by_broker: HashMap<BrokerId, Vec<f64>>,
    pub current_per_byte_by_broker: HashMap<BrokerId, f64>,
    pub history_per_byte_by_broker: HashMap<BrokerId, Vec<f64>>,
    pub skipped: Vec<(BrokerId, SkipReason)>,
}

/// Noise floor applied only to the flush metric's history (`spec.md` §4.1).
const FLUSH_HISTORY_NOISE_FLOOR_MS: f64 = 5.0;

/// Runs the extraction step for one round.
///
/// Brokers present in `current` but missing from `history` are treated as
/// having empty history (the history test simply cannot fire for them; the
/// peer test still can). Brokers present in `history` but absent from
/// `current` contribute nothing this round — they are neither skipped nor
/// classified, which leaves their scoreboard entry (if any) to decay via
/// the "not flagged this round" path in `SlownessScoreboard::update`.
pub fn extract(
    history: &HashMap<BrokerId, MetricHistory>,
    current: &HashMap<BrokerId, MetricSnapshot>,
    config: &DetectorConfig,
) -> RoundInputs {
    let mut inputs = RoundInputs::default();

    for (broker, snapshot) in current {
        let bytes_in_rate = snapshot.bytes_in_rate();
        let threshold = config.bytes_in_rate_detection_threshold;

        if bytes_in_rate < threshold || bytes_in_rate <= 0.0 {
            inputs.skipped.push((
                broker.clone(),
                SkipReason::NegligibleIngress {
                    bytes_in_rate,
                    threshold,
                },
            ));
            continue;
        }

        inputs
            .current_flush_by_broker
            .insert(broker.clone(), snapshot.log_flush_p999_ms);
        inputs
            .current_per_byte_by_broker
            .insert(broker.clone(), snapshot.log_flush_p999_ms / bytes_in_rate);

        let (flush_history, per_byte_history) = match history.get(broker) {
            Some(h) => derive_history(h, threshold),
            None => (Vec::new(), Vec::new()),
        };
        inputs
            .history_flush_by_broker
            .insert(broker.clone(), flush_history);
        inputs
            .history_per_byte_by_broker
            .insert(broker.clone(), per_byte_history);
    }

    inputs
}

fn derive_history(history: &MetricHistory, threshold: f64) -> (Vec<f64>, Vec<f64>) {
    let flush = history
        .log_flush_p999_ms
        .iter()
        .copied()
        .filter(|&v| v > FLUSH_HISTORY_NOISE_FLOOR_MS)
        .collect();

    let mut per_byte = Vec::new();
    for i in 0..history.len() {
        let leader = history.leader_bytes_in.get(i).copied().unwrap_or(0.0);
        let replication = history.replication_bytes_in.get(i).copied().unwrap_or(0.0);
        let sum = leader + replication;
        if sum >= threshold && sum > 0.0 {
            if let Some(&flush_ms) = history.log_flush_p999_ms.get(i) {
                per_byte.push(flush_ms / sum);
            }
        }
    }

    (flush, per_byte)
}
