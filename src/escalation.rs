//! `EscalationPolicy`: score bands → emitted anomalies, gated by the
//! fleet-wide fixability check.

use std::collections::{HashMap, HashSet};

use chrono::{TimeZone, Utc};

use crate::config::DetectorConfig;
use crate::scoreboard::SlownessScoreboard;
use crate::types::{BrokerId, RemediationKind, SlowBrokerAnomaly};

/// Builds this round's emitted anomalies from the post-update scoreboard.
///
/// `anomalous` is this round's metric-anomalous set (from the
/// intersector); `cluster_size` is `history.len()`, per the
/// `spec.md` §9 resolution of the clusterSize ambiguity.
pub fn emit(
    scoreboard: &SlownessScoreboard,
    anomalous: &HashSet<BrokerId>,
    cluster_size: usize,
    config: &DetectorConfig,
    now_ms: i64,
) -> Vec<SlowBrokerAnomaly> {
    let mut to_remove = HashSet::new();
    let mut to_demote = HashSet::new();

    for broker in anomalous {
        let Some(entry) = scoreboard.get(broker) else {
            continue;
        };
        if entry.score >= config.decommission_score {
            to_remove.insert(broker.clone());
        } else if entry.score >= config.demotion_score {
            to_demote.insert(broker.clone());
        }
    }

    let flagged = to_remove.len() + to_demote.len();
    let gate_threshold = cluster_size as f64 * config.self_healing_unfixable_ratio;

    if (flagged as f64) > gate_threshold {
        let union: HashSet<BrokerId> = to_remove.union(&to_demote).cloned().collect();
        return vec![build_anomaly(
            scoreboard,
            &union,
            false,
            RemediationKind::Demote,
            now_ms,
        )];
    }

    let mut anomalies = Vec::with_capacity(2);
    if !to_demote.is_empty() {
        anomalies.push(build_anomaly(
            scoreboard,
            &to_demote,
            true,
            RemediationKind::Demote,
            now_ms,
        ));
    }
    if !to_remove.is_empty() {
        anomalies.push(build_anomaly(
            scoreboard,
            &to_remove,
            config.slow_broker_removal_enabled,
            RemediationKind::Remove,
            now_ms,
        ));
    }
    anomalies
}

fn build_anomaly(
    scoreboard: &SlownessScoreboard,
    brokers: &HashSet<BrokerId>,
    fixable: bool,
    remediation: RemediationKind,
    now_ms: i64,
) -> SlowBrokerAnomaly {
    let mut sorted: Vec<&BrokerId> = brokers.iter().collect();
    sorted.sort();

    let mut broker_timestamps = HashMap::with_capacity(brokers.len());
    let mut description_lines = Vec::with_capacity(brokers.len());

    for broker in sorted {
        let first_detected_at_ms = scoreboard
            .get(broker)
            .map(|e| e.first_detected_at_ms)
            .unwrap_or(now_ms);
        broker_timestamps.insert(broker.clone(), first_detected_at_ms);
        description_lines.push(format!(
            "Broker {}'s performance degraded at {}",
            broker,
            render_iso8601(first_detected_at_ms)
        ));
    }

    SlowBrokerAnomaly {
        brokers: broker_timestamps,
        fixable,
        remediation,
        description: description_lines.join("; "),
        detection_time_ms: now_ms,
    }
}

fn render_iso8601(epoch_ms: i64) -> String {
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| format!("epoch-ms:{epoch_ms}"))
}
