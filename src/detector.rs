//! `SlowBrokerDetector`: the `DetectRound` / `Configure` entry point that
//! wires `extractor` → `classifier` → `scoreboard` → `escalation` together
//! under a single lock, per `spec.md` §5.

use std::any::Any;
use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::classifier::{classify_metric, intersect};
use crate::config::{ConfigValue, DetectorConfig};
use crate::error::{ConfigRejected, RoundFailed};
use crate::escalation;
use crate::extractor::{self, RoundInputs};
use crate::scoreboard::{BrokerState, SlownessScoreboard};
use crate::types::{BrokerId, MetricHistory, MetricSnapshot, SlowBrokerAnomaly};

struct DetectorState {
    config: DetectorConfig,
    scoreboard: SlownessScoreboard,
}

/// The detector. Owns its scoreboard exclusively (`spec.md` §3); external
/// collaborators only ever see the anomalies `detect_round` returns.
///
/// Cheap to share: clone the `Arc` the host already wraps its detector
/// instances in, or hold this type behind one if multiple threads may
/// call `detect_round`/`configure` concurrently — the internal lock
/// serializes them per `spec.md` §5's thread-safety contract.
pub struct SlowBrokerDetector {
    state: Mutex<DetectorState>,
}

impl Default for SlowBrokerDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SlowBrokerDetector {
    pub fn new() -> Self {
        Self::with_config(DetectorConfig::default())
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        Self {
            state: Mutex::new(DetectorState {
                config,
                scoreboard: SlownessScoreboard::new(),
            }),
        }
    }

    /// Validates and applies configuration overrides. Rejects the whole
    /// call on any violation — no partial application (`spec.md` §4.6,
    /// §7). Never touches the scoreboard.
    pub fn configure(&self, options: &HashMap<String, ConfigValue>) -> Result<(), ConfigRejected> {
        let mut state = self.state.lock();
        let next = state.config.apply(options)?;
        state.config = next;
        Ok(())
    }

    /// Returns a snapshot of the current configuration.
    pub fn config(&self) -> DetectorConfig {
        self.state.lock().config.clone()
    }

    /// Returns the current score for a broker, if it is on the scoreboard.
    pub fn score_of(&self, broker: &BrokerId) -> Option<i32> {
        self.state.lock().scoreboard.get(broker).map(|e| e.score)
    }

    /// Runs one detection round.
    ///
    /// Holds the detector's single exclusive lock for the round's full
    /// duration — construct, run, and commit all happen under one
    /// `self.state.lock()` call, matching `configure` and satisfying
    /// `spec.md` §5's thread-safety contract: two concurrent callers must
    /// serialize, never both compute against the same prior scoreboard
    /// state and race to commit.
    ///
    /// Infallible by design: an unexpected failure inside the round is
    /// logged as `RoundFailed` and this returns an empty anomaly set with
    /// the scoreboard left exactly as it was before the call (`spec.md`
    /// §5, §7). A detector implemented entirely in safe, total arithmetic
    /// over already-guarded inputs should never actually hit this path;
    /// it exists so a future change to these modules cannot turn a logic
    /// bug into a poisoned scoreboard or a crashed host thread.
    pub fn detect_round(
        &self,
        history: &HashMap<BrokerId, MetricHistory>,
        current: &HashMap<BrokerId, MetricSnapshot>,
        now_ms: i64,
    ) -> Vec<SlowBrokerAnomaly> {
        info!(
            history_brokers = history.len(),
            current_brokers = current.len(),
            "slow-broker detection round starting"
        );
        let started_at = Instant::now();

        let mut state = self.state.lock();
        let config = state.config.clone();
        let scoreboard_before = state.scoreboard.clone();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_round(&config, scoreboard_before, history, current, now_ms)
        }));

        match outcome {
            Ok((anomalies, scoreboard_after)) => {
                let counts = state_counts(&scoreboard_after, config.demotion_score, config.decommission_score);
                state.scoreboard = scoreboard_after;
                info!(
                    anomalies = anomalies.len(),
                    scoreboard_size = state.scoreboard.len(),
                    suspected = counts.suspected,
                    demote_eligible = counts.demote_eligible,
                    remove_eligible = counts.remove_eligible,
                    elapsed_us = started_at.elapsed().as_micros() as u64,
                    "slow-broker detection round finished"
                );
                anomalies
            }
            Err(panic) => {
                let failure = RoundFailed::Internal(describe_panic(&panic));
                warn!(error = %failure, "slow-broker detection round failed; scoreboard unchanged");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct StateCounts {
    suspected: usize,
    demote_eligible: usize,
    remove_eligible: usize,
}

/// Buckets every scoreboard entry into its `BrokerState` band for the
/// round-finish summary log. `Absent` brokers are not in the scoreboard at
/// all, so they never contribute a count here.
fn state_counts(scoreboard: &SlownessScoreboard, demotion_score: i32, decommission_score: i32) -> StateCounts {
    let mut counts = StateCounts::default();
    for (_, entry) in scoreboard.iter() {
        match entry.state(demotion_score, decommission_score) {
            BrokerState::Absent => {}
            BrokerState::Suspected => counts.suspected += 1,
            BrokerState::DemoteEligible => counts.demote_eligible += 1,
            BrokerState::RemoveEligible => counts.remove_eligible += 1,
        }
    }
    counts
}

/// The pure core of a round: extraction, classification, intersection,
/// scoreboard update, escalation. Operates on an owned scoreboard copy and
/// returns the post-round scoreboard alongside this round's anomalies, so
/// the caller can commit both atomically (or not at all, on panic).
fn run_round(
    config: &DetectorConfig,
    mut scoreboard: SlownessScoreboard,
    history: &HashMap<BrokerId, MetricHistory>,
    current: &HashMap<BrokerId, MetricSnapshot>,
    now_ms: i64,
) -> (Vec<SlowBrokerAnomaly>, SlownessScoreboard) {
    let RoundInputs {
        current_flush_by_broker,
        history_flush_by_broker,
        current_per_byte_by_broker,
        history_per_byte_by_broker,
        skipped,
    } = extractor::extract(history, current, config);

    for (broker, reason) in &skipped {
        info!(broker = %broker, reason = %reason, "skipping broker this round");
    }

    let flush_flagged = classify_metric(
        &current_flush_by_broker,
        &history_flush_by_broker,
        config.metric_history_percentile,
        config.metric_history_margin,
        config.peer_metric_percentile,
        config.peer_metric_margin,
    );
    let per_byte_flagged = classify_metric(
        &current_per_byte_by_broker,
        &history_per_byte_by_broker,
        config.metric_history_percentile,
        config.metric_history_margin,
        config.peer_metric_percentile,
        config.peer_metric_margin,
    );

    let anomalous = intersect(&flush_flagged, &per_byte_flagged);

    scoreboard.update(&anomalous, now_ms, config.decommission_score);

    let anomalies = escalation::emit(&scoreboard, &anomalous, history.len(), config, now_ms);

    (anomalies, scoreboard)
}

fn describe_panic(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(flush: f64, leader: f64, replication: f64) -> MetricSnapshot {
        MetricSnapshot {
            log_flush_p999_ms: flush,
            leader_bytes_in: leader,
            replication_bytes_in: replication,
        }
    }

    fn flat_history(flush: f64, leader: f64, replication: f64, n: usize) -> MetricHistory {
        MetricHistory {
            log_flush_p999_ms: vec![flush; n],
            leader_bytes_in: vec![leader; n],
            replication_bytes_in: vec![replication; n],
        }
    }

    #[test]
    fn empty_round_on_empty_scoreboard_is_a_no_op() {
        let detector = SlowBrokerDetector::new();
        let anomalies = detector.detect_round(&HashMap::new(), &HashMap::new(), 0);
        assert!(anomalies.is_empty());
        assert_eq!(detector.score_of(&BrokerId::new("anything")), None);
    }

    // Scenario A: a single brief spike does not escalate.
    #[test]
    fn scenario_a_brief_spike_no_escalation() {
        let detector = SlowBrokerDetector::new();
        let mut history = HashMap::new();
        history.insert(BrokerId::new("x"), flat_history(10.0, 2_000_000.0, 0.0, 20));
        history.insert(BrokerId::new("y"), flat_history(10.0, 2_000_000.0, 0.0, 20));

        let mut current_spike = HashMap::new();
        current_spike.insert(BrokerId::new("x"), snapshot(1000.0, 2_000_000.0, 0.0));
        current_spike.insert(BrokerId::new("y"), snapshot(10.0, 2_000_000.0, 0.0));

        let anomalies = detector.detect_round(&history, &current_spike, 0);
        assert!(anomalies.is_empty());
        assert_eq!(detector.score_of(&BrokerId::new("x")), Some(1));

        let mut current_normal = HashMap::new();
        current_normal.insert(BrokerId::new("x"), snapshot(10.0, 2_000_000.0, 0.0));
        current_normal.insert(BrokerId::new("y"), snapshot(10.0, 2_000_000.0, 0.0));

        let anomalies = detector.detect_round(&history, &current_normal, 1);
        assert!(anomalies.is_empty());
        assert_eq!(detector.score_of(&BrokerId::new("x")), None);
    }

    // Scenario B: sustained degradation reaches the demotion band on round 5.
    #[test]
    fn scenario_b_sustained_degradation_to_demotion() {
        let detector = SlowBrokerDetector::new();
        let mut history = HashMap::new();
        history.insert(BrokerId::new("x"), flat_history(10.0, 2_000_000.0, 0.0, 20));
        // Pad clusterSize so the fleet-wide fixability gate (flagged >
        // clusterSize * ratio) does not trip on a single slow broker;
        // these brokers never appear in `current` so they do not affect
        // classification, only `history.len()` (the clusterSize input).
        for i in 0..9 {
            history.insert(
                BrokerId::new(format!("quiet-{i}")),
                flat_history(10.0, 2_000_000.0, 0.0, 20),
            );
        }

        let mut spiking = HashMap::new();
        spiking.insert(BrokerId::new("x"), snapshot(1000.0, 2_000_000.0, 0.0));

        for round in 0..4 {
            let anomalies = detector.detect_round(&history, &spiking, round);
            assert!(anomalies.is_empty(), "round {round} should not escalate yet");
        }

        let anomalies = detector.detect_round(&history, &spiking, 4);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].fixable);
        assert_eq!(
            anomalies[0].brokers.get(&BrokerId::new("x")),
            Some(&0)
        );
    }

    // Scenario F: a broker with zero traffic is never flagged.
    #[test]
    fn scenario_f_negligible_traffic_never_flagged() {
        let detector = SlowBrokerDetector::new();
        let mut history = HashMap::new();
        history.insert(BrokerId::new("x"), flat_history(1000.0, 0.0, 0.0, 20));

        let mut current = HashMap::new();
        current.insert(BrokerId::new("x"), snapshot(1000.0, 0.0, 0.0));

        for round in 0..10 {
            let anomalies = detector.detect_round(&history, &current, round);
            assert!(anomalies.is_empty());
        }
        assert_eq!(detector.score_of(&BrokerId::new("x")), None);
    }

    #[test]
    fn configure_rejects_and_leaves_prior_config_in_place() {
        let detector = SlowBrokerDetector::new();
        let mut bad = HashMap::new();
        bad.insert(
            "metricHistoryPercentile".to_string(),
            ConfigValue::Float(500.0),
        );
        assert!(detector.configure(&bad).is_err());
        assert_eq!(detector.config().metric_history_percentile, 90.0);
    }

    // Regression test for the §5 thread-safety contract: concurrent rounds
    // must serialize under one lock so no commit can clobber another round's
    // update. Every thread flags the same broker every round, so with a
    // correctly serialized lock the final score is exactly the total number
    // of rounds run, regardless of interleaving.
    #[test]
    fn concurrent_rounds_serialize_without_losing_scoreboard_updates() {
        use std::sync::Arc;
        use std::thread;

        let config = DetectorConfig {
            decommission_score: 10_000,
            ..Default::default()
        };
        let detector = Arc::new(SlowBrokerDetector::with_config(config));

        let mut history = HashMap::new();
        history.insert(BrokerId::new("x"), flat_history(10.0, 2_000_000.0, 0.0, 20));
        let history = Arc::new(history);

        let mut current = HashMap::new();
        current.insert(BrokerId::new("x"), snapshot(1000.0, 2_000_000.0, 0.0));
        let current = Arc::new(current);

        const THREADS: i64 = 8;
        const ROUNDS_PER_THREAD: i64 = 25;

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let detector = Arc::clone(&detector);
                let history = Arc::clone(&history);
                let current = Arc::clone(&current);
                thread::spawn(move || {
                    for r in 0..ROUNDS_PER_THREAD {
                        detector.detect_round(&history, &current, t * ROUNDS_PER_THREAD + r);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("detector thread should not panic");
        }

        assert_eq!(
            detector.score_of(&BrokerId::new("x")),
            Some((THREADS * ROUNDS_PER_THREAD) as i32)
        );
    }
}
