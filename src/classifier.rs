//! `PercentileClassifier` and `AnomalyIntersector`.
//!
//! The classifier is metric-agnostic: it is invoked once for the flush
//! metric and once for the per-byte metric (`spec.md` §4.2), and the
//! intersector ANDs the two results together (`spec.md` §4.3).

use std::collections::{HashMap, HashSet};

use crate::percentile::{has_sufficient_data, percentile};
use crate::types::BrokerId;

/// Flags brokers on a single metric using the history test and the peer
/// test. A broker is flagged iff either test fires for it.
///
/// `current` and `history` must share the same metric (both flush, or both
/// per-byte) — this function has no notion of which metric it is looking
/// at, by design, so the two calls in `detector.rs` are symmetric.
pub fn classify_metric(
    current: &HashMap<BrokerId, f64>,
    history: &HashMap<BrokerId, Vec<f64>>,
    history_percentile: f64,
    history_margin: f64,
    peer_percentile: f64,
    peer_margin: f64,
) -> HashSet<BrokerId> {
    let peer_base = peer_percentile_base(current, peer_percentile);

    let mut flagged = HashSet::new();
    for (broker, &current_value) in current {
        let history_fired = history
            .get(broker)
            .map(|h| history_test_fires(h, current_value, history_percentile, history_margin))
            .unwrap_or(false);

        let peer_fired = peer_base
            .map(|base| current_value > base * peer_margin)
            .unwrap_or(false);

        if history_fired || peer_fired {
            flagged.insert(broker.clone());
        }
    }

    flagged
}

fn history_test_fires(history: &[f64], current_value: f64, p: f64, margin: f64) -> bool {
    if !has_sufficient_data(history.len(), p) {
        return false;
    }
    match percentile(history, p) {
        Some(base) => current_value > base * margin,
        None => false,
    }
}

fn peer_percentile_base(current: &HashMap<BrokerId, f64>, p: f64) -> Option<f64> {
    if !has_sufficient_data(current.len(), p) {
        return None;
    }
    let values: Vec<f64> = current.values().copied().collect();
    percentile(&values, p)
}

/// A broker is metric-anomalous this round iff it was flagged on both the
/// flush metric and the per-byte metric.
pub fn intersect(flush_flagged: &HashSet<BrokerId>, per_byte_flagged: &HashSet<BrokerId>) -> HashSet<BrokerId> {
    flush_flagged.intersection(per_byte_flagged).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, f64)]) -> HashMap<BrokerId, f64> {
        pairs
            .iter()
            .map(|(k, v)| (BrokerId::new(*k), *v))
            .collect()
    }

    #[test]
    fn history_test_fires_when_current_exceeds_margin_times_base() {
        let mut history = HashMap::new();
        // ten samples so p90 is meaningful: n*0.9=9>=1, n*0.1=1>=1
        history.insert(BrokerId::new("b1"), vec![10.0; 10]);
        let current = map(&[("b1", 1000.0)]);

        let flagged = classify_metric(&current, &history, 90.0, 3.0, 50.0, 100.0);
        assert!(flagged.contains(&BrokerId::new("b1")));
    }

    #[test]
    fn history_test_does_not_fire_with_insufficient_data() {
        let mut history = HashMap::new();
        // n=2: n*0.9=1.8>=1 but n*0.1=0.2<1 -> insufficient
        history.insert(BrokerId::new("b1"), vec![10.0, 10.0]);
        let current = map(&[("b1", 1000.0)]);

        let flagged = classify_metric(&current, &history, 90.0, 3.0, 50.0, 1_000_000.0);
        assert!(!flagged.contains(&BrokerId::new("b1")));
    }

    #[test]
    fn peer_test_fires_for_an_outlier_even_without_history() {
        let history = HashMap::new();
        let current = map(&[("b1", 1.0), ("b2", 1.0), ("b3", 1000.0)]);

        // peer p50 base ~= 1.0, margin 10 -> b3 (1000) fires, b1/b2 do not
        let flagged = classify_metric(&current, &history, 90.0, 3.0, 50.0, 10.0);
        assert!(flagged.contains(&BrokerId::new("b3")));
        assert!(!flagged.contains(&BrokerId::new("b1")));
    }

    #[test]
    fn intersection_requires_both_metrics() {
        let flush: HashSet<BrokerId> = [BrokerId::new("b1"), BrokerId::new("b2")].into();
        let per_byte: HashSet<BrokerId> = [BrokerId::new("b2"), BrokerId::new("b3")].into();
        let anomalous = intersect(&flush, &per_byte);
        assert_eq!(anomalous, [BrokerId::new("b2")].into());
    }
}
