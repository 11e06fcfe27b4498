//! Detector configuration: tunables, defaults, and validation.
//!
//! Mirrors the teacher crate's `route_quality::config` pattern of a single
//! `Default`-implementing struct with documented fields, except that here
//! the struct is built from a flat, string-keyed map rather than parsed
//! directly from a config file — the host owns the file format.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigRejected;

/// One configuration value, as supplied through `Configure`.
///
/// The tunable set is closed (see the table in `spec.md` §4.6), so a small
/// typed enum gives precise `ConfigRejected::WrongType` errors instead of a
/// generic deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl ConfigValue {
    fn as_f64(&self, key: &'static str) -> Result<f64, ConfigRejected> {
        match self {
            ConfigValue::Float(v) => Ok(*v),
            ConfigValue::Int(v) => Ok(*v as f64),
            ConfigValue::Bool(_) => Err(ConfigRejected::WrongType {
                key,
                expected: "number",
            }),
        }
    }

    fn as_i64(&self, key: &'static str) -> Result<i64, ConfigRejected> {
        match self {
            ConfigValue::Int(v) => Ok(*v),
            ConfigValue::Float(v) if v.fract() == 0.0 => Ok(*v as i64),
            _ => Err(ConfigRejected::WrongType {
                key,
                expected: "integer",
            }),
        }
    }

    fn as_bool(&self, key: &'static str) -> Result<bool, ConfigRejected> {
        match self {
            ConfigValue::Bool(v) => Ok(*v),
            _ => Err(ConfigRejected::WrongType {
                key,
                expected: "bool",
            }),
        }
    }
}

/// Validated detector configuration. Construct via `DetectorConfig::default()`
/// and `DetectorConfig::apply`, never by setting fields directly from
/// untrusted input — only `apply` enforces the range constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Ingress rate below which a broker is skipped entirely this round, B/s.
    pub bytes_in_rate_detection_threshold: f64,
    /// Percentile used by the history test.
    pub metric_history_percentile: f64,
    /// Multiplicative margin applied to the history-test base.
    pub metric_history_margin: f64,
    /// Percentile used by the peer test.
    pub peer_metric_percentile: f64,
    /// Multiplicative margin applied to the peer-test base.
    pub peer_metric_margin: f64,
    /// Score at which a broker enters the demote-eligible band.
    pub demotion_score: i32,
    /// Score at which a broker enters the remove-eligible band (saturates here).
    pub decommission_score: i32,
    /// Fraction of the fleet that can be simultaneously flagged before the
    /// fixability gate declines auto-remediation.
    pub self_healing_unfixable_ratio: f64,
    /// Whether removal-typed anomalies are permitted to be marked fixable.
    pub slow_broker_removal_enabled: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            bytes_in_rate_detection_threshold: 1_048_576.0,
            metric_history_percentile: 90.0,
            metric_history_margin: 3.0,
            peer_metric_percentile: 50.0,
            peer_metric_margin: 10.0,
            demotion_score: 5,
            decommission_score: 50,
            self_healing_unfixable_ratio: 0.1,
            slow_broker_removal_enabled: false,
        }
    }
}

impl DetectorConfig {
    /// Apply a flat map of overrides on top of the current configuration,
    /// returning a new, fully validated configuration. Unknown keys are
    /// ignored (and logged at `debug`); any recognized key with the wrong
    /// type or an out-of-range value rejects the whole call — no partial
    /// application, no silent clamping.
    pub fn apply(&self, options: &HashMap<String, ConfigValue>) -> Result<Self, ConfigRejected> {
        let mut next = self.clone();

        for (key, value) in options {
            match key.as_str() {
                "bytesInRateDetectionThreshold" => {
                    let v = value.as_f64("bytesInRateDetectionThreshold")?;
                    require(
                        v >= 0.0,
                        "bytesInRateDetectionThreshold",
                        v,
                        ">= 0",
                    )?;
                    next.bytes_in_rate_detection_threshold = v;
                }
                "metricHistoryPercentile" => {
                    let v = value.as_f64("metricHistoryPercentile")?;
                    require(
                        (0.0..=100.0).contains(&v),
                        "metricHistoryPercentile",
                        v,
                        "[0.0, 100.0]",
                    )?;
                    next.metric_history_percentile = v;
                }
                "metricHistoryMargin" => {
                    let v = value.as_f64("metricHistoryMargin")?;
                    require(v >= 1.0, "metricHistoryMargin", v, ">= 1.0")?;
                    next.metric_history_margin = v;
                }
                "peerMetricPercentile" => {
                    let v = value.as_f64("peerMetricPercentile")?;
                    require(
                        (0.0..=100.0).contains(&v),
                        "peerMetricPercentile",
                        v,
                        "[0.0, 100.0]",
                    )?;
                    next.peer_metric_percentile = v;
                }
                "peerMetricMargin" => {
                    let v = value.as_f64("peerMetricMargin")?;
                    require(v >= 1.0, "peerMetricMargin", v, ">= 1.0")?;
                    next.peer_metric_margin = v;
                }
                "demotionScore" => {
                    let v = value.as_i64("demotionScore")?;
                    require(v >= 0, "demotionScore", v, ">= 0")?;
                    next.demotion_score = v as i32;
                }
                "decommissionScore" => {
                    let v = value.as_i64("decommissionScore")?;
                    next.decommission_score = v as i32;
                }
                "selfHealingUnfixableRatio" => {
                    let v = value.as_f64("selfHealingUnfixableRatio")?;
                    require(
                        (0.0..=1.0).contains(&v),
                        "selfHealingUnfixableRatio",
                        v,
                        "[0.0, 1.0]",
                    )?;
                    next.self_healing_unfixable_ratio = v;
                }
                "slowBrokerRemovalEnabled" => {
                    next.slow_broker_removal_enabled = value.as_bool("slowBrokerRemovalEnabled")?;
                }
                unknown => {
                    tracing::debug!(key = unknown, "ignoring unknown configuration key");
                }
            }
        }

        if next.decommission_score < next.demotion_score {
            return Err(ConfigRejected::InvalidRelationship {
                detail: format!(
                    "decommissionScore ({}) must be >= demotionScore ({})",
                    next.decommission_score, next.demotion_score
                ),
            });
        }

        Ok(next)
    }
}

fn require<T: std::fmt::Display>(
    ok: bool,
    key: &'static str,
    value: T,
    constraint: &'static str,
) -> Result<(), ConfigRejected> {
    if ok {
        Ok(())
    } else {
        Err(ConfigRejected::OutOfRange {
            key,
            value: value.to_string(),
            constraint,
        })
    }
}
