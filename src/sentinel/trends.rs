//! Latency trend analytics over an agent's recent probe history.
//!
//! [`compute_trends`] is a pure function of the stored history: it never
//! performs I/O, so the same sample slice always yields the same
//! [`TrendStats`]. The standard deviation is the population variant.

use serde::{Deserialize, Serialize};

/// One probe outcome as stored in the agent's rolling history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSample {
    /// Unix timestamp (seconds) at which the probe ran.
    pub timestamp: i64,
    /// Wall time the probe took, in milliseconds.
    pub response_time_ms: u64,
    /// Whether the probe returned a 2xx status.
    pub success: bool,
}

/// Direction of the latency trend over the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Degrading,
}

/// Rolling statistics derived from the probe history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendStats {
    /// Mean response time of successful probes, in milliseconds.
    pub avg_time: f64,
    /// Population standard deviation of successful probe times.
    pub std_dev: f64,
    /// Whether latency is improving, stable, or degrading.
    pub recent_trend: TrendDirection,
}

impl TrendStats {
    fn flat(direction: TrendDirection) -> Self {
        TrendStats {
            avg_time: 0.0,
            std_dev: 0.0,
            recent_trend: direction,
        }
    }
}

/// Number of trailing successful samples treated as the "recent" window.
const RECENT_WINDOW: usize = 3;

/// Recent-vs-older mean ratio below which the trend counts as improving.
const IMPROVING_RATIO: f64 = 0.8;

/// Recent-vs-older mean ratio above which the trend counts as degrading.
const DEGRADING_RATIO: f64 = 1.2;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Derive rolling average, population standard deviation, and the
/// directional trend from a probe history ordered oldest → newest.
///
/// - Fewer than 3 samples: all zeros, `stable`.
/// - No successful samples at all: all zeros, `degrading`.
/// - Otherwise stats are computed over successful samples only; the trend
///   compares the mean of the last 3 successes against the mean of every
///   earlier success (`stable` when there is nothing earlier to compare).
pub fn compute_trends(history: &[ProbeSample]) -> TrendStats {
    if history.len() < RECENT_WINDOW {
        return TrendStats::flat(TrendDirection::Stable);
    }

    let times: Vec<f64> = history
        .iter()
        .filter(|s| s.success)
        .map(|s| s.response_time_ms as f64)
        .collect();
    if times.is_empty() {
        return TrendStats::flat(TrendDirection::Degrading);
    }

    let avg_time = mean(&times);
    let variance = times
        .iter()
        .map(|t| {
            let d = t - avg_time;
            d * d
        })
        .sum::<f64>()
        / times.len() as f64;
    let std_dev = variance.sqrt();

    let recent_trend = if times.len() <= RECENT_WINDOW {
        // No older window to compare against.
        TrendDirection::Stable
    } else {
        let split = times.len() - RECENT_WINDOW;
        let older_mean = mean(&times[..split]);
        let recent_mean = mean(&times[split..]);
        if recent_mean < IMPROVING_RATIO * older_mean {
            TrendDirection::Improving
        } else if recent_mean > DEGRADING_RATIO * older_mean {
            TrendDirection::Degrading
        } else {
            TrendDirection::Stable
        }
    };

    TrendStats {
        avg_time,
        std_dev,
        recent_trend,
    }
}

/// A probe is anomalous when it lands more than two standard deviations
/// above the rolling average (and an average exists at all).
pub fn is_anomalous(current_response_time_ms: u64, stats: &TrendStats) -> bool {
    stats.avg_time > 0.0
        && (current_response_time_ms as f64) > stats.avg_time + 2.0 * stats.std_dev
}
