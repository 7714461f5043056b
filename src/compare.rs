use crate::models::{ComputedMetrics, PeriodDelta};

/// Deltas for every metric of the current period, in its order. Metrics
/// missing from `prior` compare against zero.
pub fn compare(current: &ComputedMetrics, prior: &ComputedMetrics) -> Vec<PeriodDelta> {
    current
        .iter()
        .map(|(name, current_value)| {
            let prior_value = prior.get(name).unwrap_or(0);
            delta(name, current_value, prior_value)
        })
        .collect()
}

fn delta(name: &str, current_value: u64, prior_value: u64) -> PeriodDelta {
    let absolute_delta = current_value as i64 - prior_value as i64;
    // undefined rather than infinite growth when there is nothing to compare with
    let percent_delta = if prior_value > 0 {
        Some(absolute_delta as f64 / prior_value as f64)
    } else {
        None
    };

    PeriodDelta {
        metric_name: name.to_string(),
        current_value,
        prior_value,
        absolute_delta,
        percent_delta,
    }
}
