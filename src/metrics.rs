use tracing::debug;

use crate::error::Result;
use crate::models::{ComputedMetrics, MetricDefinition, RawEventCounts};

/// Reduces raw event counts into the named metrics, one entry per
/// definition in definition order. Source events missing from `raw` give 0.
pub fn aggregate(raw: &RawEventCounts, definitions: &[MetricDefinition]) -> Result<ComputedMetrics> {
    raw.validate()?;

    let mut metrics = ComputedMetrics::new();
    for definition in definitions {
        // validate() guarantees every stored count is non-negative
        let value = raw.get(&definition.event).unwrap_or(0).max(0) as u64;
        metrics.set(&definition.name, value);
    }

    debug!(
        definitions = definitions.len(),
        metrics = metrics.len(),
        "aggregated metrics"
    );
    Ok(metrics)
}
