use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(Error::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Occurrence counts per event name for one period, as returned by the
/// analytics source. Names missing from the map count as zero.
///
/// Counts are stored signed so that a source handing over a negative value
/// is reported as an input error instead of silently wrapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEventCounts(BTreeMap<String, i64>);

impl RawEventCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: impl Into<String>, count: i64) {
        self.0.insert(event.into(), count);
    }

    pub fn get(&self, event: &str) -> Option<i64> {
        self.0.get(event).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses the `{ "<event>": <count>, ... }` interchange shape.
    ///
    /// Non-integer values are rejected with an error naming the event;
    /// negative integers are accepted here and rejected by [`validate`].
    ///
    /// [`validate`]: RawEventCounts::validate
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| Error::InvalidCount {
            event: "<root>".to_string(),
            reason: "expected an object of event counts".to_string(),
        })?;

        let mut counts = Self::new();
        for (event, count) in object {
            let count = count.as_i64().ok_or_else(|| Error::InvalidCount {
                event: event.clone(),
                reason: format!("expected an integer, got {count}"),
            })?;
            counts.insert(event.clone(), count);
        }
        Ok(counts)
    }

    /// Checks every entry: names must be non-empty and counts non-negative.
    /// Entries are visited in name order, so the reported event is stable.
    pub fn validate(&self) -> Result<()> {
        for (event, count) in self.iter() {
            if event.is_empty() {
                return Err(Error::EmptyEventName);
            }
            if count < 0 {
                return Err(Error::InvalidCount {
                    event: event.to_string(),
                    reason: format!("negative value {count}"),
                });
            }
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for RawEventCounts {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A business metric bound to the event whose count it reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    pub event: String,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event: event.into(),
        }
    }
}

/// Metric values for one period, kept in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedMetrics {
    entries: Vec<(String, u64)>,
}

impl ComputedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a metric value. A name seen before keeps its original position.
    pub fn set(&mut self, name: &str, value: u64) {
        match self.entries.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ComputedMetrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEvent {
    pub name: String,
    pub count: u64,
    pub rank: usize,
}

/// Change of one metric between the prior and the current period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodDelta {
    pub metric_name: String,
    pub current_value: u64,
    pub prior_value: u64,
    pub absolute_delta: i64,
    /// `absolute_delta / prior_value` as a fraction; `None` when the prior
    /// value is zero.
    pub percent_delta: Option<f64>,
}

/// Ordered insight sentences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Insight(Vec<String>);

impl Insight {
    pub fn new(lines: Vec<String>) -> Self {
        Self(lines)
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An assembled report. Built once by [`crate::report::assemble`] and only
/// read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    period_label: String,
    range: DateRange,
    prior_range: Option<DateRange>,
    metrics: ComputedMetrics,
    top_events: Vec<RankedEvent>,
    comparisons: Vec<PeriodDelta>,
    insights: Insight,
    generated_at: DateTime<Utc>,
}

impl Report {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        period_label: String,
        range: DateRange,
        prior_range: Option<DateRange>,
        metrics: ComputedMetrics,
        top_events: Vec<RankedEvent>,
        comparisons: Vec<PeriodDelta>,
        insights: Insight,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            period_label,
            range,
            prior_range,
            metrics,
            top_events,
            comparisons,
            insights,
            generated_at,
        }
    }

    pub fn period_label(&self) -> &str {
        &self.period_label
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn prior_range(&self) -> Option<DateRange> {
        self.prior_range
    }

    pub fn metrics(&self) -> &ComputedMetrics {
        &self.metrics
    }

    pub fn top_events(&self) -> &[RankedEvent] {
        &self.top_events
    }

    pub fn comparisons(&self) -> &[PeriodDelta] {
        &self.comparisons
    }

    /// Delta for one metric, when a prior period was supplied.
    pub fn comparison(&self, metric: &str) -> Option<&PeriodDelta> {
        self.comparisons.iter().find(|d| d.metric_name == metric)
    }

    pub fn insights(&self) -> &Insight {
        &self.insights
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}
