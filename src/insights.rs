//! Insight sentence generation.
//!
//! Rules run in a fixed priority order and each emits zero or more lines:
//! 1. top event (needs at least one ranked event)
//! 2. significant growth, one line per metric whose percent change reaches
//!    the threshold (needs a prior period)
//! 3. headline counts, one line per configured headline metric present in
//!    the current metrics
//!
//! Lines past `max_lines` are dropped, so earlier rules win.

use serde::Deserialize;

use crate::models::{ComputedMetrics, Insight, PeriodDelta, RankedEvent};

pub const DEFAULT_GROWTH_THRESHOLD: f64 = 0.20;
pub const DEFAULT_MAX_LINES: usize = 6;

/// A metric called out in every report, with the noun used in its sentence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeadlineMetric {
    pub metric: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl HeadlineMetric {
    pub fn new(metric: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            label: Some(label.into()),
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.metric)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsightConfig {
    /// Minimum fractional change (0.20 = 20%) for a growth line.
    pub growth_threshold: f64,
    pub headline_metrics: Vec<HeadlineMetric>,
    pub max_lines: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            growth_threshold: DEFAULT_GROWTH_THRESHOLD,
            headline_metrics: Vec::new(),
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

pub fn generate(
    metrics: &ComputedMetrics,
    ranked: &[RankedEvent],
    deltas: Option<&[PeriodDelta]>,
    config: &InsightConfig,
) -> Insight {
    let mut lines = Vec::new();

    if let Some(top) = ranked.first() {
        lines.push(format!(
            "Most popular action: {} with {} occurrences",
            top.name,
            format_count(top.count)
        ));
    }

    for delta in deltas.unwrap_or_default() {
        let Some(pct) = delta.percent_delta else {
            continue;
        };
        if pct >= config.growth_threshold {
            lines.push(format!(
                "{} increased {}% (from {} to {})",
                delta.metric_name,
                format_percent(pct),
                format_count(delta.prior_value),
                format_count(delta.current_value)
            ));
        }
    }

    for headline in &config.headline_metrics {
        if let Some(value) = metrics.get(&headline.metric) {
            lines.push(format!("{} {} this period.", format_count(value), headline.label()));
        }
    }

    lines.truncate(config.max_lines);
    Insight::new(lines)
}

/// Formats a count with comma thousands separators (12500 -> "12,500").
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Formats a fractional change as a whole percentage (1.1707 -> "117").
/// Changes that round to zero print as "0", never "-0".
pub fn format_percent(fraction: f64) -> String {
    let rounded = (fraction * 100.0).round();
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{rounded:.0}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ranked(name: &str, count: u64) -> RankedEvent {
        RankedEvent {
            name: name.to_string(),
            count,
            rank: 1,
        }
    }

    fn delta(metric: &str, current: u64, prior: u64) -> PeriodDelta {
        let absolute_delta = current as i64 - prior as i64;
        PeriodDelta {
            metric_name: metric.to_string(),
            current_value: current,
            prior_value: prior,
            absolute_delta,
            percent_delta: (prior > 0).then(|| absolute_delta as f64 / prior as f64),
        }
    }

    fn signups_config() -> InsightConfig {
        InsightConfig {
            headline_metrics: vec![HeadlineMetric::new("Signups", "new signups")],
            ..InsightConfig::default()
        }
    }

    fn signups(value: u64) -> ComputedMetrics {
        let mut metrics = ComputedMetrics::new();
        metrics.set("Signups", value);
        metrics
    }

    #[test]
    fn emits_rules_in_priority_order() {
        let deltas = vec![delta("Signups", 89, 41)];
        let insight = generate(
            &signups(89),
            &[ranked("Page View", 12500)],
            Some(&deltas),
            &signups_config(),
        );

        assert_eq!(
            insight.lines(),
            &[
                "Most popular action: Page View with 12,500 occurrences".to_string(),
                "Signups increased 117% (from 41 to 89)".to_string(),
                "89 new signups this period.".to_string(),
            ]
        );
    }

    #[test]
    fn empty_period_still_reports_headlines() {
        let insight = generate(&signups(0), &[], None, &signups_config());
        assert_eq!(insight.lines(), &["0 new signups this period.".to_string()]);
    }

    #[test]
    fn undefined_percent_never_counts_as_growth() {
        let deltas = vec![delta("Signups", 48, 0)];
        let insight = generate(&signups(48), &[], Some(&deltas), &InsightConfig::default());
        assert!(insight.is_empty());
    }

    #[test]
    fn growth_below_threshold_is_skipped() {
        let deltas = vec![delta("Signups", 119, 100), delta("Receipts", 120, 100)];
        let insight = generate(&ComputedMetrics::new(), &[], Some(&deltas), &InsightConfig::default());
        assert_eq!(
            insight.lines(),
            &["Receipts increased 20% (from 100 to 120)".to_string()]
        );
    }

    #[test]
    fn declines_are_not_growth() {
        let deltas = vec![delta("Signups", 10, 100)];
        let insight = generate(&signups(10), &[], Some(&deltas), &InsightConfig::default());
        assert!(insight.is_empty());
    }

    #[test]
    fn headline_missing_from_metrics_is_skipped() {
        let config = InsightConfig {
            headline_metrics: vec![HeadlineMetric {
                metric: "Referrals".to_string(),
                label: None,
            }],
            ..InsightConfig::default()
        };
        assert!(generate(&signups(3), &[], None, &config).is_empty());
    }

    #[test]
    fn headline_label_defaults_to_metric_name() {
        let config = InsightConfig {
            headline_metrics: vec![HeadlineMetric {
                metric: "Signups".to_string(),
                label: None,
            }],
            ..InsightConfig::default()
        };
        let insight = generate(&signups(1200), &[], None, &config);
        assert_eq!(insight.lines(), &["1,200 Signups this period.".to_string()]);
    }

    #[test]
    fn max_lines_keeps_earliest_rules() {
        let config = InsightConfig {
            max_lines: 1,
            ..signups_config()
        };
        let deltas = vec![delta("Signups", 89, 41)];
        let insight = generate(&signups(89), &[ranked("Page View", 3)], Some(&deltas), &config);
        assert_eq!(
            insight.lines(),
            &["Most popular action: Page View with 3 occurrences".to_string()]
        );
    }

    #[test]
    fn formats_counts_with_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn formats_percent_without_negative_zero() {
        assert_eq!(format_percent(48.0 / 41.0), "117");
        assert_eq!(format_percent(-0.25), "-25");
        assert_eq!(format_percent(-1.0 / 1000.0), "0");
        assert_eq!(format_percent(0.004), "0");
    }

    proptest! {
        #[test]
        fn line_count_never_exceeds_max(
            values in prop::collection::vec((0u64..500, 0u64..500), 0..10),
            max_lines in 0usize..6
        ) {
            let mut metrics = ComputedMetrics::new();
            let mut deltas = Vec::new();
            let mut headlines = Vec::new();
            for (i, (current, prior)) in values.iter().enumerate() {
                let name = format!("m{i}");
                metrics.set(&name, *current);
                deltas.push(delta(&name, *current, *prior));
                headlines.push(HeadlineMetric::new(name, "things"));
            }
            let config = InsightConfig {
                growth_threshold: 0.0,
                headline_metrics: headlines,
                max_lines,
            };

            let first = generate(&metrics, &[ranked("A", 1)], Some(&deltas), &config);
            prop_assert!(first.len() <= max_lines);
            let second = generate(&metrics, &[ranked("A", 1)], Some(&deltas), &config);
            prop_assert_eq!(first, second);
        }
    }
}
