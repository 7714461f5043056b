use chrono::{DateTime, Utc};
use tracing::debug;

use crate::compare;
use crate::error::{Error, Result};
use crate::insights::{self, InsightConfig};
use crate::metrics;
use crate::models::{DateRange, MetricDefinition, RawEventCounts, Report};
use crate::ranking;

/// Parameters that shape every report, handed in by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub definitions: Vec<MetricDefinition>,
    pub top_n: usize,
    pub insights: InsightConfig,
}

/// Counts for the comparison period.
#[derive(Debug, Clone, Copy)]
pub struct Baseline<'a> {
    pub range: Option<DateRange>,
    pub counts: &'a RawEventCounts,
}

impl<'a> Baseline<'a> {
    pub fn new(range: DateRange, counts: &'a RawEventCounts) -> Self {
        Self {
            range: Some(range),
            counts,
        }
    }

    /// Prior counts without a known date range.
    pub fn counts_only(counts: &'a RawEventCounts) -> Self {
        Self { range: None, counts }
    }
}

pub fn assemble(
    range: DateRange,
    period_label: &str,
    raw_current: &RawEventCounts,
    baseline: Option<Baseline<'_>>,
    options: &ReportOptions,
) -> Result<Report> {
    assemble_at(range, period_label, raw_current, baseline, options, Utc::now())
}

/// Same as [`assemble`] with a fixed generation time.
pub fn assemble_at(
    range: DateRange,
    period_label: &str,
    raw_current: &RawEventCounts,
    baseline: Option<Baseline<'_>>,
    options: &ReportOptions,
    generated_at: DateTime<Utc>,
) -> Result<Report> {
    range.validate()?;
    if let Some(prior_range) = baseline.and_then(|b| b.range) {
        prior_range.validate()?;
        if prior_range.days() != range.days() {
            return Err(Error::MismatchedBaseline {
                current_days: range.days(),
                prior_days: prior_range.days(),
            });
        }
    }

    let current = metrics::aggregate(raw_current, &options.definitions)?;
    let prior = baseline
        .map(|b| metrics::aggregate(b.counts, &options.definitions))
        .transpose()?;
    let top_events = ranking::rank(raw_current, options.top_n)?;
    let comparisons = prior
        .as_ref()
        .map(|prior| compare::compare(&current, prior));
    let insight = insights::generate(
        &current,
        &top_events,
        comparisons.as_deref(),
        &options.insights,
    );

    debug!(
        range = %range,
        metrics = current.len(),
        top_events = top_events.len(),
        comparisons = comparisons.as_ref().map_or(0, Vec::len),
        insights = insight.len(),
        "assembled report"
    );

    Ok(Report::new(
        period_label.to_string(),
        range,
        baseline.and_then(|b| b.range),
        current,
        top_events,
        comparisons.unwrap_or_default(),
        insight,
        generated_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::HeadlineMetric;
    use chrono::{NaiveDate, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn week() -> DateRange {
        DateRange::new(date(2026, 2, 2), date(2026, 2, 8)).unwrap()
    }

    fn options(top_n: usize) -> ReportOptions {
        ReportOptions {
            definitions: vec![MetricDefinition::new("Signups", "Sign Up")],
            top_n,
            insights: InsightConfig {
                headline_metrics: vec![HeadlineMetric::new("Signups", "new signups")],
                ..InsightConfig::default()
            },
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 9, 9, 0, 0).unwrap()
    }

    #[test]
    fn full_pipeline() {
        crate::logging::init_test();
        let current: RawEventCounts = [("Sign Up", 89), ("Page View", 12500)].into_iter().collect();
        let prior: RawEventCounts = [("Sign Up", 41)].into_iter().collect();
        let prior_range = DateRange::new(date(2026, 1, 26), date(2026, 2, 1)).unwrap();

        let report = assemble_at(
            week(),
            "Weekly Summary",
            &current,
            Some(Baseline::new(prior_range, &prior)),
            &options(1),
            fixed_time(),
        )
        .unwrap();

        assert_eq!(report.period_label(), "Weekly Summary");
        assert_eq!(report.prior_range(), Some(prior_range));
        assert_eq!(report.metrics().get("Signups"), Some(89));
        assert_eq!(report.top_events().len(), 1);
        assert_eq!(report.top_events()[0].name, "Page View");
        assert_eq!(report.top_events()[0].count, 12500);
        assert_eq!(report.top_events()[0].rank, 1);

        let delta = report.comparison("Signups").unwrap();
        assert_eq!(delta.prior_value, 41);
        assert_eq!(delta.absolute_delta, 48);
        assert!((delta.percent_delta.unwrap() - 1.1707).abs() < 1e-3);

        let lines = report.insights().lines();
        assert!(lines.contains(&"Most popular action: Page View with 12,500 occurrences".to_string()));
        assert!(lines.contains(&"Signups increased 117% (from 41 to 89)".to_string()));
        assert_eq!(report.generated_at(), fixed_time());
    }

    #[test]
    fn zero_prior_has_no_growth_line() {
        let current: RawEventCounts = [("Sign Up", 48)].into_iter().collect();
        let prior = RawEventCounts::new();
        let report = assemble_at(
            week(),
            "Weekly Summary",
            &current,
            Some(Baseline::counts_only(&prior)),
            &options(5),
            fixed_time(),
        )
        .unwrap();

        let delta = report.comparison("Signups").unwrap();
        assert_eq!(delta.absolute_delta, 48);
        assert_eq!(delta.percent_delta, None);
        assert!(report.insights().lines().iter().all(|l| !l.contains("increased")));
    }

    #[test]
    fn empty_events_still_produce_headlines() {
        let report = assemble_at(
            week(),
            "Weekly Summary",
            &RawEventCounts::new(),
            None,
            &options(5),
            fixed_time(),
        )
        .unwrap();

        assert_eq!(report.metrics().get("Signups"), Some(0));
        assert!(report.top_events().is_empty());
        assert!(report.comparisons().is_empty());
        assert_eq!(report.insights().lines(), &["0 new signups this period.".to_string()]);
    }

    #[test]
    fn reversed_range_fails() {
        let range = DateRange {
            start: date(2026, 2, 8),
            end: date(2026, 2, 2),
        };
        let err = assemble(range, "Weekly Summary", &RawEventCounts::new(), None, &options(5))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[test]
    fn baseline_length_must_match() {
        let prior = RawEventCounts::new();
        let short = DateRange::new(date(2026, 1, 30), date(2026, 2, 1)).unwrap();
        let err = assemble(
            week(),
            "Weekly Summary",
            &RawEventCounts::new(),
            Some(Baseline::new(short, &prior)),
            &options(5),
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::MismatchedBaseline {
                current_days: 7,
                prior_days: 3
            }
        );
    }

    #[test]
    fn component_errors_propagate_unchanged() {
        let current: RawEventCounts = [("Sign Up", 1)].into_iter().collect();
        let err = assemble(week(), "Weekly Summary", &current, None, &options(0)).unwrap_err();
        assert_eq!(err, Error::InvalidTopN(0));

        let bad_prior: RawEventCounts = [("Sign Up", -7)].into_iter().collect();
        let err = assemble(
            week(),
            "Weekly Summary",
            &current,
            Some(Baseline::counts_only(&bad_prior)),
            &options(3),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCount { ref event, .. } if event == "Sign Up"));
    }

    #[test]
    fn assembly_is_deterministic_for_fixed_time() {
        let current: RawEventCounts = [("B", 5), ("A", 5), ("C", 3)].into_iter().collect();
        let first = assemble_at(week(), "Weekly Summary", &current, None, &options(2), fixed_time()).unwrap();
        let second = assemble_at(week(), "Weekly Summary", &current, None, &options(2), fixed_time()).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
