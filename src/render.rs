//! Delivery-side rendering of an assembled [`Report`].

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::insights::{format_count, format_percent};
use crate::models::{PeriodDelta, Report};

/// Slack shows at most this many events in the top events block.
const SLACK_TOP_EVENTS: usize = 5;

pub fn to_json(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

pub fn to_markdown(report: &Report) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", report.period_label());
    let _ = writeln!(output, "Events from {}", report.range());
    if let Some(prior) = report.prior_range() {
        let _ = writeln!(output, "Compared with {prior}");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Metrics");

    if report.metrics().is_empty() {
        let _ = writeln!(output, "No metrics configured.");
    } else {
        for (name, value) in report.metrics().iter() {
            match report.comparison(name) {
                Some(delta) => {
                    let _ = writeln!(
                        output,
                        "- {}: {} ({})",
                        name,
                        format_count(value),
                        describe_change(delta)
                    );
                }
                None => {
                    let _ = writeln!(output, "- {}: {}", name, format_count(value));
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Events");

    if report.top_events().is_empty() {
        let _ = writeln!(output, "No events recorded for this window.");
    } else {
        for event in report.top_events() {
            let _ = writeln!(
                output,
                "{}. {}: {}",
                event.rank,
                event.name,
                format_count(event.count)
            );
        }
    }

    if !report.insights().is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Summary");
        for line in report.insights().lines() {
            let _ = writeln!(output, "- {line}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "_Generated {}_",
        report.generated_at().format("%Y-%m-%d %H:%M UTC")
    );

    output
}

/// Change versus the prior period, e.g. `+48, n/a vs 0` or `-10, -25%`.
fn describe_change(delta: &PeriodDelta) -> String {
    let sign = if delta.absolute_delta >= 0 { "+" } else { "-" };
    let absolute = format!("{sign}{}", format_count(delta.absolute_delta.unsigned_abs()));
    match delta.percent_delta.map(format_percent) {
        Some(pct) if pct == "0" => format!("{absolute}, 0%"),
        Some(pct) if pct.starts_with('-') => format!("{absolute}, {pct}%"),
        Some(pct) => format!("{absolute}, +{pct}%"),
        None => format!("{absolute}, n/a vs 0"),
    }
}

/// Block Kit payload for an incoming webhook.
pub fn to_slack_blocks(report: &Report, company_name: &str) -> Value {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": format!("{company_name} {}", report.period_label()),
                "emoji": false
            }
        }),
        json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!(
                    "{} • {}",
                    report.generated_at().format("%B %d, %Y"),
                    report.range()
                )
            }]
        }),
        json!({ "type": "divider" }),
    ];

    if !report.metrics().is_empty() {
        let mut text = String::from("*Key Metrics*\n");
        for (name, value) in report.metrics().iter() {
            let _ = write!(text, "• {}: *{}*", name, format_count(value));
            if let Some(delta) = report.comparison(name) {
                let _ = write!(text, " ({})", describe_change(delta));
            }
            text.push('\n');
        }
        blocks.push(section(text.trim_end()));
    }

    if !report.top_events().is_empty() {
        blocks.push(json!({ "type": "divider" }));
        let mut text = String::from("*Top Events*\n");
        for event in report.top_events().iter().take(SLACK_TOP_EVENTS) {
            let _ = writeln!(text, "{}. {}: {}", event.rank, event.name, format_count(event.count));
        }
        blocks.push(section(text.trim_end()));
    }

    if !report.insights().is_empty() {
        blocks.push(json!({ "type": "divider" }));
        let mut text = String::from("*Summary*\n");
        for line in report.insights().lines() {
            let _ = writeln!(text, "• {line}");
        }
        blocks.push(section(text.trim_end()));
    }

    blocks.push(json!({ "type": "divider" }));
    blocks.push(json!({
        "type": "context",
        "elements": [{
            "type": "mrkdwn",
            "text": format!("{company_name} Analytics • Auto-generated report")
        }]
    }));

    json!({
        "text": format!("{company_name} {} Analytics Report", report.period_label()),
        "blocks": blocks
    })
}

/// Block Kit payload announcing a failed report run.
pub fn slack_error_blocks(source: &str, message: &str, at: DateTime<Utc>) -> Value {
    json!({
        "text": format!("Analytics error in {source}"),
        "blocks": [
            {
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": "Analytics Report Error",
                    "emoji": false
                }
            },
            section(&format!("*Source:* `{source}`\n*Error:* {message}")),
            {
                "type": "context",
                "elements": [{
                    "type": "mrkdwn",
                    "text": at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
                }]
            }
        ]
    })
}

fn section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": {
            "type": "mrkdwn",
            "text": text
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{HeadlineMetric, InsightConfig};
    use crate::models::{DateRange, MetricDefinition, RawEventCounts};
    use crate::report::{assemble_at, Baseline, ReportOptions};
    use chrono::{NaiveDate, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_report(with_prior: bool) -> Report {
        let options = ReportOptions {
            definitions: vec![
                MetricDefinition::new("New Signups", "Sign Up"),
                MetricDefinition::new("Referrals", "Referral Completed"),
            ],
            top_n: 3,
            insights: InsightConfig {
                headline_metrics: vec![HeadlineMetric::new("New Signups", "new signups")],
                ..InsightConfig::default()
            },
        };
        let current: RawEventCounts = [("Sign Up", 89), ("Page View", 12500), ("Referral Completed", 4)]
            .into_iter()
            .collect();
        let prior: RawEventCounts = [("Sign Up", 41)].into_iter().collect();
        let range = DateRange::new(date(2026, 2, 2), date(2026, 2, 8)).unwrap();
        let prior_range = DateRange::new(date(2026, 1, 26), date(2026, 2, 1)).unwrap();

        assemble_at(
            range,
            "Weekly Summary",
            &current,
            with_prior.then(|| Baseline::new(prior_range, &prior)),
            &options,
            Utc.with_ymd_and_hms(2026, 2, 9, 9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn json_uses_interchange_keys() {
        let value: Value = serde_json::from_str(&to_json(&sample_report(true)).unwrap()).unwrap();
        assert_eq!(value["period_label"], "Weekly Summary");
        assert_eq!(value["range"]["start"], "2026-02-02");
        assert_eq!(value["metrics"]["New Signups"], 89);
        assert_eq!(value["top_events"][0]["name"], "Page View");
        assert_eq!(value["top_events"][0]["rank"], 1);
        assert_eq!(value["comparisons"][1]["percent_delta"], Value::Null);
        assert!(value["insights"].as_array().is_some());
        assert!(value["generated_at"].as_str().is_some());
    }

    #[test]
    fn markdown_marks_undefined_change() {
        let markdown = to_markdown(&sample_report(true));
        assert!(markdown.starts_with("# Weekly Summary\n"));
        assert!(markdown.contains("- New Signups: 89 (+48, +117%)"));
        assert!(markdown.contains("- Referrals: 4 (+4, n/a vs 0)"));
        assert!(markdown.contains("1. Page View: 12,500"));
        assert!(markdown.contains("## Summary"));
    }

    #[test]
    fn small_changes_render_as_zero_percent() {
        let decline = PeriodDelta {
            metric_name: "Signups".to_string(),
            current_value: 999,
            prior_value: 1000,
            absolute_delta: -1,
            percent_delta: Some(-0.001),
        };
        assert_eq!(describe_change(&decline), "-1, 0%");

        let growth = PeriodDelta {
            current_value: 1001,
            absolute_delta: 1,
            percent_delta: Some(0.001),
            ..decline.clone()
        };
        assert_eq!(describe_change(&growth), "+1, 0%");

        let drop = PeriodDelta {
            current_value: 30,
            prior_value: 40,
            absolute_delta: -10,
            percent_delta: Some(-0.25),
            ..decline
        };
        assert_eq!(describe_change(&drop), "-10, -25%");
    }

    #[test]
    fn markdown_without_prior_omits_changes() {
        let markdown = to_markdown(&sample_report(false));
        assert!(markdown.contains("- New Signups: 89\n"));
        assert!(!markdown.contains("Compared with"));
    }

    #[test]
    fn slack_payload_has_fallback_and_sections() {
        let payload = to_slack_blocks(&sample_report(true), "Acme");
        assert_eq!(payload["text"], "Acme Weekly Summary Analytics Report");
        let blocks = payload["blocks"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "header");
        assert_eq!(blocks[0]["text"]["text"], "Acme Weekly Summary");
        let top = blocks
            .iter()
            .filter_map(|b| b["text"]["text"].as_str())
            .find(|t| t.starts_with("*Top Events*"))
            .unwrap();
        assert!(top.contains("1. Page View: 12,500"));
    }

    #[test]
    fn error_payload_names_source() {
        let payload = slack_error_blocks(
            "weekly",
            "top_n must be positive, got 0",
            Utc.with_ymd_and_hms(2026, 2, 9, 9, 0, 0).unwrap(),
        );
        let body = payload["blocks"][1]["text"]["text"].as_str().unwrap();
        assert!(body.contains("`weekly`"));
        assert!(body.contains("top_n must be positive"));
    }
}
