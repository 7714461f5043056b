//! Configuration loading
//!
//! Settings come from a TOML file, looked up in this order:
//! 1. the `--config` flag
//! 2. `$USAGE_DIGEST_CONFIG`
//! 3. `./usage-digest.toml`
//!
//! Without a file the built-in defaults apply.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::insights::{HeadlineMetric, InsightConfig, DEFAULT_GROWTH_THRESHOLD, DEFAULT_MAX_LINES};
use crate::models::MetricDefinition;
use crate::report::ReportOptions;
use crate::window::{BaselinePolicy, Period};

pub const CONFIG_ENV: &str = "USAGE_DIGEST_CONFIG";
pub const LOCAL_CONFIG: &str = "usage-digest.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_project_id")]
    pub project_id: String,

    #[serde(default = "default_company_name")]
    pub company_name: String,

    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_max_insights")]
    pub max_insights: usize,

    /// Fractional change that counts as significant growth
    #[serde(default = "default_growth_threshold")]
    pub growth_threshold: f64,

    #[serde(default)]
    pub baseline: BaselinePolicy,

    /// Events fetched for ranking on top of the metric source events.
    /// Empty means every event the project recorded.
    #[serde(default)]
    pub tracked_events: Vec<String>,

    /// Event whose count is the period's active users, reported as
    /// "Weekly Active Users" and so on
    #[serde(default)]
    pub active_users_event: Option<String>,

    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricDefinition>,

    #[serde(default = "default_headlines")]
    pub headlines: Vec<HeadlineMetric>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            company_name: default_company_name(),
            top_n: default_top_n(),
            max_insights: default_max_insights(),
            growth_threshold: default_growth_threshold(),
            baseline: BaselinePolicy::default(),
            tracked_events: Vec::new(),
            active_users_event: None,
            metrics: default_metrics(),
            headlines: default_headlines(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_project_id() -> String {
    "default".to_string()
}

fn default_company_name() -> String {
    "Reewild".to_string()
}

fn default_top_n() -> usize {
    10
}

fn default_max_insights() -> usize {
    DEFAULT_MAX_LINES
}

fn default_growth_threshold() -> f64 {
    DEFAULT_GROWTH_THRESHOLD
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics() -> Vec<MetricDefinition> {
    [
        ("New Signups", "Sign Up"),
        ("Users Onboarded", "User Onboarded"),
        ("Receipts Uploaded", "Receipt Uploaded"),
        ("PlanetPoints Added", "PlanetPoints Added"),
        ("Vouchers Redeemed", "Voucher Redeemed"),
        ("Products Tracked", "PlanetPoints Product Tracked"),
        ("Referrals Completed", "Referral Completed"),
    ]
    .into_iter()
    .map(|(name, event)| MetricDefinition::new(name, event))
    .collect()
}

fn default_headlines() -> Vec<HeadlineMetric> {
    vec![
        HeadlineMetric::new("New Signups", "new signups"),
        HeadlineMetric::new("Receipts Uploaded", "receipts uploaded"),
        HeadlineMetric::new("Vouchers Redeemed", "vouchers redeemed"),
        HeadlineMetric::new("Referrals Completed", "successful referrals"),
    ]
}

impl Config {
    /// Loads and validates the configuration.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let config = match Self::resolve_path(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(LOCAL_CONFIG);
        local.exists().then_some(local)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.top_n == 0 {
            bail!("top_n must be at least 1");
        }
        if !self.growth_threshold.is_finite() || self.growth_threshold < 0.0 {
            bail!(
                "growth_threshold must be a non-negative fraction, got {}",
                self.growth_threshold
            );
        }

        let mut names = HashSet::new();
        for metric in &self.metrics {
            if metric.name.trim().is_empty() || metric.event.trim().is_empty() {
                bail!("metric definitions need both a name and an event");
            }
            if !names.insert(metric.name.as_str()) {
                bail!("metric '{}' is defined more than once", metric.name);
            }
        }

        if let Some(event) = &self.active_users_event {
            if event.trim().is_empty() {
                bail!("active_users_event must not be empty");
            }
        }

        for headline in &self.headlines {
            if !names.contains(headline.metric.as_str()) {
                bail!("headline metric '{}' is not defined", headline.metric);
            }
        }

        Ok(())
    }

    /// Events to request from the analytics source. `only` replaces the
    /// configured `tracked_events` when non-empty. With nothing tracked the
    /// result is empty, which fetches every event; otherwise metric source
    /// events come first, then the tracked ones, without duplicates.
    pub fn requested_events(&self, only: &[String]) -> Vec<String> {
        let tracked: &[String] = if only.is_empty() {
            &self.tracked_events
        } else {
            only
        };
        if tracked.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        self.metrics
            .iter()
            .map(|metric| &metric.event)
            .chain(self.active_users_event.iter())
            .chain(tracked.iter())
            .filter(|event| seen.insert(event.as_str()))
            .cloned()
            .collect()
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            definitions: self.metrics.clone(),
            top_n: self.top_n,
            insights: InsightConfig {
                growth_threshold: self.growth_threshold,
                headline_metrics: self.headlines.clone(),
                max_lines: self.max_insights,
            },
        }
    }

    /// Options for a `period` report, with the active users metric first
    /// when an event is configured for it.
    pub fn report_options_for(&self, period: Period) -> ReportOptions {
        let mut options = self.report_options();
        if let Some(event) = &self.active_users_event {
            let name = period.active_users_label();
            options
                .definitions
                .insert(0, MetricDefinition::new(name.clone(), event.clone()));
            options
                .insights
                .headline_metrics
                .insert(0, HeadlineMetric::new(name, "active users"));
        }
        options
    }
}
