//! Pipeline orchestration
//!
//! This module provides the public API for Sleep Insights.
//! It orchestrates the full pipeline from the raw daily log to the dashboard report.

use crate::aggregates::AggregateCalculator;
use crate::config::AnalyzerConfig;
use crate::encoder::{InsightsReport, ReportEncoder};
use crate::error::Result;
use crate::impact::ImpactAnalyzer;
use crate::normalizer::EntryNormalizer;
use crate::schema::RawLogAdapter;
use crate::types::{DailyRecord, DashboardStats, HabitDefinition, Metric};

/// Analyze typed records for one metric with the default thresholds.
///
/// Returns `None` when no record has a sleep score.
///
/// # Example
/// ```ignore
/// let stats = analyze_dashboard(&records, &habits, Metric::SleepScore);
/// ```
pub fn analyze_dashboard(
    records: &[DailyRecord],
    habits: &[HabitDefinition],
    metric: Metric,
) -> Option<DashboardStats> {
    run_analysis(&AnalyzerConfig::default(), records, habits, metric)
}

/// Analyze a raw daily log JSON document and encode the report as JSON.
///
/// # Arguments
/// * `log_json` - Daily log object keyed by `YYYY-MM-DD`
/// * `habits_json` - Array of habit definitions
/// * `metric_key` - Metric key such as `sleepScore` or `rhr`
pub fn dashboard_to_json(log_json: &str, habits_json: &str, metric_key: &str) -> Result<String> {
    let metric: Metric = metric_key.parse()?;
    InsightsProcessor::new().analyze_json(log_json, habits_json, metric)
}

/// Run the analysis pipeline.
///
/// Pipeline stages:
/// 1. EntryNormalizer - Filter eligible records and derive decimal hours
/// 2. ImpactAnalyzer - Rank per-habit impact rows
/// 3. AggregateCalculator - Window and bucket statistics
fn run_analysis(
    config: &AnalyzerConfig,
    records: &[DailyRecord],
    habits: &[HabitDefinition],
    metric: Metric,
) -> Option<DashboardStats> {
    // Stage 1: Normalize records to entries
    let entries = EntryNormalizer::normalize(records);
    if entries.is_empty() {
        tracing::debug!(%metric, records = records.len(), "No eligible entries");
        return None;
    }

    // Stage 2: Habit impacts
    let habit_impacts = ImpactAnalyzer::new(config, metric).analyze(&entries, habits);

    // Stage 3: Aggregates
    let aggregates = AggregateCalculator::new(config, metric);
    let recent_average = aggregates.recent_average(&entries);
    let sleep_debt = aggregates.sleep_debt(&entries);
    let optimal_bedtime = aggregates.optimal_bedtime(&entries);
    let bedtime_buckets = aggregates.bedtime_buckets(&entries);
    let weekday_buckets = aggregates.weekday_buckets(&entries);

    tracing::debug!(
        %metric,
        entries = entries.len(),
        rows = habit_impacts.len(),
        significant = habit_impacts.iter().filter(|r| r.significant).count(),
        "Analyzed dashboard"
    );

    Some(DashboardStats {
        metric,
        entries,
        habit_impacts,
        recent_average,
        sleep_debt,
        optimal_bedtime,
        bedtime_buckets,
        weekday_buckets,
    })
}

/// Processor holding analyzer thresholds.
///
/// It keeps no state between runs; every call recomputes from its inputs.
#[derive(Debug, Clone, Default)]
pub struct InsightsProcessor {
    config: AnalyzerConfig,
    encoder: ReportEncoder,
}

impl InsightsProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a processor with specific thresholds
    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self {
            config,
            encoder: ReportEncoder::new(),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze typed records
    pub fn analyze(
        &self,
        records: &[DailyRecord],
        habits: &[HabitDefinition],
        metric: Metric,
    ) -> Option<DashboardStats> {
        run_analysis(&self.config, records, habits, metric)
    }

    /// Analyze and encode the report
    pub fn report(
        &self,
        records: &[DailyRecord],
        habits: &[HabitDefinition],
        metric: Metric,
    ) -> InsightsReport {
        let stats = self.analyze(records, habits, metric);
        self.encoder.encode(metric, stats.as_ref())
    }

    /// Parse raw JSON documents, analyze, and encode the report as JSON
    pub fn analyze_json(&self, log_json: &str, habits_json: &str, metric: Metric) -> Result<String> {
        let log = RawLogAdapter::parse_log(log_json)?;
        let habits = RawLogAdapter::parse_habits(habits_json)?;
        let records = RawLogAdapter::to_records(&log, &habits);

        let stats = self.analyze(&records, &habits, metric);
        self.encoder.encode_to_json(metric, stats.as_ref())
    }
}
