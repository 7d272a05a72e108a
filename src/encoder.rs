//! Report encoding
//!
//! This module encodes dashboard statistics into the presentation-facing report.
//! The report carries display strings next to the raw numbers, and no timestamps
//! or random identifiers, so identical inputs always encode to identical JSON.

use crate::error::{InsightError, Result};
use crate::types::{
    BedtimeBucket, DashboardStats, Entry, HabitType, ImpactEffect, ImpactRow, ImpactStrategy, Metric,
    WeekdayBucket,
};
use crate::{INSIGHTS_VERSION, PRODUCER_NAME};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Insights report consumed by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub metric: MetricDescriptor,
    pub status: ReportStatus,
    /// Absent when there is no data
    pub summary: Option<ReportSummary>,
    /// Selected metric per eligible day, ascending by date
    pub entries: Vec<ReportEntry>,
    pub habits: Vec<ReportHabitRow>,
    pub bedtime_buckets: Vec<ReportBucket>,
    pub weekday_buckets: Vec<ReportBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub key: String,
    pub label: String,
    pub unit: String,
    pub inverse: bool,
}

impl From<Metric> for MetricDescriptor {
    fn from(metric: Metric) -> Self {
        Self {
            key: metric.key().to_string(),
            label: metric.label().to_string(),
            unit: metric.unit().to_string(),
            inverse: metric.inverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ready,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub entry_count: usize,
    pub recent_average: Option<f64>,
    pub recent_average_display: Option<String>,
    pub sleep_debt: Option<ReportSleepDebt>,
    pub optimal_bedtime: Option<ReportBedtime>,
    pub top_habit: Option<ReportTopHabit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub value_display: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtDirection {
    Deficit,
    Surplus,
    /// Within a rounding step of the target
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSleepDebt {
    /// Magnitude in hours, see `direction` for the sign
    pub hours: f64,
    pub direction: DebtDirection,
    pub nights: usize,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBedtime {
    pub window: String,
    pub avg_sleep_score: f64,
    pub avg_sleep_score_display: String,
    pub nights: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTopHabit {
    pub habit_id: String,
    pub label: String,
    pub impact: f64,
    pub impact_display: String,
    pub avg_metric_display: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportHabitRow {
    pub habit_id: String,
    pub label: String,
    pub label_detail: Option<String>,
    pub option: Option<String>,
    pub habit_type: HabitType,
    pub strategy: ImpactStrategy,
    pub impact: Option<f64>,
    pub impact_display: Option<String>,
    pub avg_metric: Option<f64>,
    pub avg_metric_display: Option<String>,
    pub avg_value: Option<f64>,
    pub present_count: usize,
    pub absent_count: usize,
    pub significant: bool,
    pub effect: ImpactEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBucket {
    pub label: String,
    pub average: Option<f64>,
    pub average_display: Option<String>,
    pub count: usize,
}

/// Report encoder
#[derive(Debug, Clone, Default)]
pub struct ReportEncoder;

impl ReportEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode statistics for a metric; `None` encodes the no-data report
    pub fn encode(&self, metric: Metric, stats: Option<&DashboardStats>) -> InsightsReport {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: INSIGHTS_VERSION.to_string(),
        };

        let Some(stats) = stats else {
            return InsightsReport {
                report_version: REPORT_VERSION.to_string(),
                producer,
                metric: metric.into(),
                status: ReportStatus::NoData,
                summary: None,
                entries: Vec::new(),
                habits: Vec::new(),
                bedtime_buckets: Vec::new(),
                weekday_buckets: Vec::new(),
            };
        };

        InsightsReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            metric: metric.into(),
            status: ReportStatus::Ready,
            summary: Some(self.build_summary(metric, stats)),
            entries: stats.entries.iter().map(|e| report_entry(metric, e)).collect(),
            habits: stats
                .habit_impacts
                .iter()
                .map(|row| self.build_row(metric, row))
                .collect(),
            bedtime_buckets: stats
                .bedtime_buckets
                .iter()
                .map(|b| bedtime_bucket(metric, b))
                .collect(),
            weekday_buckets: stats
                .weekday_buckets
                .iter()
                .map(|b| weekday_bucket(metric, b))
                .collect(),
        }
    }

    /// Encode to a JSON string
    pub fn encode_to_json(&self, metric: Metric, stats: Option<&DashboardStats>) -> Result<String> {
        let report = self.encode(metric, stats);
        serde_json::to_string_pretty(&report).map_err(|e| InsightError::EncodingError(e.to_string()))
    }

    fn build_summary(&self, metric: Metric, stats: &DashboardStats) -> ReportSummary {
        let sleep_debt = stats.sleep_debt.map(|debt| {
            let hours = debt.debt_hours.abs();
            let rendered = format_decimals(hours, 1);
            let direction = if rendered == "0.0" {
                DebtDirection::Balanced
            } else if debt.is_deficit() {
                DebtDirection::Deficit
            } else {
                DebtDirection::Surplus
            };
            let display = match direction {
                DebtDirection::Deficit => format!("{rendered} h deficit"),
                DebtDirection::Surplus => format!("{rendered} h surplus"),
                DebtDirection::Balanced => format!("{rendered} h"),
            };
            ReportSleepDebt {
                hours,
                direction,
                nights: debt.nights,
                display,
            }
        });

        let optimal_bedtime = stats.optimal_bedtime.as_ref().map(|best| ReportBedtime {
            window: best.window.clone(),
            avg_sleep_score: best.avg_sleep_score,
            avg_sleep_score_display: format_metric(Metric::SleepScore, best.avg_sleep_score),
            nights: best.nights,
        });

        let top_habit = stats.top_habit().and_then(|row| {
            let impact = row.impact?;
            Some(ReportTopHabit {
                habit_id: row.habit_id.clone(),
                label: row.label.clone(),
                impact,
                impact_display: format_impact(impact),
                avg_metric_display: row.avg_metric.map(|v| format_metric(metric, v)),
            })
        });

        ReportSummary {
            entry_count: stats.entry_count(),
            recent_average: stats.recent_average,
            recent_average_display: stats.recent_average.map(|v| format_metric(metric, v)),
            sleep_debt,
            optimal_bedtime,
            top_habit,
        }
    }

    fn build_row(&self, metric: Metric, row: &ImpactRow) -> ReportHabitRow {
        ReportHabitRow {
            habit_id: row.habit_id.clone(),
            label: row.label.clone(),
            label_detail: row.label_detail.clone(),
            option: row.option.clone(),
            habit_type: row.habit_type,
            strategy: row.strategy,
            impact: row.impact,
            impact_display: row.impact.map(format_impact),
            avg_metric: row.avg_metric,
            avg_metric_display: row.avg_metric.map(|v| format_metric(metric, v)),
            avg_value: row.avg_value,
            present_count: row.present_count,
            absent_count: row.absent_count,
            significant: row.significant,
            effect: row.effect,
        }
    }
}

fn report_entry(metric: Metric, entry: &Entry) -> ReportEntry {
    let value = entry.metric(metric);
    ReportEntry {
        date: entry.date,
        value,
        value_display: value.map(|v| format_metric(metric, v)),
    }
}

fn bedtime_bucket(metric: Metric, bucket: &BedtimeBucket) -> ReportBucket {
    ReportBucket {
        label: bucket.label.clone(),
        average: bucket.average,
        average_display: bucket.average.map(|v| format_metric(metric, v)),
        count: bucket.count,
    }
}

fn weekday_bucket(metric: Metric, bucket: &WeekdayBucket) -> ReportBucket {
    ReportBucket {
        label: bucket.weekday.to_string(),
        average: bucket.average,
        average_display: bucket.average.map(|v| format_metric(metric, v)),
        count: bucket.count,
    }
}

/// Render a metric value with its display precision and unit ("7.3 h", "62 ms", "85")
pub fn format_metric(metric: Metric, value: f64) -> String {
    let number = format_decimals(value, metric.display_decimals());
    match metric.unit() {
        "" => number,
        unit => format!("{number} {unit}"),
    }
}

/// Render an impact signed with one decimal ("+34.8", "-26.7")
pub fn format_impact(impact: f64) -> String {
    let rounded = round_to(impact, 1);
    if rounded == 0.0 {
        "0.0".to_string()
    } else {
        format!("{rounded:+.1}")
    }
}

/// Fixed-point rendering, halves rounded away from zero
pub fn format_decimals(value: f64, decimals: usize) -> String {
    let rounded = round_to(value, decimals);
    // Avoid "-0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.decimals$}")
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OptimalBedtime, SleepDebt};
    use chrono::Weekday;

    fn sample_stats() -> DashboardStats {
        DashboardStats {
            metric: Metric::SleepScore,
            entries: Vec::new(),
            habit_impacts: vec![
                ImpactRow {
                    habit_id: "screen_time".to_string(),
                    label: "Screen time".to_string(),
                    habit_type: HabitType::Number,
                    option: None,
                    label_detail: Some("(High vs Low)".to_string()),
                    strategy: ImpactStrategy::MedianSplit,
                    impact: Some(-26.666),
                    avg_metric: Some(71.0),
                    avg_value: Some(30.0),
                    present_count: 5,
                    absent_count: 0,
                    significant: true,
                    effect: ImpactEffect::Unfavorable,
                },
                ImpactRow {
                    habit_id: "meditation".to_string(),
                    label: "Meditation".to_string(),
                    habit_type: HabitType::Boolean,
                    option: None,
                    label_detail: None,
                    strategy: ImpactStrategy::PresenceAbsence,
                    impact: Some(12.04),
                    avg_metric: Some(84.5),
                    avg_value: None,
                    present_count: 4,
                    absent_count: 1,
                    significant: true,
                    effect: ImpactEffect::Favorable,
                },
            ],
            recent_average: Some(77.6),
            sleep_debt: Some(SleepDebt {
                debt_hours: 10.5,
                target_hours: 56.0,
                actual_hours: 45.5,
                nights: 7,
            }),
            optimal_bedtime: Some(OptimalBedtime {
                hour: 22,
                window: "22:00 - 23:00".to_string(),
                avg_sleep_score: 86.5,
                nights: 3,
            }),
            bedtime_buckets: vec![BedtimeBucket {
                hour: 22,
                label: "22:00".to_string(),
                average: Some(86.5),
                count: 3,
            }],
            weekday_buckets: vec![WeekdayBucket {
                weekday: Weekday::Mon,
                average: None,
                count: 1,
            }],
        }
    }

    #[test]
    fn test_encode_ready_report() {
        let stats = sample_stats();
        let report = ReportEncoder::new().encode(Metric::SleepScore, Some(&stats));

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, "sleep-insights");
        assert_eq!(report.status, ReportStatus::Ready);
        assert_eq!(report.metric.key, "sleepScore");

        let summary = report.summary.unwrap();
        assert_eq!(summary.recent_average_display.as_deref(), Some("78"));
        let debt = summary.sleep_debt.unwrap();
        assert_eq!(debt.direction, DebtDirection::Deficit);
        assert_eq!(debt.display, "10.5 h deficit");
        assert_eq!(summary.optimal_bedtime.unwrap().avg_sleep_score_display, "87");

        // The unfavorable row ranks first but the top habit is the favorable one
        let top = summary.top_habit.unwrap();
        assert_eq!(top.habit_id, "meditation");
        assert_eq!(top.impact_display, "+12.0");

        assert_eq!(report.habits[0].impact_display.as_deref(), Some("-26.7"));
        assert_eq!(report.weekday_buckets[0].label, "Mon");
        assert_eq!(report.weekday_buckets[0].average_display, None);
    }

    #[test]
    fn test_encode_no_data() {
        let report = ReportEncoder::new().encode(Metric::Rhr, None);
        assert_eq!(report.status, ReportStatus::NoData);
        assert!(report.summary.is_none());
        assert!(report.habits.is_empty());
        assert!(report.metric.inverse);

        let json = ReportEncoder::new().encode_to_json(Metric::Rhr, None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "no_data");
        assert!(value["summary"].is_null());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let stats = sample_stats();
        let encoder = ReportEncoder::new();
        let first = encoder.encode_to_json(Metric::SleepScore, Some(&stats)).unwrap();
        let second = encoder.encode_to_json(Metric::SleepScore, Some(&stats)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(format_metric(Metric::Duration, 7.25), "7.3 h");
        assert_eq!(format_metric(Metric::Hrv, 61.5), "62 ms");
        assert_eq!(format_metric(Metric::SleepScore, 84.4), "84");
        assert_eq!(format_impact(34.8333), "+34.8");
        assert_eq!(format_impact(-0.04), "0.0");
        assert_eq!(format_decimals(-0.2, 0), "0");
    }

    #[test]
    fn test_surplus_direction() {
        let mut stats = sample_stats();
        stats.sleep_debt = Some(SleepDebt {
            debt_hours: -1.0,
            target_hours: 16.0,
            actual_hours: 17.0,
            nights: 2,
        });
        let report = ReportEncoder::new().encode(Metric::SleepScore, Some(&stats));
        let debt = report.summary.unwrap().sleep_debt.unwrap();
        assert_eq!(debt.direction, DebtDirection::Surplus);
        assert!((debt.hours - 1.0).abs() < 1e-9);
        assert_eq!(debt.display, "1.0 h surplus");
    }

    #[test]
    fn test_balanced_debt() {
        let mut stats = sample_stats();
        stats.sleep_debt = Some(SleepDebt {
            debt_hours: 0.0,
            target_hours: 16.0,
            actual_hours: 16.0,
            nights: 2,
        });
        let report = ReportEncoder::new().encode(Metric::SleepScore, Some(&stats));
        let debt = report.summary.unwrap().sleep_debt.unwrap();
        assert_eq!(debt.direction, DebtDirection::Balanced);
        assert_eq!(debt.display, "0.0 h");

        let json = serde_json::to_value(ReportEncoder::new().encode(Metric::SleepScore, Some(&stats)))
            .unwrap();
        assert_eq!(json["summary"]["sleep_debt"]["direction"], "balanced");
    }
}
