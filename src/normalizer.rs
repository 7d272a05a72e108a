//! Entry normalization
//!
//! This module turns typed daily records into analysis-ready entries.
//! - Records without a sleep score are excluded
//! - Hour/minute pairs are combined into decimal hours (one decimal place)
//! - Output is strictly ascending by date

use crate::types::{DailyRecord, Entry};

/// Normalizer for converting daily records to entries
pub struct EntryNormalizer;

impl EntryNormalizer {
    /// Normalize records into eligible entries, ascending by date.
    ///
    /// If two records share a date the later one in the input wins.
    pub fn normalize(records: &[DailyRecord]) -> Vec<Entry> {
        let mut entries: Vec<Entry> = records
            .iter()
            .filter_map(Self::normalize_record)
            .collect();

        // Stable sort keeps input order within a date, so dedup can keep the last
        entries.sort_by_key(|e| e.date);
        let mut deduped: Vec<Entry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.last_mut() {
                Some(last) if last.date == entry.date => *last = entry,
                _ => deduped.push(entry),
            }
        }

        tracing::debug!(
            records = records.len(),
            eligible = deduped.len(),
            "Normalized daily records"
        );
        deduped
    }

    /// Normalize one record, `None` when it has no sleep score
    pub fn normalize_record(record: &DailyRecord) -> Option<Entry> {
        let sleep_score = record.sleep_score?;

        Some(Entry {
            date: record.date,
            sleep_score,
            duration: combine_hours(record.duration_hours, record.duration_minutes),
            deep_sleep: combine_hours(record.deep_hours, record.deep_minutes),
            body_battery: record.body_battery,
            hrv: record.hrv,
            rhr: record.rhr,
            habits: record.habits.clone(),
            habit_values: record.habit_values.clone(),
            bedtime: record.bedtime,
            notes: record.notes.clone(),
        })
    }
}

/// `hours + minutes / 60` rounded to one decimal, missing parts count as 0
pub fn combine_hours(hours: Option<f64>, minutes: Option<f64>) -> f64 {
    round_to_tenth(hours.unwrap_or(0.0) + minutes.unwrap_or(0.0) / 60.0)
}

/// Round half away from zero to one decimal place
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
