//! Dashboard aggregates
//!
//! Window and bucket statistics shown next to the habit impact rows:
//! - Recent average and sleep debt over the latest entries
//! - Optimal bedtime hour (always scored against sleep score)
//! - Bedtime hour and weekday buckets of the selected metric

use std::collections::BTreeMap;

use chrono::Weekday;

use crate::config::AnalyzerConfig;
use crate::impact::mean;
use crate::types::{BedtimeBucket, Entry, Metric, OptimalBedtime, SleepDebt, WeekdayBucket};

/// Weekdays in dashboard order
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Aggregate calculator for a single metric
pub struct AggregateCalculator<'a> {
    config: &'a AnalyzerConfig,
    metric: Metric,
}

impl<'a> AggregateCalculator<'a> {
    pub fn new(config: &'a AnalyzerConfig, metric: Metric) -> Self {
        Self { config, metric }
    }

    /// The chronologically latest entries (entries must be ascending)
    pub fn recent_window<'e>(&self, entries: &'e [Entry]) -> &'e [Entry] {
        let start = entries.len().saturating_sub(self.config.recent_window_days);
        &entries[start..]
    }

    /// Mean of the selected metric over the recent window
    pub fn recent_average(&self, entries: &[Entry]) -> Option<f64> {
        mean(
            self.recent_window(entries)
                .iter()
                .filter_map(|e| e.metric(self.metric)),
        )
    }

    /// Target minus actual sleep over the recent window
    pub fn sleep_debt(&self, entries: &[Entry]) -> Option<SleepDebt> {
        let window = self.recent_window(entries);
        if window.is_empty() {
            return None;
        }

        let target_hours = self.config.sleep_target_hours * window.len() as f64;
        let actual_hours: f64 = window.iter().map(|e| e.duration).sum();

        Some(SleepDebt {
            debt_hours: target_hours - actual_hours,
            target_hours,
            actual_hours,
            nights: window.len(),
        })
    }

    /// Bedtime hour with the highest mean sleep score.
    ///
    /// Only hours with at least `bedtime_min_bucket` nights compete. Ties go to the
    /// earliest hour of the night.
    pub fn optimal_bedtime(&self, entries: &[Entry]) -> Option<OptimalBedtime> {
        let mut best: Option<(u8, f64, usize)> = None;

        for (hour, group) in self.group_by_bedtime_hour(entries) {
            if group.len() < self.config.bedtime_min_bucket {
                continue;
            }
            let Some(avg) = mean(group.iter().map(|e| e.sleep_score)) else {
                continue;
            };
            if best.map_or(true, |(_, best_avg, _)| avg > best_avg) {
                best = Some((hour, avg, group.len()));
            }
        }

        best.map(|(hour, avg_sleep_score, nights)| OptimalBedtime {
            hour,
            window: format!("{}:00 - {}:00", hour, u16::from(hour) + 1),
            avg_sleep_score,
            nights,
        })
    }

    /// Mean selected metric per bedtime hour, in night order
    pub fn bedtime_buckets(&self, entries: &[Entry]) -> Vec<BedtimeBucket> {
        self.group_by_bedtime_hour(entries)
            .into_iter()
            .map(|(hour, group)| BedtimeBucket {
                hour,
                label: format!("{hour:02}:00"),
                average: mean(group.iter().filter_map(|e| e.metric(self.metric))),
                count: group.len(),
            })
            .collect()
    }

    /// Mean selected metric per weekday, Monday first; days without entries are omitted
    pub fn weekday_buckets(&self, entries: &[Entry]) -> Vec<WeekdayBucket> {
        WEEK.iter()
            .filter_map(|&weekday| {
                let group: Vec<&Entry> = entries.iter().filter(|e| e.weekday() == weekday).collect();
                if group.is_empty() {
                    return None;
                }
                Some(WeekdayBucket {
                    weekday,
                    average: mean(group.iter().filter_map(|e| e.metric(self.metric))),
                    count: group.len(),
                })
            })
            .collect()
    }

    /// Entries with a bedtime grouped by hour, ordered by night order
    fn group_by_bedtime_hour<'e>(&self, entries: &'e [Entry]) -> Vec<(u8, Vec<&'e Entry>)> {
        let mut groups: BTreeMap<u8, (u8, Vec<&'e Entry>)> = BTreeMap::new();
        for entry in entries {
            if let Some(bedtime) = entry.bedtime {
                groups
                    .entry(night_order_key(bedtime.hour, self.config.night_order_pivot_hour))
                    .or_insert_with(|| (bedtime.hour, Vec::new()))
                    .1
                    .push(entry);
            }
        }
        groups.into_values().collect()
    }
}

/// Sort key placing early-morning hours after the evening (01 -> 25)
pub fn night_order_key(hour: u8, pivot: u8) -> u8 {
    if hour < pivot {
        hour + 24
    } else {
        hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeOfDay;
    use chrono::{Datelike, NaiveDate};
    use std::collections::{BTreeMap, BTreeSet};

    fn entry(date: NaiveDate, score: f64, duration: f64, bedtime: Option<(u8, u8)>) -> Entry {
        Entry {
            date,
            sleep_score: score,
            duration,
            deep_sleep: 1.0,
            body_battery: None,
            hrv: None,
            rhr: None,
            habits: BTreeSet::new(),
            habit_values: BTreeMap::new(),
            bedtime: bedtime.and_then(|(h, m)| TimeOfDay::new(h, m)),
            notes: String::new(),
        }
    }

    fn day(n: u32) -> NaiveDate {
        // 2024-01-01 is a Monday
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    #[test]
    fn test_sleep_debt_over_last_week() {
        let durations = [9.0, 9.0, 6.0, 7.0, 6.5, 8.0, 5.0, 7.0, 6.0];
        let entries: Vec<Entry> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| entry(day(i as u32 + 1), 80.0, *d, None))
            .collect();

        let config = AnalyzerConfig::default();
        let debt = AggregateCalculator::new(&config, Metric::SleepScore)
            .sleep_debt(&entries)
            .unwrap();

        assert_eq!(debt.nights, 7);
        assert!((debt.target_hours - 56.0).abs() < 1e-9);
        assert!((debt.actual_hours - 45.5).abs() < 1e-9);
        assert!((debt.debt_hours - 10.5).abs() < 1e-9);
        assert!(debt.is_deficit());
    }

    #[test]
    fn test_short_history_window() {
        let entries = vec![entry(day(1), 70.0, 9.0, None), entry(day(2), 90.0, 8.0, None)];
        let config = AnalyzerConfig::default();
        let calc = AggregateCalculator::new(&config, Metric::SleepScore);

        assert_eq!(calc.recent_average(&entries), Some(80.0));
        let debt = calc.sleep_debt(&entries).unwrap();
        assert!((debt.debt_hours + 1.0).abs() < 1e-9);
        assert!(!debt.is_deficit());

        assert_eq!(calc.recent_average(&[]), None);
        assert_eq!(calc.sleep_debt(&[]), None);
    }

    #[test]
    fn test_recent_average_skips_missing_metric() {
        let mut entries: Vec<Entry> = (1..=3).map(|n| entry(day(n), 80.0, 7.0, None)).collect();
        entries[0].hrv = Some(40.0);
        entries[2].hrv = Some(60.0);

        let config = AnalyzerConfig::default();
        let calc = AggregateCalculator::new(&config, Metric::Hrv);
        assert_eq!(calc.recent_average(&entries), Some(50.0));
    }

    #[test]
    fn test_optimal_bedtime_uses_sleep_score() {
        let mut entries = vec![
            entry(day(1), 85.0, 7.0, Some((22, 10))),
            entry(day(2), 89.0, 7.0, Some((22, 45))),
            entry(day(3), 70.0, 7.0, Some((23, 30))),
            entry(day(4), 72.0, 7.0, Some((23, 5))),
            // Single night buckets never qualify
            entry(day(5), 99.0, 7.0, Some((21, 0))),
            entry(day(6), 95.0, 7.0, None),
        ];
        for e in &mut entries {
            // Inverted HRV must not influence the choice
            e.hrv = Some(100.0 - e.sleep_score);
        }

        let config = AnalyzerConfig::default();
        let best = AggregateCalculator::new(&config, Metric::Hrv)
            .optimal_bedtime(&entries)
            .unwrap();

        assert_eq!(best.hour, 22);
        assert_eq!(best.window, "22:00 - 23:00");
        assert!((best.avg_sleep_score - 87.0).abs() < 1e-9);
        assert_eq!(best.nights, 2);
    }

    #[test]
    fn test_optimal_bedtime_unavailable_and_ties() {
        let config = AnalyzerConfig::default();
        let calc = AggregateCalculator::new(&config, Metric::SleepScore);

        let sparse = vec![entry(day(1), 80.0, 7.0, Some((22, 0))), entry(day(2), 80.0, 7.0, Some((23, 0)))];
        assert_eq!(calc.optimal_bedtime(&sparse), None);

        let tied = vec![
            entry(day(1), 80.0, 7.0, Some((0, 15))),
            entry(day(2), 80.0, 7.0, Some((0, 45))),
            entry(day(3), 80.0, 7.0, Some((23, 0))),
            entry(day(4), 80.0, 7.0, Some((23, 50))),
        ];
        let best = calc.optimal_bedtime(&tied).unwrap();
        assert_eq!(best.hour, 23);
        assert_eq!(best.window, "23:00 - 24:00");
    }

    #[test]
    fn test_bedtime_buckets_in_night_order() {
        let mut entries = vec![
            entry(day(1), 60.0, 7.0, Some((1, 0))),
            entry(day(2), 80.0, 7.0, Some((22, 30))),
            entry(day(3), 90.0, 7.0, Some((22, 0))),
            entry(day(4), 70.0, 7.0, Some((23, 59))),
            entry(day(5), 75.0, 7.0, None),
        ];
        entries[1].body_battery = Some(50.0);

        let config = AnalyzerConfig::default();
        let buckets = AggregateCalculator::new(&config, Metric::BodyBattery).bedtime_buckets(&entries);

        let hours: Vec<u8> = buckets.iter().map(|b| b.hour).collect();
        assert_eq!(hours, vec![22, 23, 1]);
        assert_eq!(buckets[0].label, "22:00");
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].average, Some(50.0));
        assert_eq!(buckets[1].average, None);
        assert_eq!(buckets[2].label, "01:00");
    }

    #[test]
    fn test_weekday_buckets_start_monday() {
        // Sunday 2024-01-07, Monday 2024-01-08, Wednesday 2024-01-10
        let entries = vec![
            entry(day(7), 60.0, 7.0, None),
            entry(day(8), 80.0, 7.0, None),
            entry(day(10), 70.0, 7.0, None),
            entry(day(14), 90.0, 7.0, None),
        ];
        assert_eq!(entries[0].date.weekday(), Weekday::Sun);

        let config = AnalyzerConfig::default();
        let buckets = AggregateCalculator::new(&config, Metric::SleepScore).weekday_buckets(&entries);

        let days: Vec<Weekday> = buckets.iter().map(|b| b.weekday).collect();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed, Weekday::Sun]);
        assert_eq!(buckets[2].count, 2);
        assert_eq!(buckets[2].average, Some(75.0));
    }

    #[test]
    fn test_night_order_key() {
        assert_eq!(night_order_key(23, 12), 23);
        assert_eq!(night_order_key(0, 12), 24);
        assert_eq!(night_order_key(11, 12), 35);
        assert_eq!(night_order_key(12, 12), 12);
    }
}
