//! Sleep Insights - On-device analytics correlating daily habits with sleep outcomes
//!
//! The engine turns a raw daily log into a dashboard report through a deterministic
//! pipeline: typed ingestion → entry normalization → habit impact ranking →
//! window and bucket aggregates → report encoding.
//!
//! ## Modules
//!
//! - **Analysis Pipeline**: Rank habits by their impact on a selected sleep metric
//! - **Journal**: Pure edits used by the logging side (habit toggles, sleep entry)

pub mod aggregates;
pub mod config;
pub mod encoder;
pub mod error;
pub mod impact;
pub mod journal;
pub mod logging;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::AnalyzerConfig;
pub use encoder::{InsightsReport, ReportEncoder, REPORT_VERSION};
pub use error::{InsightError, Result};
pub use journal::{default_entry_date, DailyLog, SleepMetrics};
pub use pipeline::{analyze_dashboard, dashboard_to_json, InsightsProcessor};
pub use types::{
    DailyRecord, DashboardStats, Entry, HabitDefinition, HabitType, HabitValue, ImpactEffect,
    ImpactRow, Metric, TimeOfDay,
};

// Schema exports
pub use schema::{RawDailyRecord, RawLog, RawLogAdapter, ValidationIssue};

/// Library version embedded in every report
pub const INSIGHTS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "sleep-insights";
