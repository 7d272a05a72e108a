//! FFI bindings for Sleep Insights
//!
//! This module provides C-compatible functions for calling the analyzer from other
//! languages. All functions take null-terminated C strings and return allocated
//! memory that must be freed by the caller using `insights_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::AnalyzerConfig;
use crate::error::InsightError;
use crate::pipeline::{dashboard_to_json, InsightsProcessor};
use crate::types::Metric;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Borrow a C string as UTF-8
unsafe fn cstr_to_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("Invalid {name} string pointer"));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("{name} is not valid UTF-8"))
}

/// Convert a Rust string to a C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Hand a result across the boundary, recording the error on failure
fn finish(result: Result<String, String>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(msg) => {
            set_last_error(&msg);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze a daily log and return the insights report JSON.
///
/// # Safety
/// - `log_json`, `habits_json` and `metric` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `insights_free_string`.
/// - Returns NULL on error; call `insights_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn insights_analyze(
    log_json: *const c_char,
    habits_json: *const c_char,
    metric: *const c_char,
) -> *mut c_char {
    clear_last_error();

    finish(analyze_inner(log_json, habits_json, metric))
}

unsafe fn analyze_inner(
    log_json: *const c_char,
    habits_json: *const c_char,
    metric: *const c_char,
) -> Result<String, String> {
    let log = cstr_to_str(log_json, "log JSON")?;
    let habits = cstr_to_str(habits_json, "habits JSON")?;
    let metric = cstr_to_str(metric, "metric")?;
    dashboard_to_json(log, habits, metric).map_err(|e| e.to_string())
}

// ============================================================================
// Configured Processor API
// ============================================================================

/// Opaque handle to an InsightsProcessor
pub struct InsightsProcessorHandle {
    processor: InsightsProcessor,
}

/// Create a processor from a TOML config document (NULL for defaults).
///
/// # Safety
/// - `config_toml` must be NULL or a valid null-terminated C string.
/// - Must be freed with `insights_processor_free`.
/// - Returns NULL when the config is invalid.
#[no_mangle]
pub unsafe extern "C" fn insights_processor_new(
    config_toml: *const c_char,
) -> *mut InsightsProcessorHandle {
    clear_last_error();

    let config = if config_toml.is_null() {
        Ok(AnalyzerConfig::default())
    } else {
        match cstr_to_str(config_toml, "config") {
            Ok(toml) => AnalyzerConfig::from_toml_str(toml).map_err(|e| e.to_string()),
            Err(msg) => Err(msg),
        }
    };

    match config {
        Ok(config) => Box::into_raw(Box::new(InsightsProcessorHandle {
            processor: InsightsProcessor::with_config(config),
        })),
        Err(msg) => {
            set_last_error(&msg);
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `insights_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn insights_processor_free(processor: *mut InsightsProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Analyze with a configured processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `insights_processor_new`.
/// - String arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `insights_free_string`.
#[no_mangle]
pub unsafe extern "C" fn insights_processor_analyze(
    processor: *const InsightsProcessorHandle,
    log_json: *const c_char,
    habits_json: *const c_char,
    metric: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Invalid processor pointer");
        return ptr::null_mut();
    }
    let handle = &*processor;

    finish(processor_analyze_inner(&handle.processor, log_json, habits_json, metric))
}

unsafe fn processor_analyze_inner(
    processor: &InsightsProcessor,
    log_json: *const c_char,
    habits_json: *const c_char,
    metric: *const c_char,
) -> Result<String, String> {
    let log = cstr_to_str(log_json, "log JSON")?;
    let habits = cstr_to_str(habits_json, "habits JSON")?;
    let metric: Metric = cstr_to_str(metric, "metric")?
        .parse()
        .map_err(|e: InsightError| e.to_string())?;
    processor
        .analyze_json(log, habits, metric)
        .map_err(|e| e.to_string())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by an `insights_*` function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by this library, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn insights_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The pointer is valid until the next `insights_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn insights_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn insights_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log_json() -> CString {
        CString::new(
            r#"{
                "2024-01-15": {"sleepScore": 90, "habits": ["read"]},
                "2024-01-16": {"sleepScore": 60, "habits": []},
                "2024-01-17": {"sleepScore": 85, "habits": ["read"]}
            }"#,
        )
        .unwrap()
    }

    fn sample_habits_json() -> CString {
        CString::new(r#"[{"id": "read", "label": "Read a book"}]"#).unwrap()
    }

    #[test]
    fn test_ffi_analyze() {
        let log = sample_log_json();
        let habits = sample_habits_json();
        let metric = CString::new("sleepScore").unwrap();

        unsafe {
            let result = insights_analyze(log.as_ptr(), habits.as_ptr(), metric.as_ptr());
            assert!(!result.is_null());

            let report = CStr::from_ptr(result).to_str().unwrap();
            assert!(report.contains("\"status\": \"ready\""));
            assert!(report.contains("Read a book"));

            insights_free_string(result);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        let config = CString::new("min_sample_size = 1").unwrap();
        let log = sample_log_json();
        let habits = sample_habits_json();
        let metric = CString::new("sleepScore").unwrap();

        unsafe {
            let processor = insights_processor_new(config.as_ptr());
            assert!(!processor.is_null());

            let result =
                insights_processor_analyze(processor, log.as_ptr(), habits.as_ptr(), metric.as_ptr());
            assert!(!result.is_null());
            let report: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(report["habits"][0]["significant"], true);

            insights_free_string(result);
            insights_processor_free(processor);

            let defaults = insights_processor_new(ptr::null());
            assert!(!defaults.is_null());
            insights_processor_free(defaults);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let invalid = CString::new("not json").unwrap();
        let habits = sample_habits_json();
        let metric = CString::new("sleepScore").unwrap();

        unsafe {
            let result = insights_analyze(invalid.as_ptr(), habits.as_ptr(), metric.as_ptr());
            assert!(result.is_null());

            let error = insights_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            let result = insights_analyze(ptr::null(), habits.as_ptr(), metric.as_ptr());
            assert!(result.is_null());

            let bad_config = CString::new("recent_window_days = 0").unwrap();
            assert!(insights_processor_new(bad_config.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = insights_version();
            assert!(!version.is_null());
            assert_eq!(CStr::from_ptr(version).to_str().unwrap(), env!("CARGO_PKG_VERSION"));
        }
    }
}
