//! FFI bindings for Synheart Focus
//!
//! This module provides C-compatible functions for running a focus engine from
//! mobile hosts. Strings are null-terminated; every returned string must be
//! freed with `focus_free_string`. The classifier is supplied by the host as a
//! callback.

use std::cell::RefCell;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use chrono::{DateTime, TimeZone, Utc};

use crate::artifact::ArtifactFilter;
use crate::config::FocusConfig;
use crate::engine::{Classifier, FocusEngine};
use crate::error::ClassifierError;
use crate::features::HrvFeatureExtractor;
use crate::types::{ClassProbabilities, FocusLabel, ModelDescriptor};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn timestamp_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

// ============================================================================
// Classifier Callback
// ============================================================================

/// Host inference callback.
///
/// Receives `feature_count` features and must write `class_count`
/// probabilities, in the descriptor's `class_names` order, to `out_probs`.
/// Returns 0 on success; any other value is reported as a classifier failure.
pub type FocusPredictFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    features: *const f64,
    feature_count: usize,
    out_probs: *mut f64,
    class_count: usize,
) -> i32;

/// Classifier that forwards to a host callback
pub struct FfiClassifier {
    descriptor: ModelDescriptor,
    classes: Vec<FocusLabel>,
    predict: FocusPredictFn,
    user_data: *mut c_void,
}

impl Classifier for FfiClassifier {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn predict(&mut self, features: &[f64]) -> Result<ClassProbabilities, ClassifierError> {
        let mut out = vec![0.0; self.classes.len()];
        // SAFETY: both buffers live for the duration of the call and the host
        // contract bounds writes to `class_count` values.
        let status = unsafe {
            (self.predict)(
                self.user_data,
                features.as_ptr(),
                features.len(),
                out.as_mut_ptr(),
                out.len(),
            )
        };
        if status != 0 {
            return Err(ClassifierError::Failed(format!(
                "host callback returned status {status}"
            )));
        }
        Ok(ClassProbabilities::from_pairs(self.classes.iter().copied().zip(out)))
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Extract the 24 HRV features from beat intervals (ms).
///
/// Intervals pass through the default artifact filter first; input with no
/// plausible intervals is an error.
///
/// # Safety
/// - `intervals_ms` must point to `len` readable doubles.
/// - Returns a newly allocated JSON object (name → value) that must be freed
///   with `focus_free_string`.
/// - Returns NULL on error; call `focus_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn focus_extract_features(
    intervals_ms: *const f64,
    len: usize,
) -> *mut c_char {
    clear_last_error();

    if intervals_ms.is_null() {
        set_last_error("Null intervals pointer");
        return ptr::null_mut();
    }

    let intervals = slice::from_raw_parts(intervals_ms, len);
    let config = FocusConfig::default();
    let kept = ArtifactFilter::default().filter(intervals, 0.0, config.motion_threshold_g);
    let result = HrvFeatureExtractor::extract(&kept)
        .and_then(|vector| Ok(serde_json::to_string(&vector.to_map())?));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Engine API
// ============================================================================

/// Opaque handle to a FocusEngine
pub struct FocusEngineHandle {
    engine: FocusEngine<FfiClassifier>,
}

/// Create a new engine.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL (defaults).
/// - `descriptor_json` must be a valid null-terminated C string; it must list
///   `class_names`.
/// - `predict` is invoked synchronously with `user_data` during ingestion.
/// - Must be freed with `focus_engine_free`.
/// - Returns NULL on error; call `focus_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_new(
    config_json: *const c_char,
    descriptor_json: *const c_char,
    predict: Option<FocusPredictFn>,
    user_data: *mut c_void,
) -> *mut FocusEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        FocusConfig::default()
    } else {
        let parsed = cstr_to_string(config_json)
            .ok_or_else(|| "Invalid config string pointer".to_string())
            .and_then(|json| FocusConfig::from_json(&json).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => config,
            Err(msg) => {
                set_last_error(&msg);
                return ptr::null_mut();
            }
        }
    };

    let descriptor_str = match cstr_to_string(descriptor_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid descriptor string pointer");
            return ptr::null_mut();
        }
    };

    let descriptor = match ModelDescriptor::from_json(&descriptor_str) {
        Ok(d) => d,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let classes = match descriptor.class_labels() {
        Ok(Some(classes)) if !classes.is_empty() => classes,
        Ok(_) => {
            set_last_error("Descriptor must list class_names");
            return ptr::null_mut();
        }
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let Some(predict) = predict else {
        set_last_error("Null predict callback");
        return ptr::null_mut();
    };

    let classifier = FfiClassifier {
        descriptor,
        classes,
        predict,
        user_data,
    };

    match FocusEngine::new(config, classifier) {
        Ok(engine) => Box::into_raw(Box::new(FocusEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `focus_engine_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_free(engine: *mut FocusEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Ingest one heart-rate sample.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `focus_engine_new`.
/// - Returns a newly allocated FocusResult JSON when a cycle completed, which
///   must be freed with `focus_free_string`.
/// - Returns NULL when no result is ready; `focus_last_error` is then NULL.
///   On failure NULL is returned and `focus_last_error` holds the message.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_ingest(
    engine: *mut FocusEngineHandle,
    heart_rate_bpm: f64,
    timestamp_ms: i64,
    motion_g: f64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;

    let Some(timestamp) = timestamp_from_millis(timestamp_ms) else {
        set_last_error("Timestamp out of range");
        return ptr::null_mut();
    };

    let result = handle
        .engine
        .ingest_with_motion(heart_rate_bpm, timestamp, motion_g)
        .and_then(|r| r.map(|r| serde_json::to_string(&r)).transpose().map_err(Into::into));

    match result {
        Ok(Some(json)) => string_to_cstr(&json),
        Ok(None) => ptr::null_mut(),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Set the behaviour score (0-1) used by the dual-modality strategy.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `focus_engine_new`.
/// - A negative score clears it.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_set_behavior_score(
    engine: *mut FocusEngineHandle,
    score: f64,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;

    if score < 0.0 {
        handle.engine.clear_behavior_score();
        return 0;
    }

    match handle.engine.set_behavior_score(score) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Reset the engine to Idle; learned baselines are kept.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `focus_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_reset(engine: *mut FocusEngineHandle) {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return;
    }

    (*engine).engine.reset();
}

/// Save engine baselines to JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `focus_engine_new`.
/// - Returns a newly allocated string that must be freed with `focus_free_string`.
/// - Returns NULL on error; call `focus_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_save_baseline(engine: *mut FocusEngineHandle) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;

    match handle.engine.save_baseline() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load engine baselines from JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `focus_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `focus_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_load_baseline(
    engine: *mut FocusEngineHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.engine.load_baseline(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Focus functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Focus function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn focus_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Focus function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn focus_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Focus library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn focus_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const BASE_MS: i64 = 1_705_309_200_000;

    fn descriptor_json() -> CString {
        let descriptor = ModelDescriptor::for_schema(
            "ffi-test",
            "sha256:0",
            crate::types::FeatureSchema::Hrv24,
        )
        .with_class_names(&[
            FocusLabel::Focused,
            FocusLabel::Bored,
            FocusLabel::Anxious,
            FocusLabel::Overload,
        ]);
        CString::new(serde_json::to_string(&descriptor).unwrap()).unwrap()
    }

    unsafe extern "C" fn predict_focused(
        user_data: *mut c_void,
        _features: *const f64,
        feature_count: usize,
        out_probs: *mut f64,
        class_count: usize,
    ) -> i32 {
        if feature_count != 24 || class_count != 4 {
            return 1;
        }
        let calls = &*(user_data as *const Cell<usize>);
        calls.set(calls.get() + 1);
        let out = slice::from_raw_parts_mut(out_probs, class_count);
        out.copy_from_slice(&[0.9, 0.05, 0.03, 0.02]);
        0
    }

    unsafe extern "C" fn predict_failing(
        _user_data: *mut c_void,
        _features: *const f64,
        _feature_count: usize,
        _out_probs: *mut f64,
        _class_count: usize,
    ) -> i32 {
        7
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        let calls = Cell::new(0usize);
        let descriptor = descriptor_json();

        unsafe {
            let engine = focus_engine_new(
                ptr::null(),
                descriptor.as_ptr(),
                Some(predict_focused),
                &calls as *const Cell<usize> as *mut c_void,
            );
            assert!(!engine.is_null());

            let mut results = Vec::new();
            for s in 0..=60 {
                let out = focus_engine_ingest(engine, 70.0, BASE_MS + s * 1000, 0.0);
                if out.is_null() {
                    assert!(focus_last_error().is_null());
                } else {
                    results.push(CStr::from_ptr(out).to_str().unwrap().to_string());
                    focus_free_string(out);
                }
            }

            assert_eq!(results.len(), 1);
            assert_eq!(calls.get(), 1);
            let value: serde_json::Value = serde_json::from_str(&results[0]).unwrap();
            assert_eq!(value["dominant_label"], "focused");
            assert!((value["raw_score"].as_f64().unwrap() - 97.0).abs() < 1e-9);

            // Save baselines and load them into a second engine
            let baselines = focus_engine_save_baseline(engine);
            assert!(!baselines.is_null());

            let engine2 = focus_engine_new(
                ptr::null(),
                descriptor.as_ptr(),
                Some(predict_focused),
                &calls as *const Cell<usize> as *mut c_void,
            );
            assert_eq!(focus_engine_load_baseline(engine2, baselines), 0);

            assert_eq!(focus_engine_set_behavior_score(engine, 0.5), 0);
            assert_ne!(focus_engine_set_behavior_score(engine, 2.0), 0);
            assert_eq!(focus_engine_set_behavior_score(engine, -1.0), 0);
            focus_engine_reset(engine);

            focus_free_string(baselines);
            focus_engine_free(engine);
            focus_engine_free(engine2);
        }
    }

    #[test]
    fn test_ffi_classifier_failure() {
        let descriptor = descriptor_json();

        unsafe {
            let engine = focus_engine_new(
                ptr::null(),
                descriptor.as_ptr(),
                Some(predict_failing),
                ptr::null_mut(),
            );
            assert!(!engine.is_null());

            for s in 0..60 {
                assert!(focus_engine_ingest(engine, 70.0, BASE_MS + s * 1000, 0.0).is_null());
            }
            let out = focus_engine_ingest(engine, 70.0, BASE_MS + 60_000, 0.0);
            assert!(out.is_null());

            let error = focus_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("status 7"));

            focus_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_requires_class_names() {
        let descriptor = ModelDescriptor::for_schema(
            "no-classes",
            "x",
            crate::types::FeatureSchema::Hrv24,
        );
        let json = CString::new(serde_json::to_string(&descriptor).unwrap()).unwrap();

        unsafe {
            let engine = focus_engine_new(
                ptr::null(),
                json.as_ptr(),
                Some(predict_failing),
                ptr::null_mut(),
            );
            assert!(engine.is_null());
            assert!(!focus_last_error().is_null());

            let bad_config = CString::new(r#"{"hop_duration_secs": -1}"#).unwrap();
            let descriptor = descriptor_json();
            let engine = focus_engine_new(
                bad_config.as_ptr(),
                descriptor.as_ptr(),
                Some(predict_failing),
                ptr::null_mut(),
            );
            assert!(engine.is_null());
        }
    }

    #[test]
    fn test_ffi_extract_features() {
        let intervals = [800.0, 810.0, 790.0, 805.0, 795.0];

        unsafe {
            let out = focus_extract_features(intervals.as_ptr(), intervals.len());
            assert!(!out.is_null());
            let json = CStr::from_ptr(out).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(json).unwrap();
            assert_eq!(value.as_object().unwrap().len(), 24);
            assert!((value["mean_rr"].as_f64().unwrap() - 800.0).abs() < 1e-9);
            focus_free_string(out);

            let out = focus_extract_features(intervals.as_ptr(), 0);
            assert!(out.is_null());
            assert!(!focus_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_extract_features_rejects_implausible_intervals() {
        let huge = [1e15, 1e15];
        let negative = [-800.0, -810.0, -790.0];

        unsafe {
            for intervals in [&huge[..], &negative[..]] {
                let out = focus_extract_features(intervals.as_ptr(), intervals.len());
                assert!(out.is_null());
                let error = CStr::from_ptr(focus_last_error()).to_str().unwrap();
                assert!(error.contains("Insufficient data"), "{error}");
            }

            // Artifacts are dropped, the rest is still extracted
            let mixed = [800.0, 1e15, 810.0, 790.0, 805.0];
            let out = focus_extract_features(mixed.as_ptr(), mixed.len());
            assert!(!out.is_null());
            let json = CStr::from_ptr(out).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(json).unwrap();
            assert!((value["mean_rr"].as_f64().unwrap() - 801.25).abs() < 1e-9);
            focus_free_string(out);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = focus_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
