//! FFI bindings for the RRSM engine
//!
//! This module provides C-compatible functions for calling the engine from the
//! app. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `rrsm_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::ComputeError;
use crate::pipeline::{nights_to_dashboard, nights_to_insights};

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
        Err(_) => {
            set_last_error("Result contained an interior NUL byte");
            ptr::null_mut()
        }
    }
}

/// Hand a pipeline result back across the boundary
fn into_c_result(result: Result<String, ComputeError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Classify fetched night rows and return `InsightResponse` JSON.
///
/// # Safety
/// - `nights_json` must be a valid null-terminated C string holding a JSON
///   array or NDJSON of night rows.
/// - `request_json` must be a valid null-terminated C string or NULL; NULL
///   uses the default request.
/// - Returns a newly allocated string that must be freed with `rrsm_free_string`.
/// - Returns NULL on error; call `rrsm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rrsm_nights_to_insights(
    nights_json: *const c_char,
    request_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let nights_str = match cstr_to_string(nights_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid nights JSON string pointer");
            return ptr::null_mut();
        }
    };

    let request_str = if request_json.is_null() {
        String::new()
    } else {
        match cstr_to_string(request_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid request JSON string pointer");
                return ptr::null_mut();
            }
        }
    };

    into_c_result(nights_to_insights(nights_str, request_str))
}

/// Score the most recent nights and return `DashboardResponse` JSON.
///
/// # Safety
/// - `nights_json` must be a valid null-terminated C string holding a JSON
///   array or NDJSON of night rows.
/// - `nights` of zero or less uses the configured dashboard window.
/// - Returns a newly allocated string that must be freed with `rrsm_free_string`.
/// - Returns NULL on error; call `rrsm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rrsm_nights_to_dashboard(
    nights_json: *const c_char,
    nights: i32,
) -> *mut c_char {
    clear_last_error();

    let nights_str = match cstr_to_string(nights_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid nights JSON string pointer");
            return ptr::null_mut();
        }
    };

    let nights = usize::try_from(nights).ok().filter(|n| *n > 0);

    into_c_result(nights_to_dashboard(nights_str, nights))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by RRSM functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an RRSM function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn rrsm_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next RRSM function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn rrsm_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the engine version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn rrsm_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
