//! C-ABI wrapper around `yyf-core`.
//!
//! # Overview
//! Exposes configuration, request building and response routing through
//! `extern "C"` functions so any language with a C FFI can drive the client
//! while performing the HTTP I/O itself.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Configuration goes in as JSON text, the same flat or composite
//!   documents `Setup::from_json` accepts.
//! - Handlers are C function pointers plus a `user_data` pointer, invoked
//!   synchronously while `yyf_route_response` runs.
//! - The C caller owns all returned pointers and must call the matching
//!   `yyf_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use yyf_core::{
    Config, Failure, Handler, HandlerTable, HttpMethod, HttpResponse, Payload, Request,
    ResponseBody, Router, Setup, TransportError,
};

use types::*;

/// Borrow a C string as `&str`; invalid UTF-8 reads as empty.
///
/// # Safety
/// `ptr` must be non-null and point to a NUL-terminated string that outlives
/// the returned reference.
unsafe fn borrow_str<'a>(ptr: *const c_char) -> &'a str {
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or("")
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Create a configuration with default options and status codes.
///
/// The caller must free the returned pointer with `yyf_config_free`.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_config_new() -> *mut FfiConfig {
    catch_unwind(|| {
        Box::into_raw(Box::new(FfiConfig {
            inner: Arc::new(Config::new()),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a configuration created by `yyf_config_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_config_free(config: *mut FfiConfig) {
    if !config.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(config) });
        }));
    }
}

/// Merge a JSON configuration document into `config`.
///
/// A JSON string sets the root; an object is either a flat options map or
/// the composite `{"options": {...}, "code": {...}}` form. Nothing is
/// applied on error.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_configure(config: *mut FfiConfig, json: *const c_char) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if config.is_null() || json.is_null() {
            return FfiErrorCode::NullArg;
        }
        let config = unsafe { &mut *config };
        let text = unsafe { borrow_str(json) };
        let result = Setup::from_json_str(text)
            .and_then(|setup| Arc::make_mut(&mut config.inner).configure(setup).map(|_| ()));
        match result {
            Ok(()) => FfiErrorCode::Ok,
            Err(e) => {
                tracing::warn!(error = %e, "configuration rejected");
                FfiErrorCode::from(&e)
            }
        }
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Map `code` to `name`, or remove the mapping for `code` when `name` is
/// null or empty.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_set_code(
    config: *mut FfiConfig,
    code: i64,
    name: *const c_char,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if config.is_null() {
            return FfiErrorCode::NullArg;
        }
        let config = unsafe { &mut *config };
        let name = if name.is_null() {
            None
        } else {
            Some(unsafe { borrow_str(name) })
        };
        match Arc::make_mut(&mut config.inner).set_code(code, name) {
            Ok(_) => FfiErrorCode::Ok,
            Err(e) => FfiErrorCode::from(&e),
        }
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Effective options as JSON text.
///
/// Returns null if `config` is null. Free with `yyf_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_options_json(config: *const FfiConfig) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if config.is_null() {
            return std::ptr::null_mut();
        }
        let config = unsafe { &*config };
        match serde_json::to_string(config.inner.options()) {
            Ok(json) => c_string(json),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Build the HTTP request for one call.
///
/// `method` is a verb name (any case). `payload_json` may be null; a JSON
/// object becomes encoded fields, a JSON string is sent as text. `is_async`
/// uses tri-state: -1 = configured default, 0 = false, 1 = true.
/// Returns null on a null argument, an unknown method, invalid payload JSON
/// or an encoding failure.
/// The caller must free the returned pointer with `yyf_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_build_request(
    config: *const FfiConfig,
    method: *const c_char,
    path: *const c_char,
    payload_json: *const c_char,
    is_async: i32,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if config.is_null() || method.is_null() || path.is_null() {
            return std::ptr::null_mut();
        }
        let config = unsafe { &*config };
        let method: HttpMethod = match unsafe { borrow_str(method) }.parse() {
            Ok(m) => m,
            Err(_) => return std::ptr::null_mut(),
        };
        let path = unsafe { borrow_str(path) };

        let mut request = Request::detached(config.inner.clone(), method, path);
        if !payload_json.is_null() {
            let payload: Value = match serde_json::from_str(unsafe { borrow_str(payload_json) }) {
                Ok(v) => v,
                Err(_) => return std::ptr::null_mut(),
            };
            request = request.payload(Payload::from(payload));
        }
        match is_async {
            0 => request = request.is_async(false),
            1 => request = request.is_async(true),
            _ => {}
        }

        match request.build() {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(e) => {
                tracing::debug!(error = %e, "request build failed");
                std::ptr::null_mut()
            }
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to what the router expects.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> Result<HttpResponse, TransportError> {
    let body = if resp.body.is_null() {
        ""
    } else {
        unsafe { borrow_str(resp.body) }
    };
    if resp.status == 0 {
        let message = if body.is_empty() { "transport failed" } else { body };
        return Err(TransportError::new(message));
    }
    Ok(HttpResponse::new(resp.status, body))
}

fn body_text(body: &ResponseBody) -> String {
    match body {
        ResponseBody::Json(value) => value.to_string(),
        ResponseBody::Text(text) => text.clone(),
    }
}

/// Per-request handler table calling into `handlers`.
///
/// `on_status` is registered under every status name the configuration
/// knows, so each resolved status reaches it.
fn handler_table(config: &Config, handlers: &FfiHandlers) -> Result<HandlerTable, yyf_core::Error> {
    let user_data = UserData::new(handlers.user_data);
    let mut table = HandlerTable::new();

    if let Some(on_status) = handlers.on_status {
        for name in config.codes().names() {
            let status = CString::new(name).unwrap_or_default();
            table.set(
                name,
                Handler::data(move |data: &Value, _: &HttpResponse| {
                    let data = CString::new(data.to_string()).unwrap_or_default();
                    on_status(user_data.get(), status.as_ptr(), data.as_ptr());
                }),
            )?;
        }
    }
    if let Some(ready) = handlers.ready {
        table.set(
            "ready",
            Handler::ready(move |body, _| {
                let body = CString::new(body_text(body)).unwrap_or_default();
                ready(user_data.get(), body.as_ptr())
            }),
        )?;
    }
    if let Some(on_final) = handlers.on_final {
        table.set(
            "final",
            Handler::finally(move |body, _| {
                let body = CString::new(body_text(body)).unwrap_or_default();
                on_final(user_data.get(), body.as_ptr());
            }),
        )?;
    }
    if let Some(on_error) = handlers.on_error {
        table.set(
            "onerror",
            Handler::error(move |failure: &Failure| {
                let message = CString::new(failure.to_string()).unwrap_or_default();
                on_error(
                    user_data.get(),
                    failure.kind().into(),
                    failure.status().unwrap_or(0),
                    message.as_ptr(),
                );
            }),
        )?;
    }
    Ok(table)
}

/// Route a host-executed response through `handlers`.
///
/// `handlers` may be null, in which case only the configuration's own
/// handlers run. Callbacks fire on the calling thread before this returns.
/// The caller must free the returned pointer with `yyf_free_outcome`.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_route_response(
    config: *const FfiConfig,
    response: *const FfiHttpResponse,
    handlers: *const FfiHandlers,
) -> *mut FfiOutcome {
    catch_unwind(AssertUnwindSafe(|| {
        if config.is_null() {
            return FfiOutcome::null_arg("config");
        }
        if response.is_null() {
            return FfiOutcome::null_arg("response");
        }
        let config = unsafe { &*config };
        let resp = unsafe { &*response };

        let table = if handlers.is_null() {
            HandlerTable::new()
        } else {
            match handler_table(&config.inner, unsafe { &*handlers }) {
                Ok(table) => table,
                Err(e) => return FfiOutcome::error(FfiErrorCode::from(&e), &e.to_string()),
            }
        };

        let outcome = Router::new(config.inner.clone(), table).route(ffi_response_to_core(resp));
        FfiOutcome::from_core(outcome)
    }))
    .unwrap_or_else(|_| FfiOutcome::panic("panic in yyf_route_response"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by `yyf_build_request`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        if !req.url.is_null() {
            drop(unsafe { CString::from_raw(req.url) });
        }
        if !req.body.is_null() {
            drop(unsafe { CString::from_raw(req.body) });
        }
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                if !h.key.is_null() {
                    drop(unsafe { CString::from_raw(h.key) });
                }
                if !h.value.is_null() {
                    drop(unsafe { CString::from_raw(h.value) });
                }
            }
        }
    });
}

/// Free an `FfiOutcome` returned by `yyf_route_response`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_free_outcome(outcome: *mut FfiOutcome) {
    if outcome.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let outcome = unsafe { Box::from_raw(outcome) };
        if !outcome.status.is_null() {
            drop(unsafe { CString::from_raw(outcome.status) });
        }
        if !outcome.error_message.is_null() {
            drop(unsafe { CString::from_raw(outcome.error_message) });
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn yyf_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
