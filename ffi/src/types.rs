//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! enums with explicit discriminants. Conversion functions live here to keep
//! `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use yyf_core::{Config, Error, FailureKind, HttpMethod, HttpRequest, Outcome};

/// Opaque handle to a configuration. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiConfig {
    pub(crate) inner: Arc<Config>,
}

/// Owned C string; interior NUL bytes yield an empty string.
pub(crate) fn c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Patch => FfiHttpMethod::Patch,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `yyf_build_request`. The C caller executes the request and
/// passes the response back through `yyf_route_response`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    /// Null when the request has no body.
    pub body: *mut c_char,
    pub is_async: bool,
    pub with_credentials: bool,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: HttpRequest) -> *mut Self {
        let body = match req.body {
            Some(b) => c_string(b),
            None => std::ptr::null_mut(),
        };

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: c_string(k),
                    value: c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url: c_string(req.url),
            headers,
            headers_len,
            body,
            is_async: req.is_async,
            with_credentials: req.with_credentials,
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this after executing a request, then passes a
/// pointer to `yyf_route_response`. The FFI layer reads but does not free
/// these fields. A `status` of 0 reports a transport failure; `body` then
/// carries the error message.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Callbacks invoked while a response is routed.
///
/// Every callback is optional and receives `user_data` first. String
/// arguments are borrowed for the duration of the call only.
#[repr(C)]
pub struct FfiHandlers {
    pub user_data: *mut c_void,
    /// Called with the resolved status name and the `data` field as JSON text.
    pub on_status:
        Option<extern "C" fn(user_data: *mut c_void, status: *const c_char, data: *const c_char)>,
    /// Called with the response body; returning `false` skips dispatch.
    pub ready: Option<extern "C" fn(user_data: *mut c_void, body: *const c_char) -> bool>,
    /// Called last for every 2xx response.
    pub on_final: Option<extern "C" fn(user_data: *mut c_void, body: *const c_char)>,
    pub on_error: Option<
        extern "C" fn(
            user_data: *mut c_void,
            kind: FfiFailureKind,
            http_status: u16,
            message: *const c_char,
        ),
    >,
}

/// `user_data` carried into handler closures.
///
/// Routing runs to completion inside `yyf_route_response`, on the caller's
/// thread, so the pointer never outlives the call that supplied it.
#[derive(Clone, Copy)]
pub(crate) struct UserData(*mut c_void);

unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub(crate) fn get(self) -> *mut c_void {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned by configuration calls and carried in `FfiOutcome`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NullArg = 1,
    InvalidConfig = 2,
    ReservedStatus = 3,
    UnsupportedMethod = 4,
    Serialization = 5,
    HandlerMismatch = 6,
    Panic = 7,
    Other = 8,
}

impl From<&Error> for FfiErrorCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::InvalidConfig(_) => FfiErrorCode::InvalidConfig,
            Error::ReservedStatus(_) => FfiErrorCode::ReservedStatus,
            Error::UnsupportedMethod(_) => FfiErrorCode::UnsupportedMethod,
            Error::Serialization(_) => FfiErrorCode::Serialization,
            Error::HandlerMismatch { .. } => FfiErrorCode::HandlerMismatch,
            Error::NoTransport | Error::CompletionLost => FfiErrorCode::Other,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiFailureKind {
    None = 0,
    Transport = 1,
    Http = 2,
    Format = 3,
}

impl From<FailureKind> for FfiFailureKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Transport => FfiFailureKind::Transport,
            FailureKind::Http(_) => FfiFailureKind::Http,
            FailureKind::Format => FfiFailureKind::Format,
        }
    }
}

/// Tag telling the caller which `FfiOutcome` fields are meaningful.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiOutcomeTag {
    /// `status` holds the resolved name; `handled` says whether a callback ran.
    Dispatched = 0,
    /// `status` holds the unmapped code as text.
    Unmapped = 1,
    Vetoed = 2,
    Opaque = 3,
    CatchAll = 4,
    /// `failure` and `http_status` describe what went wrong.
    Failed = 5,
    /// The call itself was rejected; see `error_code` and `error_message`.
    Error = 6,
}

/// Result of `yyf_route_response`. Free with `yyf_free_outcome`.
#[repr(C)]
pub struct FfiOutcome {
    pub tag: FfiOutcomeTag,
    pub status: *mut c_char,
    pub handled: bool,
    pub failure: FfiFailureKind,
    pub http_status: u16,
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
}

impl FfiOutcome {
    fn empty(tag: FfiOutcomeTag) -> Self {
        FfiOutcome {
            tag,
            status: std::ptr::null_mut(),
            handled: false,
            failure: FfiFailureKind::None,
            http_status: 0,
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
        }
    }

    pub(crate) fn from_core(outcome: Outcome) -> *mut Self {
        let result = match outcome {
            Outcome::Dispatched { status, handled } => FfiOutcome {
                status: c_string(status),
                handled,
                ..Self::empty(FfiOutcomeTag::Dispatched)
            },
            Outcome::Unmapped { code } => FfiOutcome {
                status: c_string(code),
                ..Self::empty(FfiOutcomeTag::Unmapped)
            },
            Outcome::Vetoed => Self::empty(FfiOutcomeTag::Vetoed),
            Outcome::Opaque => Self::empty(FfiOutcomeTag::Opaque),
            Outcome::CatchAll => Self::empty(FfiOutcomeTag::CatchAll),
            Outcome::Failed(kind) => FfiOutcome {
                failure: kind.into(),
                http_status: match kind {
                    FailureKind::Http(status) => status,
                    FailureKind::Transport | FailureKind::Format => 0,
                },
                ..Self::empty(FfiOutcomeTag::Failed)
            },
        };
        Box::into_raw(Box::new(result))
    }

    pub(crate) fn error(code: FfiErrorCode, message: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiOutcome {
            error_code: code,
            error_message: c_string(message),
            ..Self::empty(FfiOutcomeTag::Error)
        }))
    }

    /// Build an error outcome for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, &format!("null argument: {name}"))
    }

    /// Build an error outcome for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, msg)
    }
}
