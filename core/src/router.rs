//! Routes a completed request to its handlers.
//!
//! # Design
//! A request ends exactly once, in one of two ways:
//!
//! - **failure**: transport error or a status outside `200..300`. The
//!   `onerror` handler gets a `Failure`; the body is not parsed.
//! - **success**: the body is parsed as JSON (text that does not parse stays
//!   opaque). `ready` may veto routing; an object carrying the configured
//!   status field has its data field dispatched to the handler named by the
//!   code map; an object without it is a format failure. `final` runs last.
//!
//! A catch-all handler, when present, takes every 2xx response instead of
//! all of the above. `route` consumes the router, so handlers cannot fire a
//! second time for the same request.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Config;
use crate::error::TransportError;
use crate::handler::{HandlerTable, Scoped};
use crate::http::HttpResponse;

/// Response body after the best-effort JSON parse.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// Parse trimmed `text` as JSON, keeping it as text when that fails.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match serde_json::from_str(text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}

/// What the `onerror` handler is told.
#[derive(Debug, Clone)]
pub enum Failure {
    /// No response was obtained.
    Transport { error: TransportError },
    /// The server answered outside `200..300`.
    Http { response: HttpResponse },
    /// Valid JSON that is not an envelope with a status field.
    Format { response: HttpResponse, body: Value },
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::Transport { .. } => FailureKind::Transport,
            Failure::Http { response } => FailureKind::Http(response.status),
            Failure::Format { .. } => FailureKind::Format,
        }
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Failure::Transport { .. } => None,
            Failure::Http { response } | Failure::Format { response, .. } => Some(response),
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    /// The parsed body, for format failures.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Failure::Format { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Transport { error } => write!(f, "{error}"),
            Failure::Http { response } => write!(f, "HTTP {}: {}", response.status, response.body),
            Failure::Format { body, .. } => write!(f, "unrecognised response shape: {body}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Http(u16),
    Format,
}

/// What routing did with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The status resolved to `status`; `handled` is false when no handler
    /// was registered under that name.
    Dispatched { status: String, handled: bool },
    /// The status field held a code the map does not know.
    Unmapped { code: String },
    /// `ready` returned `false`.
    Vetoed,
    /// The body was not JSON, or was a JSON scalar, so nothing was routed.
    Opaque,
    /// The catch-all handler took the response.
    CatchAll,
    /// `onerror` was called.
    Failed(FailureKind),
}

/// Routes one response for one request.
pub struct Router {
    config: Arc<Config>,
    local: HandlerTable,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("local", &self.local).finish()
    }
}

impl Router {
    pub fn new(config: Arc<Config>, local: HandlerTable) -> Self {
        Self { config, local }
    }

    fn handlers(&self) -> Scoped<'_> {
        Scoped {
            local: &self.local,
            global: self.config.handles(),
        }
    }

    /// Deliver the request's single completion.
    pub fn route(self, result: Result<HttpResponse, TransportError>) -> Outcome {
        match result {
            Err(error) => self.fail(Failure::Transport { error }),
            Ok(response) if !response.is_success() => self.fail(Failure::Http { response }),
            Ok(response) => self.complete(response),
        }
    }

    fn fail(&self, failure: Failure) -> Outcome {
        let kind = failure.kind();
        tracing::debug!(?kind, "routing failure to onerror");
        if let Some(on_error) = self.handlers().error() {
            on_error(&failure);
        }
        Outcome::Failed(kind)
    }

    fn complete(&self, response: HttpResponse) -> Outcome {
        let handlers = self.handlers();
        if let Some(catch_all) = handlers.catch_all() {
            catch_all(&response);
            return Outcome::CatchAll;
        }

        let body = ResponseBody::parse(&response.body);
        let vetoed = handlers
            .ready()
            .is_some_and(|ready| !ready(&body, &response));

        let outcome = if vetoed {
            Outcome::Vetoed
        } else {
            self.dispatch(&body, &response)
        };

        if let Some(finally) = handlers.finally() {
            finally(&body, &response);
        }
        outcome
    }

    fn dispatch(&self, body: &ResponseBody, response: &HttpResponse) -> Outcome {
        let options = self.config.options();
        let value = match body {
            ResponseBody::Json(value @ (Value::Object(_) | Value::Array(_) | Value::Null)) => value,
            ResponseBody::Json(_) | ResponseBody::Text(_) => return Outcome::Opaque,
        };

        let Some(code) = value.get(&options.status) else {
            return self.fail(Failure::Format {
                response: response.clone(),
                body: value.clone(),
            });
        };

        let Some(status) = self.config.codes().resolve(code) else {
            tracing::warn!(%code, "status code has no name; nothing dispatched");
            return Outcome::Unmapped {
                code: code.to_string(),
            };
        };

        let data = value.get(&options.data).unwrap_or(&Value::Null);
        let handler = self.handlers().data(status);
        tracing::debug!(status, handled = handler.is_some(), "dispatching response");
        if let Some(handler) = handler {
            handler(data, response);
        }
        Outcome::Dispatched {
            status: status.to_string(),
            handled: handler.is_some(),
        }
    }
}
