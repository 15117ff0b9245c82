//! Handler table: named callbacks invoked by the router.
//!
//! # Design
//! Every handler lives under a name. Status names (`success`, `fail`,
//! `auth`, or anything mapped in the `CodeMap`) take a `Data` handler. Four
//! names are reserved for lifecycle hooks, each with its own signature:
//! `ready`, `final`, `onerror` and `before`. The kind is checked when the
//! handler is registered, so a mismatch fails at configuration time instead
//! of surfacing on the first response.
//!
//! Tables exist at two scopes, configuration-wide and per request; lookups
//! go through `Scoped`, which prefers the per-request entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;
use crate::http::HttpResponse;
use crate::request::Outgoing;
use crate::router::{Failure, ResponseBody};

pub const SUCCESS: &str = "success";
pub const FAIL: &str = "fail";
pub const AUTH: &str = "auth";

pub const READY: &str = "ready";
pub const FINAL: &str = "final";
pub const ON_ERROR: &str = "onerror";
pub const BEFORE: &str = "before";

/// Names that belong to lifecycle hooks rather than status codes.
pub const RESERVED: [&str; 4] = [READY, FINAL, ON_ERROR, BEFORE];

/// Receives the envelope's data field and the raw response.
pub type DataFn = Arc<dyn Fn(&Value, &HttpResponse) + Send + Sync>;
/// Sees the parsed body first; returning `false` vetoes status routing.
pub type ReadyFn = Arc<dyn Fn(&ResponseBody, &HttpResponse) -> bool + Send + Sync>;
/// Observes the parsed body after routing, whatever happened.
pub type FinalFn = Arc<dyn Fn(&ResponseBody, &HttpResponse) + Send + Sync>;
pub type ErrorFn = Arc<dyn Fn(&Failure) + Send + Sync>;
/// Rewrites the outgoing request before it is encoded.
pub type BeforeFn = Arc<dyn Fn(&mut Outgoing) + Send + Sync>;
/// Takes over every 2xx response in place of envelope routing.
pub type CatchAllFn = Arc<dyn Fn(&HttpResponse) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Data,
    Ready,
    Final,
    Error,
    Before,
}

impl HandlerKind {
    /// The kind a handler registered under `name` must have.
    pub fn for_name(name: &str) -> Self {
        match name {
            READY => HandlerKind::Ready,
            FINAL => HandlerKind::Final,
            ON_ERROR => HandlerKind::Error,
            BEFORE => HandlerKind::Before,
            _ => HandlerKind::Data,
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandlerKind::Data => "data",
            HandlerKind::Ready => "ready",
            HandlerKind::Final => "final",
            HandlerKind::Error => "error",
            HandlerKind::Before => "before",
        };
        f.write_str(s)
    }
}

/// A callback of one of the five kinds.
#[derive(Clone)]
pub enum Handler {
    Data(DataFn),
    Ready(ReadyFn),
    Final(FinalFn),
    Error(ErrorFn),
    Before(BeforeFn),
}

impl Handler {
    pub fn data(f: impl Fn(&Value, &HttpResponse) + Send + Sync + 'static) -> Self {
        Handler::Data(Arc::new(f))
    }

    pub fn ready(f: impl Fn(&ResponseBody, &HttpResponse) -> bool + Send + Sync + 'static) -> Self {
        Handler::Ready(Arc::new(f))
    }

    pub fn finally(f: impl Fn(&ResponseBody, &HttpResponse) + Send + Sync + 'static) -> Self {
        Handler::Final(Arc::new(f))
    }

    pub fn error(f: impl Fn(&Failure) + Send + Sync + 'static) -> Self {
        Handler::Error(Arc::new(f))
    }

    pub fn before(f: impl Fn(&mut Outgoing) + Send + Sync + 'static) -> Self {
        Handler::Before(Arc::new(f))
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Handler::Data(_) => HandlerKind::Data,
            Handler::Ready(_) => HandlerKind::Ready,
            Handler::Final(_) => HandlerKind::Final,
            Handler::Error(_) => HandlerKind::Error,
            Handler::Before(_) => HandlerKind::Before,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.kind())
    }
}

/// Handlers keyed by name, plus an optional catch-all.
#[derive(Clone, Default)]
pub struct HandlerTable {
    named: HashMap<String, Handler>,
    catch_all: Option<CatchAllFn>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration-wide defaults: inert `success`/`fail`, and an `onerror`
    /// that logs the failure.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.insert(SUCCESS, Handler::data(|_, _| {}));
        table.insert(FAIL, Handler::data(|_, _| {}));
        table.insert(
            ON_ERROR,
            Handler::error(|failure| {
                tracing::error!(status = ?failure.status(), "request failed: {failure}");
            }),
        );
        table
    }

    /// Register `handler` under `name`, checking its kind first.
    pub fn set(&mut self, name: impl Into<String>, handler: Handler) -> Result<(), Error> {
        let name = name.into();
        let expected = HandlerKind::for_name(&name);
        if handler.kind() != expected {
            return Err(Error::HandlerMismatch {
                name,
                expected,
                actual: handler.kind(),
            });
        }
        self.insert(name, handler);
        Ok(())
    }

    /// Unchecked insert for names whose kind is known statically.
    pub(crate) fn insert(&mut self, name: impl Into<String>, handler: Handler) {
        self.named.insert(name.into(), handler);
    }

    pub fn remove(&mut self, name: &str) -> Option<Handler> {
        self.named.remove(name)
    }

    pub fn set_catch_all(&mut self, f: CatchAllFn) {
        self.catch_all = Some(f);
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.named.get(name)
    }

    pub fn catch_all(&self) -> Option<&CatchAllFn> {
        self.catch_all.as_ref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.catch_all.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Handler)> {
        self.named.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into `self` name by name; a catch-all in `other` wins.
    pub fn merge(&mut self, other: HandlerTable) {
        self.named.extend(other.named);
        if other.catch_all.is_some() {
            self.catch_all = other.catch_all;
        }
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.named.keys().collect();
        names.sort();
        f.debug_struct("HandlerTable")
            .field("named", &names)
            .field("catch_all", &self.catch_all.is_some())
            .finish()
    }
}

/// Per-request table layered over the configuration-wide one.
#[derive(Clone, Copy)]
pub(crate) struct Scoped<'a> {
    pub local: &'a HandlerTable,
    pub global: &'a HandlerTable,
}

impl<'a> Scoped<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Handler> {
        self.local.get(name).or_else(|| self.global.get(name))
    }

    pub fn data(&self, name: &str) -> Option<&'a DataFn> {
        match self.get(name) {
            Some(Handler::Data(f)) => Some(f),
            _ => None,
        }
    }

    pub fn ready(&self) -> Option<&'a ReadyFn> {
        match self.get(READY) {
            Some(Handler::Ready(f)) => Some(f),
            _ => None,
        }
    }

    pub fn finally(&self) -> Option<&'a FinalFn> {
        match self.get(FINAL) {
            Some(Handler::Final(f)) => Some(f),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&'a ErrorFn> {
        match self.get(ON_ERROR) {
            Some(Handler::Error(f)) => Some(f),
            _ => None,
        }
    }

    pub fn before(&self) -> Option<&'a BeforeFn> {
        match self.get(BEFORE) {
            Some(Handler::Before(f)) => Some(f),
            _ => None,
        }
    }

    pub fn catch_all(&self) -> Option<&'a CatchAllFn> {
        self.local.catch_all().or_else(|| self.global.catch_all())
    }
}
