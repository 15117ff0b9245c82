//! The dispatcher: configuration plus a transport.
//!
//! # Design
//! `Client` is cheap to clone: it holds an `Arc` of its `Config` and an
//! `Arc` of its transport. Configuration changes copy-on-write the shared
//! `Config`, so requests already in flight keep the snapshot they were built
//! with and clones made earlier are unaffected. Each verb call returns a
//! fresh `Request` carrying its own handler table.

use std::fmt;
use std::sync::Arc;

use crate::config::{Config, Setup};
use crate::error::Error;
use crate::handler::{CatchAllFn, Handler, HandlerTable};
use crate::http::{HttpMethod, HttpResponse};
use crate::request::Request;
use crate::transport::{Transport, UreqTransport};

#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(Config::default(), UreqTransport::default())
    }
}

impl Client {
    pub fn new(config: Config, transport: impl Transport) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    /// A client with default configuration and `root` as its prefix.
    pub fn with_root(root: &str, transport: impl Transport) -> Result<Self, Error> {
        let mut config = Config::new();
        config.configure(root)?;
        Ok(Self::new(config, transport))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the current configuration snapshot.
    pub fn config_snapshot(&self) -> Arc<Config> {
        self.config.clone()
    }

    pub fn configure(&mut self, setup: impl Into<Setup>) -> Result<&mut Self, Error> {
        Arc::make_mut(&mut self.config).configure(setup)?;
        Ok(self)
    }

    pub fn set_code(&mut self, code: i64, name: Option<&str>) -> Result<&mut Self, Error> {
        Arc::make_mut(&mut self.config).set_code(code, name)?;
        Ok(self)
    }

    pub fn set_handle(
        &mut self,
        name: impl Into<String>,
        handler: Handler,
    ) -> Result<&mut Self, Error> {
        Arc::make_mut(&mut self.config).set_handle(name, handler)?;
        Ok(self)
    }

    pub fn set_catch_all(
        &mut self,
        f: impl Fn(&HttpResponse) + Send + Sync + 'static,
    ) -> &mut Self {
        let f: CatchAllFn = Arc::new(f);
        Arc::make_mut(&mut self.config).set_catch_all(f);
        self
    }

    pub fn get_handle(&self, name: &str) -> Option<&Handler> {
        self.config.get_handle(name)
    }

    pub fn handles(&self) -> &HandlerTable {
        self.config.handles()
    }

    pub fn request(&self, method: HttpMethod, path: &str) -> Request {
        Request::new(self.config.clone(), self.transport.clone(), method, path)
    }

    pub fn get(&self, path: &str) -> Request {
        self.request(HttpMethod::Get, path)
    }

    pub fn post(&self, path: &str) -> Request {
        self.request(HttpMethod::Post, path)
    }

    pub fn put(&self, path: &str) -> Request {
        self.request(HttpMethod::Put, path)
    }

    pub fn patch(&self, path: &str) -> Request {
        self.request(HttpMethod::Patch, path)
    }

    pub fn delete(&self, path: &str) -> Request {
        self.request(HttpMethod::Delete, path)
    }
}
