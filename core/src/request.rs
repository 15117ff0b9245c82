//! Per-request builder.
//!
//! # Design
//! A `Request` collects one call's overrides (payload, async flag,
//! encoding) and its own handler table, then turns into exactly one
//! `HttpRequest` plus the `Router` that will receive its completion.
//! Handlers are attached before anything is sent, so a synchronous
//! completion always finds them.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{Config, Encoding};
use crate::encode::{self, Payload};
use crate::error::Error;
use crate::handler::{self, Handler, HandlerTable, Scoped};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::router::{Failure, ResponseBody, Router};
use crate::transport::{Pending, Transport};

/// Mutable view of a request handed to `before` hooks.
///
/// Runs after the root prefix is applied and before the payload is encoded
/// (or moved into the query string for GET).
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub method: HttpMethod,
    pub url: String,
    /// Copy of the configured headers; changes apply to this request only.
    pub headers: Vec<(String, String)>,
    pub payload: Option<Payload>,
}

/// One call: builder for the request and its handlers.
pub struct Request {
    config: Arc<Config>,
    transport: Option<Arc<dyn Transport>>,
    method: HttpMethod,
    path: String,
    payload: Option<Payload>,
    is_async: Option<bool>,
    encoding: Option<Encoding>,
    handlers: HandlerTable,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("payload", &self.payload)
            .field("is_async", &self.is_async)
            .field("encoding", &self.encoding)
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl Request {
    pub(crate) fn new(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        method: HttpMethod,
        path: &str,
    ) -> Self {
        let mut request = Self::detached(config, method, path);
        request.transport = Some(transport);
        request
    }

    /// A request with no transport, for hosts that execute `prepare`'s
    /// `HttpRequest` themselves and hand the response to the `Router`.
    pub fn detached(config: Arc<Config>, method: HttpMethod, path: &str) -> Self {
        Self {
            config,
            transport: None,
            method,
            path: path.to_string(),
            payload: None,
            is_async: None,
            encoding: None,
            handlers: HandlerTable::new(),
        }
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn is_async(mut self, is_async: bool) -> Self {
        self.is_async = Some(is_async);
        self
    }

    /// Shorthand for `is_async(false)`.
    pub fn sync(self) -> Self {
        self.is_async(false)
    }

    pub fn encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn success(self, f: impl Fn(&Value, &HttpResponse) + Send + Sync + 'static) -> Self {
        self.with(handler::SUCCESS, Handler::data(f))
    }

    pub fn fail(self, f: impl Fn(&Value, &HttpResponse) + Send + Sync + 'static) -> Self {
        self.with(handler::FAIL, Handler::data(f))
    }

    pub fn auth(self, f: impl Fn(&Value, &HttpResponse) + Send + Sync + 'static) -> Self {
        self.with(handler::AUTH, Handler::data(f))
    }

    pub fn ready(
        self,
        f: impl Fn(&ResponseBody, &HttpResponse) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.with(handler::READY, Handler::ready(f))
    }

    pub fn finally(self, f: impl Fn(&ResponseBody, &HttpResponse) + Send + Sync + 'static) -> Self {
        self.with(handler::FINAL, Handler::finally(f))
    }

    pub fn on_error(self, f: impl Fn(&Failure) + Send + Sync + 'static) -> Self {
        self.with(handler::ON_ERROR, Handler::error(f))
    }

    pub fn before(self, f: impl Fn(&mut Outgoing) + Send + Sync + 'static) -> Self {
        self.with(handler::BEFORE, Handler::before(f))
    }

    pub fn catch_all(mut self, f: impl Fn(&HttpResponse) + Send + Sync + 'static) -> Self {
        self.handlers.set_catch_all(Arc::new(f));
        self
    }

    /// Data handler for a custom status name.
    pub fn on_status(
        self,
        name: &str,
        f: impl Fn(&Value, &HttpResponse) + Send + Sync + 'static,
    ) -> Result<Self, Error> {
        self.set_handle(name, Handler::data(f))
    }

    pub fn set_handle(mut self, name: &str, handler: Handler) -> Result<Self, Error> {
        self.handlers.set(name, handler)?;
        Ok(self)
    }

    /// This request's handler for `name`, else the configured one.
    pub fn get_handle(&self, name: &str) -> Option<&Handler> {
        self.scoped().get(name)
    }

    /// Handlers registered on this request only.
    pub fn handles(&self) -> &HandlerTable {
        &self.handlers
    }

    fn with(mut self, name: &str, handler: Handler) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    fn scoped(&self) -> Scoped<'_> {
        Scoped {
            local: &self.handlers,
            global: self.config.handles(),
        }
    }

    /// The `HttpRequest` this call would send.
    pub fn build(&self) -> Result<HttpRequest, Error> {
        let options = self.config.options();
        let is_async = self.is_async.unwrap_or(options.is_async);
        let encoding = self.encoding.as_ref().unwrap_or(&options.encoding);

        let mut outgoing = Outgoing {
            method: self.method,
            url: join_root(&options.root, &self.path),
            headers: options
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            payload: self.payload.clone(),
        };
        if let Some(before) = self.scoped().before() {
            before(&mut outgoing);
        }

        let Outgoing {
            method,
            mut url,
            headers: configured,
            payload,
        } = outgoing;

        let mut payload = payload.filter(|p| !p.is_empty());
        if method == HttpMethod::Get {
            if let Some(payload) = payload.take() {
                append_query(&mut url, payload);
            }
        }

        let mut headers = Vec::new();
        let body = match payload {
            Some(payload) => {
                let encoded = encode::encode(encoding, payload)?;
                let overridden = configured
                    .iter()
                    .any(|(k, _)| k.eq_ignore_ascii_case("content-type"));
                if let Some(content_type) = encoded.content_type.filter(|_| !overridden) {
                    headers.push(("Content-Type".to_string(), content_type));
                }
                Some(encoded.body)
            }
            None => None,
        };
        headers.extend(configured);

        let request = HttpRequest {
            method,
            url,
            headers,
            body,
            is_async,
            with_credentials: options.cookie,
        };
        tracing::debug!(method = %request.method, url = %request.url, is_async, "built request");
        Ok(request)
    }

    /// Split into the request to execute and the router for its response.
    pub fn prepare(self) -> Result<(HttpRequest, Router), Error> {
        let request = self.build()?;
        Ok((request, Router::new(self.config, self.handlers)))
    }

    /// Execute through the client's transport.
    ///
    /// Synchronous requests complete before this returns; asynchronous ones
    /// run on their own thread and report through the returned `Pending`.
    pub fn send(mut self) -> Result<Pending, Error> {
        let transport = self.transport.take().ok_or(Error::NoTransport)?;
        let (request, router) = self.prepare()?;
        Ok(Pending::start(transport, request, router))
    }
}

/// Join `root` and `path`, collapsing the one duplicate `/` at the seam.
pub fn join_root(root: &str, path: &str) -> String {
    match (root.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{root}{}", &path[1..]),
        _ => format!("{root}{path}"),
    }
}

fn append_query(url: &mut String, payload: Payload) {
    let query = match payload {
        Payload::Fields(fields) => encode::urlencode(&fields),
        Payload::Text(text) => text,
    };
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(&query);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptionsPatch;
    use crate::encode::{JSON_CONTENT_TYPE, URLENCODED_CONTENT_TYPE};
    use serde_json::json;

    fn config_with(patch: OptionsPatch) -> Arc<Config> {
        let mut config = Config::new();
        config.configure(patch).unwrap();
        Arc::new(config)
    }

    fn request(config: &Arc<Config>, method: HttpMethod, path: &str) -> Request {
        Request::detached(config.clone(), method, path)
    }

    #[test]
    fn get_moves_payload_into_query() {
        let config = Arc::new(Config::new());
        let built = request(&config, HttpMethod::Get, "/search")
            .payload(json!({"q": "x"}))
            .build()
            .unwrap();
        assert!(built.body.is_none());
        assert!(built.url.ends_with("?q=x"));
        assert!(built.header("content-type").is_none());
    }

    #[test]
    fn get_appends_to_existing_query() {
        let config = Arc::new(Config::new());
        let built = request(&config, HttpMethod::Get, "/search?page=2")
            .payload(json!({"q": "a b"}))
            .build()
            .unwrap();
        assert_eq!(built.url, "/search?page=2&q=a%20b");
    }

    #[test]
    fn post_is_urlencoded_by_default() {
        let config = Arc::new(Config::new());
        let built = request(&config, HttpMethod::Post, "/users")
            .payload(json!({"a": 1, "b": "x y"}))
            .build()
            .unwrap();
        assert_eq!(built.body.as_deref(), Some("a=1&b=x%20y"));
        assert_eq!(built.header("Content-Type"), Some(URLENCODED_CONTENT_TYPE));
    }

    #[test]
    fn per_call_encoding_overrides_configuration() {
        let config = Arc::new(Config::new());
        let built = request(&config, HttpMethod::Put, "/users/1")
            .payload(json!({"name": "ann"}))
            .encoding(Encoding::Json)
            .build()
            .unwrap();
        assert_eq!(built.body.as_deref(), Some(r#"{"name":"ann"}"#));
        assert_eq!(built.header("content-type"), Some(JSON_CONTENT_TYPE));
    }

    #[test]
    fn root_join_collapses_one_separator() {
        assert_eq!(join_root("/api/", "/users"), "/api/users");
        assert_eq!(join_root("http://h/api", "/users"), "http://h/api/users");
        assert_eq!(join_root("", "/users"), "/users");
        assert_eq!(join_root("/api//", "//users"), "/api///users");
    }

    #[test]
    fn options_flow_into_the_request() {
        let config = config_with(
            OptionsPatch::new()
                .root("http://host/api/")
                .is_async(false)
                .cookie(true)
                .headers([("X-Token", "t")]),
        );
        let built = request(&config, HttpMethod::Delete, "/users/1").build().unwrap();
        assert_eq!(built.url, "http://host/api/users/1");
        assert!(!built.is_async);
        assert!(built.with_credentials);
        assert_eq!(built.header("x-token"), Some("t"));
        assert!(built.body.is_none());
    }

    #[test]
    fn per_call_async_overrides_configuration() {
        let config = config_with(OptionsPatch::new().is_async(false));
        let built = request(&config, HttpMethod::Get, "/").is_async(true).build().unwrap();
        assert!(built.is_async);
    }

    #[test]
    fn configured_content_type_wins() {
        let config = config_with(OptionsPatch::new().headers([("content-type", "text/plain")]));
        let built = request(&config, HttpMethod::Post, "/")
            .payload("raw")
            .build()
            .unwrap();
        let content_types: Vec<_> = built
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(built.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn before_hook_can_rewrite_payload_and_headers() {
        let mut config = Config::new();
        config
            .set_handle(
                "before",
                Handler::before(|outgoing| {
                    outgoing.headers.push(("X-Signed".to_string(), "yes".to_string()));
                    outgoing.payload = Some(Payload::from(json!({"replaced": true})));
                }),
            )
            .unwrap();
        let config = Arc::new(config);
        let built = request(&config, HttpMethod::Post, "/")
            .payload(json!({"original": 1}))
            .build()
            .unwrap();
        assert_eq!(built.body.as_deref(), Some("replaced=true"));
        assert_eq!(built.header("x-signed"), Some("yes"));
        assert!(config.options().headers.is_empty());
    }

    #[test]
    fn per_request_before_hook_sees_prefixed_url() {
        let config = config_with(OptionsPatch::new().root("/v2"));
        let built = request(&config, HttpMethod::Get, "/ping")
            .before(|outgoing| {
                assert_eq!(outgoing.url, "/v2/ping");
                outgoing.url.push_str("?trace=1");
            })
            .build()
            .unwrap();
        assert_eq!(built.url, "/v2/ping?trace=1");
    }

    #[test]
    fn empty_payload_sends_no_body() {
        let config = Arc::new(Config::new());
        let built = request(&config, HttpMethod::Post, "/")
            .payload(json!({}))
            .build()
            .unwrap();
        assert!(built.body.is_none());
        assert!(built.header("content-type").is_none());
    }

    #[test]
    fn handler_lookup_falls_back_to_configuration() {
        let config = Arc::new(Config::new());
        let req = request(&config, HttpMethod::Get, "/").success(|_, _| {});
        assert!(req.handles().contains("success"));
        assert!(!req.handles().contains("onerror"));
        assert!(matches!(req.get_handle("onerror"), Some(Handler::Error(_))));
    }

    #[test]
    fn on_status_rejects_reserved_names() {
        let config = Arc::new(Config::new());
        let err = request(&config, HttpMethod::Get, "/")
            .on_status("final", |_, _| {})
            .unwrap_err();
        assert!(matches!(err, Error::HandlerMismatch { .. }));
    }

    #[test]
    fn detached_request_cannot_send() {
        let config = Arc::new(Config::new());
        let err = request(&config, HttpMethod::Get, "/").send().unwrap_err();
        assert!(matches!(err, Error::NoTransport));
    }
}
