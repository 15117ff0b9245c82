//! The I/O seam: executing an `HttpRequest`.
//!
//! # Design
//! The core never opens sockets itself. A `Transport` turns one
//! `HttpRequest` into one `HttpResponse` (or a `TransportError`); any
//! `Fn(&HttpRequest) -> Result<HttpResponse, TransportError>` qualifies, which
//! keeps tests free of network access. `UreqTransport` is the blocking
//! implementation used outside tests.
//!
//! `is_async` only decides who waits: a synchronous request runs on the
//! caller's thread, an asynchronous one on a thread of its own that reports
//! its `Outcome` over a channel. There is no cancellation and no timeout.

use std::fmt;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use crate::error::{Error, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::router::{Outcome, Router};

/// Executes requests. Shared across threads by the client.
pub trait Transport: Send + Sync + 'static {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
{
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// HTTP error statuses come back as responses, not errors, so the router
/// sees them. `with_credentials` has no meaning outside a browser and is
/// ignored.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let body = request.body.as_deref().map(str::as_bytes);

        let result = match (request.method, body) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), headers).call(),
            (HttpMethod::Delete, None) => with_headers(self.agent.delete(url), headers).call(),
            (HttpMethod::Delete, Some(body)) => {
                with_headers(self.agent.delete(url), headers)
                    .force_send_body()
                    .send(body)
            }
            (HttpMethod::Post, Some(body)) => {
                with_headers(self.agent.post(url), headers).send(body)
            }
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => with_headers(self.agent.put(url), headers).send(body),
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), headers).send_empty(),
            (HttpMethod::Patch, Some(body)) => {
                with_headers(self.agent.patch(url), headers).send(body)
            }
            (HttpMethod::Patch, None) => with_headers(self.agent.patch(url), headers).send_empty(),
        };

        let mut response = result?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string()?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Completion of a sent request.
pub struct Pending {
    state: State,
}

enum State {
    Done(Outcome),
    Waiting(Receiver<Outcome>),
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Done(outcome) => f.debug_tuple("Pending::Done").field(outcome).finish(),
            State::Waiting(_) => f.write_str("Pending::Waiting"),
        }
    }
}

impl Pending {
    pub(crate) fn start(
        transport: Arc<dyn Transport>,
        request: HttpRequest,
        router: Router,
    ) -> Self {
        if !request.is_async {
            let outcome = router.route(transport.execute(&request));
            return Self {
                state: State::Done(outcome),
            };
        }

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let outcome = router.route(transport.execute(&request));
            // The caller may have dropped its `Pending`; handlers already ran.
            let _ = tx.send(outcome);
        });
        Self {
            state: State::Waiting(rx),
        }
    }

    /// Block until the request has been routed.
    pub fn wait(self) -> Result<Outcome, Error> {
        match self.state {
            State::Done(outcome) => Ok(outcome),
            State::Waiting(rx) => rx.recv().map_err(|_| Error::CompletionLost),
        }
    }

    /// The outcome if routing has finished, without blocking.
    pub fn try_outcome(&mut self) -> Result<Option<Outcome>, Error> {
        let outcome = match &self.state {
            State::Done(outcome) => outcome.clone(),
            State::Waiting(rx) => match rx.try_recv() {
                Ok(outcome) => outcome,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(Error::CompletionLost),
            },
        };
        self.state = State::Done(outcome.clone());
        Ok(Some(outcome))
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done(_))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::Config;
    use crate::handler::HandlerTable;
    use crate::router::FailureKind;

    fn request(is_async: bool) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: "/ping".to_string(),
            headers: Vec::new(),
            body: None,
            is_async,
            with_credentials: false,
        }
    }

    fn router() -> Router {
        Router::new(Arc::new(Config::new()), HandlerTable::new())
    }

    #[test]
    fn sync_request_completes_before_returning() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let transport = move |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
            *counter.lock().unwrap() += 1;
            Ok(HttpResponse::new(200, r#"{"status":1}"#))
        };
        let pending = Pending::start(Arc::new(transport), request(false), router());
        assert!(pending.is_done());
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(matches!(pending.wait().unwrap(), Outcome::Dispatched { .. }));
    }

    #[test]
    fn async_request_reports_over_channel() {
        let transport = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
            Err(TransportError::new("offline"))
        };
        let pending = Pending::start(Arc::new(transport), request(true), router());
        assert_eq!(pending.wait().unwrap(), Outcome::Failed(FailureKind::Transport));
    }

    #[test]
    fn try_outcome_caches_the_result() {
        let transport = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse::new(500, ""))
        };
        let mut pending = Pending::start(Arc::new(transport), request(true), router());
        let outcome = loop {
            if let Some(outcome) = pending.try_outcome().unwrap() {
                break outcome;
            }
            thread::yield_now();
        };
        assert_eq!(outcome, Outcome::Failed(FailureKind::Http(500)));
        assert!(pending.is_done());
        assert_eq!(pending.try_outcome().unwrap(), Some(outcome));
    }
}
