//! REST dispatch client.
//!
//! # Overview
//! Wraps an HTTP transport with a configuration object, REST-verb
//! shortcuts, and a response router: JSON envelopes of the form
//! `{"status": <code>, "data": <payload>}` are dispatched to the handler
//! named by the code (`1 -> success`, `0 -> fail`, `-1 -> auth` unless
//! configured otherwise).
//!
//! # Design
//! - Host-does-IO: a `Request` becomes a plain-data `HttpRequest`, and a
//!   plain-data `HttpResponse` goes to a `Router`. `Transport` sits between
//!   them; `UreqTransport` is the stock implementation, and hosts can drive
//!   `Request::prepare` themselves.
//! - `Config` is an explicit value owned by the `Client`; changes merge key
//!   by key and copy-on-write so in-flight requests keep their snapshot.
//! - `Client` issues requests; `Request` carries one call's overrides and
//!   handlers. The two are separate types.
//! - The status-code map is a single bijective type; both directions change
//!   together.

pub mod client;
pub mod codes;
pub mod config;
pub mod encode;
pub mod error;
pub mod handler;
pub mod http;
pub mod plugin;
pub mod request;
pub mod router;
pub mod transport;

pub use client::Client;
pub use codes::CodeMap;
pub use config::{Config, Encoding, Options, OptionsPatch, Setup};
pub use encode::Payload;
pub use error::{Error, TransportError};
pub use handler::{Handler, HandlerKind, HandlerTable};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use plugin::Host;
pub use request::{Outgoing, Request};
pub use router::{Failure, FailureKind, Outcome, ResponseBody, Router};
pub use transport::{Pending, Transport, UreqTransport};
