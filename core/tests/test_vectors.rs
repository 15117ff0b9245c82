//! Verify request building and response routing against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Each vector file describes a configuration, an input, and the expected
//! result. Routing vectors record the order in which handlers fire, so a
//! vector fails on a missing call as well as an extra one.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use yyf_core::{
    Config, FailureKind, Handler, HandlerTable, HttpMethod, HttpRequest, HttpResponse, Outcome,
    Request, Router, Setup, TransportError,
};

fn config_from(case: &Value) -> Arc<Config> {
    let mut config = Config::new();
    if let Some(setup) = case.get("config") {
        config.configure(Setup::from_json(setup).unwrap()).unwrap();
    }
    Arc::new(config)
}

/// Outcome in the shape the vectors spell it.
fn outcome_json(outcome: &Outcome) -> Value {
    match outcome {
        Outcome::Dispatched { status, handled } => {
            json!({ "dispatched": status, "handled": handled })
        }
        Outcome::Unmapped { code } => json!({ "unmapped": code }),
        Outcome::Vetoed => json!({ "vetoed": true }),
        Outcome::Opaque => json!({ "opaque": true }),
        Outcome::CatchAll => json!({ "catch_all": true }),
        Outcome::Failed(FailureKind::Transport) => json!({ "failed": "transport" }),
        Outcome::Failed(FailureKind::Format) => json!({ "failed": "format" }),
        Outcome::Failed(FailureKind::Http(status)) => json!({ "failed": status }),
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[test]
fn routing_test_vectors() {
    let raw = include_str!("../../test-vectors/routing.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let calls = Arc::new(Mutex::new(Vec::<String>::new()));
        let data = Arc::new(Mutex::new(None::<Value>));

        let mut handlers = HandlerTable::new();
        for status in ["success", "fail", "auth", "custom"] {
            let calls = calls.clone();
            let data = data.clone();
            handlers
                .set(
                    status,
                    Handler::data(move |value, _| {
                        calls.lock().unwrap().push(status.to_string());
                        *data.lock().unwrap() = Some(value.clone());
                    }),
                )
                .unwrap();
        }
        let log = calls.clone();
        handlers
            .set("final", Handler::finally(move |_, _| log.lock().unwrap().push("final".into())))
            .unwrap();
        let log = calls.clone();
        handlers
            .set("onerror", Handler::error(move |_| log.lock().unwrap().push("onerror".into())))
            .unwrap();
        if let Some(allow) = case["ready"].as_bool() {
            let log = calls.clone();
            handlers
                .set(
                    "ready",
                    Handler::ready(move |_, _| {
                        log.lock().unwrap().push("ready".into());
                        allow
                    }),
                )
                .unwrap();
        }

        let result = match case["transport_error"].as_str() {
            Some(message) => Err(TransportError::new(message)),
            None => {
                let response = &case["response"];
                Ok(HttpResponse::new(
                    response["status"].as_u64().unwrap() as u16,
                    response["body"].as_str().unwrap(),
                ))
            }
        };

        let outcome = Router::new(config_from(case), handlers).route(result);
        assert_eq!(outcome_json(&outcome), case["expected_outcome"], "{name}: outcome");

        let expected_calls: Vec<String> =
            serde_json::from_value(case["expected_calls"].clone()).unwrap();
        assert_eq!(*calls.lock().unwrap(), expected_calls, "{name}: calls");

        if let Some(expected) = case.get("expected_data") {
            assert_eq!(data.lock().unwrap().as_ref(), Some(expected), "{name}: data");
        }
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

#[test]
fn build_test_vectors() {
    let raw = include_str!("../../test-vectors/build.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let method: HttpMethod = case["method"].as_str().unwrap().parse().unwrap();
        let path = case["path"].as_str().unwrap();

        let mut request = Request::detached(config_from(case), method, path);
        if let Some(payload) = case.get("payload") {
            request = request.payload(payload.clone());
        }
        let built: HttpRequest = request.build().unwrap();

        let expected = &case["expected_request"];
        assert_eq!(built.method.as_str(), expected["method"], "{name}: method");
        assert_eq!(built.url, expected["url"].as_str().unwrap(), "{name}: url");

        let expected_headers: Vec<(String, String)> =
            serde_json::from_value(expected["headers"].clone()).unwrap();
        assert_eq!(built.headers, expected_headers, "{name}: headers");

        assert_eq!(built.body.as_deref(), expected["body"].as_str(), "{name}: body");
        assert_eq!(Value::Bool(built.is_async), expected["is_async"], "{name}: is_async");
        assert_eq!(
            Value::Bool(built.with_credentials),
            expected["with_credentials"],
            "{name}: with_credentials"
        );
    }
}
