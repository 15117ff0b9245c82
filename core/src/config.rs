//! Client configuration: options, status codes and default handlers.
//!
//! # Design
//! `Config` is an explicit value handed to the `Client` rather than a
//! process-wide singleton. It is changed only through `configure` and the
//! `set_*` methods, which merge key by key: an option, handler or code that
//! the update does not mention keeps its current value. `headers` is a
//! single option, so a new `headers` map replaces the old one. Headers keep
//! the order they were configured in.
//!
//! `Options` serializes with the short key names used in JSON configuration
//! documents (`async`, `type`, ...). Keys the library does not know are kept
//! verbatim in `extra`.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codes::{code_of, CodeMap};
use crate::error::Error;
use crate::handler::{CatchAllFn, Handler, HandlerTable, RESERVED};

/// How a request payload is written into the body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Encoding {
    /// `key=value&...`, percent-encoded.
    #[default]
    UrlEncoded,
    Json,
    /// `multipart/form-data`.
    Form,
    /// No encoding and no content type; the payload must already be text.
    Raw,
    /// Literal content type; the payload passes through untouched.
    ContentType(String),
}

impl From<String> for Encoding {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "urlencoded" | "url" => Encoding::UrlEncoded,
            "json" => Encoding::Json,
            "form" => Encoding::Form,
            "" => Encoding::Raw,
            _ => Encoding::ContentType(s),
        }
    }
}

impl From<&str> for Encoding {
    fn from(s: &str) -> Self {
        Encoding::from(s.to_string())
    }
}

impl From<Encoding> for String {
    fn from(e: Encoding) -> Self {
        match e {
            Encoding::UrlEncoded => "urlencoded".to_string(),
            Encoding::Json => "json".to_string(),
            Encoding::Form => "form".to_string(),
            Encoding::Raw => String::new(),
            Encoding::ContentType(s) => s,
        }
    }
}

/// Effective options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Prefix joined to every request path.
    pub root: String,
    #[serde(rename = "async")]
    pub is_async: bool,
    /// Send credentials on cross-origin requests.
    pub cookie: bool,
    #[serde(rename = "type")]
    pub encoding: Encoding,
    #[serde(deserialize_with = "header_values::deserialize")]
    pub headers: IndexMap<String, String>,
    /// Name of the response field holding the status code.
    pub status: String,
    /// Name of the response field holding the payload for handlers.
    pub data: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            root: String::new(),
            is_async: true,
            cookie: false,
            encoding: Encoding::UrlEncoded,
            headers: IndexMap::new(),
            status: "status".to_string(),
            data: "data".to_string(),
            extra: Map::new(),
        }
    }
}

impl Options {
    /// Apply every field present in `patch`, leaving the rest alone.
    pub fn merge(&mut self, patch: OptionsPatch) {
        if let Some(root) = patch.root {
            self.root = root;
        }
        if let Some(is_async) = patch.is_async {
            self.is_async = is_async;
        }
        if let Some(cookie) = patch.cookie {
            self.cookie = cookie;
        }
        if let Some(encoding) = patch.encoding {
            self.encoding = encoding;
        }
        if let Some(headers) = patch.headers {
            self.headers = headers;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(data) = patch.data {
            self.data = data;
        }
        for (key, value) in patch.extra {
            self.extra.insert(key, value);
        }
    }
}

/// A partial update to `Options`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default, rename = "async", skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<bool>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
    #[serde(
        default,
        deserialize_with = "header_values::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub headers: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn is_async(mut self, is_async: bool) -> Self {
        self.is_async = Some(is_async);
        self
    }

    pub fn cookie(mut self, cookie: bool) -> Self {
        self.cookie = Some(cookie);
        self
    }

    pub fn encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = Some(
            headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn status_field(mut self, field: impl Into<String>) -> Self {
        self.status = Some(field.into());
        self
    }

    pub fn data_field(mut self, field: impl Into<String>) -> Self {
        self.data = Some(field.into());
        self
    }

    /// Store a key the library does not interpret.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Argument to `Config::configure`.
///
/// Built from a root string, an `OptionsPatch`, a JSON document, or
/// assembled with the builder methods (options + handlers + codes).
#[derive(Debug, Clone, Default)]
pub struct Setup {
    pub options: OptionsPatch,
    pub handlers: HandlerTable,
    /// `(name, code)` pairs, applied in order.
    pub codes: Vec<(String, i64)>,
}

impl Setup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: OptionsPatch) -> Self {
        self.options = options;
        self
    }

    pub fn handler(mut self, name: impl Into<String>, handler: Handler) -> Result<Self, Error> {
        self.handlers.set(name, handler)?;
        Ok(self)
    }

    pub fn catch_all(mut self, f: CatchAllFn) -> Self {
        self.handlers.set_catch_all(f);
        self
    }

    pub fn code(mut self, name: impl Into<String>, code: i64) -> Self {
        self.codes.push((name.into(), code));
        self
    }

    /// Read a JSON configuration document.
    ///
    /// A string sets `root`. An object holding an `options`, `handle` or
    /// `code` object is the composite form; any other object is a flat
    /// options map. Handlers cannot be expressed in JSON, so a non-empty
    /// `handle` section is rejected.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let object = match value {
            Value::String(root) => return Ok(Setup::from(root.as_str())),
            Value::Object(object) => object,
            other => {
                return Err(Error::InvalidConfig(format!(
                    "expected a string or an object, got {other}"
                )))
            }
        };

        let composite = ["options", "handle", "code"]
            .iter()
            .any(|key| matches!(object.get(*key), Some(Value::Object(_))));
        if !composite {
            return Ok(Setup::from(parse_patch(value.clone())?));
        }

        let mut setup = Setup::new();
        if let Some(options) = object.get("options") {
            setup.options = parse_patch(options.clone())?;
        }
        if let Some(Value::Object(handle)) = object.get("handle") {
            if !handle.is_empty() {
                return Err(Error::InvalidConfig(
                    "handlers cannot be described in JSON".to_string(),
                ));
            }
        }
        if let Some(Value::Object(codes)) = object.get("code") {
            for (name, value) in codes {
                let code = code_of(value).ok_or_else(|| {
                    Error::InvalidConfig(format!("code for `{name}` is not an integer: {value}"))
                })?;
                setup.codes.push((name.clone(), code));
            }
        }
        Ok(setup)
    }

    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Self::from_json(&value)
    }
}

fn parse_patch(value: Value) -> Result<OptionsPatch, Error> {
    serde_json::from_value(value).map_err(|e| Error::InvalidConfig(e.to_string()))
}

impl From<&str> for Setup {
    fn from(root: &str) -> Self {
        Setup::new().options(OptionsPatch::new().root(root))
    }
}

impl From<String> for Setup {
    fn from(root: String) -> Self {
        Setup::new().options(OptionsPatch::new().root(root))
    }
}

impl From<OptionsPatch> for Setup {
    fn from(options: OptionsPatch) -> Self {
        Setup::new().options(options)
    }
}

/// Options, status codes and configuration-wide handlers.
#[derive(Clone)]
pub struct Config {
    options: Options,
    codes: CodeMap,
    handlers: HandlerTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            options: Options::default(),
            codes: CodeMap::default(),
            handlers: HandlerTable::with_defaults(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("options", &self.options)
            .field("codes", &self.codes)
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `setup` into this configuration.
    ///
    /// Nothing is applied if a code in `setup` names a reserved handler.
    pub fn configure(&mut self, setup: impl Into<Setup>) -> Result<&mut Self, Error> {
        let setup = setup.into();
        if let Some((name, _)) = setup
            .codes
            .iter()
            .find(|(name, _)| RESERVED.contains(&name.as_str()))
        {
            return Err(Error::ReservedStatus(name.clone()));
        }

        self.options.merge(setup.options);
        self.handlers.merge(setup.handlers);
        for (name, code) in setup.codes {
            self.codes.set(code, name);
        }
        tracing::debug!(root = %self.options.root, "configuration updated");
        Ok(self)
    }

    /// Map `code` to `name`, or remove the mapping for `code` when `name`
    /// is `None` or empty.
    pub fn set_code(&mut self, code: i64, name: Option<&str>) -> Result<&mut Self, Error> {
        if let Some(name) = name.filter(|n| RESERVED.contains(n)) {
            return Err(Error::ReservedStatus(name.to_string()));
        }
        self.codes.update(code, name);
        Ok(self)
    }

    pub fn set_handle(
        &mut self,
        name: impl Into<String>,
        handler: Handler,
    ) -> Result<&mut Self, Error> {
        self.handlers.set(name, handler)?;
        Ok(self)
    }

    pub fn set_catch_all(&mut self, f: CatchAllFn) -> &mut Self {
        self.handlers.set_catch_all(f);
        self
    }

    pub fn get_handle(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn handles(&self) -> &HandlerTable {
        &self.handlers
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn codes(&self) -> &CodeMap {
        &self.codes
    }
}

mod header_values {
    use indexmap::IndexMap;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Header maps in JSON may carry numbers and booleans; store them as text.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = IndexMap::<String, Value>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => Ok((name, s)),
                Value::Number(n) => Ok((name, n.to_string())),
                Value::Bool(b) => Ok((name, b.to_string())),
                other => Err(D::Error::custom(format!(
                    "header `{name}` must be a string, number or boolean, got {other}"
                ))),
            })
            .collect()
    }

    pub fn deserialize_opt<'de, D>(
        deserializer: D,
    ) -> Result<Option<IndexMap<String, String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let options = Options::default();
        assert_eq!(options.root, "");
        assert!(options.is_async);
        assert!(!options.cookie);
        assert_eq!(options.encoding, Encoding::UrlEncoded);
        assert_eq!(options.status, "status");
        assert_eq!(options.data, "data");
    }

    #[test]
    fn merge_is_key_scoped() {
        let mut config = Config::new();
        config
            .configure(Setup::from_json(&json!({"headers": {"a": 1}})).unwrap())
            .unwrap()
            .configure(OptionsPatch::new().cookie(true))
            .unwrap();
        assert_eq!(config.options().headers.get("a").map(String::as_str), Some("1"));
        assert!(config.options().cookie);
        assert!(config.options().is_async);
    }

    #[test]
    fn headers_keep_configured_order() {
        let mut config = Config::new();
        config
            .configure(Setup::from_json_str(r#"{"headers":{"Z-Last":"1","A-First":"2"}}"#).unwrap())
            .unwrap();
        let names: Vec<&str> = config.options().headers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Z-Last", "A-First"]);

        config
            .configure(OptionsPatch::new().headers([("b", "1"), ("a", "2")]))
            .unwrap();
        let names: Vec<&str> = config.options().headers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn string_setup_sets_root_only() {
        let mut config = Config::new();
        config.configure(OptionsPatch::new().cookie(true)).unwrap();
        config.configure("/api").unwrap();
        assert_eq!(config.options().root, "/api");
        assert!(config.options().cookie);
    }

    #[test]
    fn unknown_keys_pass_through() {
        let mut config = Config::new();
        config
            .configure(Setup::from_json(&json!({"debug": true, "retries": 3})).unwrap())
            .unwrap();
        assert_eq!(config.options().extra["debug"], json!(true));
        assert_eq!(config.options().extra["retries"], json!(3));
    }

    #[test]
    fn composite_json_applies_options_and_codes() {
        let setup = Setup::from_json(&json!({
            "options": {"root": "/v1", "type": "json", "async": false},
            "code": {"success": 200, "auth": 401}
        }))
        .unwrap();
        let mut config = Config::new();
        config.configure(setup).unwrap();

        assert_eq!(config.options().root, "/v1");
        assert_eq!(config.options().encoding, Encoding::Json);
        assert!(!config.options().is_async);
        assert_eq!(config.codes().name(200), Some("success"));
        assert_eq!(config.codes().name(1), None);
        assert_eq!(config.codes().code("auth"), Some(401));
        assert_eq!(config.codes().code("fail"), Some(0));
    }

    #[test]
    fn composite_json_rejects_handlers() {
        let err = Setup::from_json(&json!({"handle": {"success": "noop"}})).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn json_rejects_non_object() {
        assert!(matches!(
            Setup::from_json(&json!([1, 2])),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Setup::from_json(&json!({"headers": {"x": [1]}})),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn encoding_names_round_trip() {
        assert_eq!(Encoding::from("URL"), Encoding::UrlEncoded);
        assert_eq!(Encoding::from("Json"), Encoding::Json);
        assert_eq!(Encoding::from(""), Encoding::Raw);
        assert_eq!(
            Encoding::from("text/csv"),
            Encoding::ContentType("text/csv".to_string())
        );
        assert_eq!(String::from(Encoding::Form), "form");
    }

    #[test]
    fn reserved_code_names_are_rejected_atomically() {
        let mut config = Config::new();
        let setup = Setup::new()
            .options(OptionsPatch::new().root("/x"))
            .code("final", 9);
        let err = config.configure(setup).unwrap_err();
        assert!(matches!(err, Error::ReservedStatus(name) if name == "final"));
        assert_eq!(config.options().root, "");
        assert!(config.set_code(3, Some("onerror")).is_err());
    }

    #[test]
    fn set_code_and_remove() {
        let mut config = Config::new();
        config.set_code(2, Some("retry")).unwrap().set_code(2, Some("again")).unwrap();
        assert_eq!(config.codes().name(2), Some("again"));
        assert_eq!(config.codes().code("retry"), None);
        config.set_code(2, None).unwrap();
        assert_eq!(config.codes().name(2), None);
    }

    #[test]
    fn handlers_merge_into_defaults() {
        let mut config = Config::new();
        let setup = Setup::new()
            .handler("auth", Handler::data(|_, _| {}))
            .unwrap();
        config.configure(setup).unwrap();
        assert!(config.get_handle("auth").is_some());
        assert!(config.get_handle("success").is_some());
        assert!(config.get_handle("onerror").is_some());
    }

    #[test]
    fn options_serialize_with_short_keys() {
        let value = serde_json::to_value(Options::default()).unwrap();
        assert_eq!(value["async"], json!(true));
        assert_eq!(value["type"], json!("urlencoded"));
    }
}
