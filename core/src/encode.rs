//! Payload encoding for request bodies and GET query strings.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::Encoding;
use crate::error::Error;

pub const URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Data attached to a request.
///
/// `Fields` is encoded according to the request's `Encoding`; `Text` is
/// already encoded and is sent as is.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Fields(Map<String, Value>),
    Text(String),
}

impl Payload {
    /// Serialize any value; objects become `Fields`, strings become `Text`,
    /// everything else becomes its JSON text.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        Ok(Payload::from(serde_json::to_value(value)?))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Fields(fields) => fields.is_empty(),
            Payload::Text(text) => text.is_empty(),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Payload::Fields(fields),
            Value::String(text) => Payload::Text(text),
            other => Payload::Text(other.to_string()),
        }
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(fields: Map<String, Value>) -> Self {
        Payload::Fields(fields)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Payload::Fields(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A body ready to send, with the content type the encoder chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub content_type: Option<String>,
    pub body: String,
}

/// Encode `payload` as a request body.
pub fn encode(encoding: &Encoding, payload: Payload) -> Result<Encoded, Error> {
    let boundary = format!("----yyf{}", Uuid::new_v4().simple());
    encode_with_boundary(encoding, payload, &boundary)
}

/// `encode` with a caller-chosen multipart boundary.
pub fn encode_with_boundary(
    encoding: &Encoding,
    payload: Payload,
    boundary: &str,
) -> Result<Encoded, Error> {
    let encoded = match (encoding, payload) {
        (Encoding::UrlEncoded, payload) => Encoded {
            content_type: Some(URLENCODED_CONTENT_TYPE.to_string()),
            body: match payload {
                Payload::Fields(fields) => urlencode(&fields),
                Payload::Text(text) => text,
            },
        },
        (Encoding::Json, payload) => Encoded {
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            body: match payload {
                Payload::Fields(fields) => serde_json::to_string(&fields)?,
                Payload::Text(text) => text,
            },
        },
        (Encoding::Form, Payload::Fields(fields)) => Encoded {
            content_type: Some(format!("multipart/form-data; boundary={boundary}")),
            body: multipart(&fields, boundary),
        },
        (Encoding::Form, Payload::Text(text)) | (Encoding::Raw, Payload::Text(text)) => Encoded {
            content_type: None,
            body: text,
        },
        (Encoding::Raw, Payload::Fields(fields)) => Encoded {
            content_type: None,
            body: serde_json::to_string(&fields)?,
        },
        (Encoding::ContentType(content_type), payload) => Encoded {
            content_type: Some(content_type.clone()),
            body: match payload {
                Payload::Fields(fields) => serde_json::to_string(&fields)?,
                Payload::Text(text) => text,
            },
        },
    };
    Ok(encoded)
}

/// `k=v&...` in insertion order, both sides percent-encoded.
pub fn urlencode(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&field_text(value))
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// `multipart/form-data` body with one part per field.
pub fn multipart(fields: &Map<String, Value>, boundary: &str) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str("--");
        body.push_str(boundary);
        body.push_str("\r\n");
        body.push_str(&format!(
            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
            escape_name(name)
        ));
        body.push_str(&field_text(value));
        body.push_str("\r\n");
    }
    body.push_str("--");
    body.push_str(boundary);
    body.push_str("--\r\n");
    body
}

/// Field name as it may appear inside a quoted header parameter.
fn escape_name(name: &str) -> String {
    name.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Strings verbatim, other values as JSON text.
fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
