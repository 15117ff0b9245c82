//! Bijective map between numeric response codes and status names.
//!
//! # Design
//! Routing resolves a code to a handler name on every response, and
//! configuration looks codes up by name. Both directions are stored, but the
//! only way to change them is `set`/`remove`, which update both sides in one
//! step so the map can never hold two names for one code or two codes for
//! one name.

use std::collections::HashMap;

use serde_json::Value;

/// Partial bijection `code <-> name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMap {
    by_code: HashMap<i64, String>,
    by_name: HashMap<String, i64>,
}

impl Default for CodeMap {
    /// `1 -> success`, `0 -> fail`, `-1 -> auth`.
    fn default() -> Self {
        let mut map = Self::empty();
        map.set(1, "success");
        map.set(0, "fail");
        map.set(-1, "auth");
        map
    }
}

impl CodeMap {
    pub fn empty() -> Self {
        Self {
            by_code: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Map `code` to `name`, evicting any entry that used either side.
    pub fn set(&mut self, code: i64, name: impl Into<String>) {
        let name = name.into();
        if let Some(old_name) = self.by_code.remove(&code) {
            self.by_name.remove(&old_name);
        }
        if let Some(old_code) = self.by_name.remove(&name) {
            self.by_code.remove(&old_code);
        }
        self.by_code.insert(code, name.clone());
        self.by_name.insert(name, code);
    }

    /// Drop the entry for `code`, returning the name it had.
    pub fn remove(&mut self, code: i64) -> Option<String> {
        let name = self.by_code.remove(&code)?;
        self.by_name.remove(&name);
        Some(name)
    }

    /// `Some(name)` sets, `None` or an empty name removes.
    pub fn update(&mut self, code: i64, name: Option<&str>) {
        match name {
            Some(name) if !name.is_empty() => self.set(code, name),
            _ => {
                self.remove(code);
            }
        }
    }

    pub fn name(&self, code: i64) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    pub fn code(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    /// Resolve a status field taken from a response body.
    ///
    /// Accepts integers, integral floats and numeric strings, since servers
    /// disagree on how they spell the code.
    pub fn resolve(&self, value: &Value) -> Option<&str> {
        self.name(code_of(value)?)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.by_code.iter().map(|(code, name)| (*code, name.as_str()))
    }

    /// Names in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

/// Numeric code carried by a JSON status field, if it has one.
pub fn code_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_cover_success_fail_auth() {
        let map = CodeMap::default();
        assert_eq!(map.name(1), Some("success"));
        assert_eq!(map.name(0), Some("fail"));
        assert_eq!(map.name(-1), Some("auth"));
        assert_eq!(map.code("auth"), Some(-1));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn reassigning_a_code_evicts_the_old_name() {
        let mut map = CodeMap::default();
        map.set(2, "retry");
        map.set(2, "again");
        assert_eq!(map.name(2), Some("again"));
        assert_eq!(map.code("retry"), None);
        assert_eq!(map.code("again"), Some(2));
    }

    #[test]
    fn reassigning_a_name_evicts_the_old_code() {
        let mut map = CodeMap::default();
        map.set(200, "success");
        assert_eq!(map.code("success"), Some(200));
        assert_eq!(map.name(1), None);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn update_without_name_removes() {
        let mut map = CodeMap::default();
        map.update(0, None);
        assert_eq!(map.name(0), None);
        assert_eq!(map.code("fail"), None);

        map.update(-1, Some(""));
        assert_eq!(map.code("auth"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn removing_unknown_code_is_a_no_op() {
        let mut map = CodeMap::default();
        assert_eq!(map.remove(42), None);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn both_directions_agree_after_churn() {
        let mut map = CodeMap::default();
        map.set(1, "fail");
        map.set(5, "success");
        map.set(-1, "success");
        map.remove(1);
        for (code, name) in map.iter() {
            assert_eq!(map.code(name), Some(code));
        }
        for name in map.names() {
            assert_eq!(map.name(map.code(name).unwrap()), Some(name));
        }
    }

    #[test]
    fn resolve_accepts_numeric_spellings() {
        let map = CodeMap::default();
        assert_eq!(map.resolve(&json!(1)), Some("success"));
        assert_eq!(map.resolve(&json!(1.0)), Some("success"));
        assert_eq!(map.resolve(&json!("-1")), Some("auth"));
        assert_eq!(map.resolve(&json!(1.5)), None);
        assert_eq!(map.resolve(&json!(true)), None);
        assert_eq!(map.resolve(&json!(7)), None);
    }
}
