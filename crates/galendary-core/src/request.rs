//! Command requests and parameter access.
//!
//! A request is a flat map of string keys to text-or-null values. Transports that
//! cannot express null send [`NULL_SENTINEL`] instead; [`Request::normalize_nulls`]
//! turns those into real nulls before any handler reads them.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::value::Value;

/// Reserved literal standing in for SQL NULL on transports without a null.
pub const NULL_SENTINEL: &str = "{NULL_PLS_NO_USER_TYPE_ME_IN_AS_REAL_VALUE}";

/// Keys under which the command token may appear, in priority order.
pub const COMMAND_KEYS: [&str; 2] = ["c", "command"];

/// An inbound command request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    fields: BTreeMap<String, Value>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build a request from a decoded JSON object.
    ///
    /// Strings are kept verbatim, `null` becomes `Value::Null`, and numbers or
    /// booleans are carried as their text form since every field is nominally a
    /// string. Nested arrays and objects are rejected.
    pub fn from_json(object: serde_json::Map<String, Json>) -> Result<Self> {
        let mut request = Self::new();
        for (key, value) in object {
            let value = match value {
                Json::Null => Value::Null,
                Json::String(s) => Value::Text(s),
                Json::Bool(b) => Value::Text(b.to_string()),
                Json::Number(n) => Value::Text(n.to_string()),
                Json::Array(_) | Json::Object(_) => {
                    return Err(Error::invalid(key, "nested values are not supported"));
                }
            };
            request.fields.insert(key, value);
        }
        Ok(request)
    }

    /// Replace every field equal to [`NULL_SENTINEL`] with a real null, in place.
    pub fn normalize_nulls(&mut self) {
        for value in self.fields.values_mut() {
            if value.as_str() == Some(NULL_SENTINEL) {
                *value = Value::Null;
            }
        }
    }

    /// Look up a field that may be absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The first of several alias keys that is present.
    pub fn first_of(&self, aliases: &[&str]) -> Option<&Value> {
        aliases.iter().find_map(|name| self.fields.get(*name))
    }

    /// The command token, taken from `c` and then `command`.
    ///
    /// A null token reads as empty.
    pub fn command_token(&self) -> Option<&str> {
        self.first_of(&COMMAND_KEYS)
            .map(|value| value.as_str().unwrap_or(""))
    }

    /// A field that must be present. A present-but-null field yields `Value::Null`.
    pub fn require(&self, name: &str) -> Result<Value> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| Error::missing(name))
    }

    /// A field that may be absent; absence reads as null.
    pub fn optional(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or(Value::Null)
    }

    /// A required field parsed as an integer id.
    pub fn require_int(&self, name: &str) -> Result<Value> {
        match self.require(name)? {
            Value::Null => Ok(Value::Null),
            value => value
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| Error::invalid(name, "expected an integer")),
        }
    }

    /// A required field that must be non-null text.
    pub fn require_text(&self, name: &str) -> Result<String> {
        match self.require(name)? {
            Value::Text(s) => Ok(s),
            Value::Null => Err(Error::invalid(name, "must not be null")),
            other => Ok(match other.as_i64() {
                Some(n) => n.to_string(),
                None => return Err(Error::invalid(name, "expected text")),
            }),
        }
    }

    /// An optional `"true"`/other flag; absent or null reads as `None`.
    pub fn optional_flag(&self, name: &str) -> Option<bool> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            value => Some(value.as_str() == Some("true")),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Request {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut request = Self::new();
        for (k, v) in iter {
            request.insert(k, v);
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_missing_names_field() {
        let req = Request::new().with("username", "jeff");
        let err = req.require("passhash").unwrap_err();
        assert!(matches!(err, Error::MissingParameter { ref name } if name == "passhash"));
    }

    #[test]
    fn test_optional_never_fails() {
        let req = Request::new().with("title", "Lecture");
        assert_eq!(req.optional("title"), Value::from("Lecture"));
        assert_eq!(req.optional("description"), Value::Null);
    }

    #[test]
    fn test_null_sentinel_becomes_null() {
        let mut req = Request::new()
            .with("title", NULL_SENTINEL)
            .with("description", "kept");
        req.normalize_nulls();
        assert_eq!(req.optional("title"), Value::Null);
        assert_eq!(req.require("title").unwrap(), Value::Null);
        assert_eq!(req.optional("description"), Value::from("kept"));
    }

    #[test]
    fn test_command_token_prefers_short_alias() {
        let req = Request::new()
            .with("c", "v_l")
            .with("command", "create_user");
        assert_eq!(req.command_token(), Some("v_l"));

        let req = Request::new().with("command", "create_user");
        assert_eq!(req.command_token(), Some("create_user"));

        assert_eq!(Request::new().command_token(), None);
        assert_eq!(Request::new().with("c", Value::Null).command_token(), Some(""));
    }

    #[test]
    fn test_require_int() {
        let req = Request::new().with("group_id", "45").with("bad", "4x");
        assert_eq!(req.require_int("group_id").unwrap(), Value::Int(45));
        assert!(matches!(
            req.require_int("bad"),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            req.require_int("absent"),
            Err(Error::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_optional_flag() {
        let req = Request::new()
            .with("is_public", "true")
            .with("looking_for_subgroups", "no")
            .with("nothing", Value::Null);
        assert_eq!(req.optional_flag("is_public"), Some(true));
        assert_eq!(req.optional_flag("looking_for_subgroups"), Some(false));
        assert_eq!(req.optional_flag("nothing"), None);
        assert_eq!(req.optional_flag("absent"), None);
    }

    #[test]
    fn test_from_json_stringifies_scalars() {
        let json: serde_json::Value = serde_json::json!({
            "c": "get_related_groups",
            "group_id": 12,
            "is_public": true,
            "title": null,
        });
        let serde_json::Value::Object(map) = json else {
            unreachable!()
        };
        let req = Request::from_json(map).unwrap();
        assert_eq!(req.optional("group_id"), Value::from("12"));
        assert_eq!(req.optional("is_public"), Value::from("true"));
        assert_eq!(req.require("title").unwrap(), Value::Null);
    }

    #[test]
    fn test_from_json_rejects_nested() {
        let json = serde_json::json!({ "c": ["a"] });
        let serde_json::Value::Object(map) = json else {
            unreachable!()
        };
        assert!(Request::from_json(map).is_err());
    }
}
