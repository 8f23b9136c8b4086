//! Structured message values.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Number;

use crate::binary::Binary;
use crate::error::{EnvelopeError, Result};
use crate::path::{display_path, PathSegment};
use crate::port::Port;

/// A message body: JSON-like data plus binary payloads and channel endpoints.
///
/// Arrays and objects are reference counted. Cloning a composite shares the
/// node, so the same node can sit at several paths of one message; mutation
/// through [`Value::replace_at`] is copy-on-write.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Arc<Vec<Value>>),
    Object(Arc<BTreeMap<String, Value>>),
    Binary(Binary),
    Channel(Port),
}

/// Identity of a shareable node, used to detect aliasing during scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NodeId {
    Composite(usize),
    Port(u64),
}

impl Value {
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Binary payloads, typed views and channel endpoints are moved as whole
    /// units instead of being traversed.
    pub fn is_transferable(&self) -> bool {
        matches!(self, Value::Binary(_) | Value::Channel(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(number) => number.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(number) => number.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Value::Binary(binary) => Some(binary),
            _ => None,
        }
    }

    pub fn as_port(&self) -> Option<&Port> {
        match self {
            Value::Channel(port) => Some(port),
            _ => None,
        }
    }

    /// Object member lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Follow `path` from this value.
    pub fn pointer(&self, path: &[PathSegment]) -> Option<&Value> {
        path.iter().try_fold(self, |value, segment| value.child(segment))
    }

    fn child(&self, segment: &PathSegment) -> Option<&Value> {
        match self {
            Value::Array(items) => items.get(segment.as_index()?),
            Value::Object(map) => map.get(segment.as_key().as_ref()),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &PathSegment, insert: bool) -> Option<&mut Value> {
        match self {
            Value::Array(items) => Arc::make_mut(items).get_mut(segment.as_index()?),
            Value::Object(map) => {
                let map = Arc::make_mut(map);
                let key = segment.as_key();
                if insert && !map.contains_key(key.as_ref()) {
                    map.insert(key.to_string(), Value::Null);
                }
                map.get_mut(key.as_ref())
            }
            _ => None,
        }
    }

    /// Store `new` at `path` and return what was there before.
    ///
    /// The empty path replaces the whole value. A missing object key in the
    /// final position is created; any other missing step is an error.
    /// Composites shared with other holders are copied before mutation.
    pub fn replace_at(&mut self, path: &[PathSegment], new: Value) -> Result<Value> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(std::mem::replace(self, new));
        };

        let mut slot = self;
        for segment in parents {
            slot = match slot.child_mut(segment, false) {
                Some(child) => child,
                None => return Err(EnvelopeError::PathNotFound(display_path(path))),
            };
        }
        match slot.child_mut(last, true) {
            Some(target) => Ok(std::mem::replace(target, new)),
            None => Err(EnvelopeError::PathNotFound(display_path(path))),
        }
    }

    pub(crate) fn node_id(&self) -> Option<NodeId> {
        match self {
            Value::Array(items) => Some(NodeId::Composite(Arc::as_ptr(items) as *const () as usize)),
            Value::Object(map) => Some(NodeId::Composite(Arc::as_ptr(map) as *const () as usize)),
            Value::Channel(port) => Some(NodeId::Port(port.id())),
            _ => None,
        }
    }

    /// Convert from plain JSON.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(number) => Value::Number(number),
            serde_json::Value::String(value) => Value::String(value),
            serde_json::Value::Array(items) => {
                Value::Array(Arc::new(items.into_iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(Arc::new(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            )),
        }
    }

    /// Convert to plain JSON. Transferable leaves become `null`
    /// placeholders; their content travels in transfer descriptors.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Binary(_) | Value::Channel(_) => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Number(number) => serde_json::Value::Number(number.clone()),
            Value::String(value) => serde_json::Value::String(value.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Channel(a), Value::Channel(b)) => a.same_port(b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

impl From<Binary> for Value {
    fn from(value: Binary) -> Self {
        Value::Binary(value)
    }
}

impl From<Port> for Value {
    fn from(value: Port) -> Self {
        Value::Channel(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::path::Path;

    fn path(segments: &[&str]) -> Path {
        segments.iter().map(|s| PathSegment::from(*s)).collect()
    }

    #[test]
    fn json_roundtrip_without_transferables() {
        let json = json!({"name": "ada", "tags": ["x", 1, true, null], "nested": {"n": 1.5}});
        let value = Value::from_json(json.clone());
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn transferables_render_as_null() {
        let (port, _other) = Port::pair();
        let value = Value::object([
            ("bin", Value::from(Binary::raw(vec![1, 2]))),
            ("port", Value::from(port)),
        ]);
        assert_eq!(value.to_json(), json!({"bin": null, "port": null}));
    }

    #[test]
    fn replace_at_nested_path_returns_old_value() {
        let mut value = Value::from_json(json!({"a": {"b": [1, 2, 3]}}));
        let path: Path = vec!["a".into(), "b".into(), 1usize.into()];

        let old = value.replace_at(&path, Value::Null).unwrap();
        assert_eq!(old, Value::from(2u64));
        assert_eq!(value.to_json(), json!({"a": {"b": [1, null, 3]}}));
    }

    #[test]
    fn replace_at_root() {
        let mut value = Value::from("root");
        let old = value.replace_at(&[], Value::from(true)).unwrap();
        assert_eq!(old, Value::from("root"));
        assert_eq!(value, Value::from(true));
    }

    #[test]
    fn replace_at_creates_missing_final_key() {
        let mut value = Value::from_json(json!({"a": {}}));
        value
            .replace_at(&path(&["a", "new"]), Value::from(7u64))
            .unwrap();
        assert_eq!(value.to_json(), json!({"a": {"new": 7}}));
    }

    #[test]
    fn replace_at_missing_parent_fails() {
        let mut value = Value::from_json(json!({"a": 1}));
        let err = value
            .replace_at(&path(&["x", "y"]), Value::Null)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::PathNotFound(p) if p == "$.x.y"));
    }

    #[test]
    fn replace_at_array_out_of_range_fails() {
        let mut value = Value::from_json(json!([1]));
        let err = value
            .replace_at(&[PathSegment::Index(5)], Value::Null)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::PathNotFound(_)));
    }

    #[test]
    fn replace_at_copies_shared_nodes() {
        let shared = Value::from_json(json!({"k": 1}));
        let mut root = Value::object([("a", shared.clone()), ("b", shared.clone())]);

        root.replace_at(&path(&["a", "k"]), Value::from(2u64)).unwrap();

        assert_eq!(root.to_json(), json!({"a": {"k": 2}, "b": {"k": 1}}));
        assert_eq!(shared.to_json(), json!({"k": 1}));
    }

    #[test]
    fn pointer_accepts_string_indices() {
        let value = Value::from_json(json!({"list": ["zero", "one"]}));
        let found = value.pointer(&path(&["list", "1"]));
        assert_eq!(found, Some(&Value::from("one")));
    }

    #[test]
    fn non_finite_float_is_null() {
        assert!(Value::from(f64::NAN).is_null());
        assert_eq!(Value::from(0.5).as_f64(), Some(0.5));
    }
}
