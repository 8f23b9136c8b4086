use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One step from a composite value to a child: an array index or an object
/// key. Serialized as a bare JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

/// Sequence of segments from a payload root to one of its leaves.
pub type Path = Vec<PathSegment>;

impl PathSegment {
    /// Array index addressed by this segment. String keys that spell an
    /// integer count, since some senders emit every key as a string.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(index) => Some(*index),
            PathSegment::Key(key) => key.parse().ok(),
        }
    }

    /// Object key addressed by this segment.
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            PathSegment::Index(index) => Cow::Owned(index.to_string()),
            PathSegment::Key(key) => Cow::Borrowed(key),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(index) => write!(f, "[{index}]"),
            PathSegment::Key(key) => write!(f, ".{key}"),
        }
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

/// Render a path as `$.a[0].b` for logs and errors.
pub fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::from("$");
    for segment in path {
        out.push_str(&segment.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_serialize_as_bare_json() {
        let path: Path = vec!["a".into(), 2usize.into(), "b".into()];
        assert_eq!(serde_json::to_string(&path).unwrap(), r#"["a",2,"b"]"#);

        let parsed: Path = serde_json::from_str(r#"["x",0,"1"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                PathSegment::Key("x".into()),
                PathSegment::Index(0),
                PathSegment::Key("1".into())
            ]
        );
    }

    #[test]
    fn string_keys_can_address_indices() {
        assert_eq!(PathSegment::Key("3".into()).as_index(), Some(3));
        assert_eq!(PathSegment::Key("x".into()).as_index(), None);
        assert_eq!(PathSegment::Index(4).as_key(), "4");
    }

    #[test]
    fn display_is_readable() {
        let path: Path = vec!["a".into(), 0usize.into()];
        assert_eq!(display_path(&path), "$.a[0]");
        assert_eq!(display_path(&[]), "$");
    }
}
