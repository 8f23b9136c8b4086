//! Object graph scanning.

use std::collections::HashSet;

use crate::path::{Path, PathSegment};
use crate::value::{NodeId, Value};

/// Lazy depth-first, pre-order walk over a value.
///
/// Yields `(path, value)` for the root and every nested value. Arrays are
/// visited in index order and objects in key order. Binary payloads and
/// ports are leaves. A composite node or port that was already yielded is
/// skipped entirely (neither yielded nor traversed again), so only its first
/// path is ever reported. Binary payloads carry no identity: a cloned
/// binary is reported at every path that holds it.
pub struct Walk<'a> {
    stack: Vec<(Path, &'a Value)>,
    visited: HashSet<NodeId>,
}

/// Walk `root`; `None` produces an empty sequence.
pub fn walk(root: Option<&Value>) -> Walk<'_> {
    Walk {
        stack: root.map(|value| (Path::new(), value)).into_iter().collect(),
        visited: HashSet::new(),
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (Path, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, value)) = self.stack.pop() {
            if let Some(id) = value.node_id() {
                if !self.visited.insert(id) {
                    continue;
                }
            }

            match value {
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate().rev() {
                        self.stack.push((child_path(&path, PathSegment::Index(index)), item));
                    }
                }
                Value::Object(map) => {
                    for (key, item) in map.iter().rev() {
                        self.stack
                            .push((child_path(&path, PathSegment::Key(key.clone())), item));
                    }
                }
                _ => {}
            }

            return Some((path, value));
        }
        None
    }
}

fn child_path(parent: &Path, segment: PathSegment) -> Path {
    let mut path = Vec::with_capacity(parent.len() + 1);
    path.extend_from_slice(parent);
    path.push(segment);
    path
}

/// Every transferable leaf reachable from `root`, with its first path, in
/// walk order.
pub fn find_transferables(root: &Value) -> Vec<(Path, &Value)> {
    walk(Some(root))
        .filter(|(_, value)| value.is_transferable())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::binary::Binary;
    use crate::port::Port;

    fn key(name: &str) -> PathSegment {
        PathSegment::Key(name.to_string())
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(walk(None).count(), 0);
    }

    #[test]
    fn scalar_root_yields_itself() {
        let value = Value::from("leaf");
        let items: Vec<_> = walk(Some(&value)).collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].0.is_empty());
    }

    #[test]
    fn pre_order_with_paths() {
        let value = Value::from_json(json!({"a": [10, {"b": "s"}], "c": true}));
        let paths: Vec<Path> = walk(Some(&value)).map(|(path, _)| path).collect();

        assert_eq!(
            paths,
            vec![
                vec![],
                vec![key("a")],
                vec![key("a"), PathSegment::Index(0)],
                vec![key("a"), PathSegment::Index(1)],
                vec![key("a"), PathSegment::Index(1), key("b")],
                vec![key("c")],
            ]
        );
    }

    #[test]
    fn binary_is_a_leaf() {
        let value = Value::object([("buf", Binary::from_u16s(&[1, 2, 3]))]);
        let items: Vec<_> = walk(Some(&value)).collect();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn finds_transferables_with_paths() {
        let (port, _peer) = Port::pair();
        let value = Value::object([
            ("plain", Value::from(1u64)),
            (
                "a",
                Value::object([("b", Value::from(Binary::raw(b"Hello".to_vec())))]),
            ),
            ("p", Value::from(port)),
        ]);

        let found = find_transferables(&value);
        let paths: Vec<&Path> = found.iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec![&vec![key("a"), key("b")], &vec![key("p")]]);
    }

    #[test]
    fn no_transferables_in_plain_json() {
        let value = Value::from_json(json!({"x": [1, 2, {"y": "z"}]}));
        assert!(find_transferables(&value).is_empty());
    }

    #[test]
    fn shared_composite_reported_once() {
        let shared = Value::object([("buf", Binary::raw(vec![0xaa]))]);
        let value = Value::object([("a", shared.clone()), ("b", shared)]);

        let found = find_transferables(&value);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, vec![key("a"), key("buf")]);
    }

    #[test]
    fn repeated_port_reported_once() {
        let (port, _peer) = Port::pair();
        let value = Value::array([Value::from(port.clone()), Value::from(port)]);

        let found = find_transferables(&value);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, vec![PathSegment::Index(0)]);
    }

    #[test]
    fn cloned_binary_is_reported_at_every_path() {
        let buf = Value::from(Binary::raw(vec![0xaa, 0xbb]));
        let value = Value::object([("a", buf.clone()), ("b", buf)]);

        let found = find_transferables(&value);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, vec![key("a")]);
        assert_eq!(found[1].0, vec![key("b")]);
    }

    #[test]
    fn equal_but_distinct_nodes_are_both_visited() {
        let value = Value::array([
            Value::object([("buf", Binary::raw(vec![1]))]),
            Value::object([("buf", Binary::raw(vec![1]))]),
        ]);
        assert_eq!(find_transferables(&value).len(), 2);
    }
}
