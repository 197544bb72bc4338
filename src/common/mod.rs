//! Shared value and tuple types that flow through the operator pipeline and
//! across the publish channel wire.
//!
//! Everything that crosses the network boundary (plan trees, result rows,
//! status notifications) is JSON; `Value` is the typed representation that
//! the executor works with internally once a tuple has been deserialized.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Node identity as produced by the partition store (graph id + vertex id
/// local to a partition, or the global id used over the wire).
pub type NodeId = u64;

/// Identifies a partition within the cluster.
pub type PartitionId = u32;

/// A single value as it appears in a projected tuple.
///
/// Mirrors the variants a query plan can actually produce: scalars read off
/// a node/relation property map, plus the two composite shapes
/// (`Node`/`List`) that pattern-returning clauses emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// An entire node's property map, returned as-is (`RETURN n`).
    Node(BTreeMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Node(_) => "node",
            Value::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_node_id(&self) -> Option<NodeId> {
        match self {
            Value::Integer(i) if *i >= 0 => Some(*i as NodeId),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Node(props) => write!(f, "{props:?}"),
            Value::List(items) => write!(f, "{items:?}"),
        }
    }
}

/// A single row flowing between operators. Columns are positional and keyed
/// by the binding name the plan assigned them (`n`, `m`, `count(n)`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Tuple {
    columns: BTreeMap<String, Value>,
}

impl Tuple {
    pub fn new() -> Self {
        Self { columns: BTreeMap::new() }
    }

    pub fn with(mut self, binding: impl Into<String>, value: Value) -> Self {
        self.columns.insert(binding.into(), value);
        self
    }

    pub fn get(&self, binding: &str) -> Option<&Value> {
        self.columns.get(binding)
    }

    pub fn set(&mut self, binding: impl Into<String>, value: Value) {
        self.columns.insert(binding.into(), value);
    }

    pub fn bindings(&self) -> impl Iterator<Item = &String> {
        self.columns.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.columns.iter()
    }

    pub fn merge(&self, other: &Tuple) -> Tuple {
        let mut merged = self.clone();
        for (k, v) in other.iter() {
            merged.set(k.clone(), v.clone());
        }
        merged
    }

    pub fn project(&self, bindings: &[String]) -> Tuple {
        let mut out = Tuple::new();
        for b in bindings {
            if let Some(v) = self.get(b) {
                out.set(b.clone(), v.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_merge_keeps_left_binding_unless_overwritten() {
        let a = Tuple::new().with("n", Value::Integer(1));
        let b = Tuple::new().with("m", Value::Integer(2));
        let merged = a.merge(&b);
        assert_eq!(merged.get("n"), Some(&Value::Integer(1)));
        assert_eq!(merged.get("m"), Some(&Value::Integer(2)));
    }

    #[test]
    fn value_round_trips_through_json() {
        let v = Value::List(vec![Value::Integer(1), Value::Null, Value::String("x".into())]);
        let encoded = serde_json::to_string(&v).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(v, decoded);
    }
}
