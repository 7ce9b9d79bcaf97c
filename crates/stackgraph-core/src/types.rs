//! Core types shared by every stage of the graph
//!
//! Node identity, the lifecycle state, the value type carried between
//! nodes, and input addresses.

use crate::error::ConfigError;
use petgraph::graph::NodeIndex;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Handle of a node inside a [`StackGraph`](crate::graph::StackGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) NodeIndex);

impl NodeId {
    /// Position of the node in its graph's arena
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

/// Lifecycle state of a node
///
/// States only move forward: `Idle → Waiting → Running → Finished | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    Idle,
    Waiting,
    Running,
    Finished,
    Failed,
}

impl NodeState {
    /// `Finished` and `Failed` accept no further transitions
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "IDLE",
            Self::Waiting => "WAITING",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Ordered mapping of output name to value
pub type Outputs = BTreeMap<String, Value>;

/// A value flowing from one node's outputs into another node's inputs
///
/// Deserializes from a string, a number or a boolean as `Text`, from an
/// array of scalars as `List`, and from a table as `Map`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Plain string, the common case
    Text(String),
    /// List of strings, rendered comma-delimited as a parameter
    List(Vec<String>),
    /// Nested outputs, published by aggregate nodes
    Map(Outputs),
}

impl Value {
    /// Borrow the string if this is a `Text` value
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the nested outputs if this is a `Map` value
    #[must_use]
    pub fn as_map(&self) -> Option<&Outputs> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// String form handed to the cloud provider as a stack parameter
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(","),
            Self::Map(map) => serde_json::to_string(map).unwrap_or_default(),
        }
    }
}

/// A scalar rendered as text
struct Scalar(String);

struct ScalarVisitor;

impl Visitor<'_> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number or boolean")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
        Ok(Scalar(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
        Ok(Scalar(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
        Ok(Scalar(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
        Ok(Scalar(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
        Ok(Scalar(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
        Ok(Scalar(v.to_string()))
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar, an array of scalars or a table")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(Scalar(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut outputs = Outputs::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            outputs.insert(key, value);
        }
        Ok(Value::Map(outputs))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

macro_rules! value_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Text(value.to_string())
                }
            }
        )*
    };
}

value_from_integer!(i32, i64, u32, u64);

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Outputs> for Value {
    fn from(value: Outputs) -> Self {
        Self::Map(value)
    }
}

/// Where an input may be read from: `"<connection>:<output>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputAddress {
    /// Name of the connection on the consuming node
    pub connection: String,
    /// Output name on the connected node
    pub output: String,
}

impl InputAddress {
    /// Build an address from its two halves
    pub fn new(connection: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            output: output.into(),
        }
    }
}

impl FromStr for InputAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((connection, output)) if !connection.is_empty() && !output.is_empty() => {
                Ok(Self::new(connection, output))
            }
            _ => Err(ConfigError::InvalidAddress(s.to_string())),
        }
    }
}

impl fmt::Display for InputAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connection, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_splits_on_first_colon() {
        let addr: InputAddress = "VPC:Subnet:Ids".parse().unwrap();
        assert_eq!(addr.connection, "VPC");
        assert_eq!(addr.output, "Subnet:Ids");
        assert_eq!(addr.to_string(), "VPC:Subnet:Ids");
    }

    #[test]
    fn address_rejects_missing_halves() {
        assert!("VpcId".parse::<InputAddress>().is_err());
        assert!(":VpcId".parse::<InputAddress>().is_err());
        assert!("global:".parse::<InputAddress>().is_err());
    }

    #[test]
    fn values_render_as_parameters() {
        assert_eq!(Value::from("a").render(), "a");
        assert_eq!(
            Value::from(vec!["us-east-1b".to_string(), "us-east-1d".to_string()]).render(),
            "us-east-1b,us-east-1d"
        );
        let mut nested = Outputs::new();
        nested.insert("k".into(), Value::from("v"));
        assert_eq!(Value::from(nested).render(), r#"{"k":"v"}"#);
    }

    #[test]
    fn scalars_deserialize_as_text() {
        let parsed: Outputs =
            serde_json::from_str(r#"{"Port": 42, "Ratio": 0.5, "Public": true, "Name": "web"}"#)
                .unwrap();
        assert_eq!(parsed["Port"], Value::from("42"));
        assert_eq!(parsed["Ratio"], Value::from("0.5"));
        assert_eq!(parsed["Public"], Value::from("true"));
        assert_eq!(parsed["Name"], Value::from("web"));
    }

    #[test]
    fn arrays_and_tables_deserialize() {
        let parsed: Value = serde_json::from_str(r#"{"Zones": ["a", 2], "Id": "x"}"#).unwrap();
        let map = parsed.as_map().unwrap();
        assert_eq!(map["Zones"], Value::from(vec!["a".to_string(), "2".to_string()]));
        assert_eq!(map["Id"], Value::from("x"));
        assert!(serde_json::from_str::<Value>("[[1]]").is_err());
        assert!(serde_json::from_str::<Value>("null").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(NodeState::Finished.is_terminal());
        assert!(NodeState::Failed.is_terminal());
        assert!(!NodeState::Running.is_terminal());
        assert_eq!(NodeState::Waiting.to_string(), "WAITING");
    }
}
