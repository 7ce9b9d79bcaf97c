//! Stack nodes and their declarations
//!
//! A [`NodeSpec`] declares what a node needs: its inputs with their
//! candidate addresses, static defaults, and the attributes that make up
//! its tag set. The graph turns a spec into a [`StackNode`] and owns it.

use crate::error::{ConfigError, StateMachineError};
use crate::kind::NodeKind;
use crate::naming::Tags;
use crate::state_machine;
use crate::types::{InputAddress, NodeId, NodeState, Outputs, Value};
use std::collections::BTreeMap;

/// Declaration of a node's inputs, defaults and attributes
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    name: String,
    inputs: BTreeMap<String, Vec<String>>,
    defaults: BTreeMap<String, Value>,
    attributes: BTreeMap<String, String>,
    extra_tags: Tags,
}

impl NodeSpec {
    /// Start a spec with the node's base name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declare an input and the addresses it may be read from, in order
    #[must_use]
    pub fn input(mut self, name: impl Into<String>, addresses: &[&str]) -> Self {
        self.inputs.insert(
            name.into(),
            addresses.iter().map(|a| (*a).to_string()).collect(),
        );
        self
    }

    /// Fallback used when no address resolves
    #[must_use]
    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Tag `key` takes the resolved value of `input`
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, input: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), input.into());
        self
    }

    /// Fixed tag added to the tag set
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_tags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `input` has been declared
    #[must_use]
    pub fn declares(&self, input: &str) -> bool {
        self.inputs.contains_key(input)
    }

    pub(crate) fn build(self, kind: NodeKind) -> Result<StackNode, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        let mut inputs = BTreeMap::new();
        for (input, addresses) in self.inputs {
            let parsed = addresses
                .iter()
                .map(|a| a.parse::<InputAddress>())
                .collect::<Result<Vec<_>, _>>()?;
            inputs.insert(input, parsed);
        }
        for input in self.attributes.values() {
            if !inputs.contains_key(input) {
                return Err(ConfigError::UndeclaredInput {
                    node: self.name,
                    input: input.clone(),
                });
            }
        }
        Ok(StackNode {
            name: self.name,
            inputs,
            defaults: self.defaults,
            attributes: self.attributes,
            extra_tags: self.extra_tags,
            state: NodeState::Idle,
            connections: BTreeMap::new(),
            requires: Vec::new(),
            outputs: Outputs::new(),
            stack_name: None,
            last_tick: None,
            kind,
        })
    }
}

/// A node owned by a [`StackGraph`](crate::graph::StackGraph)
#[derive(Debug)]
pub struct StackNode {
    pub(crate) name: String,
    pub(crate) inputs: BTreeMap<String, Vec<InputAddress>>,
    pub(crate) defaults: BTreeMap<String, Value>,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) extra_tags: Tags,
    pub(crate) state: NodeState,
    pub(crate) connections: BTreeMap<String, NodeId>,
    pub(crate) requires: Vec<String>,
    pub(crate) outputs: Outputs,
    pub(crate) stack_name: Option<String>,
    pub(crate) last_tick: Option<u64>,
    pub(crate) kind: NodeKind,
}

impl StackNode {
    /// Base name, without the digest suffix
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Outputs, empty until the node is `Finished`
    #[must_use]
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Connections this node is still waiting on
    #[must_use]
    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    /// Connection name → supplying node
    #[must_use]
    pub fn connections(&self) -> &BTreeMap<String, NodeId> {
        &self.connections
    }

    #[must_use]
    pub fn inputs(&self) -> &BTreeMap<String, Vec<InputAddress>> {
        &self.inputs
    }

    #[must_use]
    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    /// External stack name, known once the node has launched
    #[must_use]
    pub fn stack_name(&self) -> Option<&str> {
        self.stack_name.as_deref()
    }

    /// Last tick that evaluated this node
    #[must_use]
    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn transition(&mut self, to: NodeState) -> Result<(), StateMachineError> {
        state_machine::validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }
}
