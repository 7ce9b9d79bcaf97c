//! Input resolution
//!
//! An input is read from the first candidate address that resolves, in
//! declaration order, then from the node's default. Resolution is a pure
//! lookup over state already computed by earlier ticks.

use crate::error::InputError;
use crate::node::StackNode;
use crate::types::{InputAddress, NodeId, NodeState, Outputs, Value};

/// Read access to the other nodes of a graph
pub trait NodeLookup {
    /// The node behind `id`, if it belongs to this graph
    fn lookup(&self, id: NodeId) -> Option<&StackNode>;
}

/// Resolve one explicit address against the node's connections
pub fn resolve_address(
    node: &StackNode,
    address: &InputAddress,
    graph: &impl NodeLookup,
) -> Result<Value, InputError> {
    let supplier = node
        .connections
        .get(&address.connection)
        .and_then(|id| graph.lookup(*id))
        .ok_or_else(|| InputError::NoSuchConnection(address.connection.clone()))?;

    if supplier.state != NodeState::Finished {
        return Err(no_such_output(address));
    }
    supplier
        .outputs
        .get(&address.output)
        .cloned()
        .ok_or_else(|| no_such_output(address))
}

/// Resolve a named input: candidates in order, then the default
pub fn resolve(node: &StackNode, input: &str, graph: &impl NodeLookup) -> Result<Value, InputError> {
    let Some(addresses) = node.inputs.get(input) else {
        let missing = InputError::NoSuchInput(input.to_string());
        tracing::trace!(node = %node.name, input, "{missing}");
        return Err(InputError::UnresolvableInput(input.to_string()));
    };

    for address in addresses {
        match resolve_address(node, address, graph) {
            Ok(value) => return Ok(value),
            Err(e) => tracing::trace!(node = %node.name, input, "{e}"),
        }
    }

    node.defaults
        .get(input)
        .cloned()
        .ok_or_else(|| InputError::UnresolvableInput(input.to_string()))
}

/// Every declared input that currently resolves
pub fn resolve_all(node: &StackNode, graph: &impl NodeLookup) -> Outputs {
    node.inputs
        .keys()
        .filter_map(|input| {
            resolve(node, input, graph)
                .ok()
                .map(|value| (input.clone(), value))
        })
        .collect()
}

fn no_such_output(address: &InputAddress) -> InputError {
    InputError::NoSuchOutput {
        connection: address.connection.clone(),
        output: address.output.clone(),
    }
}
