//! Dependency calculation
//!
//! Works out which connections must finish before a node may launch.

use crate::kind::NodeKind;
use crate::node::StackNode;
use crate::resolver::{self, NodeLookup};
use crate::types::NodeState;

/// Connection names the node is blocked on, in input order.
///
/// An input that already resolves contributes nothing. For an input that
/// does not, the first candidate whose connection is wired and not yet
/// finished is recorded and the remaining candidates are ignored, so each
/// unresolved input blocks on at most one connection. Candidates naming
/// connections that are not wired are skipped silently.
///
/// Aggregate nodes wait on every connection regardless of their inputs.
pub fn compute_requires(node: &StackNode, graph: &impl NodeLookup) -> Vec<String> {
    if matches!(node.kind, NodeKind::Aggregate) {
        return node.connections.keys().cloned().collect();
    }

    let mut requires: Vec<String> = Vec::new();
    for (input, addresses) in &node.inputs {
        if resolver::resolve(node, input, graph).is_ok() {
            continue;
        }
        let blocking = addresses.iter().find(|address| {
            node.connections
                .get(&address.connection)
                .and_then(|id| graph.lookup(*id))
                .is_some_and(|supplier| supplier.state != NodeState::Finished)
        });
        if let Some(address) = blocking {
            if !requires.contains(&address.connection) {
                requires.push(address.connection.clone());
            }
        }
    }

    tracing::debug!(node = %node.name, ?requires, "computed dependencies");
    requires
}
