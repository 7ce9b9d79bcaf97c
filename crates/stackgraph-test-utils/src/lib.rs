//! Testing utilities for the stackgraph workspace
//!
//! Shared fixtures: output maps, recording actions and graph builders.

#![allow(missing_docs)]

use parking_lot::Mutex;
use stackgraph_core::error::LaunchError;
use stackgraph_core::graph::StackGraph;
use stackgraph_core::kind::{ActionContext, CustomAction};
use stackgraph_core::node::NodeSpec;
use stackgraph_core::provider::CloudProvider;
use stackgraph_core::types::{NodeId, NodeState, Outputs, Value};
use std::sync::Arc;

pub fn outputs(pairs: &[(&str, &str)]) -> Outputs {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
        .collect()
}

/// Custom action that records every context it was launched with
#[derive(Debug, Clone, Default)]
pub struct RecordingAction {
    produces: Outputs,
    fail: bool,
    seen: Arc<Mutex<Vec<ActionContext>>>,
}

impl RecordingAction {
    pub fn producing(produces: Outputs) -> Self {
        Self {
            produces,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn launches(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn contexts(&self) -> Vec<ActionContext> {
        self.seen.lock().clone()
    }
}

impl CustomAction for RecordingAction {
    fn action(&mut self, context: &ActionContext) -> Result<Outputs, LaunchError> {
        self.seen.lock().push(context.clone());
        if self.fail {
            return Err(LaunchError::action(format!("{} refused to launch", context.base_name)));
        }
        Ok(self.produces.clone())
    }
}

/// Heartbeat `root` until it settles, without sleeping.
///
/// Panics if the root is still pending after `max_ticks`.
pub fn drive(graph: &mut StackGraph, root: NodeId, max_ticks: u64) -> NodeState {
    let start = graph.last_tick().map_or(0, |t| t + 1);
    for tick in start..start + max_ticks {
        let state = graph.heartbeat(root, tick).unwrap();
        if state.is_terminal() {
            return state;
        }
    }
    panic!("root {root} did not settle within {max_ticks} ticks");
}

/// Graph of `n` action nodes named `N0..Nn`.
///
/// For every `(supplier, consumer)` pair with `supplier < consumer`,
/// the consumer declares an input read from the supplier's `out` and the
/// two are connected. Pairs that are not ordered are ignored so the graph
/// stays acyclic. Nodes listed in `failing` refuse to launch.
pub fn action_dag(
    provider: impl CloudProvider + 'static,
    n: usize,
    edges: &[(usize, usize)],
    failing: &[usize],
) -> (StackGraph, Vec<NodeId>, Vec<RecordingAction>) {
    let mut graph = StackGraph::new(provider);
    let mut ids = Vec::with_capacity(n);
    let mut actions = Vec::with_capacity(n);

    for i in 0..n {
        let name = format!("N{i}");
        let suppliers: Vec<usize> = edges
            .iter()
            .filter(|(s, c)| *c == i && *s < *c)
            .map(|(s, _)| *s)
            .collect();
        let mut spec = NodeSpec::new(name.clone());
        for s in &suppliers {
            let address = format!("N{s}:out");
            spec = spec.input(format!("from{s}"), &[address.as_str()]);
        }
        let action = if failing.contains(&i) {
            RecordingAction::failing()
        } else {
            RecordingAction::producing(outputs(&[("out", name.as_str())]))
        };
        ids.push(graph.add_action(spec, action.clone()).unwrap());
        actions.push(action);
    }

    for &(s, c) in edges {
        if s < c && c < n && graph.node(ids[c]).unwrap().connections().get(&format!("N{s}")).is_none() {
            graph.connect(ids[c], ids[s], format!("N{s}")).unwrap();
        }
    }
    (graph, ids, actions)
}
