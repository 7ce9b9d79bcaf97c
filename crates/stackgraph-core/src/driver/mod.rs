//! Polling driver
//!
//! Heartbeats a root until it reaches a terminal state, sleeping between
//! ticks. There is no timeout: a resource stuck in progress polls forever.

use crate::error::GraphError;
use crate::graph::StackGraph;
use crate::types::{NodeId, NodeState};
use std::time::Duration;

/// Polling interval used when none is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Sleep between heartbeats
    pub interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl DriverConfig {
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

/// Drives a graph's roots to completion
#[derive(Debug, Clone, Default)]
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Heartbeat `root` immediately, then once per interval, until it is
    /// `Finished` or `Failed`.
    ///
    /// Tick ids continue from the graph's last tick, so a graph driven
    /// before is never handed a tick it already saw.
    pub fn run(&self, graph: &mut StackGraph, root: NodeId) -> Result<NodeState, GraphError> {
        let mut tick = graph.last_tick().map_or(0, |t| t + 1);
        let name = graph.node(root).ok_or(GraphError::NodeNotFound)?.name().to_string();
        tracing::info!(root = %name, tick, "driving");

        loop {
            let state = graph.heartbeat(root, tick)?;
            if state.is_terminal() {
                tracing::info!(root = %name, %state, ticks = tick + 1, "root settled");
                return Ok(state);
            }
            tracing::debug!(root = %name, %state, tick, "waiting");
            std::thread::sleep(self.config.interval);
            tick += 1;
        }
    }

    /// Drive each root in turn. Suppliers shared between roots are
    /// launched once; later roots find them finished.
    pub fn run_all(
        &self,
        graph: &mut StackGraph,
        roots: &[NodeId],
    ) -> Result<Vec<(NodeId, NodeState)>, GraphError> {
        roots
            .iter()
            .map(|root| self.run(graph, *root).map(|state| (*root, state)))
            .collect()
    }
}
