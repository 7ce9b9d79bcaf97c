//! The stack graph
//!
//! Owns every node, the connections between them, and the cloud provider.
//! Edges point from a supplying node to the node consuming its outputs, so
//! a topological order evaluates suppliers first.
//!
//! Each call to [`StackGraph::heartbeat`] is one tick:
//!
//! 1. **Demand**: walk down from the root. A demanded `Idle` node computes
//!    its requirements and becomes `Waiting`; a `Waiting` node demands the
//!    suppliers it still requires. Suppliers nobody requires stay idle.
//! 2. **Evaluate**: visit the demanded nodes once each, in topological
//!    order, advancing their state.
//!
//! A node remembers the last tick that evaluated it; calling `heartbeat`
//! again with the same tick id changes nothing.

use crate::dependency;
use crate::error::{ConfigError, GraphError, LaunchError, StateMachineError};
use crate::kind::{ActionContext, CustomAction, NodeKind, TemplateStack};
use crate::naming::{self, Tags};
use crate::node::{NodeSpec, StackNode};
use crate::provider::{CloudProvider, Progress};
use crate::resolver::{self, NodeLookup};
use crate::types::{NodeId, NodeState, Outputs, Value};
use petgraph::algo::{has_path_connecting, is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use std::collections::{BTreeMap, BTreeSet};
use tracing::Dispatch;

/// Connection name that is also registered as `global`
pub const GLOBAL_CONFIG_ALIAS: &str = "globalconfig";

/// Connection name of the shared configuration node
pub const GLOBAL_CONNECTION: &str = "global";

/// Directed acyclic graph of stack nodes
pub struct StackGraph {
    inner: DiGraph<StackNode, String>,
    provider: Box<dyn CloudProvider>,
    logger: Option<Dispatch>,
    last_tick: Option<u64>,
}

impl std::fmt::Debug for StackGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackGraph")
            .field("nodes", &self.inner.node_count())
            .field("connections", &self.inner.edge_count())
            .field("last_tick", &self.last_tick)
            .finish_non_exhaustive()
    }
}

impl NodeLookup for StackGraph {
    fn lookup(&self, id: NodeId) -> Option<&StackNode> {
        self.inner.node_weight(id.0)
    }
}

impl StackGraph {
    /// Empty graph backed by `provider`
    pub fn new(provider: impl CloudProvider + 'static) -> Self {
        Self {
            inner: DiGraph::new(),
            provider: Box::new(provider),
            logger: None,
            last_tick: None,
        }
    }

    /// Route this graph's diagnostics to `logger` instead of the
    /// process-wide subscriber
    #[must_use]
    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Add a node of any kind
    pub fn add_node(&mut self, spec: NodeSpec, kind: NodeKind) -> Result<NodeId, ConfigError> {
        let node = spec.build(kind)?;
        Ok(NodeId(self.inner.add_node(node)))
    }

    /// Add a declarative-template node
    pub fn add_template(&mut self, spec: NodeSpec, stack: TemplateStack) -> Result<NodeId, ConfigError> {
        for input in stack.template().input_wiring().values() {
            if !spec.declares(input) {
                return Err(ConfigError::UndeclaredInput {
                    node: spec.name().to_string(),
                    input: input.clone(),
                });
            }
        }
        self.add_node(spec, NodeKind::Template(stack))
    }

    /// Add a custom-action node
    pub fn add_action(
        &mut self,
        spec: NodeSpec,
        action: impl CustomAction + 'static,
    ) -> Result<NodeId, ConfigError> {
        self.add_node(spec, NodeKind::action(action))
    }

    /// Add a node that waits on all of its connections and republishes
    /// their outputs keyed by connection name
    pub fn add_aggregate(&mut self, name: impl Into<String>) -> Result<NodeId, ConfigError> {
        self.add_node(NodeSpec::new(name), NodeKind::Aggregate)
    }

    /// Add a configuration node, finished from the start with `outputs`
    pub fn add_config(&mut self, name: impl Into<String>, outputs: Outputs) -> Result<NodeId, ConfigError> {
        let mut node = NodeSpec::new(name).build(NodeKind::Config)?;
        node.outputs = outputs;
        node.state = NodeState::Finished;
        Ok(NodeId(self.inner.add_node(node)))
    }

    /// Feed `supplier`'s outputs into `consumer` under the connection `name`.
    ///
    /// Rejects self connections, duplicate names and any connection that
    /// would close a cycle.
    pub fn connect(
        &mut self,
        consumer: NodeId,
        supplier: NodeId,
        name: impl Into<String>,
    ) -> Result<(), GraphError> {
        let name = name.into();
        self.ensure(consumer)?;
        self.ensure(supplier)?;
        if consumer == supplier {
            return Err(GraphError::SelfLoop);
        }
        if self.inner[consumer.0].connections.contains_key(&name) {
            return Err(GraphError::DuplicateConnection(name));
        }

        let edge = self.inner.add_edge(supplier.0, consumer.0, name.clone());
        if is_cyclic_directed(&self.inner) {
            self.inner.remove_edge(edge);
            return Err(GraphError::CycleDetected(name));
        }

        let connections = &mut self.inner[consumer.0].connections;
        if name == GLOBAL_CONFIG_ALIAS {
            connections.entry(GLOBAL_CONNECTION.to_string()).or_insert(supplier);
        }
        connections.insert(name, supplier);
        Ok(())
    }

    /// Connect using the supplier's base name as the connection name
    pub fn connect_from(&mut self, consumer: NodeId, supplier: NodeId) -> Result<(), GraphError> {
        let name = self.node(supplier).ok_or(GraphError::NodeNotFound)?.name.clone();
        self.connect(consumer, supplier, name)
    }

    /// The node behind `id`
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&StackNode> {
        self.inner.node_weight(id.0)
    }

    #[must_use]
    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.node(id).map(|n| n.state)
    }

    /// Published outputs, empty until the node finishes
    #[must_use]
    pub fn outputs(&self, id: NodeId) -> Option<&Outputs> {
        self.node(id).map(|n| &n.outputs)
    }

    /// Find a node by base name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.inner
            .node_indices()
            .find(|idx| self.inner[*idx].name == name)
            .map(NodeId)
    }

    /// All node ids, in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.node_indices().map(NodeId)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Last tick id any heartbeat used
    #[must_use]
    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    /// Resolve a node's input against the current state of the graph
    pub fn resolve(&self, id: NodeId, input: &str) -> Result<Value, crate::error::InputError> {
        let node = self
            .node(id)
            .ok_or_else(|| crate::error::InputError::UnresolvableInput(input.to_string()))?;
        resolver::resolve(node, input, self)
    }

    /// Whether `supplier` feeds `consumer`, directly or transitively
    #[must_use]
    pub fn depends_on(&self, consumer: NodeId, supplier: NodeId) -> bool {
        consumer != supplier && has_path_connecting(&self.inner, supplier.0, consumer.0, None)
    }

    /// `root` and every node upstream of it, suppliers first
    pub fn launch_order(&self, root: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.ensure(root)?;
        let upstream = self.upstream_of(root);
        let order = toposort(&self.inner, None)
            .map_err(|cycle| GraphError::CycleDetected(self.inner[cycle.node_id()].name.clone()))?;
        Ok(order
            .into_iter()
            .filter(|idx| upstream.contains(idx))
            .map(NodeId)
            .collect())
    }

    /// Nodes with no suppliers
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        self.inner.externals(petgraph::Direction::Incoming).map(NodeId).collect()
    }

    /// Nodes nothing consumes
    #[must_use]
    pub fn exit_nodes(&self) -> Vec<NodeId> {
        self.inner.externals(petgraph::Direction::Outgoing).map(NodeId).collect()
    }

    /// Move the graph one tick closer to `root` being terminal.
    ///
    /// Returns the root's state after the tick.
    pub fn heartbeat(&mut self, root: NodeId, tick: u64) -> Result<NodeState, GraphError> {
        match self.logger.clone() {
            Some(logger) => tracing::dispatcher::with_default(&logger, || self.tick(root, tick)),
            None => self.tick(root, tick),
        }
    }

    fn tick(&mut self, root: NodeId, tick: u64) -> Result<NodeState, GraphError> {
        self.ensure(root)?;
        self.last_tick = Some(self.last_tick.map_or(tick, |last| last.max(tick)));
        if self.inner[root.0].last_tick == Some(tick) {
            return Ok(self.inner[root.0].state);
        }

        let demanded = self.demand(root, tick);
        let order = toposort(&self.inner, None)
            .map_err(|cycle| GraphError::CycleDetected(self.inner[cycle.node_id()].name.clone()))?;
        for idx in order {
            if demanded.contains(&idx) && self.inner[idx].last_tick != Some(tick) {
                if let Err(e) = self.evaluate(idx, tick) {
                    tracing::error!(node = %self.inner[idx].name, "{e}");
                }
            }
        }
        Ok(self.inner[root.0].state)
    }

    fn demand(&mut self, root: NodeId, tick: u64) -> BTreeSet<NodeIndex> {
        let mut demanded = BTreeSet::new();
        let mut stack = vec![root.0];
        while let Some(idx) = stack.pop() {
            if !demanded.insert(idx) || self.inner[idx].last_tick == Some(tick) {
                continue;
            }
            if self.inner[idx].state == NodeState::Idle {
                let requires = dependency::compute_requires(&self.inner[idx], &*self);
                let node = &mut self.inner[idx];
                node.requires = requires;
                if let Err(e) = node.transition(NodeState::Waiting) {
                    tracing::error!(node = %node.name, "{e}");
                }
            }
            let node = &self.inner[idx];
            if node.state == NodeState::Waiting {
                stack.extend(
                    node.requires
                        .iter()
                        .filter_map(|name| node.connections.get(name))
                        .map(|id| id.0),
                );
            }
        }
        demanded
    }

    fn evaluate(&mut self, idx: NodeIndex, tick: u64) -> Result<(), StateMachineError> {
        self.inner[idx].last_tick = Some(tick);

        if self.inner[idx].state == NodeState::Waiting {
            let mut failed = None;
            let mut pending = Vec::new();
            for name in &self.inner[idx].requires {
                let supplier = self.inner[idx]
                    .connections
                    .get(name)
                    .map(|id| self.inner[id.0].state);
                match supplier {
                    Some(NodeState::Finished) => {}
                    Some(NodeState::Failed) => failed = Some(name.clone()),
                    _ => pending.push(name.clone()),
                }
            }
            self.inner[idx].requires = pending;

            if let Some(name) = failed {
                tracing::error!(node = %self.inner[idx].name, dependency = %name, "dependency failed");
                return self.inner[idx].transition(NodeState::Failed);
            }
            if !self.inner[idx].requires.is_empty() {
                return Ok(());
            }
            if let Err(e) = self.launch(idx) {
                tracing::error!(node = %self.inner[idx].name, "launch failed: {e}");
                return self.inner[idx].transition(NodeState::Failed);
            }
            self.inner[idx].transition(NodeState::Running)?;
        }

        if self.inner[idx].state == NodeState::Running {
            let stack_name = self.inner[idx].stack_name.clone().unwrap_or_default();
            let node = &mut self.inner[idx];
            match node.kind.check_status(&stack_name, self.provider.as_ref()) {
                Ok(Progress::Complete) => {
                    let upstream = self.upstream_outputs(idx);
                    let node = &mut self.inner[idx];
                    node.outputs = node.kind.capture_outputs(upstream);
                    node.transition(NodeState::Finished)?;
                    tracing::info!(node = %node.name, stack = %stack_name, "finished");
                }
                Ok(Progress::Failed) => {
                    tracing::error!(node = %node.name, stack = %stack_name, "failed");
                    node.transition(NodeState::Failed)?;
                }
                Ok(Progress::InProgress) => {}
                Err(e) => {
                    tracing::error!(node = %node.name, stack = %stack_name, "status check failed: {e}");
                    node.transition(NodeState::Failed)?;
                }
            }
        }
        Ok(())
    }

    fn launch(&mut self, idx: NodeIndex) -> Result<(), LaunchError> {
        let node = &self.inner[idx];
        let inputs = resolver::resolve_all(node, &*self);
        let mut tags: Tags = naming::base_tags(&node.name, &node.extra_tags);
        for (key, input) in &node.attributes {
            tags.insert(key.clone(), resolver::resolve(node, input, &*self)?);
        }
        let context = ActionContext {
            base_name: node.name.clone(),
            stack_name: naming::stack_name(&node.name, &tags),
            inputs,
            tags,
        };
        tracing::debug!(node = %context.base_name, stack = %context.stack_name, "launching");

        let node = &mut self.inner[idx];
        node.kind.launch(&context, self.provider.as_ref())?;
        node.stack_name = Some(context.stack_name);
        Ok(())
    }

    fn upstream_outputs(&self, idx: NodeIndex) -> BTreeMap<String, Outputs> {
        let node = &self.inner[idx];
        if !matches!(node.kind, NodeKind::Aggregate) {
            return BTreeMap::new();
        }
        node.connections
            .iter()
            .map(|(name, id)| (name.clone(), self.inner[id.0].outputs.clone()))
            .collect()
    }

    fn upstream_of(&self, root: NodeId) -> BTreeSet<NodeIndex> {
        let reversed = Reversed(&self.inner);
        let mut dfs = Dfs::new(reversed, root.0);
        let mut seen = BTreeSet::new();
        while let Some(idx) = dfs.next(reversed) {
            seen.insert(idx);
        }
        seen
    }

    fn ensure(&self, id: NodeId) -> Result<(), GraphError> {
        self.inner
            .node_weight(id.0)
            .map(|_| ())
            .ok_or(GraphError::NodeNotFound)
    }
}
