//! Graph manifest
//!
//! Declares nodes, their inputs and wiring in TOML so a graph can be built
//! without code:
//!
//! ```toml
//! roots = ["Web"]
//! base_roots = ["VPC"]
//!
//! [[node]]
//! name = "VPC"
//! inputs = { KeyName = ["global:KeyName"] }
//! connections = { global = "global" }
//! parameters = { KeyName = "KeyName" }
//! resources = { Vpc = { Type = "AWS::EC2::VPC" } }
//! outputs = { VpcId = { Ref = "Vpc" } }
//! simulated_outputs = { VpcId = "vpc-0abc" }
//! ```
//!
//! Connections map a connection name to a node name. The configuration
//! node is always available as `global`. `base_roots` names the shared
//! infrastructure driven when no stack color is chosen.

use crate::error::{ConfigError, StackGraphError};
use crate::graph::{StackGraph, GLOBAL_CONNECTION};
use crate::kind::TemplateStack;
use crate::node::NodeSpec;
use crate::provider::InMemoryProvider;
use crate::template::{Parameter, Template};
use crate::types::{NodeId, Outputs, Value};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Kind of a manifest node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    #[default]
    Template,
    Aggregate,
}

/// One `[[node]]` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeEntry {
    pub name: String,
    #[serde(default)]
    pub kind: ManifestKind,
    #[serde(default)]
    pub description: Option<String>,
    /// Input name → candidate addresses
    #[serde(default)]
    pub inputs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub defaults: BTreeMap<String, Value>,
    /// Tag key → input name
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Connection name → supplying node name
    #[serde(default)]
    pub connections: BTreeMap<String, String>,
    /// Template parameter → input name
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
    /// Outputs the in-memory provider reports for this stack
    #[serde(default)]
    pub simulated_outputs: Outputs,
}

/// A whole graph declaration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Nodes to drive, in order
    #[serde(default)]
    pub roots: Vec<String>,
    /// Shared infrastructure roots, driven when no color is selected
    #[serde(default)]
    pub base_roots: Vec<String>,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeEntry>,
}

/// Ids of a graph built from a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltGraph {
    /// The configuration node
    pub global: Option<NodeId>,
    /// Roots in manifest order
    pub roots: Vec<NodeId>,
    /// Base roots in manifest order
    pub base_roots: Vec<NodeId>,
    /// Every node by name, the configuration node included
    pub nodes: BTreeMap<String, NodeId>,
}

impl BuiltGraph {
    /// Roots to drive: every root for a colored deployment, otherwise the
    /// base roots when the manifest declares any
    #[must_use]
    pub fn targets(&self, colored: bool) -> &[NodeId] {
        if colored || self.base_roots.is_empty() {
            &self.roots
        } else {
            &self.base_roots
        }
    }
}

impl Manifest {
    /// Load a manifest file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse manifest text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: "<inline>".into(),
            source,
        })
    }

    /// Add the configuration node and every manifest node to `graph`,
    /// then wire them.
    pub fn build(&self, graph: &mut StackGraph, config: Outputs) -> Result<BuiltGraph, StackGraphError> {
        let mut built = BuiltGraph::default();
        let global = graph.add_config(GLOBAL_CONNECTION, config)?;
        built.global = Some(global);
        built.nodes.insert(GLOBAL_CONNECTION.to_string(), global);

        for entry in &self.nodes {
            if built.nodes.contains_key(&entry.name) {
                return Err(ConfigError::UnsupportedValue {
                    key: entry.name.clone(),
                    reason: "node declared twice".to_string(),
                }
                .into());
            }
            let id = match entry.kind {
                ManifestKind::Template => graph.add_template(entry.spec(), entry.template()?)?,
                ManifestKind::Aggregate => graph.add_aggregate(entry.name.clone())?,
            };
            built.nodes.insert(entry.name.clone(), id);
        }

        for entry in &self.nodes {
            let consumer = built.nodes[&entry.name];
            for (connection, supplier) in &entry.connections {
                let supplier = *built
                    .nodes
                    .get(supplier)
                    .ok_or_else(|| ConfigError::UnknownNode(supplier.clone()))?;
                graph.connect(consumer, supplier, connection.clone())?;
            }
        }

        built.roots = lookup(&built.nodes, &self.roots)?;
        built.base_roots = lookup(&built.nodes, &self.base_roots)?;
        tracing::debug!(
            nodes = built.nodes.len(),
            roots = built.roots.len(),
            base_roots = built.base_roots.len(),
            "manifest built"
        );
        Ok(built)
    }

    /// Tell the in-memory provider which outputs each stack reports
    pub fn script(&self, provider: &InMemoryProvider) {
        for entry in &self.nodes {
            if !entry.simulated_outputs.is_empty() {
                provider.script_outputs(entry.name.clone(), entry.simulated_outputs.clone());
            }
        }
    }
}

impl NodeEntry {
    fn spec(&self) -> NodeSpec {
        let mut spec = NodeSpec::new(self.name.clone());
        for (input, addresses) in &self.inputs {
            let addresses: Vec<&str> = addresses.iter().map(String::as_str).collect();
            spec = spec.input(input.clone(), &addresses);
        }
        for (input, value) in &self.defaults {
            spec = spec.default_value(input.clone(), value.clone());
        }
        for (key, input) in &self.attributes {
            spec = spec.attribute(key.clone(), input.clone());
        }
        spec
    }

    fn template(&self) -> Result<TemplateStack, ConfigError> {
        let mut template = Template::new();
        if let Some(description) = &self.description {
            template.set_description(description.clone());
        }
        for (parameter, input) in &self.parameters {
            template.add_parameter(parameter.clone(), Parameter::string(), Some(input));
        }
        for (id, resource) in &self.resources {
            template
                .create_resource(id.clone(), resource.clone(), None)
                .map_err(|e| ConfigError::UnsupportedValue {
                    key: id.clone(),
                    reason: e.to_string(),
                })?;
        }
        for (name, value) in &self.outputs {
            template.add_output(name.clone(), value.clone(), None);
        }
        Ok(TemplateStack::new(template))
    }
}

fn lookup(nodes: &BTreeMap<String, NodeId>, names: &[String]) -> Result<Vec<NodeId>, ConfigError> {
    names
        .iter()
        .map(|name| {
            nodes
                .get(name)
                .copied()
                .ok_or_else(|| ConfigError::UnknownNode(name.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::types::NodeState;
    use std::io::Write;

    const MANIFEST: &str = r#"
roots = ["Web"]
base_roots = ["VPC"]

[[node]]
name = "VPC"
description = "network"
inputs = { KeyName = ["global:KeyName"] }
connections = { global = "global" }
parameters = { KeyName = "KeyName" }
resources = { Vpc = { Type = "AWS::EC2::VPC" } }
outputs = { VpcId = { Ref = "Vpc" } }
simulated_outputs = { VpcId = "vpc-0abc" }

[[node]]
name = "Web"
inputs = { VpcId = ["global:VpcId", "VPC:VpcId"], StackType = ["global:StackType"] }
defaults = { StackType = "Development" }
attributes = { StackType = "StackType" }
connections = { global = "global", VPC = "VPC" }
parameters = { VpcId = "VpcId" }
"#;

    fn config() -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("KeyName".into(), Value::from("ops"));
        outputs
    }

    #[test]
    fn builds_and_wires_nodes() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        let mut graph = StackGraph::new(InMemoryProvider::new());
        let built = manifest.build(&mut graph, config()).unwrap();

        assert_eq!(built.nodes.len(), 3);
        assert_eq!(built.roots, vec![built.nodes["Web"]]);
        assert_eq!(built.base_roots, vec![built.nodes["VPC"]]);
        let web = graph.node(built.nodes["Web"]).unwrap();
        assert_eq!(web.connections().len(), 2);
        assert_eq!(graph.state(built.nodes["global"]), Some(NodeState::Finished));
    }

    #[test]
    fn simulated_outputs_flow_to_dependents() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        let provider = InMemoryProvider::new();
        manifest.script(&provider);
        let mut graph = StackGraph::new(provider.clone());
        let built = manifest.build(&mut graph, config()).unwrap();
        let web = built.roots[0];

        let mut tick = 0;
        while !graph.state(web).unwrap().is_terminal() {
            graph.heartbeat(web, tick).unwrap();
            tick += 1;
        }
        assert_eq!(graph.state(web), Some(NodeState::Finished));
        assert_eq!(graph.resolve(web, "VpcId").unwrap(), Value::from("vpc-0abc"));
        assert_eq!(provider.create_count(), 2);
    }

    #[test]
    fn base_roots_apply_only_without_color() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        let mut graph = StackGraph::new(InMemoryProvider::new());
        let built = manifest.build(&mut graph, config()).unwrap();
        assert_eq!(built.targets(false), &[built.nodes["VPC"]]);
        assert_eq!(built.targets(true), &[built.nodes["Web"]]);

        let flat = BuiltGraph {
            base_roots: Vec::new(),
            ..built.clone()
        };
        assert_eq!(flat.targets(false), &[built.nodes["Web"]]);
    }

    #[test]
    fn unknown_base_root_is_rejected() {
        let manifest = Manifest::from_toml("base_roots = [\"Nope\"]\n").unwrap();
        let mut graph = StackGraph::new(InMemoryProvider::new());
        let err = manifest.build(&mut graph, Outputs::new()).unwrap_err();
        assert!(matches!(
            err,
            StackGraphError::Config(ConfigError::UnknownNode(n)) if n == "Nope"
        ));
    }

    #[test]
    fn numeric_and_boolean_defaults_are_text() {
        let manifest = Manifest::from_toml(
            r#"
[[node]]
name = "N"
inputs = { Y = ["X:Y"], Public = ["X:Public"] }
defaults = { Y = 42, Public = false }
"#,
        )
        .unwrap();
        assert_eq!(manifest.nodes[0].defaults["Y"], Value::from(42));
        let mut graph = StackGraph::new(InMemoryProvider::new());
        let built = manifest.build(&mut graph, Outputs::new()).unwrap();
        let node = built.nodes["N"];
        assert_eq!(graph.resolve(node, "Y").unwrap(), Value::from("42"));
        assert_eq!(graph.resolve(node, "Public").unwrap(), Value::from("false"));
    }

    #[test]
    fn unknown_connection_target_is_rejected() {
        let manifest = Manifest::from_toml(
            r#"
[[node]]
name = "Web"
connections = { VPC = "Missing" }
"#,
        )
        .unwrap();
        let mut graph = StackGraph::new(InMemoryProvider::new());
        let err = manifest.build(&mut graph, Outputs::new()).unwrap_err();
        assert!(matches!(
            err,
            StackGraphError::Config(ConfigError::UnknownNode(n)) if n == "Missing"
        ));
    }

    #[test]
    fn cyclic_manifest_is_rejected() {
        let manifest = Manifest::from_toml(
            r#"
[[node]]
name = "A"
kind = "aggregate"
connections = { B = "B" }

[[node]]
name = "B"
kind = "aggregate"
connections = { A = "A" }
"#,
        )
        .unwrap();
        let mut graph = StackGraph::new(InMemoryProvider::new());
        let err = manifest.build(&mut graph, Outputs::new()).unwrap_err();
        assert!(matches!(err, StackGraphError::Graph(GraphError::CycleDetected(_))));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Manifest::from_toml("[[node]]\nname = \"A\"\ncolour = \"blue\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        let manifest = Manifest::from_file(file.path()).unwrap();
        assert_eq!(manifest.roots, vec!["Web".to_string()]);
        assert_eq!(manifest.base_roots, vec!["VPC".to_string()]);
        assert_eq!(manifest.nodes.len(), 2);
        assert_eq!(manifest.nodes[1].kind, ManifestKind::Template);
    }
}
