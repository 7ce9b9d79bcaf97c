//! stackgraph core
//!
//! Sequences cloud stack creation as a directed acyclic graph:
//! - Nodes declare inputs read from other nodes' outputs or from defaults
//! - A node launches once every supplier it needs has finished
//! - A polling driver heartbeats the root until it finishes or fails
//!
//! # Example
//!
//! ```rust,ignore
//! use stackgraph_core::prelude::*;
//!
//! let provider = InMemoryProvider::new();
//! let mut graph = StackGraph::new(provider.clone());
//!
//! let global = graph.add_config("global", config)?;
//! let vpc = graph.add_template(NodeSpec::new("VPC").input("KeyName", &["global:KeyName"]), vpc_stack)?;
//! let web = graph.add_template(NodeSpec::new("Web").input("VpcId", &["VPC:VpcId"]), web_stack)?;
//! graph.connect(vpc, global, "global")?;
//! graph.connect(web, vpc, "VPC")?;
//!
//! let state = Driver::default().run(&mut graph, web)?;
//! ```

#![allow(missing_docs)]

// Core modules
pub mod dependency;
pub mod error;
pub mod graph;
pub mod node;
pub mod resolver;
pub mod state_machine;
pub mod types;

// Launching
pub mod kind;
pub mod naming;
pub mod provider;
pub mod template;

// Driving and setup
pub mod config;
pub mod driver;
pub mod logging;
pub mod manifest;

// Re-exports
pub use error::*;
pub use types::*;

/// Common imports
pub mod prelude {
    pub use crate::driver::{Driver, DriverConfig};
    pub use crate::error::{
        ConfigError, GraphError, InputError, LaunchError, ProviderError, StackGraphError,
    };
    pub use crate::graph::StackGraph;
    pub use crate::kind::{ActionContext, CustomAction, NodeKind, TemplateStack};
    pub use crate::manifest::Manifest;
    pub use crate::node::{NodeSpec, StackNode};
    pub use crate::provider::{CloudProvider, InMemoryProvider, StackStatus};
    pub use crate::template::{Parameter, Template};
    pub use crate::types::{InputAddress, NodeId, NodeState, Outputs, Value};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
