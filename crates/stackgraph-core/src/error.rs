//! Error types for the stack graph
//!
//! Errors stay local to the node that raised them. Input and launch
//! failures turn the node `Failed`; configuration and wiring errors are
//! raised eagerly while the graph is being built and never reach the
//! state machine.

use crate::types::NodeState;
use std::path::PathBuf;

/// Umbrella error for graph construction and driving
#[derive(Debug, thiserror::Error)]
pub enum StackGraphError {
    /// Input could not be resolved
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// Graph wiring failed
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Illegal lifecycle transition
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    /// Configuration was invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cloud provider call failed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Launching a node failed
    #[error("launch error: {0}")]
    Launch(#[from] LaunchError),
}

/// Input resolution failures
///
/// `NoSuchInput`, `NoSuchConnection` and `NoSuchOutput` are sub-cases kept
/// for diagnostics; callers of `resolve` see `UnresolvableInput` once every
/// candidate and the default are exhausted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// The input name is not declared on the node
    #[error("input `{0}` is not declared")]
    NoSuchInput(String),

    /// The address names a connection that is not wired
    #[error("no connection named `{0}`")]
    NoSuchConnection(String),

    /// The connected node has not produced the output (yet)
    #[error("connection `{connection}` has no output `{output}`")]
    NoSuchOutput {
        /// Connection looked up
        connection: String,
        /// Output that was missing
        output: String,
    },

    /// No candidate resolved and there is no default
    #[error("input `{0}` cannot be resolved")]
    UnresolvableInput(String),
}

/// Graph wiring errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Node id does not belong to this graph
    #[error("node not found")]
    NodeNotFound,

    /// A node cannot supply itself
    #[error("node cannot be connected to itself")]
    SelfLoop,

    /// The connection would close a cycle
    #[error("connecting `{0}` would create a dependency cycle")]
    CycleDetected(String),

    /// The connection name is already taken on the consuming node
    #[error("connection `{0}` already wired")]
    DuplicateConnection(String),
}

/// Illegal lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not present in the table
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: NodeState,
        /// Requested state
        to: NodeState,
    },
}

/// Configuration errors, raised before anything runs
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Node declared without a name
    #[error("node name must not be empty")]
    MissingName,

    /// Input address is not `connection:output`
    #[error("invalid input address `{0}`, expected `connection:output`")]
    InvalidAddress(String),

    /// Attribute or parameter wired to an input the node never declares
    #[error("node `{node}` references undeclared input `{input}`")]
    UndeclaredInput {
        /// Node base name
        node: String,
        /// Missing input
        input: String,
    },

    /// Manifest references a node that does not exist
    #[error("unknown node `{0}`")]
    UnknownNode(String),

    /// Profile not present in the configuration file
    #[error("profile `{0}` not found")]
    MissingProfile(String),

    /// Value has a shape the loader cannot use
    #[error("unsupported value for `{key}`: {reason}")]
    UnsupportedValue {
        /// Offending key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },
}

/// Cloud provider failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// No stack under that name
    #[error("stack `{0}` does not exist")]
    StackNotFound(String),

    /// The provider refused the request
    #[error("provider rejected request for `{name}`: {reason}")]
    Rejected {
        /// Stack name
        name: String,
        /// Provider message
        reason: String,
    },
}

/// Failures while launching a node
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// A required input (tag attribute) did not resolve
    #[error(transparent)]
    Input(#[from] InputError),

    /// The provider call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Template setup or rendering failed
    #[error("template error: {0}")]
    Template(String),

    /// A custom action reported an error
    #[error("action failed: {0}")]
    Action(String),
}

impl LaunchError {
    /// Convenience constructor for custom action failures
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }
}
