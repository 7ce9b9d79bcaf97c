//! What launching a node means
//!
//! Every node carries a [`NodeKind`] exposing the same capability set:
//! `launch`, `check_status` and `capture_outputs`. The graph drives the
//! lifecycle and dispatches on the kind.
//!
//! | Kind | launch | status | outputs |
//! |------|--------|--------|---------|
//! | `Template` | create the stack unless one with the same name exists | provider status | provider outputs, then the optional transform |
//! | `Action` | run the custom action | complete | whatever the action returned |
//! | `Aggregate` | nothing | complete | each connection's outputs, keyed by connection name |
//! | `Config` | never launched | complete | seeded at construction |

mod template_stack;

pub use template_stack::{OutputTransform, TemplateSetup, TemplateStack};

use crate::error::{LaunchError, ProviderError};
use crate::naming::Tags;
use crate::provider::{CloudProvider, Progress};
use crate::types::Outputs;
use std::collections::BTreeMap;
use std::fmt;

/// Everything a node knows at launch time
#[derive(Debug, Clone, PartialEq)]
pub struct ActionContext {
    /// Base name of the node
    pub base_name: String,
    /// External stack name derived from the tags
    pub stack_name: String,
    /// Every declared input that resolved
    pub inputs: Outputs,
    /// Resolved tag set
    pub tags: Tags,
}

/// A node whose launch is arbitrary code
///
/// The action returns the node's outputs. It runs once per launch and must
/// be idempotent: if it creates an external resource it should look for an
/// existing one first and return the same outputs.
pub trait CustomAction {
    /// Do the work and report the outputs
    fn action(&mut self, context: &ActionContext) -> Result<Outputs, LaunchError>;
}

impl<F> CustomAction for F
where
    F: FnMut(&ActionContext) -> Result<Outputs, LaunchError>,
{
    fn action(&mut self, context: &ActionContext) -> Result<Outputs, LaunchError> {
        self(context)
    }
}

/// Node kind, dispatched by the graph
pub enum NodeKind {
    /// Declarative template submitted to the cloud provider
    Template(TemplateStack),
    /// Custom action with its outputs once it has run
    Action {
        action: Box<dyn CustomAction>,
        produced: Option<Outputs>,
    },
    /// Waits on every connection and republishes their outputs
    Aggregate,
    /// Holds configuration values; finished from the start
    Config,
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(stack) => f.debug_tuple("Template").field(stack).finish(),
            Self::Action { produced, .. } => f
                .debug_struct("Action")
                .field("produced", produced)
                .finish_non_exhaustive(),
            Self::Aggregate => f.write_str("Aggregate"),
            Self::Config => f.write_str("Config"),
        }
    }
}

impl NodeKind {
    /// Wrap a custom action
    pub fn action(action: impl CustomAction + 'static) -> Self {
        Self::Action {
            action: Box::new(action),
            produced: None,
        }
    }

    /// Short label for logs and reports
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Template(_) => "template",
            Self::Action { .. } => "action",
            Self::Aggregate => "aggregate",
            Self::Config => "config",
        }
    }

    /// Start the node's external work
    pub fn launch(
        &mut self,
        context: &ActionContext,
        provider: &dyn CloudProvider,
    ) -> Result<(), LaunchError> {
        match self {
            Self::Template(stack) => stack.launch(context, provider),
            Self::Action { action, produced } => {
                *produced = Some(action.action(context)?);
                Ok(())
            }
            Self::Aggregate | Self::Config => Ok(()),
        }
    }

    /// Poll the external work
    pub fn check_status(
        &mut self,
        stack_name: &str,
        provider: &dyn CloudProvider,
    ) -> Result<Progress, ProviderError> {
        match self {
            Self::Template(stack) => stack.check_status(stack_name, provider),
            Self::Action { .. } | Self::Aggregate | Self::Config => Ok(Progress::Complete),
        }
    }

    /// Outputs to publish once complete. `upstream` holds each connection's
    /// outputs and is only read by aggregates.
    pub fn capture_outputs(&mut self, upstream: BTreeMap<String, Outputs>) -> Outputs {
        match self {
            Self::Template(stack) => stack.capture_outputs(),
            Self::Action { produced, .. } => produced.take().unwrap_or_default(),
            Self::Aggregate => upstream
                .into_iter()
                .map(|(connection, outputs)| (connection, outputs.into()))
                .collect(),
            Self::Config => Outputs::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockCloudProvider;
    use crate::types::Value;

    fn context() -> ActionContext {
        ActionContext {
            base_name: "Bucket".to_string(),
            stack_name: "Bucket-abc".to_string(),
            inputs: Outputs::new(),
            tags: Tags::new(),
        }
    }

    fn make_bucket(ctx: &ActionContext) -> Result<Outputs, LaunchError> {
        let mut out = Outputs::new();
        out.insert("BucketName".into(), Value::from(ctx.stack_name.to_lowercase()));
        Ok(out)
    }

    fn broken(_: &ActionContext) -> Result<Outputs, LaunchError> {
        Err(LaunchError::action("bucket quota exceeded"))
    }

    #[test]
    fn action_outputs_are_published_after_completion() {
        let provider = MockCloudProvider::new();
        let mut kind = NodeKind::action(make_bucket);

        kind.launch(&context(), &provider).unwrap();
        assert_eq!(kind.check_status("Bucket-abc", &provider).unwrap(), Progress::Complete);
        let outputs = kind.capture_outputs(BTreeMap::new());
        assert_eq!(outputs["BucketName"], Value::from("bucket-abc"));
    }

    #[test]
    fn action_errors_surface_from_launch() {
        let provider = MockCloudProvider::new();
        let mut kind = NodeKind::action(broken);
        assert!(matches!(
            kind.launch(&context(), &provider),
            Err(LaunchError::Action(_))
        ));
    }

    #[test]
    fn aggregate_nests_outputs_by_connection() {
        let mut upstream = BTreeMap::new();
        let mut a = Outputs::new();
        a.insert("k1".into(), Value::from("v1"));
        upstream.insert("conn1".to_string(), a.clone());

        let outputs = NodeKind::Aggregate.capture_outputs(upstream);
        assert_eq!(outputs["conn1"], Value::Map(a));
    }

    #[test]
    fn config_and_aggregate_never_touch_the_provider() {
        // a mock with no expectations panics on any call
        let provider = MockCloudProvider::new();
        for mut kind in [NodeKind::Aggregate, NodeKind::Config] {
            kind.launch(&context(), &provider).unwrap();
            assert_eq!(kind.check_status("x", &provider).unwrap(), Progress::Complete);
        }
    }
}
