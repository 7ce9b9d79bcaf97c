//! Cloud provider seam
//!
//! The graph talks to the cloud through exactly three verbs: look a stack
//! up by name, create one, and read its current status and outputs.

mod memory;

pub use memory::{InMemoryProvider, ProviderCall};

use crate::error::ProviderError;
use crate::types::{Outputs, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Status string reported by the provider for a stack
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StackStatus {
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    UpdateComplete,
    RollbackInProgress,
    RollbackComplete,
    RollbackFailed,
    /// Any status the orchestrator does not act on
    Other(String),
}

/// What a status means for the node polling it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    InProgress,
    Complete,
    Failed,
}

impl StackStatus {
    /// Parse the provider's status string
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "CREATE_FAILED" => Self::CreateFailed,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "ROLLBACK_IN_PROGRESS" => Self::RollbackInProgress,
            "ROLLBACK_COMPLETE" => Self::RollbackComplete,
            "ROLLBACK_FAILED" => Self::RollbackFailed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Provider spelling of the status
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::CreateFailed => "CREATE_FAILED",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::Other(raw) => raw,
        }
    }

    /// Map the status onto the node lifecycle
    #[must_use]
    pub fn progress(&self) -> Progress {
        match self {
            Self::CreateComplete | Self::UpdateComplete => Progress::Complete,
            Self::CreateFailed | Self::RollbackComplete | Self::RollbackFailed => Progress::Failed,
            _ => Progress::InProgress,
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider view of one stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    pub name: String,
    pub status: StackStatus,
    pub outputs: Outputs,
}

/// Everything needed to create a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStackRequest {
    pub name: String,
    pub template_body: String,
    pub parameters: Vec<(String, String)>,
    pub tags: BTreeMap<String, Value>,
}

/// Backing cloud provider
#[cfg_attr(test, mockall::automock)]
pub trait CloudProvider {
    /// Look up a stack by name, `None` if it does not exist
    fn find_stack(&self, name: &str) -> Result<Option<StackDescription>, ProviderError>;

    /// Submit a new stack
    fn create_stack(&self, request: CreateStackRequest) -> Result<(), ProviderError>;

    /// Current status and outputs of an existing stack
    fn describe_stack(&self, name: &str) -> Result<StackDescription, ProviderError>;
}
