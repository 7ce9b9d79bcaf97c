//! In-memory provider for dry runs and tests
//!
//! Stacks are created `CREATE_IN_PROGRESS` and complete after a configurable
//! number of status reads. Handles are cheap clones sharing one state, so a
//! caller can keep a handle after moving another into a graph.

use super::{CloudProvider, CreateStackRequest, StackDescription, StackStatus};
use crate::error::ProviderError;
use crate::naming::STACK_NAME_TAG;
use crate::types::Outputs;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A call observed by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Find(String),
    Create(String),
    Describe(String),
}

#[derive(Debug)]
struct SimStack {
    base_name: String,
    status: StackStatus,
    outputs: Outputs,
    reads: u32,
}

#[derive(Debug, Default)]
struct State {
    stacks: BTreeMap<String, SimStack>,
    complete_after: u32,
    failing: BTreeSet<String>,
    scripted: BTreeMap<String, Outputs>,
    calls: Vec<ProviderCall>,
}

/// Simulated cloud provider
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    inner: Arc<Mutex<State>>,
}

impl InMemoryProvider {
    /// Provider whose stacks complete on the first status read
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of status reads a stack stays in progress before settling
    #[must_use]
    pub fn with_complete_after(self, reads: u32) -> Self {
        self.inner.lock().complete_after = reads;
        self
    }

    /// Make every stack with this base name roll back instead of completing
    pub fn fail_stack(&self, base_name: impl Into<String>) {
        self.inner.lock().failing.insert(base_name.into());
    }

    /// Outputs reported once a stack with this base name completes
    pub fn script_outputs(&self, base_name: impl Into<String>, outputs: Outputs) {
        self.inner.lock().scripted.insert(base_name.into(), outputs);
    }

    /// Register a stack that already exists, as left behind by an earlier run
    pub fn insert_existing(&self, name: impl Into<String>, status: StackStatus, outputs: Outputs) {
        let name = name.into();
        self.inner.lock().stacks.insert(
            name.clone(),
            SimStack {
                base_name: name,
                status,
                outputs,
                reads: 0,
            },
        );
    }

    /// Every call seen so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of create requests received
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, ProviderCall::Create(_)))
            .count()
    }

    /// Names of every stack the provider knows about
    #[must_use]
    pub fn stack_names(&self) -> Vec<String> {
        self.inner.lock().stacks.keys().cloned().collect()
    }

    fn describe(stack: &SimStack, name: &str) -> StackDescription {
        StackDescription {
            name: name.to_string(),
            status: stack.status.clone(),
            outputs: if stack.status.progress() == super::Progress::Complete {
                stack.outputs.clone()
            } else {
                Outputs::new()
            },
        }
    }
}

impl CloudProvider for InMemoryProvider {
    fn find_stack(&self, name: &str) -> Result<Option<StackDescription>, ProviderError> {
        let mut state = self.inner.lock();
        state.calls.push(ProviderCall::Find(name.to_string()));
        Ok(state.stacks.get(name).map(|s| Self::describe(s, name)))
    }

    fn create_stack(&self, request: CreateStackRequest) -> Result<(), ProviderError> {
        let mut state = self.inner.lock();
        state.calls.push(ProviderCall::Create(request.name.clone()));
        if state.stacks.contains_key(&request.name) {
            return Err(ProviderError::Rejected {
                name: request.name,
                reason: "AlreadyExistsException".to_string(),
            });
        }
        let base_name = request
            .tags
            .get(STACK_NAME_TAG)
            .map_or_else(|| request.name.clone(), |v| v.render());
        let outputs = state.scripted.get(&base_name).cloned().unwrap_or_default();
        state.stacks.insert(
            request.name,
            SimStack {
                base_name,
                status: StackStatus::CreateInProgress,
                outputs,
                reads: 0,
            },
        );
        Ok(())
    }

    fn describe_stack(&self, name: &str) -> Result<StackDescription, ProviderError> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.calls.push(ProviderCall::Describe(name.to_string()));
        let stack = state
            .stacks
            .get_mut(name)
            .ok_or_else(|| ProviderError::StackNotFound(name.to_string()))?;
        if stack.status == StackStatus::CreateInProgress {
            if stack.reads >= state.complete_after {
                stack.status = if state.failing.contains(&stack.base_name) {
                    StackStatus::RollbackComplete
                } else {
                    StackStatus::CreateComplete
                };
            } else {
                stack.reads += 1;
            }
        }
        Ok(Self::describe(stack, name))
    }
}
