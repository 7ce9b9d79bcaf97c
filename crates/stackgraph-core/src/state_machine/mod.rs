use crate::error::StateMachineError;
use crate::types::NodeState;

/// Validates a state transition.
///
/// Nodes only move forward. `Idle -> Finished` is reserved for config
/// nodes, which are born with their outputs; `Waiting -> Failed` covers a
/// failed dependency or a launch error.
pub fn validate_transition(from: NodeState, to: NodeState) -> Result<(), StateMachineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: NodeState) -> Vec<NodeState> {
    use NodeState::*;
    match from {
        Idle => vec![Waiting, Finished],
        Waiting => vec![Running, Failed],
        Running => vec![Finished, Failed],
        Finished => vec![],
        Failed => vec![],
    }
}

fn allowed(from: NodeState, to: NodeState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = NodeState> {
        prop_oneof![
            Just(NodeState::Idle),
            Just(NodeState::Waiting),
            Just(NodeState::Running),
            Just(NodeState::Finished),
            Just(NodeState::Failed),
        ]
    }

    fn rank(state: NodeState) -> u8 {
        match state {
            NodeState::Idle => 0,
            NodeState::Waiting => 1,
            NodeState::Running => 2,
            NodeState::Finished | NodeState::Failed => 3,
        }
    }

    #[test]
    fn test_forward_path() {
        assert!(validate_transition(NodeState::Idle, NodeState::Waiting).is_ok());
        assert!(validate_transition(NodeState::Waiting, NodeState::Running).is_ok());
        assert!(validate_transition(NodeState::Running, NodeState::Finished).is_ok());
        assert!(validate_transition(NodeState::Running, NodeState::Failed).is_ok());
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(allowed_transitions(NodeState::Finished).is_empty());
        assert!(allowed_transitions(NodeState::Failed).is_empty());
        assert_eq!(
            validate_transition(NodeState::Failed, NodeState::Waiting),
            Err(StateMachineError::IllegalTransition {
                from: NodeState::Failed,
                to: NodeState::Waiting,
            })
        );
    }

    #[test]
    fn test_idle_cannot_skip_to_running() {
        assert!(validate_transition(NodeState::Idle, NodeState::Running).is_err());
    }

    proptest! {
        #[test]
        fn prop_transitions_never_go_backwards(from in any_state(), to in any_state()) {
            if validate_transition(from, to).is_ok() {
                prop_assert!(rank(to) > rank(from));
            }
        }
    }
}
