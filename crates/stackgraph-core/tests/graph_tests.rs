use proptest::prelude::*;
use stackgraph_core::graph::StackGraph;
use stackgraph_core::kind::TemplateStack;
use stackgraph_core::node::NodeSpec;
use stackgraph_core::provider::InMemoryProvider;
use stackgraph_core::template::Template;
use stackgraph_core::types::NodeState;
use stackgraph_core::GraphError;
use stackgraph_test_utils::{action_dag, drive};

proptest! {
    #[test]
    fn prop_graph_remains_acyclic(
        node_count in 1..15usize,
        edges in proptest::collection::vec((0..15usize, 0..15usize), 0..40)
    ) {
        let (mut graph, ids, _) = action_dag(InMemoryProvider::new(), node_count, &[], &[]);
        for (i, (from, to)) in edges.into_iter().enumerate() {
            if from < ids.len() && to < ids.len() {
                match graph.connect(ids[to], ids[from], format!("c{i}")) {
                    Ok(()) => prop_assert!(!graph.depends_on(ids[from], ids[to])),
                    Err(GraphError::SelfLoop) => prop_assert_eq!(from, to),
                    Err(GraphError::CycleDetected(_)) => {
                        prop_assert!(graph.depends_on(ids[from], ids[to]));
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other}"),
                }
            }
        }
        for id in &ids {
            prop_assert!(graph.launch_order(*id).is_ok());
        }
    }

    #[test]
    fn prop_acyclic_graphs_terminate(
        node_count in 1..12usize,
        edges in proptest::collection::vec((0..12usize, 0..12usize), 0..30),
        failing in proptest::collection::vec(0..12usize, 0..3)
    ) {
        let (mut graph, ids, _) = action_dag(InMemoryProvider::new(), node_count, &edges, &failing);
        let root = ids[node_count - 1];
        let upstream_failure = graph
            .launch_order(root)
            .unwrap()
            .iter()
            .any(|id| failing.contains(&id.index()));

        let state = drive(&mut graph, root, 2 * node_count as u64 + 2);
        prop_assert!(state.is_terminal());
        prop_assert_eq!(state == NodeState::Failed, upstream_failure);
    }

    #[test]
    fn prop_same_tick_heartbeat_is_a_no_op(
        depth in 1..5usize,
        complete_after in 0..4u32
    ) {
        let provider = InMemoryProvider::new().with_complete_after(complete_after);
        let mut graph = StackGraph::new(provider.clone());
        let mut prev = None;
        for i in 0..depth {
            let mut spec = NodeSpec::new(format!("S{i}"));
            if let Some((_, name)) = &prev {
                let address = format!("{name}:Out");
                spec = spec.input("In", &[address.as_str()]);
            }
            let id = graph.add_template(spec, TemplateStack::new(Template::new())).unwrap();
            if let Some((supplier, name)) = prev.take() {
                graph.connect(id, supplier, name).unwrap();
            }
            prev = Some((id, format!("S{i}")));
        }
        let (root, _) = prev.unwrap();

        for tick in 0..(depth as u64 + 1) * (u64::from(complete_after) + 2) {
            let first = graph.heartbeat(root, tick).unwrap();
            let calls = provider.calls();
            let second = graph.heartbeat(root, tick).unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(provider.calls(), calls);
        }
        prop_assert_eq!(graph.state(root), Some(NodeState::Finished));
    }
}

#[test]
fn test_rejects_simple_cycle() {
    let (mut graph, ids, _) = action_dag(InMemoryProvider::new(), 3, &[(0, 1), (1, 2)], &[]);
    assert!(matches!(
        graph.connect(ids[0], ids[2], "N2"),
        Err(GraphError::CycleDetected(_))
    ));
}

#[test]
fn test_launch_order_covers_only_upstream() {
    let (graph, ids, _) = action_dag(InMemoryProvider::new(), 4, &[(0, 2), (1, 2)], &[]);
    let order = graph.launch_order(ids[2]).unwrap();
    assert_eq!(order.len(), 3);
    assert_eq!(order.last(), Some(&ids[2]));
    assert!(!order.contains(&ids[3]));
}

#[test]
fn test_entry_and_exit_nodes() {
    let (graph, ids, _) = action_dag(InMemoryProvider::new(), 3, &[(0, 1), (1, 2)], &[]);
    assert_eq!(graph.entry_nodes(), vec![ids[0]]);
    assert_eq!(graph.exit_nodes(), vec![ids[2]]);
}

#[test]
fn test_undemanded_nodes_never_launch() {
    let (mut graph, ids, actions) = action_dag(InMemoryProvider::new(), 3, &[(0, 1)], &[]);
    assert_eq!(drive(&mut graph, ids[1], 4), NodeState::Finished);
    assert_eq!(actions[0].launches(), 1);
    assert_eq!(actions[1].launches(), 1);
    assert_eq!(actions[2].launches(), 0);
    assert_eq!(graph.state(ids[2]), Some(NodeState::Idle));
}
