//! End-to-end tests for the taxonomy engine.
//!
//! Covers the reference scenarios plus property tests over random edit
//! sequences:
//! - exactly one primary parent per connected child
//! - no cycles
//! - contexts and aggregates equal a full repair
//! - unique sibling ranks

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proptest::prelude::*;
use taxograph_core::{
    Connection, ConnectionKind, Grade, GradeAverage, Node, NodeId, NodeType, TaxonomyError,
    VersionId,
};
use taxograph_engine::{
    ConnectOptions, ConnectionUpdate, Taxonomy, TaxonomyConfig, TaxonomySnapshot,
};
use taxograph_storage::MemoryGraphStore;

fn setup() -> (Taxonomy<MemoryGraphStore>, VersionId) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    (Taxonomy::in_memory(), VersionId::default())
}

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn connect(
    tx: &Taxonomy<MemoryGraphStore>,
    v: &VersionId,
    parent: &str,
    child: &str,
    options: ConnectOptions,
) -> Result<Connection, TaxonomyError> {
    let kind = if child.starts_with('R') {
        ConnectionKind::Leaf
    } else {
        ConnectionKind::Branch
    };
    tx.connect(v, &id(parent), &id(child), kind, options)
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn scenario_first_child_gets_rank_one_and_context() {
    let (tx, v) = setup();
    tx.add_node(&v, Node::new("A", "A", NodeType::Subject).context_root(true))
        .unwrap();
    tx.add_node(&v, Node::new("B", "B", NodeType::Topic)).unwrap();

    let edge = connect(&tx, &v, "A", "B", ConnectOptions::default()).unwrap();
    assert_eq!(edge.rank, 1);
    assert!(edge.primary);

    let contexts = tx.contexts(&v, &id("B")).unwrap();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].path, "/A/B");
    assert_eq!(contexts[0].root_id, id("A"));
    assert!(contexts[0].is_primary);
}

#[test]
fn scenario_second_parent_adds_context_and_keeps_primary() {
    let (tx, v) = setup();
    tx.add_node(&v, Node::new("A", "A", NodeType::Programme).context_root(true))
        .unwrap();
    tx.add_node(&v, Node::new("C", "C", NodeType::Programme).context_root(true))
        .unwrap();
    tx.add_node(&v, Node::new("B", "B", NodeType::Subject)).unwrap();

    let ab = connect(&tx, &v, "A", "B", ConnectOptions::default()).unwrap();
    let cb = connect(&tx, &v, "C", "B", ConnectOptions::default().primary(false)).unwrap();

    assert!(!cb.primary);
    assert!(tx.get_connection(&v, &ab.id).unwrap().unwrap().primary);

    let contexts = tx.contexts(&v, &id("B")).unwrap();
    let paths: Vec<_> = contexts.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["/A/B", "/C/B"]);
    assert!(contexts[0].is_primary);
    assert!(!contexts[1].is_primary);
}

#[test]
fn scenario_cycle_is_rejected_without_changes() {
    let (tx, v) = setup();
    tx.add_node(&v, Node::new("A", "A", NodeType::Subject).context_root(true))
        .unwrap();
    tx.add_node(&v, Node::new("B", "B", NodeType::Subject)).unwrap();
    connect(&tx, &v, "A", "B", ConnectOptions::default()).unwrap();
    let before = tx.snapshot(&v).unwrap();

    let err = connect(&tx, &v, "B", "A", ConnectOptions::default()).unwrap_err();
    assert_eq!(err, TaxonomyError::invalid_argument("cycle detected"));
    assert_eq!(tx.snapshot(&v).unwrap(), before);
}

#[test]
fn scenario_disconnect_restores_aggregates() {
    let (tx, v) = setup();
    tx.add_node(&v, Node::new("S", "S", NodeType::Subject)).unwrap();
    tx.add_node(&v, Node::new("T", "T", NodeType::Topic)).unwrap();
    tx.add_node(
        &v,
        Node::new("R", "R", NodeType::Resource).grade(Grade::new(3).unwrap()),
    )
    .unwrap();
    connect(&tx, &v, "S", "T", ConnectOptions::default()).unwrap();
    let before_t = tx.quality_average(&v, &id("T")).unwrap();
    let before_s = tx.quality_average(&v, &id("S")).unwrap();

    let edge = connect(&tx, &v, "T", "R", ConnectOptions::default()).unwrap();
    let three = Some(GradeAverage { sum: 3, count: 1 });
    assert_eq!(tx.quality_average(&v, &id("T")).unwrap(), three);
    assert_eq!(tx.quality_average(&v, &id("S")).unwrap(), three);

    tx.disconnect(&v, &edge.id).unwrap();
    assert_eq!(tx.quality_average(&v, &id("T")).unwrap(), before_t);
    assert_eq!(tx.quality_average(&v, &id("S")).unwrap(), before_s);
}

#[test]
fn scenario_insert_between_siblings() {
    let (tx, v) = setup();
    tx.add_node(&v, Node::new("P", "P", NodeType::Subject)).unwrap();
    for (child, rank) in [("T1", 1), ("T2", 2), ("T5", 5)] {
        tx.add_node(&v, Node::new(child, child, NodeType::Topic)).unwrap();
        connect(&tx, &v, "P", child, ConnectOptions::default().rank(rank)).unwrap();
    }
    tx.add_node(&v, Node::new("N", "N", NodeType::Topic)).unwrap();
    connect(&tx, &v, "P", "N", ConnectOptions::default().rank(2)).unwrap();

    let order: Vec<(String, i32)> = tx
        .child_connections(&v, &id("P"))
        .unwrap()
        .into_iter()
        .map(|e| (e.child.to_string(), e.rank))
        .collect();
    assert_eq!(
        order,
        vec![
            ("T1".to_string(), 1),
            ("N".to_string(), 2),
            ("T2".to_string(), 3),
            ("T5".to_string(), 5),
        ]
    );
}

#[test]
fn child_tree_lists_leaves_before_branches() {
    let (tx, v) = setup();
    tx.add_node(&v, Node::new("S", "S", NodeType::Subject)).unwrap();
    for t in ["T1", "T2", "T3"] {
        tx.add_node(&v, Node::new(t, t, NodeType::Topic)).unwrap();
    }
    for r in ["R1", "R2"] {
        tx.add_node(&v, Node::new(r, r, NodeType::Resource)).unwrap();
    }
    connect(&tx, &v, "S", "T1", ConnectOptions::default()).unwrap();
    connect(&tx, &v, "S", "T2", ConnectOptions::default()).unwrap();
    connect(&tx, &v, "T1", "T3", ConnectOptions::default()).unwrap();
    connect(&tx, &v, "T1", "R1", ConnectOptions::default()).unwrap();
    connect(&tx, &v, "S", "R2", ConnectOptions::default()).unwrap();

    let order: Vec<String> = tx
        .child_tree(&v, &id("S"))
        .unwrap()
        .into_iter()
        .map(|e| e.child.to_string())
        .collect();
    assert_eq!(order, vec!["R2", "T1", "R1", "T3", "T2"]);
}

#[test]
fn child_tree_repeats_shared_subtree() {
    let (tx, v) = setup();
    tx.add_node(&v, Node::new("P", "P", NodeType::Programme)).unwrap();
    for s in ["S0", "S1", "S2"] {
        tx.add_node(&v, Node::new(s, s, NodeType::Subject)).unwrap();
    }
    tx.add_node(&v, Node::new("T", "T", NodeType::Topic)).unwrap();
    connect(&tx, &v, "P", "S0", ConnectOptions::default()).unwrap();
    connect(&tx, &v, "P", "S1", ConnectOptions::default()).unwrap();
    connect(&tx, &v, "S0", "S2", ConnectOptions::default()).unwrap();
    connect(&tx, &v, "S1", "S2", ConnectOptions::default()).unwrap();
    connect(&tx, &v, "S2", "T", ConnectOptions::default()).unwrap();

    let order: Vec<String> = tx
        .child_tree(&v, &id("P"))
        .unwrap()
        .into_iter()
        .map(|e| format!("{}->{}", e.parent, e.child))
        .collect();
    assert_eq!(
        order,
        vec!["P->S0", "S0->S2", "S2->T", "P->S1", "S1->S2", "S2->T"]
    );
}

#[test]
fn deep_chain_hits_ancestor_bound() {
    let config = TaxonomyConfig {
        max_ancestor_depth: 3,
        ..TaxonomyConfig::default()
    };
    let tx = Taxonomy::with_config(Arc::new(MemoryGraphStore::new()), config).unwrap();
    let v = VersionId::default();

    tx.add_node(&v, Node::new("S", "S", NodeType::Subject)).unwrap();
    let mut parent = "S".to_string();
    for i in 0..4 {
        let child = format!("T{i}");
        tx.add_node(&v, Node::new(child.as_str(), "t", NodeType::Topic))
            .unwrap();
        let result = connect(&tx, &v, &parent, &child, ConnectOptions::default());
        if i < 3 {
            result.unwrap();
        } else {
            assert_eq!(
                result.unwrap_err(),
                TaxonomyError::invalid_argument("too many levels")
            );
        }
        parent = child;
    }
}

#[test]
fn versions_do_not_share_graphs() {
    let (tx, _) = setup();
    let draft = VersionId::new("draft");
    let live = VersionId::new("live");
    for v in [&draft, &live] {
        tx.add_node(v, Node::new("A", "A", NodeType::Subject)).unwrap();
        tx.add_node(v, Node::new("B", "B", NodeType::Topic)).unwrap();
    }
    connect(&tx, &draft, "A", "B", ConnectOptions::default()).unwrap();

    assert_eq!(tx.parent_connections(&draft, &id("B")).unwrap().len(), 1);
    assert!(tx.parent_connections(&live, &id("B")).unwrap().is_empty());
}

#[test]
fn update_rank_and_primary_together() {
    let (tx, v) = setup();
    for p in ["A", "C"] {
        tx.add_node(&v, Node::new(p, p, NodeType::Programme)).unwrap();
    }
    for s in ["B", "D"] {
        tx.add_node(&v, Node::new(s, s, NodeType::Subject)).unwrap();
    }
    connect(&tx, &v, "A", "D", ConnectOptions::default()).unwrap();
    let ab = connect(&tx, &v, "A", "B", ConnectOptions::default()).unwrap();
    let cb = connect(&tx, &v, "C", "B", ConnectOptions::default().primary(false)).unwrap();

    let updated = tx
        .update_connection(
            &v,
            &ab.id,
            ConnectionUpdate {
                rank: Some(1),
                primary: Some(false),
                ..ConnectionUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.rank, 1);
    assert!(!updated.primary);
    assert!(tx.get_connection(&v, &cb.id).unwrap().unwrap().primary);

    let ranks: Vec<(String, i32)> = tx
        .child_connections(&v, &id("A"))
        .unwrap()
        .into_iter()
        .map(|e| (e.child.to_string(), e.rank))
        .collect();
    assert_eq!(ranks, vec![("B".to_string(), 1), ("D".to_string(), 2)]);
}

// =============================================================================
// Properties
// =============================================================================

const NODES: &[(&str, NodeType)] = &[
    ("P0", NodeType::Programme),
    ("P1", NodeType::Programme),
    ("S0", NodeType::Subject),
    ("S1", NodeType::Subject),
    ("S2", NodeType::Subject),
    ("T0", NodeType::Topic),
    ("T1", NodeType::Topic),
    ("T2", NodeType::Topic),
    ("T3", NodeType::Topic),
    ("R0", NodeType::Resource),
    ("R1", NodeType::Resource),
    ("R2", NodeType::Resource),
];

#[derive(Debug, Clone)]
enum Op {
    Connect {
        parent: usize,
        child: usize,
        rank: Option<i32>,
        primary: Option<bool>,
    },
    Disconnect {
        pick: usize,
    },
    Update {
        pick: usize,
        rank: Option<i32>,
        primary: Option<bool>,
    },
    Grade {
        leaf: usize,
        grade: Option<u8>,
    },
    ReplacePrimary {
        node: usize,
    },
    Rename {
        node: usize,
        visible: bool,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let n = NODES.len();
    prop_oneof![
        4 => (0..n, 0..n, proptest::option::of(-1..5i32), proptest::option::of(any::<bool>()))
            .prop_map(|(parent, child, rank, primary)| Op::Connect { parent, child, rank, primary }),
        2 => any::<usize>().prop_map(|pick| Op::Disconnect { pick }),
        2 => (any::<usize>(), proptest::option::of(-1..5i32), proptest::option::of(any::<bool>()))
            .prop_map(|(pick, rank, primary)| Op::Update { pick, rank, primary }),
        1 => (0..3usize, proptest::option::of(1..=5u8))
            .prop_map(|(leaf, grade)| Op::Grade { leaf, grade }),
        1 => (0..n).prop_map(|node| Op::ReplacePrimary { node }),
        1 => (0..n, any::<bool>()).prop_map(|(node, visible)| Op::Rename { node, visible }),
    ]
}

fn seeded() -> (Taxonomy<MemoryGraphStore>, VersionId) {
    let tx = Taxonomy::in_memory();
    let v = VersionId::default();
    for (name, node_type) in NODES {
        let root = matches!(node_type, NodeType::Programme);
        tx.add_node(&v, Node::new(*name, *name, *node_type).context_root(root))
            .unwrap();
    }
    (tx, v)
}

fn pick_edge(snap: &TaxonomySnapshot, pick: usize) -> Option<Connection> {
    if snap.connections.is_empty() {
        None
    } else {
        Some(snap.connections[pick % snap.connections.len()].clone())
    }
}

/// Apply one op; rejected ops are expected and ignored.
fn apply(tx: &Taxonomy<MemoryGraphStore>, v: &VersionId, op: &Op) {
    match op {
        Op::Connect {
            parent,
            child,
            rank,
            primary,
        } => {
            let (child_id, child_type) = NODES[*child];
            let options = ConnectOptions {
                relevance: None,
                rank: *rank,
                primary: *primary,
            };
            let _ = tx.connect(
                v,
                &id(NODES[*parent].0),
                &id(child_id),
                ConnectionKind::for_child(child_type),
                options,
            );
        }
        Op::Disconnect { pick } => {
            if let Some(edge) = pick_edge(&tx.snapshot(v).unwrap(), *pick) {
                tx.disconnect(v, &edge.id).unwrap();
            }
        }
        Op::Update {
            pick,
            rank,
            primary,
        } => {
            if let Some(edge) = pick_edge(&tx.snapshot(v).unwrap(), *pick) {
                let update = ConnectionUpdate {
                    relevance: None,
                    rank: *rank,
                    primary: *primary,
                };
                let _ = tx.update_connection(v, &edge.id, update);
            }
        }
        Op::Grade { leaf, grade } => {
            let grade = grade.map(|g| Grade::new(g).unwrap());
            tx.set_grade(v, &id(&format!("R{leaf}")), grade).unwrap();
        }
        Op::ReplacePrimary { node } => {
            tx.replace_primary_connections_for(v, &id(NODES[*node].0))
                .unwrap();
        }
        Op::Rename { node, visible } => {
            let update = taxograph_engine::NodeUpdate {
                name: Some(format!("{}-renamed", NODES[*node].0)),
                visible: Some(*visible),
                context_root: None,
            };
            tx.update_node(v, &id(NODES[*node].0), update).unwrap();
        }
    }
}

fn assert_single_primary(snap: &TaxonomySnapshot) {
    let mut primaries: HashMap<(NodeId, ConnectionKind), usize> = HashMap::new();
    for edge in &snap.connections {
        let count = primaries.entry((edge.child.clone(), edge.kind)).or_default();
        if edge.primary {
            *count += 1;
        }
    }
    for ((child, kind), count) in primaries {
        assert_eq!(count, 1, "{child} has {count} primary {kind:?} parents");
    }
}

fn assert_acyclic(snap: &TaxonomySnapshot) {
    let mut children: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for edge in &snap.connections {
        children.entry(&edge.parent).or_default().push(&edge.child);
    }

    fn visit<'a>(
        node: &'a NodeId,
        children: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
        on_path: &mut HashSet<&'a NodeId>,
        done: &mut HashSet<&'a NodeId>,
    ) {
        if done.contains(node) {
            return;
        }
        assert!(on_path.insert(node), "cycle through {node}");
        for child in children.get(node).into_iter().flatten() {
            visit(child, children, on_path, done);
        }
        on_path.remove(node);
        done.insert(node);
    }

    let mut done = HashSet::new();
    for node in snap.nodes.keys() {
        visit(node, &children, &mut HashSet::new(), &mut done);
    }
}

fn assert_unique_ranks(snap: &TaxonomySnapshot) {
    let mut seen: HashSet<(&NodeId, i32)> = HashSet::new();
    for edge in &snap.connections {
        assert!(
            seen.insert((&edge.parent, edge.rank)),
            "duplicate rank {} under {}",
            edge.rank,
            edge.parent
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_after_every_edit(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let (tx, v) = seeded();
        for op in &ops {
            apply(&tx, &v, op);
            let snap = tx.snapshot(&v).unwrap();
            assert_single_primary(&snap);
            assert_acyclic(&snap);
            assert_unique_ranks(&snap);
        }
    }

    #[test]
    fn repair_matches_incremental_state(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let (tx, v) = seeded();
        for op in &ops {
            apply(&tx, &v, op);
        }
        let incremental = tx.snapshot(&v).unwrap();

        for node in incremental.nodes.keys() {
            tx.refresh_contexts(&v, node).unwrap();
        }
        tx.rebuild_all_averages(&v).unwrap();
        prop_assert_eq!(&tx.snapshot(&v).unwrap(), &incremental);

        tx.rebuild_all_averages(&v).unwrap();
        prop_assert_eq!(&tx.snapshot(&v).unwrap(), &incremental);
    }
}
