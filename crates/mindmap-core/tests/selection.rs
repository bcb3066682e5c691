use mindmap_core::{Command, DataSourceNode, MindMapSession, Uid, topmost_ancestors_only};
use pretty_assertions::assert_eq;

fn uid(s: &str) -> Uid {
    Uid::from(s)
}

/// R[A[a1[x]], B, C]
fn sample_tree() -> DataSourceNode {
    DataSourceNode::with_uid("R", "Root").with_children(vec![
        DataSourceNode::with_uid("A", "A").with_children(vec![
            DataSourceNode::with_uid("a1", "a1").with_children(vec![DataSourceNode::with_uid("x", "x")]),
        ]),
        DataSourceNode::with_uid("B", "B"),
        DataSourceNode::with_uid("C", "C"),
    ])
}

fn select_all(session: &mut MindMapSession, ids: &[&str]) {
    for id in ids {
        session
            .exec_command(Command::SetActive {
                node: uid(id),
                active: true,
                additive: true,
            })
            .unwrap();
    }
}

#[test]
fn test_selection_order_is_kept() {
    let mut session = MindMapSession::new(sample_tree());
    select_all(&mut session, &["C", "A", "B"]);
    assert_eq!(session.selection().active(), &[uid("C"), uid("A"), uid("B")]);
    assert_eq!(session.selection().last(), Some(&uid("B")));

    // Flags mirror the list
    let flagged = session.tree().active_uids();
    assert_eq!(flagged, vec![uid("A"), uid("B"), uid("C")]);

    session.exec_command(Command::select("x")).unwrap();
    assert_eq!(session.selection().active(), &[uid("x")]);
    assert_eq!(session.tree().active_uids(), vec![uid("x")]);
}

#[test]
fn test_multi_delete_reselects_survivor_of_last() {
    let mut session = MindMapSession::new(sample_tree());
    select_all(&mut session, &["B", "a1", "A"]);

    session
        .exec_command(Command::DeleteSubtree {
            nodes: session.selection().active().to_vec(),
        })
        .unwrap();

    // a1 goes with A; the last topmost target is A, whose next surviving sibling is C
    let remaining: Vec<Uid> = session.tree().children.iter().map(|c| c.uid().clone()).collect();
    assert_eq!(remaining, vec![uid("C")]);
    assert_eq!(session.selection().active(), &[uid("C")]);
}

#[test]
fn test_collapse_clears_active_descendants() {
    let mut session = MindMapSession::new(sample_tree());
    select_all(&mut session, &["x", "B", "a1"]);

    session
        .exec_command(Command::SetExpand {
            nodes: vec![uid("A")],
            expand: false,
        })
        .unwrap();

    assert_eq!(session.selection().active(), &[uid("B")]);
    assert!(!session.tree().find(&uid("x")).unwrap().data.is_active);
    assert!(session.node(&uid("a1")).is_none());
}

#[test]
fn test_clear_active() {
    let mut session = MindMapSession::new(sample_tree());
    select_all(&mut session, &["A", "B"]);
    session.exec_command(Command::ClearActive).unwrap();
    assert!(session.selection().is_empty());
    assert!(session.tree().active_uids().is_empty());
}

#[test]
fn test_deactivate_single_node() {
    let mut session = MindMapSession::new(sample_tree());
    select_all(&mut session, &["A", "B"]);
    session
        .exec_command(Command::SetActive {
            node: uid("A"),
            active: false,
            additive: false,
        })
        .unwrap();
    assert_eq!(session.selection().active(), &[uid("B")]);
}

#[test]
fn test_topmost_filter() {
    let tree = sample_tree();
    let ids = [uid("x"), uid("B"), uid("A"), uid("B"), uid("missing")];
    assert_eq!(topmost_ancestors_only(&tree, &ids), vec![uid("B"), uid("A")]);
}
