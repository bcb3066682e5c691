//! Session walkthrough
//!
//! Builds a small map, edits it through commands and key chords, and prints the layout.
//! Engine debug logs (commands, history, layout passes) go through the fmt subscriber.

use mindmap_core::{Command, DataSourceNode, KeyChord, MindMapSession, StateChangeType};
use std::sync::{Arc, Mutex};

fn print_layout(session: &MindMapSession) {
    for node in session.nodes().iter() {
        let text = session
            .tree()
            .find(&node.uid)
            .map(|n| n.data.text.as_str())
            .unwrap_or("?");
        println!(
            "  {:indent$}{text:<16} left={:>6.1} top={:>6.1} size={:.0}x{:.0}",
            "",
            node.left,
            node.top,
            node.width,
            node.height,
            indent = node.depth * 2,
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let root = DataSourceNode::with_uid("root", "Project").with_children(vec![
        DataSourceNode::with_uid("goals", "Goals"),
        DataSourceNode::with_uid("risks", "Risks"),
    ]);
    let mut session = MindMapSession::new(root);

    let structural = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&structural);
    session.subscribe(move |change| {
        if change.change_type == StateChangeType::DocumentModified {
            *counter.lock().unwrap() += 1;
        }
    });

    println!("1. Initial layout:");
    print_layout(&session);

    println!("\n2. Tab on `goals`, then Enter on the new node:");
    session.exec_command(Command::select("goals")).unwrap();
    session.handle_key(&KeyChord::key("Tab")).unwrap();
    session.handle_key(&KeyChord::key("Enter")).unwrap();
    print_layout(&session);

    println!("\n3. Collapse `goals`:");
    session
        .exec_command(Command::SetExpand {
            nodes: vec!["goals".into()],
            expand: false,
        })
        .unwrap();
    print_layout(&session);

    println!("\n4. Undo twice:");
    session.exec_command(Command::Undo).unwrap();
    session.exec_command(Command::Undo).unwrap();
    print_layout(&session);

    let state = session.state();
    println!(
        "\nversion={} nodes={} undo_depth={} redo_depth={} structural changes={}",
        state.version,
        state.node_count,
        state.undo_redo.undo_depth,
        state.undo_redo.redo_depth,
        structural.lock().unwrap()
    );
    println!("\nDocument:\n{}", session.tree().to_json_pretty().unwrap());
}
