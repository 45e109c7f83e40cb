#![allow(missing_docs)]

use graphcode::inspector::RecordKind;
use graphcode::{
    ArchiveOptions, Archivable, Archiver, ArchiverState, ClassNameTable, GraphCode, GraphCodeError,
    Inspector, NodeId, ObjectGraph, Result, TypeRegistry, Unarchiver, UnarchiverState,
};

#[derive(Debug, Archivable)]
#[archive(name = "Person")]
struct Person {
    name: String,
    age: u8,
    friends: Vec<NodeId>,
    #[archive(conditional)]
    best_friend: Option<NodeId>,
}

fn person(name: &str, age: u8) -> Person {
    Person {
        name: name.into(),
        age,
        friends: vec![],
        best_friend: None,
    }
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register::<Person>();
    registry
}

/// alice -> bob -> alice, alice ~> carol (conditional only).
fn people() -> (ObjectGraph, NodeId) {
    let mut graph = ObjectGraph::new();
    let alice = graph.add(person("alice", 30));
    let bob = graph.add(person("bob", 31));
    let carol = graph.add(person("carol", 32));
    if let Some(p) = graph.get_mut_as::<Person>(alice) {
        p.friends.push(bob);
        p.best_friend = Some(carol);
    }
    if let Some(p) = graph.get_mut_as::<Person>(bob) {
        p.friends.push(alice);
        p.best_friend = Some(alice);
    }
    (graph, alice)
}

#[test]
fn test_inspector_report() -> Result<()> {
    let (graph, alice) = people();
    let bytes = GraphCode::encode(&graph, Some(alice))?;
    let report = Inspector::inspect(&registry(), &bytes)?;

    assert_eq!(report.archive_size, bytes.len());
    assert_eq!(report.stream_version, 1);
    assert_eq!(report.root_count, 1);
    assert_eq!(report.object_count, 2);

    let kinds: Vec<RecordKind> = report.records.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RecordKind::Value,         // alice
            RecordKind::Value,         // bob
            RecordKind::BackReference, // bob.friends[0] -> alice
            RecordKind::BackReference, // bob.best_friend -> alice
            RecordKind::Nil,           // alice.best_friend (carol not archived)
        ]
    );
    assert_eq!(report.records[1].depth, 1);
    assert_eq!(report.records[2].archive_id, Some(1));

    let text = report.to_string();
    assert!(text.contains("GRAPHCODE INSPECTOR REPORT"));
    assert!(text.contains("#2 Person v0"));

    let json = serde_json::to_value(&report).map_err(|e| GraphCodeError::Internal(e.to_string()))?;
    assert_eq!(json["records"][2]["kind"], "back_reference");
    assert_eq!(json["records"][0]["class_name"], "Person");
    Ok(())
}

#[test]
fn test_inspector_shows_aliases() -> Result<()> {
    let (graph, alice) = people();
    let bytes = GraphCode::builder()
        .alias("Person", "P")
        .encode(&graph, Some(alice))?;
    let options = ArchiveOptions::new().decode_alias("P", "Person");
    let report = Inspector::inspect_with_options(&registry(), &bytes, options)?;
    assert_eq!(report.records[0].archived_name.as_deref(), Some("P"));
    assert_eq!(report.records[0].class_name.as_deref(), Some("Person"));
    assert!(report.to_string().contains("(archived as P)"));
    Ok(())
}

#[test]
fn test_shared_class_name_table() -> Result<()> {
    let (graph, alice) = people();
    let mut table = ClassNameTable::new();
    table.register_alias("Person", "Human");
    table.register_decode_alias("Human", "Person");

    let options = GraphCode::builder().class_names(table);
    let bytes = options.encode(&graph, Some(alice))?;
    let decoded = options.decode(&registry(), &bytes)?;
    let root = decoded
        .root_as::<Person>()
        .ok_or_else(|| GraphCodeError::Internal("no root".into()))?;
    assert_eq!(root.name, "alice");
    Ok(())
}

#[test]
fn test_session_states() -> Result<()> {
    let (graph, alice) = people();

    let mut archiver = Archiver::new(&graph);
    assert_eq!(archiver.state(), ArchiverState::Idle);
    archiver.encode_root(Some(alice))?;
    assert_eq!(archiver.state(), ArchiverState::Done);
    let bytes = archiver.into_bytes()?;

    let registry = registry();
    let mut unarchiver = Unarchiver::new(&registry, &bytes);
    assert_eq!(unarchiver.state(), UnarchiverState::Idle);
    unarchiver.decode_root()?;
    assert_eq!(unarchiver.state(), UnarchiverState::Done);
    assert!(unarchiver.is_at_end());

    // Nothing left to decode: the session fails and stays failed.
    assert!(matches!(unarchiver.decode_root(), Err(GraphCodeError::Format(_))));
    assert_eq!(unarchiver.state(), UnarchiverState::Failed);
    assert!(unarchiver.into_graph().is_err());
    Ok(())
}

#[test]
fn test_empty_session_yields_header_only() -> Result<()> {
    let graph = ObjectGraph::new();
    let bytes = Archiver::new(&graph).into_bytes()?;
    assert_eq!(bytes, b"GRPH\x00\x01");

    let registry = registry();
    let report = Inspector::inspect(&registry, &bytes)?;
    assert_eq!(report.root_count, 0);
    assert_eq!(report.object_count, 0);
    assert_eq!(report.stream_version, 1);
    assert!(report.records.is_empty());

    let mut unarchiver = Unarchiver::new(&registry, &bytes);
    assert!(!unarchiver.has_remaining_roots()?);
    assert_eq!(unarchiver.state(), UnarchiverState::Idle);
    assert!(unarchiver.into_graph()?.is_empty());
    Ok(())
}
