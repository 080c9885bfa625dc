use std::sync::Arc;
use topicnote_core::{
    parse_timestamp, DeleteOutcome, DocumentStore, EnrichmentClient, FileDocumentStore,
    LookupOutcome, MemoryDocumentStore, NoteService,
};

struct NoLookup;

impl EnrichmentClient for NoLookup {
    fn lookup(&self, _topic: &str) -> LookupOutcome {
        LookupOutcome::NotFound
    }
}

fn file_service(dir: &tempfile::TempDir) -> NoteService<FileDocumentStore, NoLookup> {
    let store = FileDocumentStore::open(dir.path().join("notes.json")).unwrap();
    NoteService::new(store, NoLookup)
}

#[test]
fn add_list_delete_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_service(&dir);

    service
        .add_note("Biology", "Cell", "Basic unit of life")
        .unwrap();
    let notes = service.get_notes_by_topic("Biology").unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].name, "Cell");
    assert_eq!(notes[0].text, "Basic unit of life");
    assert!(parse_timestamp(&notes[0].timestamp).is_some());

    let outcome = service.delete_note("Biology", "Cell").unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(
        outcome.status_message("Biology", "Cell"),
        "Note 'Cell' under topic 'Biology' was deleted successfully."
    );
    assert!(service.get_notes_by_topic("Biology").unwrap().is_empty());
}

#[test]
fn notes_round_trip_in_insertion_order_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = [
        ("Biology", "Cell", "Basic unit of life"),
        ("Physics", "Atom", "Smallest unit of matter"),
        ("Biology", "Gene", "Unit of heredity"),
        ("Physics", "Quark", "Elementary particle"),
        ("Biology", "Enzyme", "Catalyst\nwith a second line"),
    ];
    {
        let service = file_service(&dir);
        for (topic, name, text) in inputs {
            service.add_note(topic, name, text).unwrap();
        }
    }

    let service = file_service(&dir);
    for topic in ["Biology", "Physics"] {
        let expected: Vec<(&str, &str)> = inputs
            .iter()
            .filter(|(t, _, _)| *t == topic)
            .map(|(_, name, text)| (*name, *text))
            .collect();
        let listed = service.get_notes_by_topic(topic).unwrap();
        let actual: Vec<(&str, &str)> = listed
            .iter()
            .map(|note| (note.name.as_str(), note.text.as_str()))
            .collect();
        assert_eq!(actual, expected);
        assert!(listed
            .iter()
            .all(|note| parse_timestamp(&note.timestamp).is_some()));
    }

    let topics = service
        .store()
        .read(|doc| doc.topics.iter().map(|t| t.name.clone()).collect::<Vec<_>>())
        .unwrap();
    assert_eq!(topics, vec!["Biology".to_string(), "Physics".to_string()]);
}

#[test]
fn repeated_reads_return_identical_results() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_service(&dir);
    service.add_note("Math", "Prime", "Divisible by 1 and itself").unwrap();
    service.add_note("Math", "Ring", "Two operations").unwrap();

    let first = service.get_notes_by_topic("Math").unwrap();
    let second = service.get_notes_by_topic("Math").unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_topic_and_note_are_normal_outcomes() {
    let store = Arc::new(MemoryDocumentStore::new());
    let service = NoteService::new(Arc::clone(&store), NoLookup);

    assert!(service.get_notes_by_topic("Nowhere").unwrap().is_empty());
    assert_eq!(
        service.delete_note("Nowhere", "Nothing").unwrap(),
        DeleteOutcome::NotFound
    );

    service.add_note("History", "Rome", "Founded 753 BC").unwrap();
    assert_eq!(
        service.delete_note("History", "Athens").unwrap(),
        DeleteOutcome::NotFound
    );
    // Add persisted once; the two misses persisted nothing.
    assert_eq!(store.commit_count(), 1);
}

#[test]
fn duplicate_names_are_siblings_and_delete_removes_first_match() {
    let store = Arc::new(MemoryDocumentStore::new());
    let service = NoteService::new(Arc::clone(&store), NoLookup);
    service.add_note("Chemistry", "Bond", "first body").unwrap();
    service.add_note("Chemistry", "Ion", "unrelated").unwrap();
    service.add_note("Chemistry", "Bond", "second body").unwrap();

    let listed = service.get_notes_by_topic("Chemistry").unwrap();
    assert_eq!(listed.len(), 3);

    assert_eq!(
        service.delete_note("Chemistry", "Bond").unwrap(),
        DeleteOutcome::Deleted
    );
    let remaining = service.get_notes_by_topic("Chemistry").unwrap();
    let texts: Vec<&str> = remaining.iter().map(|note| note.text.as_str()).collect();
    assert_eq!(texts, vec!["unrelated", "second body"]);
}

#[test]
fn empty_topic_keeps_existing_after_last_note_deleted() {
    let store = Arc::new(MemoryDocumentStore::new());
    let service = NoteService::new(Arc::clone(&store), NoLookup);
    service.add_note("Art", "Fresco", "Wet plaster").unwrap();
    service.delete_note("Art", "Fresco").unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.topics.len(), 1);
    assert!(snapshot.topics[0].notes.is_empty());
    assert!(service.get_notes_by_topic("Art").unwrap().is_empty());
}
