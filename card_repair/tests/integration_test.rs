//! Integration tests for card_repair.
//!
//! Each test runs against a SQLite database in its own temporary directory.

use std::path::Path;

use tempfile::TempDir;

use card_kernel::hashing::table_hash;
use card_kernel::{active_template, Card, CardId};
use card_repair::backup::{latest_backup, read_backup};
use card_repair::{CardStore, MemorySink, PassKind, RepairSession, RunError, SqliteCardStore};

fn open_store(path: &Path) -> SqliteCardStore {
    let store = SqliteCardStore::open(path).unwrap();
    store.create_schema().unwrap();
    store
}

/// Seed a table with one complete physical card, one card missing its
/// project-4 record, an untrimmed text and unused numbers 3 and 4.
fn seed(store: &mut SqliteCardStore) {
    let rows = [
        (10, 2, 1, "AAA", Some("Main door"), true),
        (10, 3, 1, "AAA", Some("Main door"), true),
        (10, 4, 1, "AAA", None, true),
        (11, 2, 2, "BBB", Some(" Garage "), false),
        (11, 3, 2, "BBB", None, false),
        (12, 2, 5, "CCC", Some("Office"), true),
        (12, 3, 5, "CCC", Some("Office"), true),
        (12, 4, 5, "CCC", Some("Office"), true),
    ];
    for (customer, project, number, identity, text, active) in rows {
        let mut card = Card::new_sibling(customer, project, number, identity);
        card.text = text.map(Into::into);
        card.set_flags(active).unwrap();
        store.save(&mut card).unwrap();
    }
}

fn find<'a>(cards: &'a [Card], identity: &str, project: i32) -> Option<&'a Card> {
    cards
        .iter()
        .find(|c| c.card_identity == identity && c.project_number == project)
}

#[test]
fn test_full_run_repairs_table() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("cards.db");
    let mut store = open_store(&db);
    seed(&mut store);

    let mut session = RepairSession::new(store, MemorySink::new());
    let report = session.run(&PassKind::DEFAULT_ORDER).unwrap();
    let (_, sink) = session.into_parts();

    // Reopen to read what actually reached the database.
    let mut reopened = SqliteCardStore::open(&db).unwrap();
    let cards = reopened.load_all().unwrap();
    assert_eq!(cards.len(), 9);

    let garage = find(&cards, "BBB", 2).unwrap();
    assert_eq!(garage.text.as_deref(), Some("Garage"));

    // Propagation runs before completion, so the new record copies the
    // already-propagated text of its lowest-project sibling.
    let slave = find(&cards, "BBB", 3).unwrap();
    assert_eq!(slave.text.as_deref(), Some("Garage"));
    let created = find(&cards, "BBB", 4).unwrap();
    assert!(created.id.is_some());
    assert_eq!(created.customer_number, 11);
    assert_eq!(created.card_number, 2);
    assert_eq!(created.text.as_deref(), Some("Garage"));
    assert!(!created.is_active());

    // The untouched slave text of AAA/4 was blank and gets the master's text.
    assert_eq!(find(&cards, "AAA", 4).unwrap().text.as_deref(), Some("Main door"));

    assert!(sink.contains("Creating new card"));
    assert!(sink.contains("No card(s) at position 3-5"));
    assert!(report.remaining.iter().any(|v| v.contains("3-5")));
    assert_eq!(report.diff.inserted.len(), 1);
    assert_ne!(report.hash_before, report.hash_after);
    assert_eq!(report.hash_after, table_hash(&cards));
}

#[test]
fn test_completed_sibling_takes_its_project_template() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir.path().join("cards.db"));
    let mut source = Card::new_sibling(3, 2, 1, "ZZZ");
    source.set_flags(true).unwrap();
    store.save(&mut source).unwrap();

    let mut session = RepairSession::new(store, MemorySink::new());
    session.run(&[PassKind::CompleteSiblings]).unwrap();
    let (mut store, _) = session.into_parts();

    let cards = store.load_all().unwrap();
    assert_eq!(cards.len(), 3);
    for project in [3, 4] {
        let card = find(&cards, "ZZZ", project).unwrap();
        assert_eq!(card.flags(), active_template(project).unwrap());
        assert!(card.is_flags_valid().unwrap());
    }
}

#[test]
fn test_second_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir.path().join("cards.db"));
    seed(&mut store);

    let mut session = RepairSession::new(store, MemorySink::new());
    let first = session.run(&PassKind::DEFAULT_ORDER).unwrap();
    assert!(first.total_writes() > 0);

    let second = session.run(&PassKind::DEFAULT_ORDER).unwrap();
    assert_eq!(second.total_writes(), 0);
    assert!(second.diff.is_empty());
    assert_eq!(second.hash_before, second.hash_after);
}

#[test]
fn test_read_only_passes_leave_hash_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir.path().join("cards.db"));
    seed(&mut store);

    let mut session = RepairSession::new(store, MemorySink::new())
        .with_backup_dir(dir.path().join("backups"));
    let report = session
        .run(&[PassKind::AuditFlags, PassKind::FindNumberingGaps])
        .unwrap();
    assert_eq!(report.total_writes(), 0);
    assert_eq!(report.hash_before, report.hash_after);
    // No pass writes, so no backup is taken.
    assert!(report.backup.is_none());
    assert!(latest_backup(&dir.path().join("backups")).unwrap().is_none());
}

#[test]
fn test_backup_then_restore() {
    let dir = TempDir::new().unwrap();
    let backups = dir.path().join("backups");
    let mut store = open_store(&dir.path().join("cards.db"));
    seed(&mut store);
    let original = store.load_all().unwrap();

    let mut session = RepairSession::new(store, MemorySink::new()).with_backup_dir(&backups);
    let report = session.run(&PassKind::DEFAULT_ORDER).unwrap();
    let backup = report.backup.expect("a writing run takes a backup");
    assert_eq!(latest_backup(&backups).unwrap(), Some(backup.clone()));
    assert_eq!(read_backup(&backup).unwrap(), original);

    let restored = session.restore(&backup).unwrap();
    assert_eq!(restored, original.len());
    let (mut store, sink) = session.into_parts();
    assert_eq!(store.load_all().unwrap(), original);
    assert!(sink.contains("Restored 8 cards"));
}

#[test]
fn test_check_reports_violations() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir.path().join("cards.db"));
    seed(&mut store);
    let mut session = RepairSession::new(store, MemorySink::new());

    let violations = session.check().unwrap();
    assert!(!violations.is_empty());
    assert!(session.sink().contains("Checked 8 cards"));
}

#[test]
fn test_invalid_project_aborts_run() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir.path().join("cards.db"));
    let mut good = Card::new_sibling(1, 2, 1, "QQQ");
    store.save(&mut good).unwrap();
    // Flags set on a project with no template cannot be judged.
    let mut bad = Card::from_row(CardId(99), 1, 7, 1, "QQQ".into(), None, [true; 13]);
    bad.id = None;
    store.save(&mut bad).unwrap();

    let mut session = RepairSession::new(store, MemorySink::new());
    let err = session
        .run(&[PassKind::TrimTexts, PassKind::AuditFlags])
        .unwrap_err();
    assert!(matches!(err, RunError::Pass { pass: PassKind::AuditFlags, .. }));
    assert!(session.sink().contains("Error in"));
}
