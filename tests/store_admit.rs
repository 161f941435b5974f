// tests/store_admit.rs
use linkrelay::store::SeenLedger;
use std::sync::Arc;

#[test]
fn second_admission_is_rejected() {
    let ledger = SeenLedger::open_in_memory().unwrap();
    assert!(ledger.admit("x:acme", "42", Some("https://x.com/acme/status/42")).unwrap());
    assert!(!ledger.admit("x:acme", "42", Some("https://x.com/acme/status/42")).unwrap());
    assert_eq!(ledger.count().unwrap(), 1);
}

#[test]
fn only_unseen_ids_are_admitted() {
    // Source "acme" returns ids "1" and "2"; "1" is already in the ledger.
    let ledger = SeenLedger::open_in_memory().unwrap();
    assert!(ledger.admit("acme", "1", None).unwrap());

    let newly_admitted: Vec<&str> = ["1", "2"]
        .into_iter()
        .filter(|id| ledger.admit("acme", id, None).unwrap())
        .collect();
    assert_eq!(newly_admitted, vec!["2"]);
}

#[test]
fn same_id_under_different_sources_is_new() {
    let ledger = SeenLedger::open_in_memory().unwrap();
    assert!(ledger.admit("x:acme", "42", None).unwrap());
    assert!(ledger.admit("x:globex", "42", None).unwrap());
    assert_eq!(ledger.count().unwrap(), 2);
}

#[test]
fn records_persist_across_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("watcher.db");
    {
        let ledger = SeenLedger::open(&path).unwrap();
        assert!(ledger.admit("x:acme", "42", Some("https://x.com/acme/status/42")).unwrap());
    }
    let ledger = SeenLedger::open(&path).unwrap();
    assert!(!ledger.admit("x:acme", "42", Some("https://x.com/acme/status/42")).unwrap());
    assert_eq!(ledger.count().unwrap(), 1);
}

#[test]
fn concurrent_admissions_have_a_single_winner() {
    let ledger = Arc::new(SeenLedger::open_in_memory().unwrap());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        handles.push(std::thread::spawn(move || {
            ledger.admit("x:acme", "contested", None).unwrap()
        }));
    }
    let winners = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|admitted| *admitted)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(ledger.count().unwrap(), 1);
}
