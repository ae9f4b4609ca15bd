//! End-to-end transaction semantics against the sharded store:
//! version bumping, first-committer-wins conflicts, rollback invisibility,
//! and delete-then-reinsert within one transaction.

use cofferdb::{Error, QueryBuilder, SessionId, ShardedStore, StoreConfig, Value, ValueKind};
use tempfile::tempdir;

fn open(dir: &std::path::Path) -> ShardedStore {
    ShardedStore::open(StoreConfig::new(dir).with_shard_count(3).with_cache_capacity(16)).unwrap()
}

// ============================================================================
// Versioning
// ============================================================================

#[test]
fn fresh_key_commits_at_version_one_then_two() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let session = SessionId(1);

    store.begin_transaction(session).unwrap();
    store.put(session, "k", Value::string(0, "v0")).unwrap();
    store.commit(session).unwrap();
    assert_eq!(store.committed_state()["k"].version(), 1);

    store.begin_transaction(session).unwrap();
    store.put(session, "k", Value::string(0, "v1")).unwrap();
    store.commit(session).unwrap();

    let v = &store.committed_state()["k"];
    assert_eq!(v.version(), 2);
    assert_eq!(v.as_str(), Some("v1"));
}

#[test]
fn age_scenario() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let session = SessionId(1);

    store.begin_transaction(session).unwrap();
    store.put(session, "age", Value::integer(0, 25)).unwrap();
    store.commit(session).unwrap();

    let committed = store.committed_state();
    assert_eq!(committed["age"].version(), 1);
    assert_eq!(committed["age"].as_integer(), Some(25));
}

// ============================================================================
// Conflicts
// ============================================================================

#[test]
fn first_committer_wins_and_loser_write_is_discarded() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let (a, b) = (SessionId(1), SessionId(2));

    store.begin_transaction(a).unwrap();
    store.put(a, "k", Value::integer(0, 0)).unwrap();
    store.commit(a).unwrap();

    store.begin_transaction(a).unwrap();
    store.begin_transaction(b).unwrap();
    store.get(a, "k").unwrap();
    store.get(b, "k").unwrap();
    store.put(a, "k", Value::integer(0, 1)).unwrap();
    store.put(b, "k", Value::integer(0, 2)).unwrap();

    store.commit(a).unwrap();
    let err = store.commit(b).unwrap_err();
    assert!(matches!(err, Error::ConcurrencyConflict { key } if key == "k"));

    // A's write is intact and B must begin a new transaction to retry
    assert_eq!(store.committed_state()["k"].as_integer(), Some(1));
    assert!(store.begin_transaction(b).is_ok());
}

#[test]
fn read_only_observation_does_not_conflict() {
    let dir = tempdir().unwrap();
    let store = ShardedStore::open(
        StoreConfig::new(dir.path()).with_shard_count(1).with_cache_capacity(16),
    )
    .unwrap();
    let (a, b) = (SessionId(1), SessionId(2));

    store.begin_transaction(a).unwrap();
    store.put(a, "k", Value::integer(0, 1)).unwrap();
    store.commit(a).unwrap();

    store.begin_transaction(a).unwrap();
    store.get(a, "k").unwrap();
    store.put(a, "unrelated", Value::integer(0, 7)).unwrap();

    // B bumps the key A only observed
    store.begin_transaction(b).unwrap();
    store.get(b, "k").unwrap();
    store.put(b, "k", Value::integer(0, 2)).unwrap();
    store.commit(b).unwrap();

    // A staged nothing for "k", so its commit must succeed
    store.commit(a).unwrap();
    let committed = store.committed_state();
    assert_eq!(committed["unrelated"].as_integer(), Some(7));
    assert_eq!(committed["k"].as_integer(), Some(2));
}

// ============================================================================
// Rollback
// ============================================================================

#[test]
fn rollback_leaves_committed_state_untouched() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let session = SessionId(1);

    store.begin_transaction(session).unwrap();
    store.put(session, "k", Value::string(0, "v")).unwrap();
    store.rollback(session).unwrap();

    assert!(!store.committed_state().contains_key("k"));
    assert!(!store.is_transaction_active(session));
}

#[test]
fn staged_state_is_invisible_to_other_sessions() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let (a, b) = (SessionId(1), SessionId(2));

    store.begin_transaction(a).unwrap();
    store.begin_transaction(b).unwrap();
    store.put(a, "k", Value::string(0, "a-only")).unwrap();

    assert!(store.get(b, "k").unwrap().is_none());
    assert_eq!(store.staged_state(a).unwrap().len(), 1);
    assert!(store.staged_state(b).unwrap().is_empty());
}

// ============================================================================
// Delete-then-reinsert
// ============================================================================

#[test]
fn delete_then_reinsert_bumps_version_once() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let session = SessionId(1);

    store.begin_transaction(session).unwrap();
    store.put(session, "k", Value::string(0, "v")).unwrap();
    store.commit(session).unwrap();

    store.begin_transaction(session).unwrap();
    store.put(session, "k", Value::string(0, "v1")).unwrap();
    assert!(store.delete(session, "k").unwrap());
    store.put(session, "k", Value::string(0, "v2")).unwrap();
    store.commit(session).unwrap();

    let v = &store.committed_state()["k"];
    assert_eq!(v.version(), 2);
    assert_eq!(v.as_str(), Some("v2"));
}

// ============================================================================
// Search
// ============================================================================

#[test]
fn search_overlays_staged_and_respects_filters() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let session = SessionId(1);

    store.begin_transaction(session).unwrap();
    store.put(session, "user:1", Value::string(0, "alice")).unwrap();
    store.put(session, "score:1", Value::integer(0, 10)).unwrap();
    store.put(session, "score:2", Value::integer(0, 50)).unwrap();
    store.commit(session).unwrap();

    let range = QueryBuilder::default().with_range(Some(20), None).build().unwrap();
    assert_eq!(store.search_committed(&range).len(), 1);

    let kinds = QueryBuilder::default().with_kind(ValueKind::String).build().unwrap();
    assert_eq!(store.search_committed(&kinds).len(), 1);

    store.begin_transaction(session).unwrap();
    store.put(session, "score:3", Value::integer(0, 30)).unwrap();
    store.delete(session, "score:2").unwrap();

    let overlaid = store.search(session, &range).unwrap();
    assert_eq!(overlaid.len(), 1);
    assert_eq!(overlaid[0].0, "score:3");

    let staged = store.search_staged(session, &range).unwrap();
    assert_eq!(staged.len(), 1);
}

#[test]
fn empty_query_rejected_at_construction() {
    assert!(matches!(
        QueryBuilder::default().build(),
        Err(Error::EmptyQuery)
    ));
}
