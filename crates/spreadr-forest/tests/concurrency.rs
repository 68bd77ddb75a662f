//! Cross-thread locking and selection races over a file-backed store.
//!
//! In-memory `SQLite` databases are per-connection, so these tests run
//! against a temp-file pool shared by real threads.

use std::sync::{Arc, Barrier};

use chrono::Utc;
use spreadr_core::{Bucket, Configuration, Language, ProfileId};
use spreadr_forest::sqlite::connection::{self, ConnectionConfig};
use spreadr_forest::sqlite::migrations::run_migrations;
use spreadr_forest::{
    ForestError, ForestStore, NewSentence, SelectOptions, TreeFilters, TreeRow,
};

fn open_file_store(dir: &tempfile::TempDir) -> ForestStore {
    let path = dir.path().join("forest.db");
    let pool =
        connection::new_file(path.to_str().unwrap(), &ConnectionConfig::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        let _ = run_migrations(&conn).unwrap();
    }
    let store = ForestStore::new(pool, std::time::Duration::ZERO);
    store
        .update_config(&Configuration {
            target_branch_count: 2,
            target_branch_depth: 3,
            heartbeat_seconds: 60,
            heartbeat_margin_seconds: 0,
            ..Configuration::default()
        })
        .unwrap();
    store
}

fn profile(store: &ForestStore) -> ProfileId {
    ProfileId::from_string(store.create_profile(Language::English).unwrap().id)
}

fn rooted_tree(store: &ForestStore, author: &ProfileId, text: &str) -> TreeRow {
    let sentence = store
        .append_sentence(&NewSentence {
            profile_id: author,
            parent_id: None,
            text,
            language: Language::English,
            bucket: Bucket::Experiment,
            read_time_proportion: 0.5,
            write_time_proportion: 0.5,
        })
        .unwrap();
    store
        .get_tree(&sentence.tree_id.into())
        .unwrap()
        .unwrap()
}

#[test]
fn concurrent_acquires_have_exactly_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_file_store(&dir));
    let author = profile(&store);

    // Several rounds, each on a fresh unlocked tree.
    for round in 0..5 {
        let tree = rooted_tree(&store, &author, &format!("round {round}"));
        let tree_id = spreadr_core::TreeId::from_string(tree.id);
        let profiles = [profile(&store), profile(&store)];
        let now = Utc::now();
        let barrier = Arc::new(Barrier::new(2));

        let results: Vec<Result<(), ForestError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = profiles
                .iter()
                .map(|profile_id| {
                    let store = Arc::clone(&store);
                    let barrier = Arc::clone(&barrier);
                    let tree_id = tree_id.clone();
                    scope.spawn(move || {
                        let _ = barrier.wait();
                        store.acquire_lock(&tree_id, profile_id, now)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(ForestError::LockConflict { .. })))
            .count();
        assert_eq!(winners, 1, "exactly one acquire must win");
        assert_eq!(conflicts, 1, "the loser must see a lock conflict");

        // The recorded holder is the winner.
        let held_by = store.get_tree(&tree_id).unwrap().unwrap().profile_lock_id;
        let winner_index = results.iter().position(Result::is_ok).unwrap();
        assert_eq!(held_by.as_deref(), Some(profiles[winner_index].as_str()));
    }
}

#[test]
fn concurrent_selectors_get_distinct_trees() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_file_store(&dir));
    let author = profile(&store);

    let _ = rooted_tree(&store, &author, "first tree");
    let _ = rooted_tree(&store, &author, "second tree");

    let pickers = [profile(&store), profile(&store)];
    let now = Utc::now();
    let barrier = Arc::new(Barrier::new(2));

    let chosen: Vec<Option<TreeRow>> = std::thread::scope(|scope| {
        let handles: Vec<_> = pickers
            .iter()
            .map(|picker| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    let _ = barrier.wait();
                    store
                        .select_tree(
                            &TreeFilters::default(),
                            picker,
                            SelectOptions {
                                prioritize_shaping: true,
                                acquire_lock: true,
                            },
                            now,
                        )
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let ids: Vec<&str> = chosen
        .iter()
        .map(|tree| tree.as_ref().expect("two free trees for two pickers").id.as_str())
        .collect();
    assert_ne!(ids[0], ids[1], "selectors must never share a tree");
}

#[test]
fn concurrent_root_appends_land_on_distinct_trees() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_file_store(&dir));
    let authors: Vec<ProfileId> = (0..4).map(|_| profile(&store)).collect();
    let barrier = Arc::new(Barrier::new(authors.len()));

    let tree_ids: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = authors
            .iter()
            .enumerate()
            .map(|(i, author)| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    let _ = barrier.wait();
                    let text = format!("suggestion {i}");
                    store
                        .append_sentence(&NewSentence {
                            profile_id: author,
                            parent_id: None,
                            text: &text,
                            language: Language::English,
                            bucket: Bucket::Experiment,
                            read_time_proportion: 0.5,
                            write_time_proportion: 0.5,
                        })
                        .unwrap()
                        .tree_id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let unique: std::collections::HashSet<&String> = tree_ids.iter().collect();
    assert_eq!(unique.len(), tree_ids.len(), "each root starts its own tree");
}
