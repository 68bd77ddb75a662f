//! High-level transactional `ForestStore` API.
//!
//! Composes the repositories into atomic, tree-centric methods. Every write
//! method runs inside a single `SQLite` immediate transaction — callers never
//! observe partial state, and two concurrent acquires on one tree can never
//! both succeed.
//!
//! INVARIANT: writes to one tree are serialized by an in-process per-tree
//! mutex (`with_tree_exclusive`); multi-tree read-modify-write sections
//! (selection, empty-tree recycling) serialize on a separate global lock.
//! The in-process locks scope contention to one tree before the
//! database-wide write lock is taken; `BEGIN IMMEDIATE` plus the busy
//! timeout is the cross-connection backstop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use spreadr_core::{Bucket, Configuration, Language, ProfileId, SentenceId, TreeId};
use spreadr_settings::SpreadrSettings;

use crate::config_cache::ConfigCache;
use crate::errors::{ForestError, Result};
use crate::graph::TreeGraph;
use crate::lease::LeaseState;
use crate::select::{self, Candidate, SelectionPolicy};
use crate::shape::TreeShape;
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::config::ConfigRepo;
use crate::sqlite::repositories::profile::ProfileRepo;
use crate::sqlite::repositories::sentence::{CreateSentenceOptions, SentenceRepo};
use crate::sqlite::repositories::tree::{TreeFilters, TreeRepo};
use crate::sqlite::row_types::{ProfileRow, SentenceRow, TreeLockStateRow, TreeRow};

/// A reformulation submission.
pub struct NewSentence<'a> {
    /// Authoring profile.
    pub profile_id: &'a ProfileId,
    /// Sentence being reformulated; `None` starts a new tree.
    pub parent_id: Option<&'a SentenceId>,
    /// The written text.
    pub text: &'a str,
    /// Language code.
    pub language: Language,
    /// Bucket tag.
    pub bucket: Bucket,
    /// Proportion of the allotted read time used, in [0, 1].
    pub read_time_proportion: f64,
    /// Proportion of the allotted write time used, in [0, 1].
    pub write_time_proportion: f64,
}

/// Knobs for [`ForestStore::select_tree`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectOptions {
    /// Prefer candidates the shape filter wants grown.
    pub prioritize_shaping: bool,
    /// Restrict to lease-free candidates and lock the chosen tree in the
    /// same transaction that read the candidate set.
    pub acquire_lock: bool,
}

/// High-level forest store wrapping a connection pool and all repositories.
pub struct ForestStore {
    pool: ConnectionPool,
    config_cache: ConfigCache,
    rng: Mutex<StdRng>,
    selection_lock: Mutex<()>,
    tree_write_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl ForestStore {
    /// Create a store over an existing (already migrated) pool.
    pub fn new(pool: ConnectionPool, config_cache_ttl: StdDuration) -> Self {
        Self {
            pool,
            config_cache: ConfigCache::new(config_cache_ttl),
            rng: Mutex::new(StdRng::from_os_rng()),
            selection_lock: Mutex::new(()),
            tree_write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open (and migrate) the file-backed store described by `settings`.
    pub fn open(settings: &SpreadrSettings) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(&settings.database.path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ForestError::Internal(format!("failed to create database directory: {e}"))
            })?;
        }
        let pool = connection::new_file(
            &settings.database.path,
            &ConnectionConfig::from_settings(&settings.database),
        )?;
        {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
        }
        info!(path = %settings.database.path, "forest store opened");
        Ok(Self::new(
            pool,
            StdDuration::from_secs(settings.forest.config_cache_ttl_seconds),
        ))
    }

    /// Open an in-memory store (for testing and tooling).
    ///
    /// The pool is capped at a single connection — every `:memory:`
    /// connection is a distinct database — and the config cache TTL is zero
    /// so tests observe configuration updates immediately.
    pub fn open_in_memory() -> Result<Self> {
        let config = ConnectionConfig {
            pool_size: 1,
            ..ConnectionConfig::default()
        };
        let pool = connection::new_in_memory(&config)?;
        {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
        }
        Ok(Self::new(pool, StdDuration::ZERO))
    }

    /// Replace the selection RNG with a seeded one (deterministic tests).
    #[must_use]
    pub fn with_rng_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Begin an immediate (write) transaction: the database write lock is
    /// taken up front, so the snapshot already includes every committed
    /// write and the read-decide-write sequence inside is atomic.
    fn write_tx(conn: &Connection) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            conn,
            TransactionBehavior::Immediate,
        )?)
    }

    fn lock_selection(&self) -> Result<MutexGuard<'_, ()>> {
        self.selection_lock
            .lock()
            .map_err(|_| ForestError::Internal("selection lock poisoned".into()))
    }

    fn tree_write_lock(&self, tree_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .tree_write_locks
            .lock()
            .map_err(|_| ForestError::Internal("tree lock map poisoned".into()))?;

        // Opportunistically prune dead weak refs when the map grows.
        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(tree_id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        let _ = locks.insert(tree_id.to_string(), Arc::downgrade(&lock));
        Ok(lock)
    }

    /// Run `f` inside the per-tree critical section and a write transaction.
    ///
    /// This is the explicit exclusive-lock boundary for one tree: blocking is
    /// scoped to callers targeting the *same* tree; unrelated trees proceed
    /// in parallel.
    pub fn with_tree_exclusive<T>(
        &self,
        tree_id: &str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let lock = self.tree_write_lock(tree_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| ForestError::Internal("tree write lock poisoned".into()))?;
        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────

    /// Current experiment configuration, through the TTL cache.
    pub fn config(&self) -> Result<Configuration> {
        self.config_cache.get_or_fetch(|| {
            let conn = self.conn()?;
            ConfigRepo::get(&conn)
        })
    }

    /// Validate and persist a new configuration, invalidating the cache.
    pub fn update_config(&self, config: &Configuration) -> Result<()> {
        config.validate()?;
        let conn = self.conn()?;
        ConfigRepo::update(&conn, config)?;
        self.config_cache.invalidate();
        info!(
            target_branch_count = config.target_branch_count,
            target_branch_depth = config.target_branch_depth,
            "experiment configuration updated"
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Profiles
    // ─────────────────────────────────────────────────────────────────────

    /// Create a participant profile.
    pub fn create_profile(&self, mothertongue: Language) -> Result<ProfileRow> {
        let conn = self.conn()?;
        ProfileRepo::create(&conn, mothertongue)
    }

    /// Get a profile by ID.
    pub fn get_profile(&self, profile_id: &ProfileId) -> Result<Option<ProfileRow>> {
        let conn = self.conn()?;
        ProfileRepo::get_by_id(&conn, profile_id.as_str())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tree queries
    // ─────────────────────────────────────────────────────────────────────

    /// Get a tree by ID.
    pub fn get_tree(&self, tree_id: &TreeId) -> Result<Option<TreeRow>> {
        let conn = self.conn()?;
        TreeRepo::get_by_id(&conn, tree_id.as_str())
    }

    /// List trees matching the discovery filters.
    pub fn list_trees(&self, filters: &TreeFilters<'_>) -> Result<Vec<TreeRow>> {
        let conn = self.conn()?;
        TreeRepo::list(&conn, filters)
    }

    /// All sentences of a tree, oldest first.
    pub fn tree_sentences(&self, tree_id: &TreeId) -> Result<Vec<SentenceRow>> {
        let conn = self.conn()?;
        if TreeRepo::get_by_id(&conn, tree_id.as_str())?.is_none() {
            return Err(ForestError::TreeNotFound(tree_id.to_string()));
        }
        SentenceRepo::list_by_tree(&conn, tree_id.as_str())
    }

    /// Get a sentence by ID.
    pub fn get_sentence(&self, sentence_id: &SentenceId) -> Result<Option<SentenceRow>> {
        let conn = self.conn()?;
        SentenceRepo::get_by_id(&conn, sentence_id.as_str())
    }

    fn load_graph(conn: &Connection, tree_id: &str) -> Result<TreeGraph> {
        let tree = TreeRepo::get_by_id(conn, tree_id)?
            .ok_or_else(|| ForestError::TreeNotFound(tree_id.to_string()))?;
        let sentences = SentenceRepo::list_by_tree(conn, tree_id)?;
        TreeGraph::from_rows(&tree, &sentences)
    }

    /// Depth of the tree's shallowest branch, in edges from the root.
    pub fn shortest_branch_depth(&self, tree_id: &TreeId) -> Result<usize> {
        let conn = self.conn()?;
        Ok(Self::load_graph(&conn, tree_id.as_str())?.shortest_branch_depth())
    }

    /// Number of direct children of the root.
    pub fn branches_count(&self, tree_id: &TreeId) -> Result<usize> {
        let conn = self.conn()?;
        Ok(Self::load_graph(&conn, tree_id.as_str())?.branches_count())
    }

    /// All (parent, child) edges of the tree, for export/visualization.
    pub fn network_edges(&self, tree_id: &TreeId) -> Result<Vec<(SentenceId, SentenceId)>> {
        let conn = self.conn()?;
        let edges = Self::load_graph(&conn, tree_id.as_str())?.edges();
        Ok(edges
            .into_iter()
            .map(|(parent, child)| (SentenceId::from_string(parent), SentenceId::from_string(child)))
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Allocation
    // ─────────────────────────────────────────────────────────────────────

    /// Obtain a tree for a new root: reuse the oldest empty tree, or create
    /// one if none exists. Keeps the forest from accumulating dead empties.
    pub fn obtain_free_tree(&self) -> Result<TreeRow> {
        let _guard = self.lock_selection()?;
        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let tree = Self::obtain_free_tree_tx(&tx)?;
        tx.commit()?;
        Ok(tree)
    }

    fn obtain_free_tree_tx(conn: &Connection) -> Result<TreeRow> {
        if let Some(tree) = TreeRepo::first_empty(conn)? {
            debug!(tree_id = %tree.id, "reusing empty tree");
            return Ok(tree);
        }
        let tree = TreeRepo::create(conn)?;
        debug!(tree_id = %tree.id, "created new empty tree");
        Ok(tree)
    }

    /// Append a reformulation.
    ///
    /// A root submission (`parent_id = None`) goes through empty-tree
    /// recycling and sets the tree root. A non-root submission checks lock
    /// validity — another profile's live lease is a [`ForestError::LockConflict`] —
    /// rejects full trees, and renews the appender's heartbeat when it holds
    /// the lease.
    pub fn append_sentence(&self, opts: &NewSentence<'_>) -> Result<SentenceRow> {
        for (name, value) in [
            ("read_time_proportion", opts.read_time_proportion),
            ("write_time_proportion", opts.write_time_proportion),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ForestError::InvalidOperation(format!(
                    "{name} must be in [0, 1]"
                )));
            }
        }
        if opts.text.trim().is_empty() {
            return Err(ForestError::InvalidOperation(
                "sentence text must not be empty".into(),
            ));
        }

        let config = self.config()?;
        match opts.parent_id {
            None => self.append_root(opts, &config),
            Some(parent_id) => self.append_child(opts, parent_id, &config),
        }
    }

    fn append_root(&self, opts: &NewSentence<'_>, config: &Configuration) -> Result<SentenceRow> {
        let _guard = self.lock_selection()?;
        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;

        if !ProfileRepo::exists(&tx, opts.profile_id.as_str())? {
            return Err(ForestError::ProfileNotFound(opts.profile_id.to_string()));
        }

        let tree = Self::obtain_free_tree_tx(&tx)?;
        let sentence = SentenceRepo::create(
            &tx,
            &CreateSentenceOptions {
                tree_id: &tree.id,
                profile_id: opts.profile_id.as_str(),
                parent_id: None,
                text: opts.text,
                language: opts.language,
                bucket: opts.bucket,
                read_time_proportion: opts.read_time_proportion,
                write_time_proportion: opts.write_time_proportion,
                read_time_allotted: config.read_time_allotted(opts.text),
                write_time_allotted: config.write_time_allotted(opts.text),
            },
        )?;
        if !TreeRepo::set_root(&tx, &tree.id, &sentence.id)? {
            return Err(ForestError::RootAlreadySet(tree.id.clone()));
        }
        tx.commit()?;

        debug!(tree_id = %tree.id, sentence_id = %sentence.id, "rooted tree");
        Ok(sentence)
    }

    fn append_child(
        &self,
        opts: &NewSentence<'_>,
        parent_id: &SentenceId,
        config: &Configuration,
    ) -> Result<SentenceRow> {
        // Sentences are immutable, so the parent (and thus the owning tree)
        // can be resolved outside the critical section.
        let parent = {
            let conn = self.conn()?;
            SentenceRepo::get_by_id(&conn, parent_id.as_str())?
        }
        .ok_or_else(|| ForestError::SentenceNotFound(parent_id.to_string()))?;

        let tree_id = parent.tree_id.clone();
        self.with_tree_exclusive(&tree_id, |tx| {
            if !ProfileRepo::exists(tx, opts.profile_id.as_str())? {
                return Err(ForestError::ProfileNotFound(opts.profile_id.to_string()));
            }

            let state = TreeRepo::lock_state(tx, &tree_id)?
                .ok_or_else(|| ForestError::TreeNotFound(tree_id.clone()))?;
            if u64::try_from(state.sentence_count).unwrap_or(0) >= config.full_tree_size() {
                return Err(ForestError::TreeFull(tree_id.clone()));
            }

            let lease = LeaseState::from_row(&state)?;
            let now = Utc::now();
            let timeout = config.lease_timeout();
            let held_by_appender = lease.is_held_by(opts.profile_id.as_str(), now, timeout);
            if !lease.is_free(now, timeout) && !held_by_appender {
                return Err(ForestError::LockConflict {
                    tree_id: tree_id.clone(),
                    holder: lease.holder.clone().unwrap_or_default(),
                });
            }

            // Allotted times derive from the sentence the participant read.
            let sentence = SentenceRepo::create(
                tx,
                &CreateSentenceOptions {
                    tree_id: &tree_id,
                    profile_id: opts.profile_id.as_str(),
                    parent_id: Some(parent_id.as_str()),
                    text: opts.text,
                    language: opts.language,
                    bucket: opts.bucket,
                    read_time_proportion: opts.read_time_proportion,
                    write_time_proportion: opts.write_time_proportion,
                    read_time_allotted: config.read_time_allotted(&parent.text),
                    write_time_allotted: config.write_time_allotted(&parent.text),
                },
            )?;

            if held_by_appender {
                let _ = TreeRepo::touch_heartbeat(tx, &tree_id, &now.to_rfc3339())?;
            }

            debug!(tree_id = %tree_id, sentence_id = %sentence.id, "appended reformulation");
            Ok(sentence)
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lock manager
    // ─────────────────────────────────────────────────────────────────────

    /// Acquire (or renew) the exclusive lease on a tree.
    ///
    /// Fails with [`ForestError::LockConflict`] if another profile holds a
    /// lease that is not free at `now`. Re-acquiring a lease you already
    /// hold renews it.
    pub fn acquire_lock(
        &self,
        tree_id: &TreeId,
        profile_id: &ProfileId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let config = self.config()?;
        let timeout = config.lease_timeout();
        self.with_tree_exclusive(tree_id.as_str(), |tx| {
            if !ProfileRepo::exists(tx, profile_id.as_str())? {
                return Err(ForestError::ProfileNotFound(profile_id.to_string()));
            }
            let state = TreeRepo::lock_state(tx, tree_id.as_str())?
                .ok_or_else(|| ForestError::TreeNotFound(tree_id.to_string()))?;
            let lease = LeaseState::from_row(&state)?;
            if !lease.is_free(now, timeout) && lease.holder.as_deref() != Some(profile_id.as_str())
            {
                return Err(ForestError::LockConflict {
                    tree_id: tree_id.to_string(),
                    holder: lease.holder.clone().unwrap_or_default(),
                });
            }
            let _ = TreeRepo::set_lock(tx, tree_id.as_str(), profile_id.as_str(), &now.to_rfc3339())?;
            debug!(tree_id = %tree_id, profile_id = %profile_id, "lease acquired");
            Ok(())
        })
    }

    /// Renew an active lease.
    ///
    /// Fails with [`ForestError::NotLockHolder`] if the caller is not the
    /// holder or the lease already expired — an expired lease must be
    /// reacquired through selection, not heartbeated back to life.
    pub fn heartbeat_lock(
        &self,
        tree_id: &TreeId,
        profile_id: &ProfileId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let config = self.config()?;
        let timeout = config.lease_timeout();
        self.with_tree_exclusive(tree_id.as_str(), |tx| {
            let state = TreeRepo::lock_state(tx, tree_id.as_str())?
                .ok_or_else(|| ForestError::TreeNotFound(tree_id.to_string()))?;
            let lease = LeaseState::from_row(&state)?;
            if !lease.is_held_by(profile_id.as_str(), now, timeout) {
                return Err(ForestError::NotLockHolder {
                    tree_id: tree_id.to_string(),
                    profile_id: profile_id.to_string(),
                });
            }
            let _ = TreeRepo::touch_heartbeat(tx, tree_id.as_str(), &now.to_rfc3339())?;
            Ok(())
        })
    }

    /// Whether the tree is free for new allocation at `now`.
    pub fn is_tree_free(&self, tree_id: &TreeId, now: DateTime<Utc>) -> Result<bool> {
        let config = self.config()?;
        let conn = self.conn()?;
        let state = TreeRepo::lock_state(&conn, tree_id.as_str())?
            .ok_or_else(|| ForestError::TreeNotFound(tree_id.to_string()))?;
        Ok(LeaseState::from_row(&state)?.is_free(now, config.lease_timeout()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────

    /// Pick a tree for a participant.
    ///
    /// Candidates come from the discovery `filters`; shape prioritization and
    /// the lease-free restriction follow `options`. With
    /// `options.acquire_lock`, the candidate read and the lock write happen
    /// in one serialized section and one transaction, closing the gap
    /// between "I saw it free" and "I locked it".
    ///
    /// `Ok(None)` means nothing is currently available — an expected steady
    /// state the caller surfaces as "try again later".
    pub fn select_tree(
        &self,
        filters: &TreeFilters<'_>,
        profile_id: &ProfileId,
        options: SelectOptions,
        now: DateTime<Utc>,
    ) -> Result<Option<TreeRow>> {
        let config = self.config()?;
        let _guard = self.lock_selection()?;
        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;

        if options.acquire_lock && !ProfileRepo::exists(&tx, profile_id.as_str())? {
            return Err(ForestError::ProfileNotFound(profile_id.to_string()));
        }

        let trees = TreeRepo::list(&tx, filters)?;
        let mut candidates = Vec::with_capacity(trees.len());
        for tree in trees {
            // Empty trees have nothing to reformulate; they are the
            // new-root path (obtain_free_tree), not selectable here.
            if tree.root_sentence_id.is_none() {
                continue;
            }
            let sentences = SentenceRepo::list_by_tree(&tx, &tree.id)?;
            let graph = match TreeGraph::from_rows(&tree, &sentences) {
                Ok(graph) => graph,
                Err(ForestError::MalformedTree { tree_id, reason }) => {
                    warn!(%tree_id, %reason, "skipping malformed tree during selection");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let lease = LeaseState::from_row(&TreeLockStateRow {
                profile_lock_id: tree.profile_lock_id.clone(),
                profile_lock_heartbeat: tree.profile_lock_heartbeat.clone(),
                newest_sentence_at: sentences.iter().map(|s| s.created_at.clone()).max(),
                sentence_count: i64::try_from(sentences.len()).unwrap_or(i64::MAX),
            })?;
            candidates.push(Candidate {
                shape: TreeShape::of(&graph),
                lease,
                tree,
            });
        }

        let policy = SelectionPolicy {
            prioritize_shaping: options.prioritize_shaping,
            require_free: options.acquire_lock,
        };
        let chosen = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| ForestError::Internal("selection rng poisoned".into()))?;
            select::select(&candidates, &config, policy, now, &mut *rng).map(|c| c.tree.clone())
        };

        if let Some(tree) = &chosen {
            if options.acquire_lock {
                let _ =
                    TreeRepo::set_lock(&tx, &tree.id, profile_id.as_str(), &now.to_rfc3339())?;
                debug!(tree_id = %tree.id, profile_id = %profile_id, "selected and locked tree");
            }
        }
        tx.commit()?;
        Ok(chosen)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
