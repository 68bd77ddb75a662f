//! # spreadr-forest
//!
//! Tree allocation and locking engine with a `SQLite` backend for the
//! spreadr reformulation-experiment platform.
//!
//! Participants read a sentence, write a paraphrase, and the paraphrase
//! becomes the next node in a branching "telephone game" tree. This crate is
//! the engine behind that flow:
//!
//! - **Graph model**: per-tree child adjacency with BFS shortest-branch-depth,
//!   branch counts, and edge lists
//! - **Shape filter**: narrows candidate trees to those still worth growing
//!   under the configured branching/depth targets
//! - **Lock manager**: exclusive per-tree leases with heartbeat renewal,
//!   timeout expiry, and implicit release on submission
//! - **Tree selector**: uniform random choice with shaped-first priority and
//!   atomic select-and-lock
//! - **`SQLite` backend**: `rusqlite` behind an `r2d2` pool with the
//!   repository pattern and version-tracked migrations

#![deny(unsafe_code)]

pub mod config_cache;
pub mod errors;
pub mod graph;
pub mod lease;
pub mod select;
pub mod shape;
pub mod sqlite;
pub mod store;

pub use config_cache::ConfigCache;
pub use errors::{ForestError, Result};
pub use graph::TreeGraph;
pub use lease::LeaseState;
pub use select::{Candidate, SelectionPolicy};
pub use shape::TreeShape;
pub use sqlite::repositories::tree::TreeFilters;
pub use sqlite::row_types::{ProfileRow, SentenceRow, TreeRow};
pub use store::{ForestStore, NewSentence, SelectOptions};
