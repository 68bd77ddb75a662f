//! High-level transactional store over the `SQLite` backend.

pub mod forest_store;

pub use forest_store::{ForestStore, NewSentence, SelectOptions};
