//! # spreadr-core
//!
//! Foundation types for the spreadr reformulation-experiment platform.
//!
//! This crate provides the shared vocabulary the other spreadr crates depend on:
//!
//! - **Branded IDs**: `ProfileId`, `TreeId`, `SentenceId` as prefixed newtypes
//!   for type safety
//! - **Vocabulary**: `Language` and `Bucket` enums with stable wire strings
//! - **Configuration**: the experiment [`Configuration`] value object with
//!   validation, lease timing, and per-sentence time allotment
//! - **Logging**: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod ids;
pub mod logging;
pub mod vocab;

pub use config::{ConfigError, Configuration};
pub use ids::{ProfileId, SentenceId, TreeId};
pub use vocab::{Bucket, Language, DEFAULT_LANGUAGE, OTHER_LANGUAGE};
