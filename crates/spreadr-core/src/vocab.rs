//! Language and bucket vocabulary.
//!
//! Sentences carry a language code and a bucket tag. The wire strings are
//! stable: they are stored verbatim in the database and exposed to the REST
//! layer, so variants are additive-only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Languages supported by the experiment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    English,
    /// French.
    French,
    /// Spanish.
    Spanish,
    /// Italian.
    Italian,
    /// German.
    German,
    /// Any mothertongue outside the supported set.
    Other,
}

/// Language assumed when a client supplies none.
pub const DEFAULT_LANGUAGE: Language = Language::English;

/// Sentinel for mothertongues outside the supported set. Trees whose
/// participants have this mothertongue are segregated by the candidate
/// filters.
pub const OTHER_LANGUAGE: Language = Language::Other;

impl Language {
    /// All supported languages, in display order.
    pub const ALL: [Language; 6] = [
        Language::English,
        Language::French,
        Language::Spanish,
        Language::Italian,
        Language::German,
        Language::Other,
    ];

    /// Stable wire string for this language.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::French => "french",
            Language::Spanish => "spanish",
            Language::Italian => "italian",
            Language::German => "german",
            Language::Other => "other",
        }
    }

    /// Parse a wire string back into a language.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purpose tag for a sentence (and, through its root, a tree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Warm-up trials, excluded from analysis.
    Training,
    /// The real experiment data.
    Experiment,
    /// Free-play trees created outside the experiment flow.
    Game,
}

impl Bucket {
    /// All buckets.
    pub const ALL: [Bucket; 3] = [Bucket::Training, Bucket::Experiment, Bucket::Game];

    /// Stable wire string for this bucket.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Training => "training",
            Bucket::Experiment => "experiment",
            Bucket::Game => "game",
        }
    }

    /// Parse a wire string back into a bucket.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == s)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
