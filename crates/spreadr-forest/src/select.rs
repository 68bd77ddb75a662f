//! Randomized tree selection.
//!
//! Two-tier policy: prefer trees the shape filter wants grown, fall back to
//! anything assignable so participants are never starved while the forest is
//! lopsided. Selection among eligible candidates is uniform — picking the
//! first match would starve later-created trees — and the RNG is injected so
//! tests can pin a seed.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use spreadr_core::Configuration;

use crate::lease::LeaseState;
use crate::shape::TreeShape;
use crate::sqlite::row_types::TreeRow;

/// One selectable tree with its precomputed shape and lease snapshot.
///
/// Built by the store inside the selection transaction; malformed trees are
/// dropped (with a warning) before a `Candidate` exists.
#[derive(Clone, Debug)]
pub struct Candidate {
    /// The tree row.
    pub tree: TreeRow,
    /// Shape measurements.
    pub shape: TreeShape,
    /// Lock-state snapshot.
    pub lease: LeaseState,
}

/// Knobs for one selection pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectionPolicy {
    /// Prefer candidates the shape filter wants grown.
    pub prioritize_shaping: bool,
    /// Restrict to lease-free candidates up front.
    pub require_free: bool,
}

/// Pick a tree among `candidates` under `policy`.
///
/// Returns `None` when no candidate survives the free filter — an expected
/// steady state, not an error.
pub fn select<'a, R: Rng + ?Sized>(
    candidates: &'a [Candidate],
    config: &Configuration,
    policy: SelectionPolicy,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<&'a Candidate> {
    let timeout = config.lease_timeout();
    let pool: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| !policy.require_free || c.lease.is_free(now, timeout))
        .collect();

    if policy.prioritize_shaping {
        let shaped: Vec<&Candidate> = pool
            .iter()
            .copied()
            .filter(|c| c.shape.eligible_for_growth(config))
            .collect();
        if let Some(&chosen) = shaped.choose(rng) {
            return Some(chosen);
        }
    }

    pool.choose(rng).copied()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
