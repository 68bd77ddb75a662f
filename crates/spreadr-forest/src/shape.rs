//! Tree shape measurements and growth-eligibility predicates.
//!
//! A tree is eligible for continued growth when all three predicates hold:
//! it is not full, not over-width, and no branch shortfall forces it deeper
//! than the target. A tree whose branches all reached target depth is still
//! eligible while it has width to spare — new branches start at the root.

use spreadr_core::Configuration;

use crate::graph::TreeGraph;

/// Shape measurements of one tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeShape {
    /// Total sentence count, root included.
    pub sentence_count: usize,
    /// Number of direct children of the root.
    pub branches_count: usize,
    /// Minimum branch depth in edges from the root (see
    /// [`TreeGraph::shortest_branch_depth`]).
    pub shortest_branch_depth: usize,
}

impl TreeShape {
    /// Measure a validated graph.
    #[must_use]
    pub fn of(graph: &TreeGraph) -> Self {
        Self {
            sentence_count: graph.node_count(),
            branches_count: graph.branches_count(),
            shortest_branch_depth: graph.shortest_branch_depth(),
        }
    }

    /// Whether the tree reached capacity:
    /// `target_branch_count * target_branch_depth + 1` sentences.
    #[must_use]
    pub fn is_full(&self, config: &Configuration) -> bool {
        self.sentence_count as u64 >= config.full_tree_size()
    }

    /// Whether the root has at most the target number of branches.
    #[must_use]
    pub fn within_width(&self, config: &Configuration) -> bool {
        self.branches_count as u64 <= u64::from(config.target_branch_count)
    }

    /// Whether the shallowest branch is at most the target depth.
    #[must_use]
    pub fn within_depth(&self, config: &Configuration) -> bool {
        self.shortest_branch_depth as u64 <= u64::from(config.target_branch_depth)
    }

    /// All three growth predicates.
    #[must_use]
    pub fn eligible_for_growth(&self, config: &Configuration) -> bool {
        !self.is_full(config) && self.within_width(config) && self.within_depth(config)
    }
}

/// Narrow `shapes` to those eligible for growth under `config`.
///
/// Never adds elements and is idempotent; the caller has already excluded
/// malformed trees (they fail graph validation before a shape exists).
pub fn filter_eligible<'a>(
    shapes: impl IntoIterator<Item = &'a TreeShape>,
    config: &Configuration,
) -> Vec<&'a TreeShape> {
    shapes
        .into_iter()
        .filter(|shape| shape.eligible_for_growth(config))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
