//! In-memory tree graph built from sentence parent pointers.
//!
//! [`TreeGraph`] validates that a tree's stored sentences actually form a
//! rooted tree (single root, all parents present, everything reachable)
//! before any traversal runs. Trees that fail validation surface as
//! [`ForestError::MalformedTree`]; filter passes catch that and skip the
//! tree instead of aborting discovery for everyone.
//!
//! Depth queries use plain breadth-first search over the child adjacency —
//! parent pointers already describe a tree, so no general graph machinery
//! is needed.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::errors::{ForestError, Result};
use crate::sqlite::row_types::{SentenceRow, TreeRow};

/// Validated child-adjacency view of one tree's sentences.
#[derive(Clone, Debug)]
pub struct TreeGraph {
    root_id: Option<String>,
    children: BTreeMap<String, Vec<String>>,
    node_count: usize,
}

impl TreeGraph {
    /// Build and validate a graph from a tree row and its sentences.
    ///
    /// `sentences` must be exactly the tree's sentence set (any order).
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::MalformedTree`] when the rows do not form a
    /// single rooted tree consistent with the tree row.
    pub fn from_rows(tree: &TreeRow, sentences: &[SentenceRow]) -> Result<Self> {
        let malformed = |reason: String| ForestError::MalformedTree {
            tree_id: tree.id.clone(),
            reason,
        };

        if sentences.is_empty() {
            if let Some(root_id) = &tree.root_sentence_id {
                return Err(malformed(format!(
                    "root {root_id} is set but the tree has no sentences"
                )));
            }
            return Ok(Self {
                root_id: None,
                children: BTreeMap::new(),
                node_count: 0,
            });
        }

        let root_id = tree
            .root_sentence_id
            .clone()
            .ok_or_else(|| malformed("sentences present but no root is set".into()))?;

        let ids: HashSet<&str> = sentences.iter().map(|s| s.id.as_str()).collect();
        if ids.len() != sentences.len() {
            return Err(malformed("duplicate sentence ids".into()));
        }

        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for sentence in sentences {
            if sentence.tree_id != tree.id {
                return Err(malformed(format!(
                    "sentence {} belongs to tree {}",
                    sentence.id, sentence.tree_id
                )));
            }
            match &sentence.parent_id {
                None => {
                    if sentence.id != root_id {
                        return Err(malformed(format!(
                            "parentless sentence {} is not the root {root_id}",
                            sentence.id
                        )));
                    }
                }
                Some(parent_id) => {
                    if !ids.contains(parent_id.as_str()) {
                        return Err(malformed(format!(
                            "parent {parent_id} of sentence {} is not in the tree",
                            sentence.id
                        )));
                    }
                    children
                        .entry(parent_id.clone())
                        .or_default()
                        .push(sentence.id.clone());
                }
            }
        }

        if !ids.contains(root_id.as_str()) {
            return Err(malformed(format!("root {root_id} is not among the sentences")));
        }

        let graph = Self {
            root_id: Some(root_id),
            children,
            node_count: sentences.len(),
        };

        let reachable = graph.reachable_count();
        if reachable != graph.node_count {
            return Err(malformed(format!(
                "{} of {} sentences unreachable from the root",
                graph.node_count - reachable,
                graph.node_count
            )));
        }

        Ok(graph)
    }

    /// Number of sentences in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of branches: direct children of the root.
    #[must_use]
    pub fn branches_count(&self) -> usize {
        self.root_id
            .as_deref()
            .and_then(|root| self.children.get(root))
            .map_or(0, Vec::len)
    }

    /// Depth of the shallowest branch, in edges from the root.
    ///
    /// For each direct child of the root (a branch head), the branch depth is
    /// `1 + ` the deepest BFS level below that head; the tree's depth is the
    /// **minimum** over heads. The shaping policy extends the weakest branch
    /// first, so the minimum — not the max or average — is what matters.
    ///
    /// Trees with zero or one sentences return their sentence count.
    #[must_use]
    pub fn shortest_branch_depth(&self) -> usize {
        if self.node_count <= 1 {
            return self.node_count;
        }
        let root = self.root_id.as_deref().unwrap_or_default();
        self.children
            .get(root)
            .map(|heads| {
                heads
                    .iter()
                    .map(|head| 1 + self.depth_below(head))
                    .min()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// All (parent, child) edges, ordered by parent then insertion order.
    #[must_use]
    pub fn edges(&self) -> Vec<(String, String)> {
        self.children
            .iter()
            .flat_map(|(parent, kids)| {
                kids.iter().map(move |kid| (parent.clone(), kid.clone()))
            })
            .collect()
    }

    /// Deepest BFS level below `start`, counting `start` as level 0.
    fn depth_below(&self, start: &str) -> usize {
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut max_level = 0;
        while let Some((node, level)) = queue.pop_front() {
            max_level = max_level.max(level);
            if let Some(kids) = self.children.get(node) {
                for kid in kids {
                    queue.push_back((kid, level + 1));
                }
            }
        }
        max_level
    }

    /// Number of nodes reachable from the root (root included).
    fn reachable_count(&self) -> usize {
        let Some(root) = self.root_id.as_deref() else {
            return 0;
        };
        let mut seen: HashSet<&str> = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            if let Some(kids) = self.children.get(node) {
                for kid in kids {
                    if seen.insert(kid) {
                        queue.push_back(kid);
                    }
                }
            }
        }
        seen.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn tree_row(id: &str, root: Option<&str>) -> TreeRow {
        TreeRow {
            id: id.into(),
            root_sentence_id: root.map(String::from),
            profile_lock_id: None,
            profile_lock_heartbeat: None,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn sentence(id: &str, tree_id: &str, parent: Option<&str>) -> SentenceRow {
        SentenceRow {
            id: id.into(),
            tree_id: tree_id.into(),
            profile_id: "prof_a".into(),
            parent_id: parent.map(String::from),
            text: id.into(),
            language: "english".into(),
            bucket: "experiment".into(),
            read_time_proportion: 0.0,
            write_time_proportion: 0.0,
            read_time_allotted: 0.0,
            write_time_allotted: 0.0,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    /// Chain of `depth` sentences hanging off the root: r -> h -> h1 -> ...
    fn chain(rows: &mut Vec<SentenceRow>, tree: &str, head: &str, depth: usize) {
        rows.push(sentence(head, tree, Some("r")));
        let mut prev = head.to_string();
        for i in 1..depth {
            let id = format!("{head}{i}");
            rows.push(sentence(&id, tree, Some(&prev)));
            prev = id;
        }
    }

    #[test]
    fn empty_tree_has_depth_zero() {
        let graph = TreeGraph::from_rows(&tree_row("tree_1", None), &[]).unwrap();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.branches_count(), 0);
        assert_eq!(graph.shortest_branch_depth(), 0);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn root_only_tree_has_depth_one() {
        let rows = vec![sentence("r", "tree_1", None)];
        let graph = TreeGraph::from_rows(&tree_row("tree_1", Some("r")), &rows).unwrap();
        assert_eq!(graph.shortest_branch_depth(), 1);
        assert_eq!(graph.branches_count(), 0);
    }

    #[test]
    fn shortest_branch_depth_takes_the_minimum() {
        // Branches of depths 3, 5, and 7 — the spec-level example.
        let mut rows = vec![sentence("r", "tree_1", None)];
        chain(&mut rows, "tree_1", "a", 3);
        chain(&mut rows, "tree_1", "b", 5);
        chain(&mut rows, "tree_1", "c", 7);

        let graph = TreeGraph::from_rows(&tree_row("tree_1", Some("r")), &rows).unwrap();
        assert_eq!(graph.branches_count(), 3);
        assert_eq!(graph.shortest_branch_depth(), 3);
    }

    #[test]
    fn depth_follows_the_deepest_path_within_a_branch() {
        // One branch that forks internally: depth is the deepest path, not
        // the shallowest leaf.
        let mut rows = vec![sentence("r", "tree_1", None)];
        rows.push(sentence("a", "tree_1", Some("r")));
        rows.push(sentence("a1", "tree_1", Some("a")));
        rows.push(sentence("a2", "tree_1", Some("a"))); // shallow fork
        rows.push(sentence("a1x", "tree_1", Some("a1")));

        let graph = TreeGraph::from_rows(&tree_row("tree_1", Some("r")), &rows).unwrap();
        assert_eq!(graph.branches_count(), 1);
        assert_eq!(graph.shortest_branch_depth(), 3);
    }

    #[test]
    fn edges_cover_every_parent_child_pair() {
        let mut rows = vec![sentence("r", "tree_1", None)];
        chain(&mut rows, "tree_1", "a", 2);

        let graph = TreeGraph::from_rows(&tree_row("tree_1", Some("r")), &rows).unwrap();
        let edges = graph.edges();
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&("r".into(), "a".into())));
        assert!(edges.contains(&("a".into(), "a1".into())));
    }

    #[test]
    fn rejects_root_set_on_empty_tree() {
        let err = TreeGraph::from_rows(&tree_row("tree_1", Some("r")), &[]).unwrap_err();
        assert_matches!(err, ForestError::MalformedTree { .. });
    }

    #[test]
    fn rejects_sentences_without_root() {
        let rows = vec![sentence("r", "tree_1", None)];
        let err = TreeGraph::from_rows(&tree_row("tree_1", None), &rows).unwrap_err();
        assert_matches!(err, ForestError::MalformedTree { .. });
    }

    #[test]
    fn rejects_second_parentless_sentence() {
        let rows = vec![sentence("r", "tree_1", None), sentence("x", "tree_1", None)];
        let err = TreeGraph::from_rows(&tree_row("tree_1", Some("r")), &rows).unwrap_err();
        assert_matches!(err, ForestError::MalformedTree { .. });
    }

    #[test]
    fn rejects_missing_parent() {
        let rows = vec![
            sentence("r", "tree_1", None),
            sentence("x", "tree_1", Some("ghost")),
        ];
        let err = TreeGraph::from_rows(&tree_row("tree_1", Some("r")), &rows).unwrap_err();
        assert_matches!(err, ForestError::MalformedTree { .. });
    }

    #[test]
    fn rejects_foreign_tree_sentence() {
        let rows = vec![sentence("r", "tree_1", None), sentence("x", "tree_2", Some("r"))];
        let err = TreeGraph::from_rows(&tree_row("tree_1", Some("r")), &rows).unwrap_err();
        assert_matches!(err, ForestError::MalformedTree { .. });
    }

    #[test]
    fn rejects_cycle_disconnected_from_root() {
        let rows = vec![
            sentence("r", "tree_1", None),
            sentence("x", "tree_1", Some("y")),
            sentence("y", "tree_1", Some("x")),
        ];
        let err = TreeGraph::from_rows(&tree_row("tree_1", Some("r")), &rows).unwrap_err();
        assert_matches!(err, ForestError::MalformedTree { .. });
    }
}
