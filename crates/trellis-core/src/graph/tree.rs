//! In-memory snapshot of the journal forest.
//!
//! [`JournalTree`] is an arena keyed by journal id with the parent pointer
//! stored on each node. The child index is derived state and is only built
//! the first time a downward lookup needs it.

use anyhow::Result;
use rusqlite::Connection;
use std::cell::OnceCell;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::db::query;
use crate::model::JournalNode;

/// Read-only structural lookups over a journal hierarchy.
///
/// The selection state machine depends on this trait rather than on a
/// database so that it can run client-side against any snapshot.
pub trait HierarchyView {
    /// Parent of `journal_id`, or `None` for roots and unknown ids.
    fn parent_of(&self, journal_id: &str) -> Option<&str>;

    /// Whether `journal_id` is part of the hierarchy.
    fn contains(&self, journal_id: &str) -> bool;

    /// True when `ancestor` lies strictly above `journal_id`.
    fn is_strict_descendant_of(&self, journal_id: &str, ancestor: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.parent_of(journal_id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.parent_of(id);
        }
        false
    }
}

/// Arena snapshot of the hierarchy.
#[derive(Debug, Default)]
pub struct JournalTree {
    nodes: HashMap<String, JournalNode>,
    children: OnceCell<HashMap<String, Vec<String>>>,
}

impl JournalTree {
    /// Build a tree from already-loaded nodes. Later duplicates replace
    /// earlier ones.
    #[must_use]
    pub fn from_nodes(nodes: impl IntoIterator<Item = JournalNode>) -> Self {
        Self {
            nodes: nodes
                .into_iter()
                .map(|n| (n.journal_id.clone(), n))
                .collect(),
            children: OnceCell::new(),
        }
    }

    /// Snapshot every journal in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn load(conn: &Connection) -> Result<Self> {
        Ok(Self::from_nodes(query::list_journals(conn)?))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, journal_id: &str) -> Option<&JournalNode> {
        self.nodes.get(journal_id)
    }

    /// Direct children, sorted by code.
    #[must_use]
    pub fn children(&self, journal_id: &str) -> &[String] {
        self.child_index()
            .get(journal_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Roots, sorted by code. A node whose parent is missing from the
    /// snapshot counts as a root.
    #[must_use]
    pub fn roots(&self) -> Vec<&str> {
        let mut roots: Vec<&str> = self
            .nodes
            .values()
            .filter(|n| {
                n.parent_id
                    .as_deref()
                    .is_none_or(|p| !self.nodes.contains_key(p))
            })
            .map(|n| n.journal_id.as_str())
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Path root → … → `journal_id`, inclusive. Empty for unknown ids.
    #[must_use]
    pub fn ancestors(&self, journal_id: &str) -> Vec<&str> {
        let Some(start) = self.nodes.get(journal_id) else {
            return Vec::new();
        };
        let mut path = vec![start.journal_id.as_str()];
        let mut seen: HashSet<&str> = path.iter().copied().collect();
        let mut current = start.parent_id.as_deref();
        while let Some(id) = current {
            let Some(node) = self.nodes.get(id) else {
                break;
            };
            if !seen.insert(node.journal_id.as_str()) {
                break;
            }
            path.push(node.journal_id.as_str());
            current = node.parent_id.as_deref();
        }
        path.reverse();
        path
    }

    /// Descendant closure including `journal_id`, in breadth-first order.
    #[must_use]
    pub fn descendants(&self, journal_id: &str) -> Vec<&str> {
        let Some(start) = self.nodes.get(journal_id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start.journal_id.as_str()]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            queue.extend(self.children(id).iter().map(String::as_str));
        }
        out
    }

    /// Number of edges between `journal_id` and its root.
    #[must_use]
    pub fn depth(&self, journal_id: &str) -> Option<usize> {
        let path = self.ancestors(journal_id);
        path.len().checked_sub(1)
    }

    fn child_index(&self) -> &HashMap<String, Vec<String>> {
        self.children.get_or_init(|| {
            let mut index: HashMap<String, Vec<String>> = HashMap::new();
            for node in self.nodes.values() {
                if let Some(parent) = &node.parent_id {
                    index
                        .entry(parent.clone())
                        .or_default()
                        .push(node.journal_id.clone());
                }
            }
            for kids in index.values_mut() {
                kids.sort_unstable();
            }
            index
        })
    }
}

impl HierarchyView for JournalTree {
    fn parent_of(&self, journal_id: &str) -> Option<&str> {
        self.nodes.get(journal_id)?.parent_id.as_deref()
    }

    fn contains(&self, journal_id: &str) -> bool {
        self.nodes.contains_key(journal_id)
    }
}
