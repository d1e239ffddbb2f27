//! Journal picker value: a three-level drill-down plus a flat override.
//!
//! - `top_level_id` is the current context node (level 1)
//! - `level2_ids` / `level3_ids` are multi-selected nodes beneath it,
//!   bounded and evicted oldest first
//! - `flat_id` is a single journal picked from a flat list; it replaces the
//!   level selection while set
//! - `root_filter` holds tags restricting which roots are offered

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};
use trellis_core::config::SelectionConfig;
use trellis_core::graph::HierarchyView;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalSelection {
    pub top_level_id: Option<String>,
    pub level2_ids: Vec<String>,
    pub level3_ids: Vec<String>,
    pub flat_id: Option<String>,
    pub root_filter: Vec<String>,
}

/// Which level a toggle or promote addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    Two,
    Three,
}

impl JournalSelection {
    /// Whether nothing is selected. The root filter is a view preference and
    /// does not count.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.top_level_id.is_none()
            && self.level2_ids.is_empty()
            && self.level3_ids.is_empty()
            && self.flat_id.is_none()
    }

    /// Clear the selection, keeping the root filter.
    pub fn clear(&mut self) {
        self.top_level_id = None;
        self.level2_ids.clear();
        self.level3_ids.clear();
        self.flat_id = None;
    }

    /// True when the user has drilled to a node other than their
    /// access-restricted root.
    #[must_use]
    pub fn is_drilled_in(&self, restricted_root: Option<&str>) -> bool {
        self.top_level_id
            .as_deref()
            .is_some_and(|top| Some(top) != restricted_root)
    }

    /// Journal ids downstream queries should filter by, sorted.
    ///
    /// - a flat selection wins outright
    /// - every level-3 id is kept
    /// - a level-2 id is dropped when one of its descendants is selected at
    ///   level 3 (the narrower pick refines it)
    /// - the top-level id is used only when no level-2/3 id is selected and
    ///   it is not the user's restricted root (which is implied anyway)
    ///
    /// An empty result means "no journal filter".
    #[must_use]
    pub fn effective_ids(
        &self,
        view: &dyn HierarchyView,
        restricted_root: Option<&str>,
    ) -> Vec<String> {
        if let Some(flat) = &self.flat_id {
            return vec![flat.clone()];
        }

        let mut out: BTreeSet<String> = self.level3_ids.iter().cloned().collect();
        for l2 in &self.level2_ids {
            let refined = self
                .level3_ids
                .iter()
                .any(|l3| view.is_strict_descendant_of(l3, l2));
            if !refined {
                out.insert(l2.clone());
            }
        }

        if out.is_empty() && self.is_drilled_in(restricted_root) {
            if let Some(top) = &self.top_level_id {
                out.insert(top.clone());
            }
        }
        out.into_iter().collect()
    }

    // -----------------------------------------------------------------------
    // Transitions (called by the reducer)
    // -----------------------------------------------------------------------

    pub(crate) fn select_top_level(&mut self, id: &str) {
        self.top_level_id = Some(id.to_string());
        self.level2_ids.clear();
        self.level3_ids.clear();
        self.flat_id = None;
    }

    pub(crate) fn set_flat(&mut self, id: Option<&str>) {
        self.clear();
        self.flat_id = id.map(str::to_string);
    }

    /// Add or remove `id` at `level`. Removing a level-2 id also drops the
    /// level-3 ids beneath it.
    pub(crate) fn toggle(
        &mut self,
        level: Level,
        id: &str,
        view: &dyn HierarchyView,
        limits: &SelectionConfig,
    ) {
        self.flat_id = None;
        match level {
            Level::Two => {
                if remove(&mut self.level2_ids, id) {
                    self.level3_ids
                        .retain(|l3| !view.is_strict_descendant_of(l3, id));
                } else {
                    push_bounded(&mut self.level2_ids, id, limits.max_level2);
                }
            }
            Level::Three => {
                if !remove(&mut self.level3_ids, id) {
                    push_bounded(&mut self.level3_ids, id, limits.max_level3);
                }
            }
        }
    }

    /// Promote `id` to the drill context.
    ///
    /// - selected node: it becomes the top level; level-3 picks beneath it
    ///   move up to level 2
    /// - unselected node beneath the top while drilled in: step out one
    ///   level. The parent of the current top becomes the top and the former
    ///   top the sole level-2 pick. The picks made under the former top now
    ///   sit one level lower, so they move to level 3 with `id` after them
    /// - otherwise: same as a toggle
    pub(crate) fn promote(
        &mut self,
        level: Level,
        id: &str,
        view: &dyn HierarchyView,
        limits: &SelectionConfig,
        restricted_root: Option<&str>,
    ) {
        let selected = match level {
            Level::Two => self.level2_ids.iter().any(|x| x == id),
            Level::Three => self.level3_ids.iter().any(|x| x == id),
        };

        if selected {
            let promoted: Vec<String> = self
                .level3_ids
                .iter()
                .filter(|l3| view.is_strict_descendant_of(l3, id))
                .cloned()
                .collect();
            debug!(journal_id = id, carried = promoted.len(), "drill down");
            self.top_level_id = Some(id.to_string());
            self.level2_ids = promoted;
            self.level3_ids.clear();
            self.flat_id = None;
            return;
        }

        if self.is_drilled_in(restricted_root) && self.step_out(id, view, limits) {
            return;
        }

        self.toggle(level, id, view, limits);
    }

    /// Re-root at the parent of the current top with `id` picked beneath
    /// the former top. Returns false, changing nothing, when `id` is not
    /// under the current top or the top has no parent.
    fn step_out(&mut self, id: &str, view: &dyn HierarchyView, limits: &SelectionConfig) -> bool {
        let Some(old_top) = self.top_level_id.clone() else {
            return false;
        };
        if !view.is_strict_descendant_of(id, &old_top) {
            return false;
        }
        let Some(grand) = view.parent_of(&old_top) else {
            return false;
        };

        // Level-2 picks refined by a level-3 pick are implied by it.
        let carried: Vec<String> = self
            .level2_ids
            .iter()
            .filter(|l2| {
                !self
                    .level3_ids
                    .iter()
                    .any(|l3| view.is_strict_descendant_of(l3, l2))
            })
            .chain(&self.level3_ids)
            .filter(|x| *x != id)
            .cloned()
            .collect();

        debug!(journal_id = id, top = grand, carried = carried.len(), "step out");
        self.top_level_id = Some(grand.to_string());
        self.level2_ids = vec![old_top];
        self.level3_ids.clear();
        for pick in carried.iter().map(String::as_str).chain([id]) {
            if !self.level3_ids.iter().any(|x| x == pick) {
                push_bounded(&mut self.level3_ids, pick, limits.max_level3);
            }
        }
        self.flat_id = None;
        true
    }

    pub(crate) fn toggle_root_filter(&mut self, tag: &str) {
        if !remove(&mut self.root_filter, tag) {
            self.root_filter.push(tag.to_string());
        }
        self.clear();
    }
}

/// Remove `id` if present; returns whether it was.
fn remove(list: &mut Vec<String>, id: &str) -> bool {
    let before = list.len();
    list.retain(|x| x != id);
    list.len() != before
}

/// Append `id`, evicting the oldest entries beyond `max`.
fn push_bounded(list: &mut Vec<String>, id: &str, max: usize) {
    list.push(id.to_string());
    if list.len() > max {
        let evicted: Vec<String> = list.drain(..list.len() - max).collect();
        warn!(?evicted, max, "selection limit reached; evicted oldest");
    }
}
