//! Selection state container and its reducer.
//!
//! # Cascade
//!
//! The *active order* is the role order restricted to visible roles. When
//! the selection of the role at active position `k` changes, every role at
//! a position greater than `k` is cleared and its fetch epoch advances, so
//! pickers never show options computed from a stale upstream selection.
//! Hidden roles hold no selection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use trellis_core::config::SelectionConfig;
use trellis_core::graph::HierarchyView;

use crate::error::SelectError;
use crate::journal::{JournalSelection, Level};
use crate::role::Role;

/// A user intent. Gesture mapping (click, long-press, ...) is the caller's
/// concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SelectTopLevel { journal_id: String },
    ToggleLevel2 { journal_id: String },
    ToggleLevel3 { journal_id: String },
    PromoteLevel2 { journal_id: String },
    PromoteLevel3 { journal_id: String },
    SetFlat { journal_id: Option<String> },
    ToggleRootFilter { tag: String },
    SelectEntity { role: Role, entity_id: Option<String> },
    ReorderRoles { order: Vec<Role> },
    ResetFrom { role: Role },
    SetVisible { role: Role, visible: bool },
}

/// Everything the pickers need to render and fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    order: Vec<Role>,
    visible: BTreeMap<Role, bool>,
    journal: JournalSelection,
    entities: BTreeMap<Role, String>,
    epochs: BTreeMap<Role, u64>,
    restricted_root: Option<String>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SelectionState {
    /// Fresh state in the default role order with every role visible.
    /// `restricted_root` is the journal the user's access is limited to.
    #[must_use]
    pub fn new(restricted_root: Option<String>) -> Self {
        Self {
            order: Role::ALL.to_vec(),
            visible: Role::ALL.iter().map(|r| (*r, true)).collect(),
            journal: JournalSelection::default(),
            entities: BTreeMap::new(),
            epochs: Role::ALL.iter().map(|r| (*r, 0)).collect(),
            restricted_root,
        }
    }

    #[must_use]
    pub fn order(&self) -> &[Role] {
        &self.order
    }

    /// Visible roles in chain order.
    #[must_use]
    pub fn active_order(&self) -> Vec<Role> {
        self.order
            .iter()
            .copied()
            .filter(|r| self.is_visible(*r))
            .collect()
    }

    #[must_use]
    pub fn is_visible(&self, role: Role) -> bool {
        self.visible.get(&role).copied().unwrap_or(true)
    }

    #[must_use]
    pub const fn journal(&self) -> &JournalSelection {
        &self.journal
    }

    /// Selected entity for a non-journal role.
    #[must_use]
    pub fn entity(&self, role: Role) -> Option<&str> {
        self.entities.get(&role).map(String::as_str)
    }

    #[must_use]
    pub fn restricted_root(&self) -> Option<&str> {
        self.restricted_root.as_deref()
    }

    /// Journal ids downstream pickers filter by.
    #[must_use]
    pub fn effective_journal_ids(&self, view: &dyn HierarchyView) -> Vec<String> {
        self.journal.effective_ids(view, self.restricted_root())
    }

    /// Current fetch generation of a role.
    #[must_use]
    pub fn epoch(&self, role: Role) -> u64 {
        self.epochs.get(&role).copied().unwrap_or(0)
    }

    fn is_role_empty(&self, role: Role) -> bool {
        match role {
            Role::Journal => self.journal.is_empty(),
            other => !self.entities.contains_key(&other),
        }
    }

    fn clear_role(&mut self, role: Role) {
        match role {
            Role::Journal => self.journal.clear(),
            other => {
                self.entities.remove(&other);
            }
        }
    }

    fn bump(&mut self, role: Role) {
        *self.epochs.entry(role).or_insert(0) += 1;
    }

    /// Clear and invalidate every active role after `role`. For a hidden
    /// role, "after" means after its slot in the full order.
    fn cascade_after(&mut self, role: Role) {
        let Some(pos) = self.order.iter().position(|r| *r == role) else {
            return;
        };
        let downstream: Vec<Role> = self.order[pos + 1..]
            .iter()
            .copied()
            .filter(|r| self.is_visible(*r))
            .collect();
        for r in downstream {
            if !self.is_role_empty(r) {
                debug!(changed = %role, cleared = %r, "cascade clear");
            }
            self.clear_role(r);
            self.bump(r);
        }
    }
}

/// Apply `command` to `state`, returning the next state.
///
/// `view` answers parent lookups for level bookkeeping; `limits` bounds the
/// level-2/3 lists.
///
/// # Errors
///
/// Returns [`SelectError`] for an unknown journal id, an entity command
/// addressed to the journal role, a selection aimed at a hidden role, or a
/// role order that is not a permutation of [`Role::ALL`]. The input state is
/// untouched either way.
pub fn reduce(
    state: &SelectionState,
    command: &Command,
    view: &dyn HierarchyView,
    limits: &SelectionConfig,
) -> Result<SelectionState, SelectError> {
    if let Some(role) = target_role(command) {
        if !state.is_visible(role) {
            return Err(SelectError::HiddenRole(role));
        }
    }

    let mut next = state.clone();
    let restricted_root = state.restricted_root();

    match command {
        Command::SelectTopLevel { journal_id } => {
            require_journal(view, journal_id)?;
            next.journal.select_top_level(journal_id);
        }
        Command::ToggleLevel2 { journal_id } => {
            require_journal(view, journal_id)?;
            next.journal.toggle(Level::Two, journal_id, view, limits);
        }
        Command::ToggleLevel3 { journal_id } => {
            require_journal(view, journal_id)?;
            next.journal.toggle(Level::Three, journal_id, view, limits);
        }
        Command::PromoteLevel2 { journal_id } => {
            require_journal(view, journal_id)?;
            next.journal
                .promote(Level::Two, journal_id, view, limits, restricted_root);
        }
        Command::PromoteLevel3 { journal_id } => {
            require_journal(view, journal_id)?;
            next.journal
                .promote(Level::Three, journal_id, view, limits, restricted_root);
        }
        Command::SetFlat { journal_id } => {
            if let Some(id) = journal_id {
                require_journal(view, id)?;
            }
            next.journal.set_flat(journal_id.as_deref());
        }
        Command::ToggleRootFilter { tag } => {
            next.journal.toggle_root_filter(tag);
        }
        Command::SelectEntity { role, entity_id } => {
            if !role.is_entity() {
                return Err(SelectError::NotEntityRole(*role));
            }
            match entity_id {
                Some(id) => {
                    next.entities.insert(*role, id.clone());
                }
                None => {
                    next.entities.remove(role);
                }
            }
        }
        Command::ReorderRoles { order } => {
            return reorder(state, order);
        }
        Command::ResetFrom { role } => {
            next.clear_role(*role);
            next.cascade_after(*role);
            return Ok(next);
        }
        Command::SetVisible { role, visible } => {
            if state.is_visible(*role) == *visible {
                return Ok(next);
            }
            next.visible.insert(*role, *visible);
            next.clear_role(*role);
            next.bump(*role);
            next.cascade_after(*role);
            return Ok(next);
        }
    }

    let changed_role = target_role(command).unwrap_or(Role::Journal);
    if changed(state, &next, changed_role) {
        next.cascade_after(changed_role);
    }
    Ok(next)
}

/// The role whose selection a command edits, for commands that edit one.
const fn target_role(command: &Command) -> Option<Role> {
    match command {
        Command::SelectTopLevel { .. }
        | Command::ToggleLevel2 { .. }
        | Command::ToggleLevel3 { .. }
        | Command::PromoteLevel2 { .. }
        | Command::PromoteLevel3 { .. }
        | Command::SetFlat { .. }
        | Command::ToggleRootFilter { .. } => Some(Role::Journal),
        Command::SelectEntity { role, .. } => Some(*role),
        Command::ReorderRoles { .. } | Command::ResetFrom { .. } | Command::SetVisible { .. } => {
            None
        }
    }
}

/// Reset every role from the first active position whose occupant differs.
fn reorder(state: &SelectionState, order: &[Role]) -> Result<SelectionState, SelectError> {
    let mut sorted = order.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != Role::ALL.len() || order.len() != Role::ALL.len() {
        return Err(SelectError::InvalidOrder(order.to_vec()));
    }

    let old_active = state.active_order();
    let mut next = state.clone();
    next.order = order.to_vec();
    let new_active = next.active_order();

    let first_diff = old_active
        .iter()
        .zip(&new_active)
        .position(|(a, b)| a != b)
        .unwrap_or(new_active.len());
    for role in &new_active[first_diff..] {
        next.clear_role(*role);
        next.bump(*role);
    }
    debug!(from = first_diff, "roles reordered");
    Ok(next)
}

fn changed(before: &SelectionState, after: &SelectionState, role: Role) -> bool {
    match role {
        Role::Journal => before.journal != after.journal,
        other => before.entities.get(&other) != after.entities.get(&other),
    }
}

fn require_journal(view: &dyn HierarchyView, journal_id: &str) -> Result<(), SelectError> {
    if view.contains(journal_id) {
        Ok(())
    } else {
        Err(SelectError::UnknownJournal(journal_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::graph::JournalTree;
    use trellis_core::model::JournalNode;

    fn node(id: &str, parent: Option<&str>) -> JournalNode {
        JournalNode {
            journal_id: id.to_string(),
            name: id.to_string(),
            parent_id: parent.map(str::to_string),
            is_terminal: false,
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    fn tree() -> JournalTree {
        JournalTree::from_nodes([
            node("4", None),
            node("40", Some("4")),
            node("401", Some("40")),
            node("45", Some("4")),
        ])
    }

    fn apply(state: &SelectionState, cmd: Command) -> SelectionState {
        reduce(state, &cmd, &tree(), &SelectionConfig::default()).unwrap()
    }

    fn with_partner_and_good() -> SelectionState {
        let s = SelectionState::default();
        let s = apply(
            &s,
            Command::SelectEntity {
                role: Role::Partner,
                entity_id: Some("P1".into()),
            },
        );
        apply(
            &s,
            Command::SelectEntity {
                role: Role::Good,
                entity_id: Some("G1".into()),
            },
        )
    }

    #[test]
    fn journal_change_clears_downstream() {
        let s = with_partner_and_good();
        let s = apply(&s, Command::SelectTopLevel { journal_id: "4".into() });
        assert_eq!(s.entity(Role::Partner), None);
        assert_eq!(s.entity(Role::Good), None);
        assert_eq!(s.journal().top_level_id.as_deref(), Some("4"));
    }

    #[test]
    fn partner_change_keeps_upstream_clears_good() {
        let s = apply(
            &SelectionState::default(),
            Command::SelectTopLevel { journal_id: "4".into() },
        );
        let s = apply(
            &s,
            Command::SelectEntity {
                role: Role::Good,
                entity_id: Some("G1".into()),
            },
        );
        let s = apply(
            &s,
            Command::SelectEntity {
                role: Role::Partner,
                entity_id: Some("P2".into()),
            },
        );
        assert_eq!(s.journal().top_level_id.as_deref(), Some("4"));
        assert_eq!(s.entity(Role::Good), None);
        assert_eq!(s.entity(Role::Partner), Some("P2"));
    }

    #[test]
    fn reselecting_same_value_does_not_cascade() {
        let s = with_partner_and_good();
        let epoch = s.epoch(Role::Good);
        let s = apply(
            &s,
            Command::SelectEntity {
                role: Role::Partner,
                entity_id: Some("P1".into()),
            },
        );
        assert_eq!(s.entity(Role::Good), Some("G1"));
        assert_eq!(s.epoch(Role::Good), epoch);
    }

    #[test]
    fn reorder_resets_from_first_difference() {
        let s = apply(
            &SelectionState::default(),
            Command::SelectTopLevel { journal_id: "4".into() },
        );
        let s = apply(
            &s,
            Command::SelectEntity {
                role: Role::Partner,
                entity_id: Some("P1".into()),
            },
        );
        let s = apply(
            &s,
            Command::SelectEntity {
                role: Role::Document,
                entity_id: Some("D1".into()),
            },
        );
        let s = apply(
            &s,
            Command::ReorderRoles {
                order: vec![Role::Journal, Role::Good, Role::Partner, Role::Document],
            },
        );
        assert_eq!(s.journal().top_level_id.as_deref(), Some("4"));
        assert_eq!(s.entity(Role::Partner), None);
        assert_eq!(s.entity(Role::Document), None);
    }

    #[test]
    fn invalid_order_is_rejected() {
        let s = SelectionState::default();
        let err = reduce(
            &s,
            &Command::ReorderRoles {
                order: vec![Role::Journal, Role::Journal, Role::Good, Role::Document],
            },
            &tree(),
            &SelectionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SelectError::InvalidOrder(_)));
    }

    #[test]
    fn entity_command_on_journal_is_rejected() {
        let err = reduce(
            &SelectionState::default(),
            &Command::SelectEntity {
                role: Role::Journal,
                entity_id: Some("4".into()),
            },
            &tree(),
            &SelectionConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, SelectError::NotEntityRole(Role::Journal));
    }

    #[test]
    fn unknown_journal_is_rejected() {
        let err = reduce(
            &SelectionState::default(),
            &Command::ToggleLevel2 { journal_id: "99".into() },
            &tree(),
            &SelectionConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, SelectError::UnknownJournal("99".into()));
    }

    #[test]
    fn reset_from_clears_role_and_downstream() {
        let s = apply(
            &with_partner_and_good(),
            Command::ResetFrom { role: Role::Partner },
        );
        assert_eq!(s.entity(Role::Partner), None);
        assert_eq!(s.entity(Role::Good), None);
    }

    #[test]
    fn hiding_a_role_clears_it_and_downstream() {
        let s = with_partner_and_good();
        let s = apply(
            &s,
            Command::SetVisible {
                role: Role::Partner,
                visible: false,
            },
        );
        assert!(!s.is_visible(Role::Partner));
        assert_eq!(s.entity(Role::Partner), None);
        assert_eq!(s.entity(Role::Good), None);
        assert_eq!(s.active_order(), vec![Role::Journal, Role::Good, Role::Document]);
    }

    #[test]
    fn hidden_role_rejects_selection() {
        let s = apply(
            &SelectionState::default(),
            Command::SetVisible {
                role: Role::Good,
                visible: false,
            },
        );
        let err = reduce(
            &s,
            &Command::SelectEntity {
                role: Role::Good,
                entity_id: Some("G1".into()),
            },
            &tree(),
            &SelectionConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, SelectError::HiddenRole(Role::Good));
    }

    #[test]
    fn set_flat_and_select_top_are_exclusive() {
        let s = apply(
            &SelectionState::default(),
            Command::SetFlat {
                journal_id: Some("401".into()),
            },
        );
        assert_eq!(s.effective_journal_ids(&tree()), vec!["401"]);
        let s = apply(&s, Command::SelectTopLevel { journal_id: "4".into() });
        assert_eq!(s.journal().flat_id, None);
        assert_eq!(s.effective_journal_ids(&tree()), vec!["4"]);
    }

    #[test]
    fn commands_round_trip_through_json() {
        let cmd = Command::SelectEntity {
            role: Role::Good,
            entity_id: Some("G1".into()),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"select_entity\""));
        assert_eq!(serde_json::from_str::<Command>(&json).unwrap(), cmd);
    }
}
