use proptest::prelude::*;

use trellis_core::config::SelectionConfig;
use trellis_core::graph::{HierarchyView, JournalTree};
use trellis_core::model::JournalNode;
use trellis_select::{Command, Role, SelectionState, reduce};

/// 1 → {10 → {100, 101}, 11 → {110}}, 2 → {20}
const NODES: &[(&str, Option<&str>)] = &[
    ("1", None),
    ("10", Some("1")),
    ("100", Some("10")),
    ("101", Some("10")),
    ("11", Some("1")),
    ("110", Some("11")),
    ("2", None),
    ("20", Some("2")),
];

fn tree() -> JournalTree {
    JournalTree::from_nodes(NODES.iter().map(|(id, parent)| JournalNode {
        journal_id: (*id).to_string(),
        name: (*id).to_string(),
        parent_id: parent.map(str::to_string),
        is_terminal: false,
        created_at_us: 0,
        updated_at_us: 0,
    }))
}

fn limits() -> SelectionConfig {
    SelectionConfig {
        max_level2: 3,
        max_level3: 2,
    }
}

fn arb_journal() -> impl Strategy<Value = String> {
    prop::sample::select(NODES.iter().map(|(id, _)| (*id).to_string()).collect::<Vec<_>>())
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn arb_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        arb_journal().prop_map(|journal_id| Command::SelectTopLevel { journal_id }),
        arb_journal().prop_map(|journal_id| Command::ToggleLevel2 { journal_id }),
        arb_journal().prop_map(|journal_id| Command::ToggleLevel3 { journal_id }),
        arb_journal().prop_map(|journal_id| Command::PromoteLevel2 { journal_id }),
        arb_journal().prop_map(|journal_id| Command::PromoteLevel3 { journal_id }),
        prop::option::of(arb_journal()).prop_map(|journal_id| Command::SetFlat { journal_id }),
        (
            prop::sample::select(vec![Role::Partner, Role::Good, Role::Document]),
            prop::option::of("[A-C][0-2]")
        )
            .prop_map(|(role, entity_id)| Command::SelectEntity { role, entity_id }),
        Just(Role::ALL.to_vec())
            .prop_shuffle()
            .prop_map(|order| Command::ReorderRoles { order }),
        arb_role().prop_map(|role| Command::ResetFrom { role }),
        (arb_role(), any::<bool>()).prop_map(|(role, visible)| Command::SetVisible { role, visible }),
    ]
}

fn run(commands: &[Command], view: &JournalTree) -> SelectionState {
    commands
        .iter()
        .fold(SelectionState::new(Some("1".into())), |s, c| {
            reduce(&s, c, view, &limits()).unwrap_or(s)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn level_lists_stay_bounded(commands in prop::collection::vec(arb_command(), 0..40)) {
        let s = run(&commands, &tree());
        prop_assert!(s.journal().level2_ids.len() <= 3);
        prop_assert!(s.journal().level3_ids.len() <= 2);
    }

    #[test]
    fn effective_ids_never_keep_a_refined_level2(commands in prop::collection::vec(arb_command(), 0..40)) {
        let view = tree();
        let s = run(&commands, &view);
        let ids = s.effective_journal_ids(&view);

        let mut sorted = ids.clone();
        sorted.sort();
        prop_assert_eq!(&ids, &sorted);

        if let Some(flat) = &s.journal().flat_id {
            prop_assert_eq!(ids, vec![flat.clone()]);
        } else {
            let level3 = &s.journal().level3_ids;
            for id in ids.iter().filter(|id| !level3.contains(id)) {
                prop_assert!(!level3.iter().any(|l3| view.is_strict_descendant_of(l3, id)));
            }
        }
    }

    #[test]
    fn a_change_clears_every_active_role_after_it(
        commands in prop::collection::vec(arb_command(), 0..30),
        last in arb_command(),
    ) {
        let view = tree();
        let before = run(&commands, &view);
        let Ok(after) = reduce(&before, &last, &view, &limits()) else {
            return Ok(());
        };

        let active = after.active_order();
        let changed = active.iter().position(|role| match role {
            Role::Journal => before.journal() != after.journal(),
            other => before.entity(*other) != after.entity(*other),
        });
        if let (Some(pos), false) = (changed, matches!(last, Command::ReorderRoles { .. })) {
            for role in &active[pos + 1..] {
                match role {
                    Role::Journal => prop_assert!(after.journal().is_empty()),
                    other => prop_assert_eq!(after.entity(*other), None),
                }
                prop_assert!(after.epoch(*role) > before.epoch(*role));
            }
        }
    }

    #[test]
    fn hidden_roles_hold_nothing(commands in prop::collection::vec(arb_command(), 0..40)) {
        let s = run(&commands, &tree());
        for role in Role::ALL.into_iter().filter(|r| !s.is_visible(*r)) {
            match role {
                Role::Journal => prop_assert!(s.journal().is_empty()),
                other => prop_assert_eq!(s.entity(other), None),
            }
        }
    }
}
