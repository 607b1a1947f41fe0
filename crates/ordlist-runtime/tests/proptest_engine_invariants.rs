//! Property-based invariant tests for the commit engine.
//!
//! For any aligned grouped list and any sequence of reorder requests:
//!
//! 1. The order stays aligned with the grouping level.
//! 2. Item moves never change the label sequence (items stay in their group).
//! 3. The order is always a permutation of the inserted ids.
//! 4. Each applied request renders exactly once; refused or unchanged ones never render.
//! 5. Every rendered frame carries the store version it was derived from.

use std::collections::HashSet;

use ordlist_core::category::{CategoryLevel, CategoryModel};
use ordlist_core::grouping::check_alignment;
use ordlist_core::id::StableId;
use ordlist_core::input::Modifiers;
use ordlist_core::item::NewItem;
use ordlist_runtime::config::EngineConfig;
use ordlist_runtime::engine::Engine;
use ordlist_runtime::events::{RenderFrame, RenderSink};
use ordlist_view::virtualized::SlotHost;
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

const LABELS: [&str; 4] = ["A", "B", "C", ""];

#[derive(Default)]
struct VersionSink {
    versions: Vec<u64>,
}

impl SlotHost for VersionSink {
    type Handle = ();

    fn create_slot(&mut self) {}

    fn place_slot(&mut self, _slot: &(), _row: usize, _top: f64) {}

    fn hide_slot(&mut self, _slot: &()) {}
}

impl RenderSink for VersionSink {
    fn present(&mut self, frame: &RenderFrame<'_>) {
        self.versions.push(frame.version);
    }
}

#[derive(Debug, Clone)]
enum Op {
    Move { pick: Vec<bool>, gap: usize },
    Position { pick: usize, position: i64 },
    Nudge { pick: usize, delta: isize },
    Group { label: usize, gap: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (prop::collection::vec(any::<bool>(), 1..8), 0usize..50)
            .prop_map(|(pick, gap)| Op::Move { pick, gap }),
        (0usize..40, -3i64..50).prop_map(|(pick, position)| Op::Position { pick, position }),
        (0usize..40, -5isize..5).prop_map(|(pick, delta)| Op::Nudge { pick, delta }),
        (0usize..3, 0usize..4).prop_map(|(label, gap)| Op::Group { label, gap }),
    ]
}

fn aligned_engine(labels: &[usize]) -> (Engine<VersionSink>, Vec<StableId>) {
    let model = CategoryModel::new(vec![CategoryLevel::new("L").with_labels(["A", "B", "C"])]);
    let mut engine = Engine::new(EngineConfig::default(), model, VersionSink::default()).unwrap();
    let ids = engine.insert_batch(
        labels
            .iter()
            .enumerate()
            .map(|(i, &l)| {
                let item = NewItem::new(format!("item-{i}"), "");
                if LABELS[l].is_empty() {
                    item
                } else {
                    item.with_category(0, l as f64, LABELS[l])
                }
            })
            .collect(),
    );
    engine.set_group_level(Some(0)).unwrap();
    engine.align_to_groups();
    (engine, ids)
}

/// Make `id` the sole selection; clicking it again would deselect it.
fn select_only(engine: &mut Engine<VersionSink>, id: StableId) {
    let selection = engine.selection();
    if selection.len() != 1 || !selection.is_selected(id) {
        engine.click(id, Modifiers::NONE);
    }
}

fn label_runs(engine: &Engine<VersionSink>) -> Vec<String> {
    let mut runs: Vec<String> = Vec::new();
    for item in engine.store().all() {
        let label = item.label(0);
        if runs.last().map(String::as_str) != Some(label) {
            runs.push(label.to_string());
        }
    }
    runs
}

// ═════════════════════════════════════════════════════════════════════════
// 1-5. Reorder sequences
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn reorders_preserve_grouping(
        labels in prop::collection::vec(0usize..LABELS.len(), 1..30),
        ops in prop::collection::vec(op_strategy(), 1..12),
    ) {
        let (mut engine, ids) = aligned_engine(&labels);
        let all: HashSet<StableId> = ids.iter().copied().collect();

        for op in ops {
            let runs_before = label_runs(&engine);
            let renders_before = engine.renders();
            let (applied, item_move) = match op {
                Op::Move { pick, gap } => {
                    let chosen: Vec<StableId> = ids
                        .iter()
                        .zip(pick.iter().cycle())
                        .filter(|(_, m)| **m)
                        .map(|(id, _)| *id)
                        .collect();
                    (engine.move_items(&chosen, gap).is_applied(), true)
                }
                Op::Position { pick, position } => {
                    select_only(&mut engine, ids[pick % ids.len()]);
                    let renders = engine.renders();
                    let applied = engine
                        .move_to_position(&position.to_string())
                        .is_ok_and(|r| r.is_applied());
                    prop_assert_eq!(engine.renders(), renders + u64::from(applied));
                    (applied, true)
                }
                Op::Nudge { pick, delta } => {
                    select_only(&mut engine, ids[pick % ids.len()]);
                    let renders = engine.renders();
                    let applied = engine.nudge_selection(delta).is_applied();
                    prop_assert_eq!(engine.renders(), renders + u64::from(applied));
                    (applied, true)
                }
                Op::Group { label, gap } => {
                    let applied = engine
                        .reorder_group(LABELS[label], gap)
                        .is_ok_and(|r| r.is_applied());
                    (applied, false)
                }
            };

            prop_assert!(check_alignment(engine.store().all(), 0).aligned);
            let now: HashSet<StableId> = engine.store().ids().into_iter().collect();
            prop_assert_eq!(&now, &all);
            if item_move {
                prop_assert_eq!(label_runs(&engine), runs_before);
            } else {
                prop_assert_eq!(engine.renders(), renders_before + u64::from(applied));
            }
            prop_assert_eq!(engine.sink().versions.last().copied(), Some(engine.version()));
        }
    }
}
