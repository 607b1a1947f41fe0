#![forbid(unsafe_code)]

//! End-to-end engine flows: commits, events, rendering, and loading.
//!
//! Run with:
//!   cargo test -p ordlist-runtime --test engine_flow

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use ordlist_core::category::{CategoryLevel, CategoryModel};
use ordlist_core::error::{EngineError, RejectReason, ReorderResult};
use ordlist_core::filter::FilterSpec;
use ordlist_core::id::StableId;
use ordlist_core::input::{Modifiers, PointerEvent};
use ordlist_core::item::{CategoryAssignment, NewItem};
use ordlist_runtime::config::EngineConfig;
use ordlist_runtime::engine::Engine;
use ordlist_runtime::events::{EngineEvent, EventLog, EventRecorder, RenderFrame, RenderMode, RenderSink};
use ordlist_runtime::loader::VecSource;
use ordlist_view::virtualized::{SlotHost, max_scroll_fraction};

// ============================================================================
// Test Infrastructure
// ============================================================================

/// Sink that records frames and tracks slot placement.
#[derive(Debug, Default)]
struct RecordingSink {
    frames: Vec<(u64, RenderMode, Option<usize>)>,
    next_slot: usize,
    placed: HashMap<usize, usize>,
}

impl RecordingSink {
    fn last_mode(&self) -> Option<RenderMode> {
        self.frames.last().map(|(_, mode, _)| *mode)
    }

    fn last_indicator(&self) -> Option<usize> {
        self.frames.last().and_then(|(_, _, drop)| *drop)
    }
}

impl SlotHost for RecordingSink {
    type Handle = usize;

    fn create_slot(&mut self) -> usize {
        self.next_slot += 1;
        self.next_slot
    }

    fn place_slot(&mut self, slot: &usize, row: usize, _top: f64) {
        self.placed.insert(*slot, row);
    }

    fn hide_slot(&mut self, slot: &usize) {
        self.placed.remove(slot);
    }
}

impl RenderSink for RecordingSink {
    fn present(&mut self, frame: &RenderFrame<'_>) {
        self.frames
            .push((frame.version, frame.mode, frame.drop_indicator));
    }
}

fn status_model() -> CategoryModel {
    CategoryModel::new(vec![
        CategoryLevel::new("Status").with_labels(["Todo", "Doing", "Done"]),
        CategoryLevel::new("Score").calculated(),
    ])
}

fn engine() -> (Engine<RecordingSink>, EventLog) {
    let mut engine = Engine::new(EngineConfig::default(), status_model(), RecordingSink::default())
        .expect("default config is valid");
    let (recorder, log) = EventRecorder::new();
    engine.add_observer(recorder);
    (engine, log)
}

fn flat(engine: &mut Engine<RecordingSink>, names: &[&str]) -> Vec<StableId> {
    engine.insert_batch(names.iter().map(|n| NewItem::new(*n, "")).collect())
}

fn status(name: &str, label: &str) -> NewItem {
    let rank = ["Todo", "Doing", "Done"]
        .iter()
        .position(|l| *l == label)
        .expect("known label");
    NewItem::new(name, "").with_category(0, rank as f64, label)
}

fn names(engine: &Engine<RecordingSink>) -> Vec<String> {
    engine
        .store()
        .all()
        .iter()
        .map(|item| item.display_name.clone())
        .collect()
}

fn group_labels(engine: &Engine<RecordingSink>) -> Vec<String> {
    engine.groups().iter().map(|g| g.label.clone()).collect()
}

fn sort_orders(engine: &Engine<RecordingSink>, label: &str) -> Vec<f64> {
    engine
        .store()
        .all()
        .iter()
        .filter(|item| item.label(0) == label)
        .map(|item| item.sort_order(0))
        .collect()
}

fn order_events(events: &[EngineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, EngineEvent::OrderChanged(_)))
        .count()
}

// ============================================================================
// Commits and events
// ============================================================================

#[test]
fn one_render_per_commit() {
    let (mut engine, log) = engine();
    let before = engine.renders();
    flat(&mut engine, &["a", "b", "c"]);
    assert_eq!(engine.renders(), before + 1);

    let events = log.drain();
    assert_eq!(order_events(&events), 1);
    assert!(events.contains(&EngineEvent::FilterChanged { visible: 3, total: 3 }));
    let (version, _, _) = *engine.sink().frames.last().expect("frame");
    assert_eq!(version, engine.version());
}

#[test]
fn non_contiguous_move_is_stable() {
    let (mut engine, log) = engine();
    let ids = flat(&mut engine, &["1", "2", "3", "4", "5"]);
    log.drain();

    let result = engine.move_items(&[ids[1], ids[3]], 5);
    assert_eq!(result, ReorderResult::Applied);
    assert_eq!(names(&engine), ["1", "3", "5", "2", "4"]);
    assert_eq!(order_events(&log.drain()), 1);

    let result = engine.move_items(&[ids[1], ids[3]], 0);
    assert_eq!(result, ReorderResult::Applied);
    assert_eq!(names(&engine), ["2", "4", "1", "3", "5"]);
}

#[test]
fn unchanged_move_is_silent() {
    let (mut engine, log) = engine();
    let ids = flat(&mut engine, &["a", "b", "c"]);
    log.drain();
    let renders = engine.renders();

    assert_eq!(engine.move_items(&[ids[1]], 1), ReorderResult::Unchanged);
    assert_eq!(engine.move_items(&[ids[1]], 2), ReorderResult::Unchanged);
    assert!(log.is_empty());
    assert_eq!(engine.renders(), renders);
}

#[test]
fn removal_prunes_selection() {
    let (mut engine, log) = engine();
    let ids = flat(&mut engine, &["a", "b", "c"]);
    engine.click(ids[0], Modifiers::NONE);
    engine.click(ids[2], Modifiers::CTRL);
    log.drain();

    engine.remove(ids[2]);
    assert_eq!(engine.selection().len(), 1);
    assert!(log.drain().contains(&EngineEvent::SelectionChanged {
        items: vec![ids[0]],
        group: None,
    }));

    assert_eq!(engine.remove_selected(), 1);
    assert_eq!(names(&engine), ["b"]);
    assert!(engine.selection().is_empty());
}

// ============================================================================
// Pointer drags
// ============================================================================

#[test]
fn pointer_drag_moves_selection() {
    let (mut engine, log) = engine();
    flat(&mut engine, &["a", "b", "c", "d", "e"]);
    log.drain();

    // Rows are 30px: "b" spans 30..60.
    assert_eq!(engine.pointer(PointerEvent::down(10.0, 40.0)), None);
    assert_eq!(engine.selection().len(), 1);
    engine.pointer(PointerEvent::moved(10.0, 140.0));
    assert!(engine.state().drag().is_some_and(|d| d.is_armed()));
    assert_eq!(engine.sink().last_indicator(), Some(5));

    let result = engine.pointer(PointerEvent::up(10.0, 140.0));
    assert_eq!(result, Some(ReorderResult::Applied));
    assert_eq!(names(&engine), ["a", "c", "d", "e", "b"]);
    assert!(engine.state().drag().is_none());
    assert_eq!(engine.sink().last_indicator(), None);
}

#[test]
fn drop_in_place_fires_no_order_event() {
    let (mut engine, log) = engine();
    flat(&mut engine, &["a", "b", "c"]);
    engine.pointer(PointerEvent::down(10.0, 40.0));
    log.drain();
    let renders = engine.renders();

    engine.pointer(PointerEvent::moved(10.0, 50.0));
    let result = engine.pointer(PointerEvent::up(10.0, 50.0));
    assert_eq!(result, Some(ReorderResult::Unchanged));
    assert_eq!(names(&engine), ["a", "b", "c"]);
    assert_eq!(order_events(&log.drain()), 0);
    // The indicator is cleared by a redraw.
    assert!(engine.renders() > renders);
    assert_eq!(engine.sink().last_indicator(), None);
}

#[test]
fn press_below_threshold_is_a_click() {
    let (mut engine, _log) = engine();
    let ids = flat(&mut engine, &["a", "b", "c"]);
    engine.click(ids[0], Modifiers::NONE);
    engine.click(ids[1], Modifiers::CTRL);

    // Plain press on an already selected item narrows on release.
    engine.pointer(PointerEvent::down(10.0, 40.0));
    assert_eq!(engine.selection().len(), 2);
    engine.pointer(PointerEvent::moved(12.0, 42.0));
    assert_eq!(engine.pointer(PointerEvent::up(12.0, 42.0)), None);
    assert_eq!(engine.selection().len(), 1);
    assert!(engine.selection().is_selected(ids[1]));
}

#[test]
fn programmatic_click_resolves_without_release() {
    let (mut engine, _log) = engine();
    let ids = flat(&mut engine, &["a", "b", "c"]);
    assert!(engine.click(ids[0], Modifiers::NONE));
    let renders = engine.renders();

    // Clicking the only selected item deselects it at once.
    assert!(engine.click(ids[0], Modifiers::NONE));
    assert!(engine.selection().is_empty());
    assert!(!engine.selection().has_deferred());
    assert_eq!(engine.renders(), renders + 1);

    // Clicking one of several selected items narrows to it.
    engine.click(ids[0], Modifiers::NONE);
    engine.click(ids[2], Modifiers::CTRL);
    assert!(engine.click(ids[2], Modifiers::NONE));
    assert_eq!(engine.selection().len(), 1);
    assert!(engine.selection().is_selected(ids[2]));
    assert!(!engine.selection().has_deferred());
}

// ============================================================================
// Grouped view
// ============================================================================

fn grouped_engine() -> (Engine<RecordingSink>, EventLog, Vec<StableId>) {
    let (mut engine, log) = engine();
    let ids = engine.insert_batch(vec![
        status("t1", "Todo"),
        status("d1", "Doing"),
        status("t2", "Todo"),
        status("n1", "Done"),
    ]);
    engine.set_group_level(Some(0)).expect("status is groupable");
    (engine, log, ids)
}

#[test]
fn misaligned_order_blocks_reordering_until_aligned() {
    let (mut engine, log, ids) = grouped_engine();
    assert!(!engine.is_reorder_enabled());
    assert!(log.drain().contains(&EngineEvent::AlignmentChanged {
        aligned: false,
        offending: vec!["Todo".to_string()],
    }));

    assert_eq!(
        engine.move_items(&[ids[1]], 0),
        ReorderResult::rejected(RejectReason::Misaligned)
    );
    assert_eq!(
        engine.reorder_group("Done", 0),
        Ok(ReorderResult::rejected(RejectReason::Misaligned))
    );
    assert_eq!(names(&engine), ["t1", "d1", "t2", "n1"]);
    assert_eq!(order_events(&log.drain()), 0);

    assert_eq!(engine.align_to_groups(), ReorderResult::Applied);
    assert_eq!(names(&engine), ["t1", "t2", "d1", "n1"]);
    assert!(engine.is_reorder_enabled());
    let events = log.drain();
    assert_eq!(order_events(&events), 1);
    assert!(events.contains(&EngineEvent::AlignmentChanged {
        aligned: true,
        offending: Vec::new(),
    }));
    assert_eq!(engine.align_to_groups(), ReorderResult::Unchanged);
}

#[test]
fn item_moves_stay_inside_their_group() {
    let (mut engine, _log, ids) = grouped_engine();
    engine.align_to_groups();

    assert_eq!(
        engine.move_items(&[ids[0], ids[1]], 0),
        ReorderResult::rejected(RejectReason::SpansGroups)
    );
    // Past the end of the list clamps to the end of the "Todo" block.
    assert_eq!(engine.move_items(&[ids[0]], 4), ReorderResult::Applied);
    assert_eq!(names(&engine), ["t2", "t1", "d1", "n1"]);
    assert_eq!(engine.move_items(&[ids[3]], 0), ReorderResult::Unchanged);
}

#[test]
fn group_reorder_rewrites_labels_and_order() {
    let (mut engine, log, _ids) = grouped_engine();
    engine.align_to_groups();
    log.drain();

    assert_eq!(engine.reorder_group("Done", 0), Ok(ReorderResult::Applied));
    assert_eq!(
        engine.model().levels()[0].labels,
        ["Done", "Todo", "Doing"]
    );
    assert_eq!(names(&engine), ["n1", "t1", "t2", "d1"]);
    let labels: Vec<&str> = engine.groups().iter().map(|g| g.label.as_str()).collect();
    assert_eq!(labels, ["Done", "Todo", "Doing"]);
    assert_eq!(order_events(&log.drain()), 1);

    assert_eq!(
        engine.reorder_group("Done", 1),
        Ok(ReorderResult::rejected(RejectReason::NoOpPosition))
    );
    assert_eq!(
        engine.reorder_group("", 0),
        Ok(ReorderResult::rejected(RejectReason::ImmovableGroup(String::new())))
    );
}

#[test]
fn inserted_items_take_their_label_rank() {
    let (mut engine, _log, _ids) = grouped_engine();
    engine.align_to_groups();

    engine.insert(NewItem::new("n2", "").with_category(0, -1.0, "Done"), None);
    assert_eq!(sort_orders(&engine, "Done"), [2.0, 2.0]);
    assert!(engine.is_reorder_enabled());
    assert_eq!(group_labels(&engine), ["Todo", "Doing", "Done"]);

    // Group moves follow the model's label order, not stray sort orders.
    assert_eq!(engine.reorder_group("Todo", 3), Ok(ReorderResult::Applied));
    assert_eq!(engine.model().levels()[0].labels, ["Doing", "Done", "Todo"]);
    assert_eq!(group_labels(&engine), ["Doing", "Done", "Todo"]);
    assert_eq!(names(&engine), ["d1", "n1", "n2", "t1", "t2"]);
}

#[test]
fn category_edits_take_the_label_rank() {
    let (mut engine, _log, ids) = grouped_engine();
    engine.align_to_groups();
    let renders = engine.renders();

    // Same label, different sort order: nothing to change.
    assert!(!engine.set_category(ids[3], 0, CategoryAssignment::new(-1.0, "Done")));
    assert_eq!(engine.renders(), renders);
    assert_eq!(sort_orders(&engine, "Done"), [2.0]);

    assert!(engine.set_category(ids[2], 0, CategoryAssignment::new(9.0, "Doing")));
    assert_eq!(sort_orders(&engine, "Doing"), [1.0, 1.0]);
    assert_eq!(group_labels(&engine), ["Todo", "Doing", "Done"]);
    assert_eq!(engine.reorder_group("Done", 0), Ok(ReorderResult::Applied));
    assert_eq!(group_labels(&engine), ["Done", "Todo", "Doing"]);

    // Labels the model does not know keep the given order.
    assert!(engine.set_category(ids[3], 0, CategoryAssignment::new(5.0, "Later")));
    assert_eq!(sort_orders(&engine, "Later"), [5.0]);
}

#[test]
fn replacing_the_model_rewrites_sort_orders() {
    let (mut engine, _log, _ids) = grouped_engine();
    engine.align_to_groups();

    engine.set_model(CategoryModel::new(vec![
        CategoryLevel::new("Status").with_labels(["Done", "Todo", "Doing"]),
        CategoryLevel::new("Score").calculated(),
    ]));
    assert_eq!(sort_orders(&engine, "Done"), [0.0]);
    assert_eq!(sort_orders(&engine, "Todo"), [1.0, 1.0]);
    assert_eq!(sort_orders(&engine, "Doing"), [2.0]);
    assert_eq!(group_labels(&engine), ["Done", "Todo", "Doing"]);
}

#[test]
fn calculated_levels_cannot_group() {
    let (mut engine, _log) = engine();
    assert_eq!(
        engine.set_group_level(Some(1)),
        Err(EngineError::CalculatedLevel(1))
    );
    assert_eq!(engine.set_group_level(Some(7)), Err(EngineError::UnknownLevel(7)));
    assert_eq!(engine.state().group_level(), None);
    assert_eq!(
        engine.align_to_groups(),
        ReorderResult::rejected(RejectReason::NotGrouped)
    );
}

#[test]
fn collapsing_hides_members_and_repacks() {
    let (mut engine, _log, ids) = grouped_engine();
    engine.align_to_groups();
    let rows = engine.layout().len();

    assert!(engine.toggle_collapsed("Todo"));
    assert_eq!(engine.layout().len(), rows - 2);
    assert_eq!(engine.sink().last_mode(), Some(RenderMode::Full));
    assert!(!engine.toggle_collapsed("Todo"));

    engine.move_items(&[ids[0]], 2);
    assert_eq!(engine.sink().last_mode(), Some(RenderMode::Repack));
}

// ============================================================================
// Move to position
// ============================================================================

#[test]
fn move_to_position_clamps_and_validates() {
    let (mut engine, _log) = engine();
    let ids = flat(&mut engine, &["a", "b", "c", "d", "e"]);
    engine.click(ids[1], Modifiers::NONE);
    engine.click(ids[3], Modifiers::CTRL);

    assert_eq!(engine.move_to_position("1"), Ok(ReorderResult::Applied));
    assert_eq!(names(&engine), ["b", "d", "a", "c", "e"]);
    assert_eq!(engine.move_to_position("999"), Ok(ReorderResult::Applied));
    assert_eq!(names(&engine), ["a", "c", "e", "b", "d"]);
    assert_eq!(engine.move_to_position("-4"), Ok(ReorderResult::Applied));
    assert_eq!(names(&engine), ["b", "d", "a", "c", "e"]);

    assert_eq!(
        engine.move_to_position("top"),
        Err(EngineError::InvalidPosition("top".to_string()))
    );
    assert_eq!(names(&engine), ["b", "d", "a", "c", "e"]);
}

#[test]
fn move_to_position_is_relative_to_the_group() {
    let (mut engine, _log, ids) = grouped_engine();
    engine.align_to_groups();
    engine.click(ids[2], Modifiers::NONE);

    assert_eq!(engine.move_to_position("1"), Ok(ReorderResult::Applied));
    assert_eq!(names(&engine), ["t2", "t1", "d1", "n1"]);
    assert_eq!(engine.move_to_position("3"), Ok(ReorderResult::Applied));
    assert_eq!(names(&engine), ["t1", "t2", "d1", "n1"]);
}

#[test]
fn nudge_moves_one_step() {
    let (mut engine, _log) = engine();
    let ids = flat(&mut engine, &["a", "b", "c"]);
    engine.click(ids[0], Modifiers::NONE);

    assert_eq!(engine.nudge_selection(1), ReorderResult::Applied);
    assert_eq!(names(&engine), ["b", "a", "c"]);
    assert_eq!(engine.nudge_selection(5), ReorderResult::Applied);
    assert_eq!(names(&engine), ["b", "c", "a"]);
    assert_eq!(engine.nudge_selection(1), ReorderResult::Unchanged);
    assert_eq!(engine.nudge_selection(-9), ReorderResult::Applied);
    assert_eq!(names(&engine), ["a", "b", "c"]);
}

// ============================================================================
// Filtering, debouncing, virtualization
// ============================================================================

#[test]
fn search_is_debounced_until_tick() {
    let (mut engine, log) = engine();
    flat(&mut engine, &["apple", "banana", "cherry"]);
    log.drain();
    let t0 = Instant::now();

    engine.set_search("an", t0);
    engine.set_search("ban", t0 + Duration::from_millis(50));
    assert!(engine.state().has_pending());
    assert!(!engine.tick(t0 + Duration::from_millis(200)));
    assert_eq!(engine.visible().len(), 3);

    assert!(engine.tick(t0 + Duration::from_millis(350)));
    assert_eq!(engine.visible(), &[1]);
    assert_eq!(
        log.drain(),
        vec![EngineEvent::FilterChanged { visible: 1, total: 3 }]
    );
}

#[test]
fn filter_hides_without_reordering() {
    let (mut engine, log) = engine();
    engine.insert_batch(vec![
        status("t1", "Todo"),
        NewItem::new("loose", ""),
        status("n1", "Done"),
    ]);
    log.drain();

    engine.set_filter(FilterSpec::show_all().allow(0, "Done").with_uncategorized(true));
    assert_eq!(engine.visible(), &[1, 2]);
    assert_eq!(names(&engine), ["t1", "loose", "n1"]);
    let events = log.drain();
    assert_eq!(order_events(&events), 0);
    assert!(events.contains(&EngineEvent::FilterChanged { visible: 2, total: 3 }));
}

#[test]
fn large_flat_lists_virtualize() {
    let (mut engine, _log) = engine();
    engine.set_viewport_height(300.0);
    flat(&mut engine, &["x"; 100]);
    assert!(!engine.is_virtual());

    engine.insert(NewItem::new("y", ""), None);
    assert!(engine.is_virtual());
    assert_eq!(engine.window().range(), 0..16);
    assert!(matches!(
        engine.sink().last_mode(),
        Some(RenderMode::Virtual { .. })
    ));
    assert_eq!(engine.sink().placed.len(), 16);

    let t0 = Instant::now();
    engine.scroll_to(0.5, t0);
    assert!(engine.tick(t0 + Duration::from_millis(20)));
    let window = engine.window();
    assert!(window.start > 0);
    assert!(engine.sink().placed.len() <= window.len());

    // Grouping turns virtualization off.
    engine.set_group_level(Some(0)).expect("groupable");
    assert!(!engine.is_virtual());
    assert!(engine.sink().placed.is_empty());
}

#[test]
fn edge_drag_scrolls_window_and_targets_new_rows() {
    let (mut engine, _log) = engine();
    engine.set_viewport_height(300.0);
    let ids = flat(&mut engine, &["r"; 200]);
    assert!(engine.is_virtual());
    let first_end = engine.window().end;
    assert_eq!(first_end, 16);

    engine.pointer(PointerEvent::down(10.0, 15.0));
    engine.pointer(PointerEvent::moved(10.0, 295.0));
    assert!(engine.state().drag().is_some_and(|d| d.is_armed()));
    assert!(engine.state().scroll_fraction() > 0.0);

    // Hold the pointer in the bottom margin until the list stops scrolling.
    let now = Instant::now();
    let mut ticks = 0;
    while engine.tick(now) {
        ticks += 1;
        assert!(ticks < 2_000, "edge scroll never settled");
    }
    assert!(ticks > 0);

    let window = engine.window();
    assert!(window.start > 0);
    assert_eq!(window.end, 200);
    assert_eq!(
        engine.state().scroll_fraction(),
        max_scroll_fraction(200.0 * 30.0, 300.0)
    );
    let indicator = engine.sink().last_indicator().expect("drop indicator");
    assert!(indicator > first_end);
    assert_eq!(indicator, 200);

    let result = engine.pointer(PointerEvent::up(10.0, 295.0));
    assert_eq!(result, Some(ReorderResult::Applied));
    assert_eq!(engine.store().position(ids[0]), Some(199));
    assert!(!engine.tick(now));
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn loader_batches_land_in_one_commit_each_pump() {
    let (mut engine, log) = engine();
    let items: Vec<NewItem> = (0..10).map(|i| NewItem::new(format!("p{i}"), "")).collect();
    engine.load(VecSource::new(items, 4));

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut inserted = 0;
    while engine.is_loading() && Instant::now() < deadline {
        inserted += engine.pump_loader();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(inserted, 10);
    assert_eq!(engine.store().len(), 10);
    assert!(log.drain().contains(&EngineEvent::LoadProgress {
        current: 10,
        total: Some(10),
    }));
}

#[test]
fn cancelled_load_delivers_nothing() {
    let (mut engine, _log) = engine();
    engine.load(VecSource::new(vec![NewItem::new("late", "")], 1));
    engine.cancel_load();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(engine.pump_loader(), 0);
    assert!(engine.store().is_empty());
}
