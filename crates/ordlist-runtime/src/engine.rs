#![forbid(unsafe_code)]

//! The commit engine.
//!
//! [`Engine`] owns the item store, the category model, the selection, and all
//! interaction state, and is the only thing that mutates them. Every public
//! mutation runs as one *commit*:
//!
//! 1. apply the mutation to the store, selection, or state;
//! 2. rebuild every derived view (visible items, groups, alignment, group
//!    bounds, layout, visible window) once, stamped with the store version;
//! 3. notify observers of what changed;
//! 4. present exactly one frame to the render sink.
//!
//! A mutation that changes nothing skips the commit entirely: no events and
//! no render.
//!
//! # Grouped view
//!
//! With a grouping level active, item moves are confined to the moved items'
//! group and every reorder is refused while the order is not aligned with the
//! level. Only [`Engine::align_to_groups`] is permitted then.
//!
//! # Threading
//!
//! The engine is single-threaded and holds no locks. Background loading
//! goes through [`Loader`], whose messages are applied by
//! [`Engine::pump_loader`] on the engine's thread.

use std::collections::HashSet;
use std::time::Instant;

use ordlist_core::category::CategoryModel;
use ordlist_core::error::{EngineError, MoveOutcome, RejectReason, ReorderResult};
use ordlist_core::filter::{FilterSpec, VisibilityCache};
use ordlist_core::grouping::{
    self, AlignmentReport, Group, GroupBounds, build_groups, check_alignment, common_label,
};
use ordlist_core::id::StableId;
use ordlist_core::input::{Modifiers, PointerEvent, PointerKind};
use ordlist_core::item::{CategoryAssignment, Item, NewItem};
use ordlist_core::selection::Selection;
use ordlist_core::store::ItemStore;
use ordlist_view::coalescer::Debouncer;
use ordlist_view::drag::{
    DragKind, DragSession, GroupBlock, drop_index_flat, drop_index_groups, edge_scroll_speed,
};
use ordlist_view::layout::{Layout, Row};
use ordlist_view::virtualized::{
    SlotPool, VisibleWindow, max_scroll_fraction, scroll_by_pixels,
};

use crate::config::{ConfigError, EngineConfig};
use crate::events::{EngineObserver, RenderFrame, RenderMode, RenderSink};
use crate::loader::{ItemSource, LoadMessage, Loader};

/// Interaction state owned by the engine.
#[derive(Debug)]
pub struct EngineState {
    hover: Option<StableId>,
    drag: Option<DragSession>,
    collapsed: HashSet<String>,
    scroll_fraction: f64,
    viewport_height: f64,
    group_level: Option<usize>,
    filter: FilterSpec,
    pending_scroll: Debouncer<f64>,
    pending_search: Debouncer<String>,
    edge_speed: i32,
}

impl EngineState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            hover: None,
            drag: None,
            collapsed: HashSet::new(),
            scroll_fraction: 0.0,
            viewport_height: 0.0,
            group_level: None,
            filter: FilterSpec::show_all(),
            pending_scroll: Debouncer::new(config.scroll_debounce),
            pending_search: Debouncer::new(config.search_debounce),
            edge_speed: 0,
        }
    }

    #[must_use]
    pub fn hover(&self) -> Option<StableId> {
        self.hover
    }

    /// The pointer press or drag in progress.
    #[must_use]
    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    #[must_use]
    pub fn is_collapsed(&self, label: &str) -> bool {
        self.collapsed.contains(label)
    }

    #[must_use]
    pub fn scroll_fraction(&self) -> f64 {
        self.scroll_fraction
    }

    #[must_use]
    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    #[must_use]
    pub fn group_level(&self) -> Option<usize> {
        self.group_level
    }

    #[must_use]
    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// True while a debounced scroll or search is waiting for [`Engine::tick`].
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_scroll.is_pending() || self.pending_search.is_pending()
    }
}

/// Views derived from one store version.
#[derive(Debug, Default)]
struct Derived {
    version: u64,
    visible: Vec<usize>,
    groups: Vec<Group>,
    alignment: Option<AlignmentReport>,
    bounds: Option<GroupBounds>,
    layout: Layout,
    virtual_mode: bool,
    window: VisibleWindow,
    order: Vec<StableId>,
    selection: (Vec<StableId>, Option<String>),
    filter_fingerprint: u64,
}

/// Ordered, grouped, filtered, virtualized list engine.
pub struct Engine<S: RenderSink> {
    config: EngineConfig,
    store: ItemStore,
    model: CategoryModel,
    selection: Selection,
    state: EngineState,
    visibility: VisibilityCache,
    derived: Derived,
    slots: SlotPool<S::Handle>,
    sink: S,
    observers: Vec<Box<dyn EngineObserver>>,
    loader: Loader,
    renders: u64,
}

impl<S: RenderSink> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("version", &self.store.version())
            .field("items", &self.store.len())
            .field("visible", &self.derived.visible.len())
            .field("group_level", &self.state.group_level)
            .field("virtual", &self.derived.virtual_mode)
            .field("observers", &self.observers.len())
            .field("renders", &self.renders)
            .finish()
    }
}

impl<S: RenderSink> Engine<S> {
    /// Create an engine and present its first (empty) frame.
    ///
    /// # Errors
    ///
    /// Returns the first invalid configuration value.
    pub fn new(config: EngineConfig, model: CategoryModel, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut engine = Self {
            state: EngineState::new(&config),
            config,
            store: ItemStore::new(),
            model,
            selection: Selection::new(),
            visibility: VisibilityCache::new(),
            derived: Derived::default(),
            slots: SlotPool::new(),
            sink,
            observers: Vec::new(),
            loader: Loader::new(),
            renders: 0,
        };
        engine.commit("init");
        Ok(engine)
    }

    // -- Accessors ---------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    #[must_use]
    pub fn model(&self) -> &CategoryModel {
        &self.model
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.store.version()
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.derived.layout
    }

    /// Full-sequence indices of the visible items.
    #[must_use]
    pub fn visible(&self) -> &[usize] {
        &self.derived.visible
    }

    /// Groups of the visible items at the active level (empty when flat).
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.derived.groups
    }

    /// Alignment of the full order with the active level.
    #[must_use]
    pub fn alignment(&self) -> Option<&AlignmentReport> {
        self.derived.alignment.as_ref()
    }

    /// False while grouped and misaligned.
    #[must_use]
    pub fn is_reorder_enabled(&self) -> bool {
        self.derived.alignment.as_ref().is_none_or(|r| r.aligned)
    }

    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.derived.virtual_mode
    }

    #[must_use]
    pub fn window(&self) -> VisibleWindow {
        self.derived.window
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Frames presented so far.
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn add_observer(&mut self, observer: impl EngineObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    // -- Store mutations ---------------------------------------------------

    pub fn insert(&mut self, item: NewItem, index: Option<usize>) -> StableId {
        let id = self.store.insert(item, index);
        self.sync_sort_orders();
        self.commit("insert");
        id
    }

    pub fn insert_batch(&mut self, items: Vec<NewItem>) -> Vec<StableId> {
        let ids = self.store.insert_batch(items);
        if !ids.is_empty() {
            self.sync_sort_orders();
            self.commit("insert_batch");
        }
        ids
    }

    /// Remove an item; it also leaves the selection.
    pub fn remove(&mut self, id: StableId) -> Option<Item> {
        let item = self.store.remove(id)?;
        self.selection.remove(id);
        if self.state.hover == Some(id) {
            self.state.hover = None;
        }
        self.commit("remove");
        Some(item)
    }

    /// Remove every selected item in one commit. Returns the count removed.
    pub fn remove_selected(&mut self) -> usize {
        let ids = self.selection.selected_in_order(&self.store);
        let removed = ids
            .iter()
            .filter(|&&id| self.store.remove(id).is_some())
            .count();
        if removed > 0 {
            self.commit("remove_selected");
        }
        removed
    }

    /// Category editor entry point. Returns false if nothing changed.
    ///
    /// A label known to an editable level always takes that label's rank as
    /// its sort order; the given one is ignored.
    pub fn set_category(&mut self, id: StableId, level: usize, mut assignment: CategoryAssignment) -> bool {
        if self.model.groupable(level).is_ok()
            && let Some(rank) = self.model.rank_of(level, &assignment.label)
        {
            assignment.sort_order = rank;
        }
        let changed = self.store.set_category(id, level, assignment);
        if changed {
            self.commit("set_category");
        }
        changed
    }

    /// Replace the category model.
    ///
    /// Grouping is switched off when the active level is no longer groupable.
    pub fn set_model(&mut self, model: CategoryModel) {
        self.model = model;
        if let Some(level) = self.state.group_level
            && self.model.groupable(level).is_err()
        {
            tracing::debug!(level, "grouping level dropped with category model");
            self.state.group_level = None;
            self.store.set_group_level(None);
        }
        self.sync_sort_orders();
        self.commit("set_model");
    }

    /// Move a label within its level's label list and rewrite item sort orders.
    ///
    /// # Errors
    ///
    /// Fails for unknown or calculated levels and unknown labels.
    pub fn move_label(&mut self, level: usize, label: &str, to: usize) -> Result<bool, EngineError> {
        if !self.model.move_label(level, label, to)? {
            return Ok(false);
        }
        grouping::recalculate_label_sort_orders(&mut self.store, &self.model, level);
        self.commit("move_label");
        Ok(true)
    }

    // -- Grouping ----------------------------------------------------------

    /// Switch grouped view on (`Some(level)`) or off.
    ///
    /// # Errors
    ///
    /// Fails for unknown and calculated levels; grouping is unchanged then.
    pub fn set_group_level(&mut self, level: Option<usize>) -> Result<(), EngineError> {
        if let Some(index) = level {
            self.model.groupable(index)?;
        }
        if self.state.group_level == level {
            return Ok(());
        }
        self.state.group_level = level;
        self.state.drag = None;
        self.store.set_group_level(level);
        self.commit("group_level");
        Ok(())
    }

    /// Collapse or expand a group. Returns the new collapsed state.
    pub fn toggle_collapsed(&mut self, label: &str) -> bool {
        let collapsed = if self.state.collapsed.remove(label) {
            false
        } else {
            self.state.collapsed.insert(label.to_string());
            true
        };
        self.commit("collapse");
        collapsed
    }

    /// Repair the alignment of the order with the active level.
    pub fn align_to_groups(&mut self) -> ReorderResult {
        let Some(level) = self.state.group_level else {
            return ReorderResult::rejected(RejectReason::NotGrouped);
        };
        let outcome = grouping::align_to_groups(&mut self.store, level);
        if outcome.is_moved() {
            self.commit("align");
        }
        outcome.into()
    }

    /// Move a displayed group to gap `new_index` among the movable displayed groups.
    ///
    /// # Errors
    ///
    /// Fails when a label involved is unknown to the category model.
    pub fn reorder_group(&mut self, label: &str, new_index: usize) -> Result<ReorderResult, EngineError> {
        let Some(level) = self.state.group_level else {
            return Ok(ReorderResult::rejected(RejectReason::NotGrouped));
        };
        self.ensure_fresh();
        let result = grouping::reorder_group(
            &mut self.store,
            &mut self.model,
            level,
            &self.derived.groups,
            label,
            new_index,
        )?;
        if result.is_applied() {
            self.commit("reorder_group");
        }
        Ok(result)
    }

    // -- Item reordering ---------------------------------------------------

    /// Move `ids` as one block to gap `gap` of the full sequence.
    ///
    /// In grouped view the gap is clamped into the items' group, and the move
    /// is refused when the order is misaligned or the items span groups.
    pub fn move_items(&mut self, ids: &[StableId], gap: usize) -> ReorderResult {
        let ids: Vec<StableId> = ids.iter().copied().filter(|id| self.store.contains(*id)).collect();
        if ids.is_empty() {
            return ReorderResult::Unchanged;
        }
        let gap = match self.move_bounds(&ids) {
            Err(reason) => return refuse(reason),
            Ok(Some((start, end))) => gap.clamp(start, end),
            Ok(None) => gap,
        };
        self.apply_move(&ids, gap)
    }

    /// Move the selection so its block starts at a user-entered 1-based position.
    ///
    /// The position counts the whole list, or the selection's group in grouped
    /// view, and is clamped into range.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidPosition`] for non-numeric input; nothing is mutated.
    pub fn move_to_position(&mut self, input: &str) -> Result<ReorderResult, EngineError> {
        let requested = parse_position(input)?;
        let ids = self.selection.selected_in_order(&self.store);
        if ids.is_empty() {
            return Ok(ReorderResult::Unchanged);
        }
        let (lo, hi) = match self.move_bounds(&ids) {
            Err(reason) => return Ok(refuse(reason)),
            Ok(bounds) => bounds.unwrap_or((0, self.store.len())),
        };
        let count = hi - lo;
        let position = usize::try_from(requested.clamp(1, count as i64)).unwrap_or(1);
        let preceding = (position - 1).min(count - ids.len());
        let selected: HashSet<StableId> = ids.iter().copied().collect();
        let gap = gap_after_unselected(self.store.all(), &selected, lo, hi, preceding);
        Ok(self.apply_move(&ids, gap))
    }

    /// Move the selected block by `delta` positions (keyboard reorder).
    pub fn nudge_selection(&mut self, delta: isize) -> ReorderResult {
        let ids = self.selection.selected_in_order(&self.store);
        if ids.is_empty() || delta == 0 {
            return ReorderResult::Unchanged;
        }
        let (lo, hi) = match self.move_bounds(&ids) {
            Err(reason) => return refuse(reason),
            Ok(bounds) => bounds.unwrap_or((0, self.store.len())),
        };
        let selected: HashSet<StableId> = ids.iter().copied().collect();
        let items = self.store.all();
        let first = self.store.position(ids[0]).unwrap_or(lo);
        let before = items[lo..first]
            .iter()
            .filter(|item| !selected.contains(&item.id()))
            .count();
        let unselected = (hi - lo) - ids.len();
        let target = before.saturating_add_signed(delta).min(unselected);
        let gap = gap_after_unselected(items, &selected, lo, hi, target);
        self.apply_move(&ids, gap)
    }

    fn apply_move(&mut self, ids: &[StableId], gap: usize) -> ReorderResult {
        let outcome = self.store.move_range(ids, gap);
        if outcome == MoveOutcome::Moved {
            self.commit("move");
        }
        outcome.into()
    }

    /// Block bounds an item move must stay within, or why it is refused.
    fn move_bounds(&mut self, ids: &[StableId]) -> Result<Option<(usize, usize)>, RejectReason> {
        let Some(level) = self.state.group_level else {
            return Ok(None);
        };
        self.ensure_fresh();
        if !self.is_reorder_enabled() {
            return Err(RejectReason::Misaligned);
        }
        let label = common_label(&self.store, ids, level).ok_or(RejectReason::SpansGroups)?;
        Ok(self
            .derived
            .bounds
            .as_ref()
            .and_then(|bounds| bounds.for_label(label)))
    }

    // -- Selection ---------------------------------------------------------

    /// Programmatic click on an item. Returns true if the selection changed.
    ///
    /// There is no release to wait for, so a plain click on an already
    /// selected item resolves at once: it narrows the selection to that item,
    /// or deselects it when it was the only one.
    pub fn click(&mut self, id: StableId, modifiers: Modifiers) -> bool {
        let mut changed = self.selection.click(&self.store, id, modifiers);
        if self.selection.has_deferred() {
            changed |= self.selection.release_without_drag();
        }
        if changed {
            self.commit("select");
        }
        changed
    }

    pub fn select_group(&mut self, label: &str) -> bool {
        let changed = self.selection.select_group(label);
        if changed {
            self.commit("select");
        }
        changed
    }

    pub fn select_all_visible(&mut self) -> bool {
        let items = self.store.all();
        let ids: Vec<StableId> = self.derived.visible.iter().map(|&i| items[i].id()).collect();
        let changed = self.selection.select_all(ids);
        if changed {
            self.commit("select");
        }
        changed
    }

    pub fn clear_selection(&mut self) -> bool {
        let changed = self.selection.clear();
        if changed {
            self.commit("select");
        }
        changed
    }

    // -- Filtering, scrolling, time ----------------------------------------

    /// Replace the filter immediately. A pending search is discarded.
    pub fn set_filter(&mut self, spec: FilterSpec) {
        self.state.pending_search.cancel();
        if self.state.filter == spec {
            return;
        }
        self.state.filter = spec;
        self.commit("filter");
    }

    /// Queue a search term; applied by [`Engine::tick`] once typing pauses.
    pub fn set_search(&mut self, text: &str, now: Instant) {
        self.state.pending_search.push(text.to_string(), now);
    }

    /// Queue a scroll position; applied by [`Engine::tick`] on the next frame.
    pub fn scroll_to(&mut self, fraction: f64, now: Instant) {
        self.state.pending_scroll.push(fraction, now);
    }

    pub fn set_viewport_height(&mut self, px: f64) {
        let px = px.max(0.0);
        if self.state.viewport_height.to_bits() == px.to_bits() {
            return;
        }
        self.state.viewport_height = px;
        self.clamp_scroll();
        self.redraw();
    }

    /// Apply due debounced input and continue edge auto-scroll.
    ///
    /// Returns true if anything was applied.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut applied = false;
        if let Some(term) = self.state.pending_search.poll(now) {
            self.apply_search(&term);
            applied = true;
        }
        if let Some(fraction) = self.state.pending_scroll.poll(now) {
            self.apply_scroll(fraction);
            applied = true;
        }
        if self.state.edge_speed != 0 && self.state.drag.as_ref().is_some_and(DragSession::is_armed) {
            applied |= self.auto_scroll();
        }
        applied
    }

    /// Apply all debounced input now, regardless of timing.
    pub fn flush_pending(&mut self) -> bool {
        let mut applied = false;
        if let Some(term) = self.state.pending_search.flush() {
            self.apply_search(&term);
            applied = true;
        }
        if let Some(fraction) = self.state.pending_scroll.flush() {
            self.apply_scroll(fraction);
            applied = true;
        }
        applied
    }

    fn apply_search(&mut self, term: &str) {
        let spec = self.state.filter.clone().with_search(term);
        if spec != self.state.filter {
            self.state.filter = spec;
            self.commit("search");
        }
    }

    fn apply_scroll(&mut self, fraction: f64) {
        self.state.scroll_fraction = if fraction.is_nan() { 0.0 } else { fraction };
        self.clamp_scroll();
        self.redraw();
    }

    fn content_height(&self) -> f64 {
        self.derived.layout.total_height(self.config.metrics())
    }

    fn clamp_scroll(&mut self) {
        let max = max_scroll_fraction(self.content_height(), self.state.viewport_height);
        self.state.scroll_fraction = self.state.scroll_fraction.clamp(0.0, max);
    }

    fn scroll_top(&self) -> f64 {
        self.state.scroll_fraction * self.content_height()
    }

    /// Scroll by the current edge speed. Returns true if the view moved.
    fn auto_scroll(&mut self) -> bool {
        let before = self.state.scroll_fraction;
        self.state.scroll_fraction = scroll_by_pixels(
            before,
            f64::from(self.state.edge_speed),
            self.content_height(),
            self.state.viewport_height,
        );
        if self.state.scroll_fraction.to_bits() == before.to_bits() {
            return false;
        }
        // Newly exposed rows must become drop targets before the next move.
        self.recompute_window();
        if let Some(mut session) = self.state.drag.take() {
            session.drop_index = self.drop_target(&session, session.current.y);
            self.state.drag = Some(session);
        }
        self.redraw();
        true
    }

    // -- Pointer input -----------------------------------------------------

    /// Feed one pointer event in viewport coordinates.
    ///
    /// Returns the drop result when an `Up` ends an armed drag.
    pub fn pointer(&mut self, event: PointerEvent) -> Option<ReorderResult> {
        match event.kind {
            PointerKind::Down => {
                self.pointer_down(event);
                None
            }
            PointerKind::Move => {
                self.pointer_move(event);
                None
            }
            PointerKind::Up => self.pointer_up(event),
        }
    }

    fn row_under(&self, y: f64) -> Option<&Row> {
        let row = self
            .derived
            .layout
            .row_at(y + self.scroll_top(), self.config.metrics())?;
        self.derived.layout.rows().get(row)
    }

    fn pointer_down(&mut self, event: PointerEvent) {
        self.state.drag = None;
        self.state.edge_speed = 0;
        let Some(row) = self.row_under(event.y).cloned() else {
            return;
        };
        let changed = match row {
            Row::Header { label, .. } => {
                let changed = self.selection.select_group(label.as_str());
                if self.state.group_level.is_some() && !label.is_empty() {
                    self.state.drag = Some(DragSession::new(DragKind::Group(label), event));
                }
                changed
            }
            Row::Item { id, .. } => {
                let changed = self.selection.click(&self.store, id, event.modifiers);
                if self.selection.is_selected(id) {
                    let ids = self.selection.selected_in_order(&self.store);
                    self.state.drag = Some(DragSession::new(DragKind::Items(ids), event));
                }
                changed
            }
        };
        if changed {
            self.commit("select");
        }
    }

    fn pointer_move(&mut self, event: PointerEvent) {
        let hover = self.row_under(event.y).and_then(Row::item_id);
        let mut dirty = hover != self.state.hover;
        self.state.hover = hover;

        if let Some(mut session) = self.state.drag.take() {
            if session.update(event, &self.config.drag()) {
                self.selection.cancel_deferred();
                tracing::trace!(kind = ?session.kind, "drag armed");
            }
            if session.is_armed() {
                self.state.edge_speed =
                    edge_scroll_speed(event.y, self.state.viewport_height, &self.config.drag());
                session.drop_index = self.drop_target(&session, event.y);
                dirty = true;
            }
            self.state.drag = Some(session);
            if self.state.edge_speed != 0 && self.auto_scroll() {
                return;
            }
        }
        if dirty {
            self.redraw();
        }
    }

    fn pointer_up(&mut self, event: PointerEvent) -> Option<ReorderResult> {
        self.state.edge_speed = 0;
        let session = self.state.drag.take()?;
        if !session.is_armed() {
            if self.selection.release_without_drag() {
                self.commit("select");
            }
            return None;
        }
        let result = match self.drop_target(&session, event.y) {
            None => ReorderResult::Unchanged,
            Some(gap) => match session.kind {
                DragKind::Items(ids) => self.move_items(&ids, gap),
                DragKind::Group(label) => self.reorder_group(&label, gap).unwrap_or_else(|err| {
                    tracing::warn!(%err, label = %label, "group drop failed");
                    ReorderResult::rejected(RejectReason::ImmovableGroup(label.clone()))
                }),
            },
        };
        if !result.is_applied() {
            // No commit happened; clear the drop indicator.
            self.redraw();
        }
        Some(result)
    }

    /// The drop gap under viewport `y` for `session`.
    fn drop_target(&self, session: &DragSession, y: f64) -> Option<usize> {
        let y = y + self.scroll_top();
        let metrics = self.config.metrics();
        let layout = &self.derived.layout;
        match &session.kind {
            DragKind::Items(ids) => {
                let window = self.derived.virtual_mode.then_some(self.derived.window);
                let gap = drop_index_flat(&layout.item_slots(metrics, window), y)?;
                let clamped = self
                    .state
                    .group_level
                    .zip(self.derived.bounds.as_ref())
                    .and_then(|(level, bounds)| {
                        common_label(&self.store, ids, level).map(|label| bounds.clamp_gap(label, gap))
                    });
                Some(clamped.unwrap_or(gap))
            }
            DragKind::Group(_) => {
                let blocks: Vec<GroupBlock> = layout
                    .group_blocks(metrics)
                    .into_iter()
                    .filter(|block| !block.label.is_empty())
                    .collect();
                drop_index_groups(&blocks, y)
            }
        }
    }

    // -- Loading -----------------------------------------------------------

    /// Start loading items in the background, superseding any running load.
    pub fn load<Src: ItemSource>(&mut self, source: Src) -> u64 {
        self.loader.start(source)
    }

    pub fn cancel_load(&mut self) {
        self.loader.cancel();
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loader.is_active()
    }

    /// Apply everything the loader delivered since the last call, in one commit.
    ///
    /// Returns the number of items inserted.
    pub fn pump_loader(&mut self) -> usize {
        let messages = self.loader.drain();
        if messages.is_empty() {
            return 0;
        }
        let mut inserted = 0;
        let mut progress = Vec::new();
        for message in messages {
            match message {
                LoadMessage::Batch(items) => inserted += self.store.insert_batch(items).len(),
                LoadMessage::Progress { current, total } => progress.push((current, total)),
                LoadMessage::Finished { loaded } => tracing::debug!(loaded, "item load finished"),
                LoadMessage::Failed(err) => tracing::warn!(%err, "item load failed"),
            }
        }
        if inserted > 0 {
            self.sync_sort_orders();
            self.commit("load");
        }
        for (current, total) in progress {
            for observer in &mut self.observers {
                observer.on_load_progress(current, total);
            }
        }
        inserted
    }

    // -- Commit ------------------------------------------------------------

    /// Rewrite sort orders at every editable level from the model's label ranks.
    ///
    /// Items sharing a label then share a sort order. Labels the model does
    /// not know keep theirs.
    fn sync_sort_orders(&mut self) {
        for (level, def) in self.model.levels().iter().enumerate() {
            if !def.is_calculated {
                grouping::recalculate_label_sort_orders(&mut self.store, &self.model, level);
            }
        }
    }

    /// Rebuild derived views if the store moved on without a commit.
    fn ensure_fresh(&mut self) {
        if self.derived.version != self.store.version() {
            tracing::debug!(
                stale = self.derived.version,
                current = self.store.version(),
                "discarding stale derived views"
            );
            self.commit("resync");
        }
    }

    fn commit(&mut self, reason: &'static str) {
        let span = tracing::debug_span!("commit", reason, version = self.store.version());
        let _enter = span.enter();

        self.selection.retain_existing(&self.store);
        if self.state.hover.is_some_and(|id| !self.store.contains(id)) {
            self.state.hover = None;
        }
        let previous = self.rebuild();
        self.notify(&previous);
        let content_changed = previous.layout != self.derived.layout;
        let repack = self.derived.layout.is_repack_of(&previous.layout);
        self.present(repack, content_changed);
    }

    /// Recompute every derived view, returning the previous set.
    fn rebuild(&mut self) -> Derived {
        let visible = self.visibility.visible(&self.store, &self.state.filter).to_vec();
        let items = self.store.all();
        let (groups, alignment, bounds, layout) = match self.state.group_level {
            Some(level) => {
                let groups = build_groups(items, &visible, level);
                let layout = Layout::grouped(&self.store, &groups, &self.state.collapsed);
                (
                    groups,
                    Some(check_alignment(items, level)),
                    Some(GroupBounds::compute(items, level)),
                    layout,
                )
            }
            None => (Vec::new(), None, None, Layout::flat(&self.store, &visible)),
        };
        let virtual_mode = self
            .config
            .window()
            .should_virtualize(layout.len(), self.state.group_level.is_some());
        let next = Derived {
            version: self.store.version(),
            visible,
            groups,
            alignment,
            bounds,
            layout,
            virtual_mode,
            window: VisibleWindow::EMPTY,
            order: self.store.ids(),
            selection: self.selection.snapshot(),
            filter_fingerprint: self.state.filter.fingerprint(),
        };
        let previous = std::mem::replace(&mut self.derived, next);
        self.clamp_scroll();
        self.recompute_window();
        previous
    }

    fn recompute_window(&mut self) {
        let rows = self.derived.layout.len();
        self.derived.window = if self.derived.virtual_mode {
            self.config
                .window()
                .window(self.state.scroll_fraction, rows, self.state.viewport_height)
        } else {
            VisibleWindow::full(rows)
        };
    }

    fn notify(&mut self, previous: &Derived) {
        let current = &self.derived;
        if current.order != previous.order {
            tracing::debug!(version = current.version, "order changed");
            for observer in &mut self.observers {
                observer.on_order_changed(&current.order);
            }
        }
        if current.selection != previous.selection {
            let (items, group) = &current.selection;
            for observer in &mut self.observers {
                observer.on_selection_changed(items, group.as_deref());
            }
        }
        let total = self.store.len();
        if current.visible.len() != previous.visible.len()
            || current.order.len() != previous.order.len()
            || current.filter_fingerprint != previous.filter_fingerprint
        {
            for observer in &mut self.observers {
                observer.on_filter_changed(current.visible.len(), total);
            }
        }
        if let Some(report) = &current.alignment
            && previous.alignment.as_ref().map(|r| r.aligned) != Some(report.aligned)
        {
            if !report.aligned {
                tracing::info!(
                    offending = ?report.offending_labels,
                    "order is not aligned with grouping; reordering disabled"
                );
            }
            for observer in &mut self.observers {
                observer.on_alignment_changed(report.aligned, report);
            }
        }
    }

    /// Present the current state without rebuilding or notifying.
    fn redraw(&mut self) {
        self.recompute_window();
        self.present(true, false);
    }

    fn present(&mut self, repack: bool, content_changed: bool) {
        let row_height = self.config.row_height;
        let mode = if self.derived.virtual_mode {
            let changes = self.slots.sync(self.derived.window, row_height, &mut self.sink);
            if content_changed {
                self.slots.rebind_all(row_height, &mut self.sink);
            }
            RenderMode::Virtual {
                window: self.derived.window,
                changes,
            }
        } else {
            if self.slots.active_len() > 0 {
                self.slots.release_all(&mut self.sink);
            }
            if repack && self.derived.layout.is_grouped() {
                RenderMode::Repack
            } else {
                RenderMode::Full
            }
        };
        let frame = RenderFrame {
            version: self.derived.version,
            mode,
            layout: &self.derived.layout,
            selection: &self.selection,
            hover: self.state.hover,
            drop_indicator: self
                .state
                .drag
                .as_ref()
                .filter(|session| session.is_armed())
                .and_then(|session| session.drop_index),
            reorder_enabled: self.derived.alignment.as_ref().is_none_or(|r| r.aligned),
            scroll_top: self.state.scroll_fraction * self.derived.layout.total_height(self.config.metrics()),
        };
        self.sink.present(&frame);
        self.renders += 1;
        tracing::trace!(renders = self.renders, mode = ?frame.mode, "frame presented");
    }
}

fn refuse(reason: RejectReason) -> ReorderResult {
    tracing::warn!(%reason, "reorder refused");
    ReorderResult::rejected(reason)
}

/// Parse a user-entered position. Out-of-range numbers saturate.
fn parse_position(input: &str) -> Result<i64, EngineError> {
    let trimmed = input.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(if negative { i64::MIN } else { i64::MAX });
    }
    Err(EngineError::InvalidPosition(input.to_string()))
}

/// The full-sequence gap in `[lo, hi]` preceded by `count` unselected items of that range.
fn gap_after_unselected(
    items: &[Item],
    selected: &HashSet<StableId>,
    lo: usize,
    hi: usize,
    count: usize,
) -> usize {
    if count == 0 {
        return lo;
    }
    let mut seen = 0;
    for (offset, item) in items[lo..hi].iter().enumerate() {
        if !selected.contains(&item.id()) {
            seen += 1;
            if seen == count {
                return lo + offset + 1;
            }
        }
    }
    hi
}
