//! The only code that changes the structure of a [`DockModel`].
//!
//! Every public operation either succeeds and emits exactly one [`DockEvent`] describing
//! what happened (or none, when the operation turned out to be a no-op), or fails with a
//! [`DockError`] before touching anything.

pub mod error;
pub mod events;
pub mod host;

use tracing::{debug, info, instrument, trace};

pub use self::error::{DockError, DockResult, ErrorCategory, Lifecycle, Violation};
pub use self::events::{DockEvent, EventBus, Subject, SubscriptionId};
pub use self::host::{DocumentFactory, HeadlessHost, LifecycleObserver, WindowHost};
use crate::common::config::Config;
use crate::common::geometry::Rect;
use crate::layout_engine::proportional::{self, Slot, SlotKind};
use crate::layout_engine::{self, Edge, Layout};
use crate::model::{
    Capabilities, DockKind, DockModel, DockWindow, Dockable, NodeId, TrackingState, WindowId,
    WindowOptions, WindowState,
};

pub struct Factory {
    model: DockModel,
    tracking: TrackingState,
    config: Config,
    events: EventBus,
    host: Box<dyn WindowHost>,
    lifecycle: Vec<Box<dyn LifecycleObserver>>,
    document_factory: Option<DocumentFactory>,
    next_id: u64,
}

static_assertions::assert_not_impl_any!(Factory: Send);

impl Factory {
    pub fn new(model: DockModel, config: Config) -> Self {
        Factory {
            model,
            tracking: TrackingState::default(),
            config,
            events: EventBus::default(),
            host: Box::new(HeadlessHost::default()),
            lifecycle: vec![],
            document_factory: None,
            next_id: 0,
        }
    }

    pub fn with_host(mut self, host: impl WindowHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn model(&self) -> &DockModel { &self.model }

    pub fn tracking(&self) -> &TrackingState { &self.tracking }

    pub fn config(&self) -> &Config { &self.config }

    pub fn events(&mut self) -> &mut EventBus { &mut self.events }

    /// Registers capability overrides; see [`DockModel::can`].
    pub fn set_override(&mut self, node: NodeId, over: crate::model::CapabilityOverride) {
        self.model.set_override(node, over);
    }

    pub fn add_lifecycle_observer(&mut self, observer: impl LifecycleObserver + 'static) {
        self.lifecycle.push(Box::new(observer));
    }

    pub fn set_document_factory(
        &mut self,
        factory: impl FnMut(&DockModel, NodeId) -> Option<Dockable> + 'static,
    ) {
        self.document_factory = Some(Box::new(factory));
    }

    /// Adds a dockable to the forest, unattached, ready for [`Factory::add_dockable`].
    pub fn create_dockable(&mut self, dockable: Dockable) -> NodeId { self.new_node(dockable) }

    // ---- membership -------------------------------------------------------------------

    /// Creates `dockable` and adds it to `dock`.
    pub fn add(&mut self, dock: NodeId, dockable: Dockable, index: Option<usize>) -> DockResult<NodeId> {
        self.get(dock)?;
        let node = self.new_node(dockable);
        match self.add_dockable(dock, node, index) {
            Ok(()) => Ok(node),
            Err(err) => {
                node.detach(&mut self.model.tree).remove();
                Err(err)
            }
        }
    }

    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn add_dockable(&mut self, dock: NodeId, dockable: NodeId, index: Option<usize>) -> DockResult<()> {
        self.ensure_container(dock)?;
        self.get(dockable)?;
        let map = self.model.map();
        if dockable.parent(map) == Some(dock) {
            return Err(Violation::AlreadyMember(dockable, dock).into());
        }
        if dockable.parent(map).is_some() || self.model.is_parked(dockable) || self.model.is_root(dockable) {
            return Err(Violation::AlreadyOwned(dockable).into());
        }
        if dockable == dock || self.model.is_descendant_of(dock, dockable) {
            return Err(Violation::IntoDescendant(dockable, dock).into());
        }

        self.attach(dockable, dock, index);
        self.expand(dock);
        self.rebalance_insert(dock, dockable);
        self.rebalance_owner(dock);
        let index = self.index_of(dockable);
        self.emit(DockEvent::DockableAdded { dockable, owner: dock, index });
        Ok(())
    }

    /// Removes `dockable` (and everything below it) from the layout, pruning docks that
    /// end up empty.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn remove_dockable(&mut self, dockable: NodeId) -> DockResult<()> {
        self.check_removable(dockable)?;
        let (id, owner, index) = self.take_out(dockable);
        self.emit(DockEvent::DockableRemoved { dockable, id, owner, index });
        Ok(())
    }

    /// Removal with a chance for lifecycle observers to veto.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn close_dockable(&mut self, dockable: NodeId) -> DockResult<()> {
        self.ensure_can(dockable, Capabilities::CLOSE)?;
        self.check_removable(dockable)?;
        let model = &self.model;
        if !self.lifecycle.iter_mut().all(|o| o.dockable_closing(model, dockable)) {
            return Err(DockError::Vetoed(Lifecycle::CloseDockable(dockable)));
        }
        let (id, owner, index) = self.take_out(dockable);
        info!(%id, "closed dockable");
        self.emit(DockEvent::DockableClosed { dockable, id, owner, index });
        Ok(())
    }

    /// Closes every member of the dockable's owner except the dockable itself.
    pub fn close_other_dockables(&mut self, dockable: NodeId) -> DockResult<usize> {
        let owner = self.owner(dockable)?;
        let others: Vec<_> = self.model.content_dockables(owner).filter(|&c| c != dockable).collect();
        Ok(self.close_each(others))
    }

    pub fn close_all_dockables(&mut self, dock: NodeId) -> DockResult<usize> {
        self.ensure_container(dock)?;
        let members: Vec<_> = self.model.content_dockables(dock).collect();
        Ok(self.close_each(members))
    }

    pub fn close_left_dockables(&mut self, dockable: NodeId) -> DockResult<usize> {
        let owner = self.owner(dockable)?;
        let left: Vec<_> = self.model.content_dockables(owner).take_while(|&c| c != dockable).collect();
        Ok(self.close_each(left))
    }

    pub fn close_right_dockables(&mut self, dockable: NodeId) -> DockResult<usize> {
        let owner = self.owner(dockable)?;
        let right: Vec<_> =
            self.model.content_dockables(owner).skip_while(|&c| c != dockable).skip(1).collect();
        Ok(self.close_each(right))
    }

    /// Moves `dockable` out of `source` and into `target` as one operation.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn move_dockable(
        &mut self,
        source: NodeId,
        target: NodeId,
        dockable: NodeId,
        index: Option<usize>,
    ) -> DockResult<()> {
        self.get(source)?;
        self.ensure_container(target)?;
        self.get(dockable)?;
        if dockable.parent(self.model.map()) != Some(source) {
            return Err(Violation::NotAMember(dockable, source).into());
        }
        if target == dockable || self.model.is_descendant_of(target, dockable) {
            return Err(Violation::IntoDescendant(dockable, target).into());
        }
        if self.model.is_splitter(dockable) {
            return Err(Violation::SplitterNotMovable(dockable).into());
        }
        let from_index = self.index_of(dockable);

        if source == target {
            let position = index.unwrap_or(usize::MAX);
            dockable.detach(&mut self.model.tree).insert_at(target, position);
            self.normalize_splitters(target);
            let index = self.index_of(dockable);
            if index == from_index {
                return Ok(());
            }
            self.emit(DockEvent::DockableMoved { dockable, from: source, from_index, to: target, index });
            return Ok(());
        }

        self.check_removable(dockable)?;
        let source_root = self.model.root_of(source);
        if let Some(d) = self.model.get_mut(dockable) {
            d.proportion = f64::NAN;
        }
        self.attach(dockable, target, index);
        self.model.tree.data.set_active(target, Some(dockable));
        self.expand(target);
        self.rebalance_insert(target, dockable);
        self.rebalance_owner(target);
        self.rebalance(source);
        self.prune(source);
        if let Some(root) = source_root {
            self.settle_focus(root);
        }
        let index = self.index_of(dockable);
        self.emit(DockEvent::DockableMoved { dockable, from: source, from_index, to: target, index });
        Ok(())
    }

    /// Exchanges the positions of two members of `dock`.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn swap_dockable(&mut self, dock: NodeId, a: NodeId, b: NodeId) -> DockResult<()> {
        self.get(dock)?;
        for node in [a, b] {
            self.get(node)?;
            if node.parent(self.model.map()) != Some(dock) {
                return Err(Violation::NotAMember(node, dock).into());
            }
            if self.model.is_splitter(node) {
                return Err(Violation::SplitterNotMovable(node).into());
            }
        }
        if a == b {
            return Ok(());
        }
        let (ia, ib) = (self.index_of(a), self.index_of(b));
        a.detach(&mut self.model.tree).insert_at(dock, ib);
        b.detach(&mut self.model.tree).insert_at(dock, ia);
        self.emit(DockEvent::DockableMoved { dockable: a, from: dock, from_index: ia, to: dock, index: ib });
        Ok(())
    }

    /// Splits `target` along `edge`: `target` and a new container holding `dockable` end up
    /// side by side in a new proportional dock that takes `target`'s place.
    ///
    /// Returns the container `dockable` now lives in.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn split_to_dock(&mut self, target: NodeId, dockable: NodeId, edge: Edge) -> DockResult<NodeId> {
        self.get(target)?;
        self.get(dockable)?;
        if self.model.is_root(target) {
            return Err(Violation::CannotSplitRoot.into());
        }
        let owner = self.owner(target)?;
        if dockable == target || self.model.is_descendant_of(target, dockable) {
            return Err(Violation::IntoDescendant(dockable, target).into());
        }
        if self.model.is_root(dockable) || self.model.is_splitter(dockable) {
            return Err(Violation::NotAContainer(dockable).into());
        }
        if self.model.is_parked(dockable) {
            return Err(Violation::AlreadyParked(dockable).into());
        }
        if self.model.is_descendant_of(dockable, target) && !self.has_leaves_besides(target, dockable) {
            return Err(Violation::SplitWouldEmptyTarget(target).into());
        }

        let source = dockable.parent(self.model.map());
        let source_root = source.and_then(|s| self.model.root_of(s));
        let from_index = self.index_of(dockable);
        let owner_active = self.model.get(owner).and_then(|o| o.active_dockable) == Some(target);
        let proportion = self.model.get(target).map_or(f64::NAN, |t| t.proportion);

        let id = self.fresh_id("split");
        let split = self.new_node(
            Dockable::proportional(id, edge.orientation()).with_proportion(proportion),
        );
        split.detach(&mut self.model.tree).insert_before(target);
        target.detach(&mut self.model.tree).push_back(split);

        let container = if self.model.is_leaf(dockable) {
            let wrapper = self.wrapper_for(dockable, edge);
            let wrapper = self.new_node(wrapper);
            wrapper.detach(&mut self.model.tree).push_back(split);
            dockable.detach(&mut self.model.tree).push_back(wrapper);
            wrapper
        } else {
            dockable.detach(&mut self.model.tree).push_back(split);
            dockable
        };
        if edge.is_leading() {
            container.detach(&mut self.model.tree).insert_at(split, 0);
        }
        self.normalize_splitters(split);
        for node in [target, container] {
            if let Some(d) = self.model.get_mut(node) {
                d.proportion = 0.5;
            }
        }
        self.model.tree.data.set_active(split, Some(container));
        if owner_active {
            self.model.tree.data.set_active(owner, Some(split));
        }
        if let Some(source) = source {
            self.rebalance(source);
            self.prune(source);
        }
        if let Some(root) = source_root {
            self.settle_focus(root);
        }

        let index = self.index_of(dockable);
        let to = self.owner(dockable)?;
        debug!(?split, ?container, %edge, "split");
        match source {
            Some(from) => self.emit(DockEvent::DockableMoved { dockable, from, from_index, to, index }),
            None => self.emit(DockEvent::DockableAdded { dockable, owner: to, index }),
        }
        Ok(container)
    }

    // ---- windows ----------------------------------------------------------------------

    /// Moves `dockable` into a new floating window with a fresh layout at `frame`.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn split_to_window(
        &mut self,
        dockable: NodeId,
        frame: Rect,
        options: Option<WindowOptions>,
    ) -> DockResult<WindowId> {
        self.open_window(dockable, frame, options)
    }

    /// Floats `dockable` where it was last shown (or at the configured default size). A dock
    /// keeps its own layout inside the window.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn float_dockable(&mut self, dockable: NodeId, options: Option<WindowOptions>) -> DockResult<WindowId> {
        let d = self.get(dockable)?;
        let defaults = &self.config.windows;
        let frame = d
            .bounds
            .filter(|b| !b.is_empty())
            .unwrap_or(Rect::new(0.0, 0.0, defaults.default_width, defaults.default_height));
        self.open_window(dockable, frame, options)
    }

    /// Puts a floating window's content back into `target` and releases the window.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn dock_window(&mut self, window: WindowId, target: NodeId, index: Option<usize>) -> DockResult<()> {
        let w = self.window(window)?;
        let (layout, owner_root) = (w.layout, w.owner_root);
        if !w.state.is_open() {
            return Err(Violation::InvalidTransition { from: w.state, to: WindowState::Closed }.into());
        }
        self.ensure_container(target)?;
        let target_root = self.model.root_of(target).ok_or(Violation::Detached(target))?;
        if target_root == layout {
            return Err(Violation::IntoDescendant(layout, target).into());
        }

        let tabbed = self.model.get(target).is_some_and(|t| t.kind.is_tabbed());
        let movers: Vec<NodeId> = if tabbed {
            layout.traverse_preorder(self.model.map()).filter(|&n| self.model.is_leaf(n)).collect()
        } else {
            self.model.content_dockables(layout).collect()
        };
        for (k, &node) in movers.iter().enumerate() {
            if let Some(d) = self.model.get_mut(node) {
                d.proportion = f64::NAN;
            }
            self.attach(node, target, index.map(|i| i + k));
            self.rebalance_insert(target, node);
        }
        if let Some(&first) = movers.first() {
            self.model.tree.data.set_active(target, Some(first));
        }
        self.expand(target);
        self.adopt_parked(layout, target_root, target);
        self.release_window(window);
        self.emit(DockEvent::WindowRemoved { window, root: owner_root });
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn present_window(&mut self, window: WindowId) -> DockResult<()> {
        self.transition(window, WindowState::Presented)?;
        let w = self.window(window)?;
        if let Some(handle) = w.host {
            let is_dialog = w.options.is_modal;
            self.host.present(handle, is_dialog);
        }
        self.emit(DockEvent::WindowOpened { window });
        Ok(())
    }

    /// Host told us the window got activation. Other active windows become inactive.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn activate_window(&mut self, window: WindowId) -> DockResult<()> {
        if self.window(window)?.state == WindowState::Active {
            return Ok(());
        }
        self.transition(window, WindowState::Active)?;
        for (id, w) in self.model.windows.iter_mut() {
            if id != window && w.state == WindowState::Active {
                w.state = WindowState::Inactive;
            }
        }
        let w = self.window(window)?;
        let (layout, host) = (w.layout, w.host);
        let dockable = self.active_leaf(layout);
        if self.tracking.track_root(layout, dockable, Some(window), host) {
            self.events.emit_tracking(&self.tracking);
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn deactivate_window(&mut self, window: WindowId) -> DockResult<()> {
        if self.window(window)?.state == WindowState::Inactive {
            return Ok(());
        }
        self.transition(window, WindowState::Inactive)?;
        if self.tracking.clear_window(window) {
            self.events.emit_tracking(&self.tracking);
        }
        Ok(())
    }

    /// Closes a floating window after every lifecycle observer agreed. Its layout and
    /// everything in it is released.
    ///
    /// A committed close reports both steps of the window's lifecycle: `WindowClosing` then
    /// `WindowClosed`.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn close_window(&mut self, window: WindowId) -> DockResult<()> {
        let state = self.window(window)?.state;
        if !state.can_transition_to(WindowState::Closing) {
            return Err(Violation::InvalidTransition { from: state, to: WindowState::Closing }.into());
        }
        let model = &self.model;
        if !self.lifecycle.iter_mut().all(|o| o.window_closing(model, window)) {
            return Err(DockError::Vetoed(Lifecycle::CloseWindow(window)));
        }
        self.transition(window, WindowState::Closing)?;
        self.emit(DockEvent::WindowClosing { window });
        self.release_window(window);
        info!(?window, "closed window");
        self.emit(DockEvent::WindowClosed { window });
        Ok(())
    }

    /// Makes `root` the tracked root, keeping its window and active dockable in step.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn activate_root(&mut self, root: NodeId) -> DockResult<()> {
        self.get(root)?;
        let Some(state) = self.model.root_state(root) else {
            return Err(Violation::NotAContainer(root).into());
        };
        let window = state.window;
        let host = window.and_then(|w| self.model.window(w)).and_then(|w| w.host);
        let dockable = self.active_leaf(root);
        if self.tracking.track_root(root, dockable, window, host) {
            self.events.emit_tracking(&self.tracking);
        }
        Ok(())
    }

    // ---- pinning and hiding -----------------------------------------------------------

    /// Moves `dockable` out of its owner into its root's pinned list for the owner's edge.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn pin_dockable(&mut self, dockable: NodeId) -> DockResult<Edge> {
        self.ensure_can(dockable, Capabilities::PIN)?;
        let (owner, root) = self.parkable(dockable)?;
        let edge = self
            .model
            .owner_chain(owner)
            .find_map(|n| match self.model.get(n).map(|d| &d.kind) {
                Some(DockKind::ToolDock { alignment, .. }) => Some(*alignment),
                _ => None,
            })
            .unwrap_or_default();
        dockable.detach(&mut self.model.tree).orphan();
        if let Some(state) = self.model.root_state_mut(root) {
            state.pinned.edge_mut(edge).push(dockable);
        }
        self.settle_focus(root);
        self.rebalance_around(owner);
        self.emit(DockEvent::DockablePinned { dockable, owner: Some(owner), edge });
        Ok(edge)
    }

    /// Returns a pinned dockable to the dock it was pinned from.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn unpin_dockable(&mut self, dockable: NodeId) -> DockResult<NodeId> {
        self.get(dockable)?;
        let Some(edge) = self.model.pinned_edge(dockable) else {
            return Err(Violation::NotPinned(dockable).into());
        };
        let root = self.model.root_of(dockable).ok_or(Violation::NotPinned(dockable))?;
        if let Some(state) = self.model.root_state_mut(root) {
            state.pinned.remove(dockable);
            if state.pinned_preview == Some(dockable) {
                state.pinned_preview = None;
            }
        }
        let owner = self.return_target(dockable, root, Some(edge));
        self.unpark_into(dockable, owner);
        self.emit(DockEvent::DockableUnpinned { dockable, owner });
        Ok(owner)
    }

    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn hide_dockable(&mut self, dockable: NodeId) -> DockResult<()> {
        let (owner, root) = self.parkable(dockable)?;
        dockable.detach(&mut self.model.tree).orphan();
        if let Some(state) = self.model.root_state_mut(root) {
            state.hidden.push(dockable);
        }
        self.settle_focus(root);
        self.rebalance_around(owner);
        self.emit(DockEvent::DockableHidden { dockable, owner: Some(owner) });
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn restore_dockable(&mut self, dockable: NodeId) -> DockResult<NodeId> {
        self.get(dockable)?;
        if !self.model.is_hidden(dockable) {
            return Err(Violation::NotHidden(dockable).into());
        }
        let root = self.model.root_of(dockable).ok_or(Violation::NotHidden(dockable))?;
        if let Some(state) = self.model.root_state_mut(root) {
            state.hidden.retain(|&n| n != dockable);
        }
        let owner = self.return_target(dockable, root, None);
        self.unpark_into(dockable, owner);
        self.emit(DockEvent::DockableRestored { dockable, owner });
        Ok(owner)
    }

    /// Shows a pinned dockable over its root without unpinning it.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn preview_pinned_dockable(&mut self, dockable: NodeId) -> DockResult<()> {
        self.get(dockable)?;
        if self.model.pinned_edge(dockable).is_none() {
            return Err(Violation::NotPinned(dockable).into());
        }
        let root = self.model.root_of(dockable).ok_or(Violation::NotPinned(dockable))?;
        let Some(state) = self.model.root_state_mut(root) else {
            return Err(Violation::NotPinned(dockable).into());
        };
        if state.pinned_preview == Some(dockable) {
            return Ok(());
        }
        state.pinned_preview = Some(dockable);
        self.emit(DockEvent::PinnedPreviewChanged { root, dockable: Some(dockable) });
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn hide_previewing_dockables(&mut self, root: NodeId) -> DockResult<()> {
        self.get(root)?;
        let Some(state) = self.model.root_state_mut(root) else {
            return Err(Violation::NotAContainer(root).into());
        };
        if state.pinned_preview.take().is_none() {
            return Ok(());
        }
        self.emit(DockEvent::PinnedPreviewChanged { root, dockable: None });
        Ok(())
    }

    // ---- activation -------------------------------------------------------------------

    /// Makes `dockable` the active member of its owner, and each owner the active member of
    /// its own owner, up to the root.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn set_active_dockable(&mut self, dockable: NodeId) -> DockResult<()> {
        self.get(dockable)?;
        let root = self.model.root_of(dockable);
        if self.model.is_parked(dockable) || (dockable.parent(self.model.map()).is_none() && root != Some(dockable)) {
            return Err(Violation::Detached(dockable).into());
        }
        let previous = dockable
            .parent(self.model.map())
            .and_then(|p| self.model.get(p))
            .and_then(|p| p.active_dockable);

        let chain: Vec<(NodeId, NodeId)> = dockable
            .ancestors(self.model.map())
            .filter_map(|n| n.parent(self.model.map()).map(|p| (n, p)))
            .collect();
        let mut changed = false;
        for (node, parent) in chain {
            if self.model.get(parent).and_then(|p| p.active_dockable) != Some(node) {
                self.model.tree.data.set_active(parent, Some(node));
                changed = true;
            }
        }
        let window = self.model.window_of(dockable);
        let host = window.and_then(|w| self.model.window(w)).and_then(|w| w.host);
        let tracked = self.tracking.track_dockable(dockable, root, window, host);
        if changed || tracked {
            self.emit(DockEvent::ActiveDockableChanged { dockable, previous });
        }
        if tracked {
            self.events.emit_tracking(&self.tracking);
        }
        Ok(())
    }

    /// Records keyboard focus for the root of `dock`. Independent of activation.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn set_focused_dockable(&mut self, dock: NodeId, dockable: NodeId) -> DockResult<()> {
        self.get(dock)?;
        self.get(dockable)?;
        if dock != dockable && !self.model.is_descendant_of(dockable, dock) {
            return Err(Violation::NotAMember(dockable, dock).into());
        }
        let root = self.model.root_of(dock).ok_or(Violation::Detached(dock))?;
        let previous = self.model.root_state(root).and_then(|s| s.focused);
        if previous == Some(dockable) {
            return Ok(());
        }
        if let Some(prev) = previous.and_then(|p| self.model.get_mut(p)) {
            prev.is_focused = false;
        }
        if let Some(d) = self.model.get_mut(dockable) {
            d.is_focused = true;
        }
        if let Some(state) = self.model.root_state_mut(root) {
            state.focused = Some(dockable);
        }
        self.emit(DockEvent::FocusedDockableChanged { root, dockable, previous });
        Ok(())
    }

    // ---- documents and sizing ---------------------------------------------------------

    /// Asks the registered document factory for a new document and adds it to `dock`.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn create_document(&mut self, dock: NodeId) -> DockResult<NodeId> {
        let can_create =
            matches!(self.get(dock)?.kind, DockKind::DocumentDock { can_create_document: true });
        let Some(factory) = self.document_factory.as_mut().filter(|_| can_create) else {
            return Err(Violation::CannotCreateDocument(dock).into());
        };
        let Some(document) = factory(&self.model, dock) else {
            return Err(Violation::CannotCreateDocument(dock).into());
        };
        let node = self.add(dock, document, None)?;
        self.model.tree.data.set_active(dock, Some(node));
        Ok(node)
    }

    /// Drags `splitter` by `delta` along an axis `extent` long.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn resize_splitter(&mut self, splitter: NodeId, delta: f64, extent: f64) -> DockResult<()> {
        self.get(splitter)?;
        let owner = self.owner(splitter)?;
        let resizable = matches!(self.get(owner)?.kind, DockKind::Proportional { .. });
        let mut slots = self.model.slots(owner);
        let floor = self.config.layout.default_min_size;
        for slot in slots.iter_mut().filter(|s| s.is_content() && s.min_size <= 0.0) {
            slot.min_size = floor;
        }
        let index = self.index_of(splitter);
        let active = proportional::active_splitters(&slots);
        if !resizable || !self.model.is_splitter(splitter) || !active.get(index).copied().unwrap_or(false) {
            return Err(Violation::NotASplitter(splitter).into());
        }
        if !proportional::drag_splitter(&mut slots, index, delta, extent) {
            trace!("splitter already at its limit");
            return Ok(());
        }
        self.write_slots(owner, &slots);
        self.emit(DockEvent::ProportionsChanged { dock: owner });
        Ok(())
    }

    /// Lays out `root` in `frame` and remembers where every visible dockable ended up.
    pub fn arrange(&mut self, root: NodeId, frame: Rect) -> Layout {
        let layout = layout_engine::arrange(&self.model, root, frame, &self.config.layout);
        for (node, rect) in layout.iter() {
            if !rect.is_empty()
                && let Some(d) = self.model.get_mut(node)
            {
                d.bounds = Some(rect);
            }
        }
        layout
    }

    /// Replaces the whole model, e.g. with one restored from disk.
    #[instrument(level = "debug", skip_all)]
    pub fn init_layout(&mut self, model: DockModel) {
        self.model = model;
        let docks: Vec<NodeId> = self
            .model
            .map()
            .ids()
            .filter(|&n| self.is_proportional(n))
            .collect();
        for dock in docks {
            self.rebalance(dock);
        }
        if std::mem::take(&mut self.tracking) != TrackingState::default() {
            self.events.emit_tracking(&self.tracking);
        }
        let root = self.model.root();
        info!(nodes = self.model.map().len(), "layout initialized");
        self.emit(DockEvent::LayoutInitialized { root });
    }

    // ---- internals --------------------------------------------------------------------

    fn emit(&mut self, event: DockEvent) { self.events.emit(&self.model, event); }

    fn get(&self, node: NodeId) -> DockResult<&Dockable> {
        self.model.get(node).ok_or(DockError::NotFound(node))
    }

    fn window(&self, window: WindowId) -> DockResult<&DockWindow> {
        self.model.window(window).ok_or(DockError::WindowNotFound(window))
    }

    fn owner(&self, node: NodeId) -> DockResult<NodeId> {
        self.get(node)?;
        node.parent(self.model.map()).ok_or(Violation::Detached(node).into())
    }

    fn index_of(&self, node: NodeId) -> usize { node.index_in_parent(self.model.map()).unwrap_or(0) }

    fn ensure_container(&self, dock: NodeId) -> DockResult<()> {
        if self.get(dock)?.kind.is_container() {
            Ok(())
        } else {
            Err(Violation::NotAContainer(dock).into())
        }
    }

    fn ensure_can(&self, node: NodeId, capability: Capabilities) -> DockResult<()> {
        self.get(node)?;
        if self.model.can(node, capability) {
            Ok(())
        } else {
            Err(Violation::NotPermitted(node, capability).into())
        }
    }

    fn transition(&mut self, window: WindowId, next: WindowState) -> DockResult<WindowState> {
        let w = self.model.window_mut(window).ok_or(DockError::WindowNotFound(window))?;
        w.transition(next).map_err(|from| Violation::InvalidTransition { from, to: next }.into())
    }

    fn new_node(&mut self, mut dockable: Dockable) -> NodeId {
        if dockable.kind.is_container() && !dockable.kind.is_root() {
            dockable.can_close_last_dockable &= self.config.docks.can_close_last_dockable;
        }
        self.model.create(dockable)
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{prefix}-{}", self.next_id);
            if self.model.find_by_id(&id).is_none() {
                return id;
            }
        }
    }

    fn attach(&mut self, node: NodeId, parent: NodeId, index: Option<usize>) {
        node.detach(&mut self.model.tree).insert_at(parent, index.unwrap_or(usize::MAX));
    }

    fn expand(&mut self, dock: NodeId) {
        if let Some(DockKind::ToolDock { auto_hide: true, is_expanded, .. }) =
            self.model.get_mut(dock).map(|d| &mut d.kind)
            && !*is_expanded
        {
            *is_expanded = true;
            trace!(?dock, "expanded auto-hide tool dock");
        }
    }

    fn check_removable(&self, dockable: NodeId) -> DockResult<()> {
        self.get(dockable)?;
        if self.model.is_root(dockable) {
            return Err(Violation::Detached(dockable).into());
        }
        match dockable.parent(self.model.map()) {
            Some(owner) => {
                let last = self.model.content_dockables(owner).count() == 1;
                let guarded = self.model.get(owner).is_some_and(|o| !o.can_close_last_dockable);
                if last && guarded {
                    return Err(Violation::LastDockable(owner).into());
                }
                Ok(())
            }
            None if self.model.is_parked(dockable) => Ok(()),
            None => Err(Violation::Detached(dockable).into()),
        }
    }

    /// Deletes a checked dockable and tidies up around it.
    fn take_out(&mut self, dockable: NodeId) -> (String, Option<NodeId>, Option<usize>) {
        let id = self.model.get(dockable).map(|d| d.id.clone()).unwrap_or_default();
        let parent = dockable.parent(self.model.map());
        let owner = parent.or_else(|| self.model.get(dockable).and_then(|d| d.owner));
        let index = dockable.index_in_parent(self.model.map());
        self.delete(dockable);
        if let Some(parent) = parent {
            self.rebalance(parent);
            self.prune(parent);
        }
        (id, owner, index)
    }

    fn close_each(&mut self, dockables: Vec<NodeId>) -> usize {
        dockables.into_iter().filter(|&d| self.close_dockable(d).is_ok()).count()
    }

    /// Deletes `node` and its subtree, dropping every reference to them. Parked dockables
    /// that would have gone back into the subtree go back to its owner instead.
    fn delete(&mut self, node: NodeId) {
        let doomed: Vec<NodeId> = node.traverse_preorder(self.model.map()).collect();
        let heir = node.parent(self.model.map()).or_else(|| self.model.root_of(node));
        let orphans: Vec<NodeId> = self
            .model
            .tree
            .data
            .roots
            .values()
            .flat_map(|s| s.hidden.iter().copied().chain(s.pinned.iter()))
            .filter(|&p| !doomed.contains(&p))
            .filter(|&p| self.model.get(p).and_then(|d| d.owner).is_some_and(|o| doomed.contains(&o)))
            .collect();
        for p in orphans {
            if let Some(d) = self.model.get_mut(p) {
                d.owner = heir.filter(|h| !doomed.contains(h));
            }
        }
        let mut tracking_changed = false;
        for &n in &doomed {
            tracking_changed |= self.tracking.forget(n);
        }
        for state in self.model.tree.data.roots.values_mut() {
            state.hidden.retain(|n| !doomed.contains(n));
            for &n in &doomed {
                state.pinned.remove(n);
            }
            if state.pinned_preview.is_some_and(|p| doomed.contains(&p)) {
                state.pinned_preview = None;
            }
            if state.focused.is_some_and(|f| doomed.contains(&f)) {
                state.focused = None;
            }
        }
        node.detach(&mut self.model.tree).remove();
        if tracking_changed {
            self.events.emit_tracking(&self.tracking);
        }
    }

    /// Removes empty collapsable docks from `dock` upwards. Docks that parked dockables
    /// will return to are kept. A floating window whose layout ends up empty is released.
    fn prune(&mut self, mut dock: NodeId) {
        loop {
            let Some(d) = self.model.get(dock) else { return };
            if self.model.is_root(dock) {
                let empty = self.model.content_dockables(dock).next().is_none()
                    && self.model.root_state(dock).is_some_and(|s| s.hidden.is_empty() && s.pinned.iter().next().is_none());
                if let Some(window) = self.model.root_state(dock).and_then(|s| s.window)
                    && empty
                {
                    debug!(?window, "floating layout emptied");
                    self.release_window(window);
                }
                return;
            }
            let empty = self.model.content_dockables(dock).next().is_none();
            if !d.is_collapsable || !empty || self.model.is_remembered_owner(dock) {
                return;
            }
            let Some(owner) = dock.parent(self.model.map()) else { return };
            trace!(id = %d.id, "pruning empty dock");
            self.delete(dock);
            self.rebalance(owner);
            dock = owner;
        }
    }

    fn has_leaves_besides(&self, target: NodeId, excluded: NodeId) -> bool {
        let map = self.model.map();
        target
            .traverse_preorder(map)
            .any(|n| self.model.is_leaf(n) && n != excluded && !self.model.is_descendant_of(n, excluded))
    }

    fn wrapper_for(&mut self, dockable: NodeId, edge: Edge) -> Dockable {
        let is_tool = self.model.get(dockable).is_some_and(|d| d.kind == DockKind::Tool);
        if is_tool {
            let id = self.fresh_id("tools");
            Dockable::tool_dock(id, edge)
        } else {
            let id = self.fresh_id("documents");
            Dockable::document_dock(id)
        }
    }

    fn open_window(&mut self, dockable: NodeId, frame: Rect, options: Option<WindowOptions>) -> DockResult<WindowId> {
        self.ensure_can(dockable, Capabilities::FLOAT)?;
        if self.model.is_root(dockable) || self.model.is_splitter(dockable) {
            return Err(Violation::NotAContainer(dockable).into());
        }
        let source = self.owner(dockable)?;
        let origin = self.model.root_of(dockable).ok_or(Violation::Detached(dockable))?;
        let options = options.unwrap_or_else(|| self.config.windows.default_options());
        let parent_window = match options.owner_mode {
            crate::model::OwnerMode::DockableWindow => self.model.window_of(dockable),
            _ => None,
        };
        let title = self.model.get(dockable).map(|d| d.title.clone()).unwrap_or_default();

        let root_id = self.fresh_id("window-root");
        let layout = self.new_node(Dockable::root(root_id));
        if let Some(d) = self.model.get_mut(dockable) {
            d.proportion = f64::NAN;
        }
        if self.model.is_leaf(dockable) {
            let wrapper = self.wrapper_for(dockable, Edge::Left);
            let wrapper = self.new_node(wrapper);
            wrapper.detach(&mut self.model.tree).push_back(layout);
            dockable.detach(&mut self.model.tree).push_back(wrapper);
        } else {
            dockable.detach(&mut self.model.tree).push_back(layout);
        }

        let window_id = self.fresh_id("window");
        let mut entry = DockWindow::new(window_id, frame, layout, origin);
        entry.title = title;
        entry.options = options;
        entry.parent_window = parent_window;
        entry.topmost = options.is_modal;
        let window = self.model.windows.insert(entry);
        if let Some(state) = self.model.root_state_mut(layout) {
            state.window = Some(window);
        }
        if let Some(state) = self.model.root_state_mut(origin) {
            state.windows.push(window);
        }
        let handle = self.host.create_host_window(window, &self.model.windows[window]);
        self.host.set_title(handle, &self.model.windows[window].title);
        self.host.set_position(handle, frame.x, frame.y);
        self.host.set_size(handle, frame.width, frame.height);
        if let Some(w) = self.model.window_mut(window) {
            w.host = Some(handle);
        }

        self.rebalance(source);
        self.prune(source);
        self.settle_focus(origin);
        info!(?window, ?dockable, "opened floating window");
        self.emit(DockEvent::WindowAdded { window, root: origin });
        Ok(window)
    }

    /// Unregisters a window and deletes its layout. Windows opened from it move to its
    /// owner root.
    fn release_window(&mut self, window: WindowId) {
        let Some(w) = self.model.window(window).cloned() else { return };
        let nested = self.model.root_state(w.layout).map(|s| s.windows.clone()).unwrap_or_default();
        for &n in &nested {
            if let Some(nw) = self.model.window_mut(n) {
                nw.owner_root = w.owner_root;
            }
        }
        if let Some(state) = self.model.root_state_mut(w.owner_root) {
            state.windows.retain(|&x| x != window);
            state.windows.extend(nested);
        }
        if self.tracking.clear_window(window) {
            self.events.emit_tracking(&self.tracking);
        }
        let parked: Vec<NodeId> = self
            .model
            .root_state(w.layout)
            .map(|s| s.hidden.iter().copied().chain(s.pinned.iter()).collect())
            .unwrap_or_default();
        for p in parked {
            self.delete(p);
        }
        self.delete(w.layout);
        if let Some(handle) = w.host {
            self.host.close(handle);
        }
        if let Some(w) = self.model.window_mut(window) {
            w.state = WindowState::Closed;
            w.host = None;
        }
    }

    /// Follows active members from `dock` down to the deepest one.
    fn active_leaf(&self, dock: NodeId) -> Option<NodeId> {
        let mut cur = self.model.get(dock)?.active_dockable?;
        while let Some(next) = self.model.get(cur).and_then(|d| d.active_dockable) {
            cur = next;
        }
        Some(cur)
    }

    /// Clears `root`'s keyboard focus once the focused dockable has left its visible tree.
    fn settle_focus(&mut self, root: NodeId) {
        let Some(focused) = self.model.root_state(root).and_then(|s| s.focused) else { return };
        if focused == root || self.model.is_descendant_of(focused, root) {
            return;
        }
        if let Some(d) = self.model.get_mut(focused) {
            d.is_focused = false;
        }
        if let Some(state) = self.model.root_state_mut(root) {
            state.focused = None;
        }
        debug!(?focused, "focused dockable left its root");
    }

    /// Hands the dockables parked on a floating `layout` over to `root`. Those whose dock
    /// did not survive the docking go back to `fallback` instead.
    fn adopt_parked(&mut self, layout: NodeId, root: NodeId, fallback: NodeId) {
        let Some(state) = self.model.root_state_mut(layout) else { return };
        let hidden = std::mem::take(&mut state.hidden);
        let pinned = std::mem::take(&mut state.pinned);
        state.pinned_preview = None;
        for node in hidden.iter().copied().chain(pinned.iter()) {
            let owner = self.model.get(node).and_then(|d| d.owner);
            if owner.and_then(|o| self.model.root_of(o)) != Some(root)
                && let Some(d) = self.model.get_mut(node)
            {
                d.owner = Some(fallback);
            }
        }
        let Some(state) = self.model.root_state_mut(root) else { return };
        state.hidden.extend(hidden);
        for edge in [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom] {
            state.pinned.edge_mut(edge).extend(pinned.edge(edge).iter().copied());
        }
    }

    fn parkable(&self, dockable: NodeId) -> DockResult<(NodeId, NodeId)> {
        self.get(dockable)?;
        if self.model.is_parked(dockable) {
            return Err(Violation::AlreadyParked(dockable).into());
        }
        if self.model.is_root(dockable) || self.model.is_splitter(dockable) {
            return Err(Violation::Detached(dockable).into());
        }
        let owner = self.owner(dockable)?;
        let root = self.model.root_of(dockable).ok_or(Violation::Detached(dockable))?;
        Ok((owner, root))
    }

    /// Where a parked dockable goes back to: its remembered owner if that is still part of
    /// the same root's visible tree, else a tool dock on `edge`, else the root's active
    /// container, else the root itself.
    fn return_target(&self, dockable: NodeId, root: NodeId, edge: Option<Edge>) -> NodeId {
        let map = self.model.map();
        let remembered = self.model.get(dockable).and_then(|d| d.owner).filter(|&o| {
            self.model.is_container(o) && o.ancestors(map).last() == Some(root)
        });
        if let Some(owner) = remembered {
            return owner;
        }
        let on_edge = edge.and_then(|edge| {
            root.traverse_preorder(map).find(|&n| {
                matches!(self.model.get(n).map(|d| &d.kind), Some(DockKind::ToolDock { alignment, .. }) if *alignment == edge)
            })
        });
        on_edge
            .or_else(|| {
                self.model
                    .get(root)
                    .and_then(|r| r.active_dockable)
                    .filter(|&a| self.model.is_container(a))
            })
            .unwrap_or(root)
    }

    fn unpark_into(&mut self, dockable: NodeId, owner: NodeId) {
        self.attach(dockable, owner, None);
        self.model.tree.data.set_active(owner, Some(dockable));
        self.expand(owner);
        self.rebalance_insert(owner, dockable);
        self.rebalance_around(owner);
    }

    /// Rebalances `dock` and its owner, whose content may have collapsed or come back.
    fn rebalance_around(&mut self, dock: NodeId) {
        self.rebalance(dock);
        self.rebalance_owner(dock);
    }

    fn rebalance_owner(&mut self, dock: NodeId) {
        if let Some(owner) = dock.parent(self.model.map()) {
            self.rebalance(owner);
        }
    }

    fn is_proportional(&self, dock: NodeId) -> bool {
        matches!(self.model.get(dock).map(|d| &d.kind), Some(DockKind::Proportional { .. }))
    }

    fn rebalance(&mut self, dock: NodeId) {
        if !self.is_proportional(dock) {
            return;
        }
        self.normalize_splitters(dock);
        let mut slots = self.model.slots(dock);
        proportional::normalize(&mut slots);
        self.write_slots(dock, &slots);
    }

    fn rebalance_insert(&mut self, dock: NodeId, node: NodeId) {
        if !self.is_proportional(dock) {
            return;
        }
        self.normalize_splitters(dock);
        let mut slots = self.model.slots(dock);
        let index = self.index_of(node);
        proportional::insert_share(&mut slots, index);
        self.write_slots(dock, &slots);
    }

    fn write_slots(&mut self, dock: NodeId, slots: &[Slot]) {
        let members: Vec<NodeId> = self.model.visible_dockables(dock).collect();
        for (node, slot) in members.into_iter().zip(slots) {
            if slot.kind != SlotKind::Splitter
                && let Some(d) = self.model.get_mut(node)
            {
                d.proportion = slot.proportion;
            }
        }
    }

    /// Exactly one splitter between neighbouring members of a proportional dock, none at
    /// either end.
    fn normalize_splitters(&mut self, dock: NodeId) {
        if !self.is_proportional(dock) {
            return;
        }
        let members: Vec<NodeId> = self.model.visible_dockables(dock).collect();
        let mut kept: Vec<NodeId> = vec![];
        for node in members {
            if self.model.is_splitter(node) {
                if kept.last().is_some_and(|&k| !self.model.is_splitter(k)) {
                    kept.push(node);
                } else {
                    node.detach(&mut self.model.tree).remove();
                }
            } else {
                kept.push(node);
            }
        }
        if let Some(&last) = kept.last()
            && self.model.is_splitter(last)
        {
            last.detach(&mut self.model.tree).remove();
            kept.pop();
        }
        for pair in kept.windows(2) {
            if !self.model.is_splitter(pair[0]) && !self.model.is_splitter(pair[1]) {
                let id = self.fresh_id("splitter");
                let splitter = self.new_node(Dockable::splitter(id));
                splitter.detach(&mut self.model.tree).insert_before(pair[1]);
            }
        }
    }
}

#[cfg(test)]
mod tests;
