//! Turning a pointer path into a drop target while a dockable is dragged.

use tracing::{debug, info, instrument, trace, warn};

use crate::common::config::DragSettings;
use crate::common::geometry::{Point, Rect};
use crate::factory::{DockError, DockResult, Factory, Violation};
use crate::layout_engine::{Edge, Layout};
use crate::model::{Capabilities, DockKind, DockModel, NodeId};

/// Where over a container the pointer is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropZone {
    /// Dock as a tab.
    Center,
    /// Split the container on this side.
    Edge(Edge),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DropTarget {
    pub dock: NodeId,
    pub zone: DropZone,
    /// Found through the band along the root's border rather than under the pointer.
    pub global: bool,
    /// Where the dropped dockable would end up.
    pub preview: Rect,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    DragStarted { origin: NodeId },
    Hovering { origin: NodeId, target: DropTarget },
    Dropped { origin: NodeId, target: DropTarget },
    Cancelled { origin: NodeId },
}

#[derive(Debug, Clone)]
pub struct DragManager {
    state: DragState,
    start: Point,
    // Set once the pointer travelled far enough to count as a drag.
    armed: bool,
    config: DragSettings,
}

impl Default for DragManager {
    fn default() -> Self { Self::new(DragSettings::default()) }
}

impl DragManager {
    pub fn new(config: DragSettings) -> Self {
        Self {
            state: DragState::Idle,
            start: Point::default(),
            armed: false,
            config,
        }
    }

    pub fn state(&self) -> DragState { self.state }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::DragStarted { .. } | DragState::Hovering { .. })
    }

    pub fn dragged(&self) -> Option<NodeId> {
        match self.state {
            DragState::Idle => None,
            DragState::DragStarted { origin }
            | DragState::Hovering { origin, .. }
            | DragState::Dropped { origin, .. }
            | DragState::Cancelled { origin } => Some(origin),
        }
    }

    /// The current candidate, while hovering.
    pub fn target(&self) -> Option<DropTarget> {
        match self.state {
            DragState::Hovering { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Starts dragging `origin` from `point`. Returns false, leaving the manager idle, if the
    /// dockable cannot be dragged.
    pub fn begin(&mut self, model: &DockModel, origin: NodeId, point: Point) -> bool {
        if self.is_dragging() {
            self.cancel();
        }
        let draggable = model.get(origin).is_some_and(|d| !d.kind.is_root() && !d.kind.is_splitter())
            && origin.parent(model.map()).is_some()
            && model.can(origin, Capabilities::DRAG);
        if !draggable {
            debug!(?origin, "not draggable");
            self.reset();
            return false;
        }
        self.state = DragState::DragStarted { origin };
        self.start = point;
        self.armed = false;
        true
    }

    /// Re-resolves the drop target for the pointer at `point`.
    #[instrument(level = "trace", skip(self, model, layout))]
    pub fn pointer_moved(&mut self, model: &DockModel, layout: &Layout, point: Point) -> Option<DropTarget> {
        let origin = match self.state {
            DragState::DragStarted { origin } | DragState::Hovering { origin, .. } => origin,
            _ => return None,
        };
        if !self.armed {
            if self.start.distance_to(point) < self.config.min_drag_distance {
                return None;
            }
            self.armed = true;
        }

        let previous = self.target();
        let target = self.resolve(model, layout, origin, point);
        self.state = match target {
            Some(target) => DragState::Hovering { origin, target },
            None => DragState::DragStarted { origin },
        };
        if previous != target {
            debug!(?target, "drop target changed");
        }
        target
    }

    /// Commits the drop: exactly one move or split, or nothing when there is no target.
    #[instrument(level = "debug", skip(self, factory))]
    pub fn drop(&mut self, factory: &mut Factory) -> DockResult<Option<DropTarget>> {
        match self.state {
            DragState::Hovering { origin, target } => {
                let result = match target.zone {
                    DropZone::Center => match origin.parent(factory.model().map()) {
                        Some(source) => factory.move_dockable(source, target.dock, origin, None),
                        None => Err(DockError::from(Violation::Detached(origin))),
                    },
                    DropZone::Edge(edge) => factory.split_to_dock(target.dock, origin, edge).map(|_| ()),
                };
                match result {
                    Ok(()) => {
                        info!(?origin, ?target, "dropped");
                        self.state = DragState::Dropped { origin, target };
                        Ok(Some(target))
                    }
                    Err(err) => {
                        warn!(%err, "drop rejected");
                        self.state = DragState::Cancelled { origin };
                        Err(err)
                    }
                }
            }
            DragState::DragStarted { origin } => {
                debug!(?origin, "dropped outside any target");
                self.state = DragState::Cancelled { origin };
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    pub fn cancel(&mut self) {
        if let DragState::DragStarted { origin } | DragState::Hovering { origin, .. } = self.state {
            self.state = DragState::Cancelled { origin };
        }
    }

    pub fn reset(&mut self) {
        self.state = DragState::Idle;
        self.armed = false;
    }

    pub fn update_config(&mut self, config: DragSettings) { self.config = config; }

    fn resolve(&self, model: &DockModel, layout: &Layout, origin: NodeId, point: Point) -> Option<DropTarget> {
        if let Some(target) = self.global_target(model, layout, origin, point) {
            return Some(target);
        }
        for node in layout.hit_chain(model, point) {
            if node == origin || model.is_descendant_of(node, origin) {
                continue;
            }
            let Some(d) = model.get(node) else { continue };
            if !d.kind.is_container() || d.kind.is_root() || !model.can(node, Capabilities::DROP) {
                continue;
            }
            let Some(rect) = layout.rect(node) else { continue };

            let (edge, distance) = nearest_edge(rect, point);
            if distance < self.config.edge_zone_fraction && !would_empty(model, node, origin) {
                return Some(DropTarget {
                    dock: node,
                    zone: DropZone::Edge(edge),
                    global: false,
                    preview: edge_slice(rect, edge, 0.5),
                });
            }
            if d.kind.is_tabbed() && accepts_tab(model, &d.kind, origin) {
                return Some(DropTarget { dock: node, zone: DropZone::Center, global: false, preview: rect });
            }
            trace!(id = %d.id, "no zone");
        }
        None
    }

    /// The band along the root's border docks next to the root's whole content.
    fn global_target(&self, model: &DockModel, layout: &Layout, origin: NodeId, point: Point) -> Option<DropTarget> {
        let root = layout.root()?;
        let rect = layout.rect(root)?;
        if !rect.contains(point) || layout.overlay().is_some_and(|o| layout.rect(o).is_some_and(|r| r.contains(point))) {
            return None;
        }
        let edge = [
            (Edge::Left, point.x - rect.x),
            (Edge::Right, rect.max_x() - point.x),
            (Edge::Top, point.y - rect.y),
            (Edge::Bottom, rect.max_y() - point.y),
        ]
        .into_iter()
        .filter(|&(_, d)| d <= self.config.global_band)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(e, _)| e)?;

        let dock = model
            .get(root)
            .and_then(|r| r.active_dockable)
            .filter(|&a| model.is_container(a))
            .or_else(|| model.content_dockables(root).find(|&c| model.is_container(c)))?;
        if dock == origin
            || model.is_descendant_of(dock, origin)
            || !model.can(dock, Capabilities::DROP)
            || would_empty(model, dock, origin)
        {
            return None;
        }
        Some(DropTarget {
            dock,
            zone: DropZone::Edge(edge),
            global: true,
            preview: edge_slice(rect, edge, self.config.edge_zone_fraction),
        })
    }
}

/// Closest side of `rect` to `point`, with the distance as a fraction of the rect's extent.
fn nearest_edge(rect: Rect, point: Point) -> (Edge, f64) {
    let (rx, ry) = rect.relative(point);
    [(Edge::Left, rx), (Edge::Right, 1.0 - rx), (Edge::Top, ry), (Edge::Bottom, 1.0 - ry)]
        .into_iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((Edge::Left, 1.0))
}

fn edge_slice(rect: Rect, edge: Edge, fraction: f64) -> Rect {
    let orientation = edge.orientation();
    let extent = rect.extent(orientation);
    let length = extent * fraction;
    let offset = if edge.is_leading() { 0.0 } else { extent - length };
    rect.slice(orientation, offset, length)
}

/// Splitting `target` off `origin` would take its last leaf.
fn would_empty(model: &DockModel, target: NodeId, origin: NodeId) -> bool {
    model.is_descendant_of(origin, target)
        && !target
            .traverse_preorder(model.map())
            .any(|n| model.is_leaf(n) && n != origin && !model.is_descendant_of(n, origin))
}

/// Tabs hold leaves; a document dock takes non-documents only if they may dock as documents.
fn accepts_tab(model: &DockModel, kind: &DockKind, origin: NodeId) -> bool {
    let Some(o) = model.get(origin) else { return false };
    if !o.kind.is_leaf() {
        return false;
    }
    match kind {
        DockKind::DocumentDock { .. } => {
            o.kind == DockKind::Document || model.can(origin, Capabilities::DOCK_AS_DOCUMENT)
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::common::config::Config;
    use crate::model::{CapabilityOverride, Dockable, Orientation};

    struct Scene {
        factory: Factory,
        main: NodeId,
        left: NodeId,
        explorer: NodeId,
        docs: NodeId,
        a: NodeId,
    }

    /// `main` holds a tool dock (0..200) and a document dock (204..804) with `a` and `b`.
    fn scene() -> Scene {
        let mut model = DockModel::new("root");
        let main = model.insert(model.root(), Dockable::proportional("main", Orientation::Horizontal));
        let left = model.insert(main, Dockable::tool_dock("left", Edge::Left).with_proportion(0.25));
        let explorer = model.insert(left, Dockable::tool("explorer", "Explorer"));
        model.insert(main, Dockable::splitter("split"));
        let docs = model.insert(main, Dockable::document_dock("docs").with_proportion(0.75));
        let a = model.insert(docs, Dockable::document("a", "A"));
        model.insert(docs, Dockable::document("b", "B"));
        let factory = Factory::new(model, Config::default());
        Scene { factory, main, left, explorer, docs, a }
    }

    impl Scene {
        fn layout(&mut self) -> Layout {
            let root = self.factory.model().root();
            self.factory.arrange(root, Rect::new(0.0, 0.0, 804.0, 600.0))
        }

        fn owner(&self, node: NodeId) -> Option<NodeId> { node.parent(self.factory.model().map()) }

        /// Starts dragging `origin` at `from` and moves the pointer to `to`.
        fn hover(&mut self, origin: NodeId, from: Point, to: Point) -> (DragManager, Option<DropTarget>) {
            let layout = self.layout();
            let mut dm = DragManager::default();
            assert!(dm.begin(self.factory.model(), origin, from));
            let target = dm.pointer_moved(self.factory.model(), &layout, to);
            (dm, target)
        }
    }

    #[test]
    fn small_movements_do_not_start_resolving() {
        let mut s = scene();
        let (mut dm, target) = s.hover(s.a, Point::new(300.0, 300.0), Point::new(302.0, 300.0));
        assert_eq!(target, None);
        assert_eq!(dm.state(), DragState::DragStarted { origin: s.a });

        let layout = s.layout();
        let target = dm.pointer_moved(s.factory.model(), &layout, Point::new(100.0, 300.0));
        assert_eq!(target.map(|t| (t.dock, t.zone)), Some((s.left, DropZone::Center)));
    }

    #[test]
    fn center_of_a_tool_dock_moves_as_tab() {
        let mut s = scene();
        let (mut dm, target) = s.hover(s.a, Point::new(300.0, 300.0), Point::new(100.0, 300.0));
        let target = target.unwrap();
        assert_eq!(target.dock, s.left);
        assert_eq!(target.zone, DropZone::Center);
        assert!(!target.global);
        assert_eq!(target.preview, Rect::new(0.0, 0.0, 200.0, 600.0));

        assert_eq!(dm.drop(&mut s.factory).unwrap(), Some(target));
        assert_eq!(dm.state(), DragState::Dropped { origin: s.a, target });
        assert_eq!(s.owner(s.a), Some(s.left));
    }

    #[test]
    fn edge_zone_splits() {
        let mut s = scene();
        let (mut dm, target) = s.hover(s.a, Point::new(300.0, 300.0), Point::new(700.0, 300.0));
        let target = target.unwrap();
        assert_eq!(target.dock, s.docs);
        assert_eq!(target.zone, DropZone::Edge(Edge::Right));
        assert_eq!(target.preview, Rect::new(504.0, 0.0, 300.0, 600.0));

        dm.drop(&mut s.factory).unwrap();
        let wrapper = s.owner(s.a).unwrap();
        assert_ne!(wrapper, s.docs);
        assert_eq!(s.owner(wrapper), s.owner(s.docs));
        assert_eq!(s.factory.model().violations(), Vec::<String>::new());
    }

    #[test]
    fn own_subtree_is_never_a_target() {
        let mut s = scene();
        let (mut dm, target) = s.hover(s.docs, Point::new(500.0, 300.0), Point::new(520.0, 300.0));
        assert_eq!(target, None);
        assert_eq!(dm.drop(&mut s.factory).unwrap(), None);
        assert_eq!(dm.state(), DragState::Cancelled { origin: s.docs });
        assert_eq!(s.owner(s.docs), Some(s.main));
    }

    #[test]
    fn border_band_docks_next_to_everything() {
        let mut s = scene();
        let (mut dm, target) = s.hover(s.a, Point::new(300.0, 300.0), Point::new(2.0, 300.0));
        let target = target.unwrap();
        assert_eq!(target.dock, s.main);
        assert_eq!(target.zone, DropZone::Edge(Edge::Left));
        assert!(target.global);
        assert_eq!(target.preview, Rect::new(0.0, 0.0, 201.0, 600.0));

        dm.drop(&mut s.factory).unwrap();
        let root = s.factory.model().root();
        let split = s.owner(s.main).unwrap();
        assert_eq!(s.owner(split), Some(root));
        assert_eq!(s.factory.model().content_dockables(split).count(), 2);
    }

    #[test]
    fn document_docks_need_dock_as_document() {
        let mut s = scene();
        let (_, target) = s.hover(s.explorer, Point::new(100.0, 300.0), Point::new(500.0, 300.0));
        assert_eq!(target.map(|t| (t.dock, t.zone)), Some((s.docs, DropZone::Center)));

        s.factory.set_override(s.explorer, CapabilityOverride::deny(Capabilities::DOCK_AS_DOCUMENT));
        let (_, target) = s.hover(s.explorer, Point::new(100.0, 300.0), Point::new(500.0, 300.0));
        assert_eq!(target, None);
    }

    #[test]
    fn drop_capability_is_inherited() {
        let mut s = scene();
        s.factory.set_override(s.main, CapabilityOverride::deny(Capabilities::DROP));
        let (_, target) = s.hover(s.explorer, Point::new(100.0, 300.0), Point::new(500.0, 300.0));
        assert_eq!(target, None);
    }

    #[test]
    fn cancel_leaves_the_tree_alone() {
        let mut s = scene();
        let (mut dm, target) = s.hover(s.a, Point::new(300.0, 300.0), Point::new(100.0, 300.0));
        assert!(target.is_some());
        dm.cancel();
        assert_eq!(dm.state(), DragState::Cancelled { origin: s.a });
        assert_eq!(dm.target(), None);
        assert_eq!(dm.drop(&mut s.factory).unwrap(), None);
        assert_eq!(s.owner(s.a), Some(s.docs));
        dm.reset();
        assert_eq!(dm.dragged(), None);
    }

    #[test]
    fn drag_needs_permission() {
        let mut s = scene();
        s.factory.set_override(s.a, CapabilityOverride::deny(Capabilities::DRAG));
        let mut dm = DragManager::default();
        assert!(!dm.begin(s.factory.model(), s.a, Point::new(300.0, 300.0)));
        assert_eq!(dm.state(), DragState::Idle);
        let root = s.factory.model().root();
        assert!(!dm.begin(s.factory.model(), root, Point::new(300.0, 300.0)));
    }
}
