use tracing::trace;

use crate::common::collections::HashMap;
use crate::common::config::LayoutSettings;
use crate::common::geometry::{Point, Rect};
use crate::layout_engine::proportional::{self, SlotKind};
use crate::layout_engine::{Edge, Orientation};
use crate::model::{DockKind, DockModel, NodeId};

/// Share of the root's extent a pinned preview takes when it has no recorded size.
const PREVIEW_FRACTION: f64 = 0.25;

/// Rectangles for every node of one root's visible tree, in pre-order.
///
/// Hidden tabs, collapsed docks and their descendants are present with an empty rect.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layout {
    rects: Vec<(NodeId, Rect)>,
    index: HashMap<NodeId, usize>,
    overlay: Option<NodeId>,
}

impl Layout {
    pub fn rect(&self, node: NodeId) -> Option<Rect> {
        self.index.get(&node).map(|&i| self.rects[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Rect)> + '_ { self.rects.iter().copied() }

    pub fn len(&self) -> usize { self.rects.len() }

    pub fn is_empty(&self) -> bool { self.rects.is_empty() }

    /// The laid-out root, if any.
    pub fn root(&self) -> Option<NodeId> { self.rects.first().map(|(n, _)| *n) }

    /// Pinned dockable shown on top of the root.
    pub fn overlay(&self) -> Option<NodeId> { self.overlay }

    /// Nodes under `point`, deepest first. The overlay, when hit, shadows the tree below it.
    pub fn hit_chain(&self, model: &DockModel, point: Point) -> Vec<NodeId> {
        let hit = |n: NodeId| self.rect(n).is_some_and(|r| r.contains(point));
        let start = match (self.overlay, self.root()) {
            (Some(overlay), _) if hit(overlay) => overlay,
            (_, Some(root)) if hit(root) => root,
            _ => return vec![],
        };
        let mut chain = vec![start];
        let mut cur = start;
        while let Some(child) = cur.children(model.map()).find(|&c| hit(c)) {
            chain.push(child);
            cur = child;
        }
        chain.reverse();
        chain
    }

    fn push(&mut self, node: NodeId, rect: Rect) {
        self.index.insert(node, self.rects.len());
        self.rects.push((node, rect));
    }
}

/// Lays out the visible tree of `root` inside `frame`.
pub fn arrange(model: &DockModel, root: NodeId, frame: Rect, settings: &LayoutSettings) -> Layout {
    let mut layout = Layout::default();
    let mut cx = Arranger {
        model,
        thickness: f64::from(settings.splitter_thickness),
        layout: &mut layout,
    };
    cx.node(root, frame);
    cx.overlay(root, frame);
    trace!(nodes = layout.len(), "arranged");
    layout
}

struct Arranger<'a> {
    model: &'a DockModel,
    thickness: f64,
    layout: &'a mut Layout,
}

impl Arranger<'_> {
    fn node(&mut self, node: NodeId, rect: Rect) {
        self.layout.push(node, rect);
        let Some(kind) = self.model.get(node).map(|d| d.kind.clone()) else {
            return;
        };
        let children: Vec<NodeId> = self.model.visible_dockables(node).collect();
        if children.is_empty() {
            return;
        }
        let rects = if rect.is_empty() {
            vec![Rect::EMPTY; children.len()]
        } else {
            match kind {
                DockKind::Proportional { orientation } => self.proportional(node, rect, orientation, true),
                DockKind::Stack { orientation } => self.proportional(node, rect, orientation, false),
                DockKind::Grid { columns, rows } => self.grid(&children, rect, columns, rows),
                DockKind::SplitView { pane_length, is_pane_open, placement } => {
                    let pane = if is_pane_open { pane_length } else { 0.0 };
                    self.split_view(node, &children, rect, pane, placement)
                }
                _ => self.tabbed(node, &children, rect),
            }
        };
        for (child, r) in children.into_iter().zip(rects) {
            self.node(child, r);
        }
    }

    fn proportional(
        &self,
        node: NodeId,
        rect: Rect,
        orientation: Orientation,
        resizable: bool,
    ) -> Vec<Rect> {
        let mut slots = self.model.slots(node);
        let thickness = if resizable {
            self.thickness
        } else {
            for slot in &mut slots {
                slot.proportion = f64::NAN;
            }
            0.0
        };
        let sizes = proportional::arrange(&slots, rect.extent(orientation), thickness);
        let mut offset = 0.0;
        slots
            .iter()
            .zip(sizes)
            .map(|(slot, size)| {
                let r = rect.slice(orientation, offset, size);
                offset += size;
                if slot.kind == SlotKind::Collapsed || (slot.kind == SlotKind::Splitter && size == 0.0) {
                    Rect::EMPTY
                } else {
                    r
                }
            })
            .collect()
    }

    fn grid(&self, children: &[NodeId], rect: Rect, columns: u16, rows: u16) -> Vec<Rect> {
        let content = children.iter().filter(|&&c| !self.model.is_splitter(c)).count();
        let columns = usize::from(columns.max(1));
        let rows = usize::from(rows.max(1)).max(content.div_ceil(columns));
        let cell_w = rect.width / columns as f64;
        let cell_h = rect.height / rows as f64;
        let mut k = 0;
        children
            .iter()
            .map(|&c| {
                if self.model.is_splitter(c) {
                    return Rect::EMPTY;
                }
                let (col, row) = (k % columns, k / columns);
                k += 1;
                Rect::new(rect.x + col as f64 * cell_w, rect.y + row as f64 * cell_h, cell_w, cell_h)
            })
            .collect()
    }

    /// The first member is the pane; the others share the content area as tabs.
    fn split_view(
        &self,
        node: NodeId,
        children: &[NodeId],
        rect: Rect,
        pane_length: f64,
        placement: Edge,
    ) -> Vec<Rect> {
        let orientation = placement.orientation();
        let extent = rect.extent(orientation);
        let pane = pane_length.clamp(0.0, extent);
        let (pane_rect, content_rect) = if placement.is_leading() {
            (rect.slice(orientation, 0.0, pane), rect.slice(orientation, pane, extent - pane))
        } else {
            (rect.slice(orientation, extent - pane, pane), rect.slice(orientation, 0.0, extent - pane))
        };
        let active = self.model.get(node).and_then(|d| d.active_dockable);
        let shown = active
            .filter(|a| children.iter().skip(1).any(|c| c == a))
            .or_else(|| children.get(1).copied());
        children
            .iter()
            .enumerate()
            .map(|(i, &c)| match i {
                0 if pane > 0.0 => pane_rect,
                0 => Rect::EMPTY,
                _ if Some(c) == shown && !self.model.is_collapsed(c) => content_rect,
                _ => Rect::EMPTY,
            })
            .collect()
    }

    fn tabbed(&self, node: NodeId, children: &[NodeId], rect: Rect) -> Vec<Rect> {
        let active = self.model.get(node).and_then(|d| d.active_dockable);
        let shown = active.or_else(|| children.iter().copied().find(|&c| !self.model.is_splitter(c)));
        children
            .iter()
            .map(|&c| {
                if Some(c) == shown && !self.model.is_collapsed(c) { rect } else { Rect::EMPTY }
            })
            .collect()
    }

    fn overlay(&mut self, root: NodeId, frame: Rect) {
        let Some(state) = self.model.root_state(root) else { return };
        let Some(preview) = state.pinned_preview else { return };
        let edge = state.pinned.edge_of(preview).unwrap_or_default();
        let orientation = edge.orientation();
        let extent = frame.extent(orientation);
        let recorded = self
            .model
            .get(preview)
            .and_then(|d| d.bounds)
            .map(|b| b.extent(orientation))
            .filter(|&e| e > 0.0);
        let length = recorded.unwrap_or(extent * PREVIEW_FRACTION).min(extent);
        let rect = if edge.is_leading() {
            frame.slice(orientation, 0.0, length)
        } else {
            frame.slice(orientation, extent - length, length)
        };
        self.layout.overlay = Some(preview);
        self.node(preview, rect);
    }
}
