use serde::{Deserialize, Serialize};

use crate::common::geometry::Rect;
use crate::layout_engine::{Edge, Orientation};
use crate::model::tree::NodeId;
use crate::model::window::WindowId;

bitflags::bitflags! {
    /// What a user may do with a dockable.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        const CLOSE = 1 << 0;
        const PIN = 1 << 1;
        const FLOAT = 1 << 2;
        const DRAG = 1 << 3;
        const DROP = 1 << 4;
        const DOCK_AS_DOCUMENT = 1 << 5;
    }
}

impl Default for Capabilities {
    fn default() -> Self { Capabilities::all() }
}

/// Closed set of dockable kinds.
///
/// Leaves carry content; everything else is a container whose children are its
/// visible dockables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[derive(strum::EnumDiscriminants)]
#[strum_discriminants(name(KindTag), derive(strum::Display))]
#[strum_discriminants(strum(serialize_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DockKind {
    Document,
    Tool,
    Content,
    Root,
    Proportional { orientation: Orientation },
    ToolDock { alignment: Edge, auto_hide: bool, is_expanded: bool },
    DocumentDock { can_create_document: bool },
    Stack { orientation: Orientation },
    Grid { columns: u16, rows: u16 },
    SplitView { pane_length: f64, is_pane_open: bool, placement: Edge },
    Splitter,
}

impl DockKind {
    pub fn tag(&self) -> KindTag { KindTag::from(self) }

    pub fn is_leaf(&self) -> bool {
        matches!(self, DockKind::Document | DockKind::Tool | DockKind::Content)
    }

    pub fn is_splitter(&self) -> bool { matches!(self, DockKind::Splitter) }

    pub fn is_container(&self) -> bool { !self.is_leaf() && !self.is_splitter() }

    pub fn is_root(&self) -> bool { matches!(self, DockKind::Root) }

    pub fn is_tool_dock(&self) -> bool { matches!(self, DockKind::ToolDock { .. }) }

    pub fn is_document_dock(&self) -> bool { matches!(self, DockKind::DocumentDock { .. }) }

    /// Containers that show exactly one (the active) child at a time.
    pub fn is_tabbed(&self) -> bool {
        matches!(self, DockKind::Root | DockKind::ToolDock { .. } | DockKind::DocumentDock { .. })
    }

    /// Axis along which children are laid out, for containers that split space.
    pub fn orientation(&self) -> Option<Orientation> {
        match self {
            DockKind::Proportional { orientation } | DockKind::Stack { orientation } => {
                Some(*orientation)
            }
            DockKind::SplitView { placement, .. } => Some(placement.orientation()),
            _ => None,
        }
    }
}

/// One node of the docking tree. Leaves and containers share this shape; container-only
/// state lives in [`DockKind`] and, for roots, in [`RootState`].
#[derive(Clone, Debug, PartialEq)]
pub struct Dockable {
    pub id: String,
    pub title: String,
    pub kind: DockKind,
    pub capabilities: Capabilities,
    /// Share of the owner's axis; NaN while unassigned.
    pub proportion: f64,
    /// Smallest extent this dockable may be resized to.
    pub min_size: f64,
    pub is_collapsable: bool,
    pub can_close_last_dockable: bool,
    /// Back-reference to the containing dock. Kept while pinned or hidden so the
    /// dockable can go back where it came from.
    pub owner: Option<NodeId>,
    pub active_dockable: Option<NodeId>,
    pub is_active: bool,
    pub is_focused: bool,
    /// Last rectangle this dockable was arranged into.
    pub bounds: Option<Rect>,
}

impl Dockable {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: DockKind) -> Self {
        let is_collapsable = !kind.is_root() && kind.is_container();
        Dockable {
            id: id.into(),
            title: title.into(),
            kind,
            capabilities: Capabilities::default(),
            proportion: f64::NAN,
            min_size: 0.0,
            is_collapsable,
            can_close_last_dockable: true,
            owner: None,
            active_dockable: None,
            is_active: false,
            is_focused: false,
            bounds: None,
        }
    }

    pub fn document(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, DockKind::Document)
    }

    pub fn tool(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, DockKind::Tool)
    }

    pub fn content(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, DockKind::Content)
    }

    pub fn root(id: impl Into<String>) -> Self { Self::new(id, "", DockKind::Root) }

    pub fn proportional(id: impl Into<String>, orientation: Orientation) -> Self {
        Self::new(id, "", DockKind::Proportional { orientation })
    }

    pub fn tool_dock(id: impl Into<String>, alignment: Edge) -> Self {
        Self::new(id, "", DockKind::ToolDock { alignment, auto_hide: false, is_expanded: true })
    }

    pub fn document_dock(id: impl Into<String>) -> Self {
        Self::new(id, "", DockKind::DocumentDock { can_create_document: true })
    }

    pub fn stack(id: impl Into<String>, orientation: Orientation) -> Self {
        Self::new(id, "", DockKind::Stack { orientation })
    }

    pub fn grid(id: impl Into<String>, columns: u16, rows: u16) -> Self {
        Self::new(id, "", DockKind::Grid { columns: columns.max(1), rows: rows.max(1) })
    }

    pub fn split_view(id: impl Into<String>, placement: Edge, pane_length: f64) -> Self {
        Self::new(id, "", DockKind::SplitView { pane_length, is_pane_open: true, placement })
    }

    pub fn splitter(id: impl Into<String>) -> Self { Self::new(id, "", DockKind::Splitter) }

    pub fn with_proportion(mut self, proportion: f64) -> Self {
        self.proportion = proportion;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_min_size(mut self, min_size: f64) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn with_can_close_last_dockable(mut self, can_close: bool) -> Self {
        self.can_close_last_dockable = can_close;
        self
    }

    pub fn with_auto_hide(mut self, auto_hide: bool, expanded: bool) -> Self {
        if let DockKind::ToolDock { auto_hide: a, is_expanded: e, .. } = &mut self.kind {
            *a = auto_hide;
            *e = expanded;
        }
        self
    }

    pub fn has_proportion(&self) -> bool { !self.proportion.is_nan() }

    pub fn can(&self, capability: Capabilities) -> bool { self.capabilities.contains(capability) }
}

/// The four edge lists pinned dockables live in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PinnedDockables {
    pub left: Vec<NodeId>,
    pub right: Vec<NodeId>,
    pub top: Vec<NodeId>,
    pub bottom: Vec<NodeId>,
}

impl PinnedDockables {
    pub fn edge(&self, edge: Edge) -> &Vec<NodeId> {
        match edge {
            Edge::Left => &self.left,
            Edge::Right => &self.right,
            Edge::Top => &self.top,
            Edge::Bottom => &self.bottom,
        }
    }

    pub fn edge_mut(&mut self, edge: Edge) -> &mut Vec<NodeId> {
        match edge {
            Edge::Left => &mut self.left,
            Edge::Right => &mut self.right,
            Edge::Top => &mut self.top,
            Edge::Bottom => &mut self.bottom,
        }
    }

    pub fn edge_of(&self, node: NodeId) -> Option<Edge> {
        [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom]
            .into_iter()
            .find(|&edge| self.edge(edge).contains(&node))
    }

    pub fn remove(&mut self, node: NodeId) -> Option<Edge> {
        let edge = self.edge_of(node)?;
        self.edge_mut(edge).retain(|&n| n != node);
        Some(edge)
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.left.iter().chain(&self.right).chain(&self.top).chain(&self.bottom).copied()
    }
}

/// State only a root dock has.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RootState {
    pub hidden: Vec<NodeId>,
    pub pinned: PinnedDockables,
    /// Pinned dockable currently shown as an overlay.
    pub pinned_preview: Option<NodeId>,
    pub windows: Vec<WindowId>,
    pub focused: Option<NodeId>,
    /// The floating window this root is the layout of, if any.
    pub window: Option<WindowId>,
}

impl RootState {
    /// Whether `node` is parked on this root rather than in its visible tree.
    pub fn parks(&self, node: NodeId) -> bool {
        self.hidden.contains(&node) || self.pinned.edge_of(node).is_some()
    }
}
