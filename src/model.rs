//! The docking tree and everything hanging off it.
//!
//! [`DockModel`] is read-only from the outside: structural changes go through
//! [`Factory`](crate::factory::Factory). The one exception is [`DockModel::insert`], used to
//! assemble a layout before it is handed to the factory.

pub mod capability;
pub mod dockable;
pub mod tracking;
pub mod tree;
pub mod window;

use slotmap::{SecondaryMap, SlotMap};
use tracing::trace;

pub use self::capability::CapabilityOverride;
pub use self::dockable::{Capabilities, DockKind, Dockable, KindTag, PinnedDockables, RootState};
pub use self::tracking::TrackingState;
pub use self::tree::NodeId;
use self::tree::{NodeMap, Observer, Tree};
pub use self::window::{DockWindow, HostHandle, OwnerMode, WindowId, WindowOptions, WindowState};
use crate::layout_engine::proportional::{self, EPSILON};
pub use crate::layout_engine::{Edge, Orientation};

/// Per-node data, kept in step with the tree structure by the [`Observer`] callbacks.
#[derive(Default)]
pub struct Components {
    pub dockables: SecondaryMap<NodeId, Dockable>,
    pub roots: SecondaryMap<NodeId, RootState>,
    pub overrides: SecondaryMap<NodeId, CapabilityOverride>,
}

impl Components {
    fn is_splitter(&self, node: NodeId) -> bool {
        self.dockables.get(node).is_some_and(|d| d.kind.is_splitter())
    }

    pub(crate) fn set_active(&mut self, parent: NodeId, active: Option<NodeId>) {
        let previous = match self.dockables.get_mut(parent) {
            Some(p) => std::mem::replace(&mut p.active_dockable, active),
            None => return,
        };
        if let Some(prev) = previous
            && let Some(d) = self.dockables.get_mut(prev)
        {
            d.is_active = false;
        }
        if let Some(next) = active
            && let Some(d) = self.dockables.get_mut(next)
        {
            d.is_active = true;
        }
    }
}

impl Observer for Components {
    fn added_to_forest(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn added_to_parent(&mut self, map: &NodeMap, node: NodeId) {
        let Some(parent) = node.parent(map) else { return };
        if let Some(d) = self.dockables.get_mut(node) {
            d.owner = Some(parent);
        }
        let has_active = self.dockables.get(parent).is_some_and(|p| p.active_dockable.is_some());
        if !has_active && !self.is_splitter(node) {
            self.set_active(parent, Some(node));
        }
    }

    // The owner back-reference is left alone: pinned and hidden dockables remember it.
    fn removing_from_parent(&mut self, map: &NodeMap, node: NodeId) {
        let Some(parent) = node.parent(map) else { return };
        if self.dockables.get(parent).and_then(|p| p.active_dockable) != Some(node) {
            return;
        }
        let mut after = std::iter::successors(node.next_sibling(map), |n| n.next_sibling(map));
        let mut before = std::iter::successors(node.prev_sibling(map), |n| n.prev_sibling(map));
        let next = after
            .find(|&n| !self.is_splitter(n))
            .or_else(|| before.find(|&n| !self.is_splitter(n)));
        self.set_active(parent, next);
    }

    fn removed_from_forest(&mut self, _map: &NodeMap, node: NodeId) {
        self.dockables.remove(node);
        self.roots.remove(node);
        self.overrides.remove(node);
    }
}

pub struct DockModel {
    pub(crate) tree: Tree<Components>,
    pub(crate) windows: SlotMap<WindowId, DockWindow>,
    root: NodeId,
}

impl DockModel {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self::with_root(Dockable::root(root_id))
    }

    pub fn with_root(root: Dockable) -> Self {
        let mut model = DockModel {
            tree: Tree::with_observer(Components::default()),
            windows: SlotMap::default(),
            root: NodeId::default(),
        };
        let mut root = root;
        root.kind = DockKind::Root;
        model.root = model.create(root);
        model
    }

    /// The main layout's root.
    pub fn root(&self) -> NodeId { self.root }

    pub fn map(&self) -> &NodeMap { &self.tree.map }

    pub fn contains(&self, node: NodeId) -> bool { self.tree.data.dockables.contains_key(node) }

    pub fn get(&self, node: NodeId) -> Option<&Dockable> { self.tree.data.dockables.get(node) }

    pub(crate) fn get_mut(&mut self, node: NodeId) -> Option<&mut Dockable> {
        self.tree.data.dockables.get_mut(node)
    }

    pub fn root_state(&self, root: NodeId) -> Option<&RootState> { self.tree.data.roots.get(root) }

    pub(crate) fn root_state_mut(&mut self, root: NodeId) -> Option<&mut RootState> {
        self.tree.data.roots.get_mut(root)
    }

    pub fn window(&self, window: WindowId) -> Option<&DockWindow> { self.windows.get(window) }

    pub(crate) fn window_mut(&mut self, window: WindowId) -> Option<&mut DockWindow> {
        self.windows.get_mut(window)
    }

    pub fn windows(&self) -> impl Iterator<Item = (WindowId, &DockWindow)> { self.windows.iter() }

    /// Adds a dockable to the forest without a parent.
    pub fn create(&mut self, dockable: Dockable) -> NodeId {
        let id = self.tree.mk_node().into_id();
        if dockable.kind.is_root() {
            self.tree.data.roots.insert(id, RootState::default());
        }
        self.tree.data.dockables.insert(id, dockable);
        id
    }

    /// Appends a new dockable under `parent`. Intended for assembling layouts; proportions
    /// and splitters are left exactly as given.
    pub fn insert(&mut self, parent: NodeId, dockable: Dockable) -> NodeId {
        let id = self.create(dockable);
        id.detach(&mut self.tree).push_back(parent)
    }

    /// Ordered members of a dock, splitters included.
    pub fn visible_dockables(&self, dock: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        dock.children(&self.tree.map)
    }

    /// Members of a dock that are not splitters.
    pub fn content_dockables(&self, dock: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        dock.children(&self.tree.map).filter(|&c| !self.is_splitter(c))
    }

    pub fn is_splitter(&self, node: NodeId) -> bool { self.tree.data.is_splitter(node) }

    pub fn is_root(&self, node: NodeId) -> bool { self.tree.data.roots.contains_key(node) }

    pub fn is_leaf(&self, node: NodeId) -> bool { self.get(node).is_some_and(|d| d.kind.is_leaf()) }

    pub fn is_container(&self, node: NodeId) -> bool {
        self.get(node).is_some_and(|d| d.kind.is_container())
    }

    /// Every root the model knows about: the main one first, then window layouts in
    /// registration order (depth first through windows opened from windows).
    pub fn roots(&self) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![self.root];
        while let Some(root) = stack.pop() {
            out.push(root);
            if let Some(state) = self.root_state(root) {
                for &w in state.windows.iter().rev() {
                    if let Some(window) = self.windows.get(w) {
                        stack.push(window.layout);
                    }
                }
            }
        }
        out
    }

    /// Depth-first search over every root, each root's visible tree before its hidden and
    /// pinned dockables.
    pub fn find_dockable(&self, mut predicate: impl FnMut(NodeId, &Dockable) -> bool) -> Option<NodeId> {
        for root in self.roots() {
            let parked = self.root_state(root).into_iter().flat_map(|s| {
                s.hidden.iter().copied().chain(s.pinned.iter()).collect::<Vec<_>>()
            });
            let found = std::iter::once(root)
                .chain(parked)
                .flat_map(|top| top.traverse_preorder(&self.tree.map))
                .find(|&n| self.get(n).is_some_and(|d| predicate(n, d)));
            if found.is_some() {
                return found;
            }
        }
        None
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeId> { self.find_dockable(|_, d| d.id == id) }

    /// The dockable itself followed by its owners up to the root.
    pub fn owner_chain(&self, node: NodeId) -> OwnerChain<'_> {
        OwnerChain {
            model: self,
            start: node,
            next: self.contains(node).then_some(node),
            budget: self.tree.map.len(),
        }
    }

    /// Whether `node` sits strictly below `ancestor` in the structural tree.
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        node != ancestor && node.ancestors(&self.tree.map).any(|a| a == ancestor)
    }

    /// The root whose tree (visible or parked) holds `node`.
    pub fn root_of(&self, node: NodeId) -> Option<NodeId> {
        self.owner_chain(node).find_map(|n| {
            let top = n.ancestors(&self.tree.map).last()?;
            self.is_root(top).then_some(top)
        })
    }

    pub fn window_of(&self, node: NodeId) -> Option<WindowId> {
        self.root_of(node).and_then(|r| self.root_state(r)).and_then(|s| s.window)
    }

    pub fn pinned_edge(&self, node: NodeId) -> Option<Edge> {
        let root = self.root_of(node)?;
        self.root_state(root)?.pinned.edge_of(node)
    }

    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.root_of(node)
            .and_then(|r| self.root_state(r))
            .is_some_and(|s| s.hidden.contains(&node))
    }

    /// Pinned or hidden: out of the visible tree but remembered by its root.
    pub fn is_parked(&self, node: NodeId) -> bool {
        self.root_of(node)
            .and_then(|r| self.root_state(r))
            .is_some_and(|s| s.parks(node))
    }

    /// Whether some parked dockable still points at `dock` as the place to go back to.
    pub fn is_remembered_owner(&self, dock: NodeId) -> bool {
        self.tree.data.roots.values().any(|state| {
            state
                .hidden
                .iter()
                .copied()
                .chain(state.pinned.iter())
                .any(|n| self.get(n).and_then(|d| d.owner) == Some(dock))
        })
    }

    /// Collapsed docks take no space: a collapsable container without any non-collapsed
    /// content, or an auto-hide tool dock that is not expanded.
    pub fn is_collapsed(&self, node: NodeId) -> bool {
        let Some(d) = self.get(node) else { return true };
        if let DockKind::ToolDock { auto_hide: true, is_expanded: false, .. } = d.kind {
            return true;
        }
        d.kind.is_container()
            && d.is_collapsable
            && self.content_dockables(node).all(|c| self.is_collapsed(c))
    }

    /// Proportion slots for the members of `dock`, in order.
    pub fn slots(&self, dock: NodeId) -> Vec<proportional::Slot> {
        self.visible_dockables(dock)
            .map(|c| {
                let d = self.get(c);
                let proportion = d.map_or(f64::NAN, |d| d.proportion);
                let min_size = d.map_or(0.0, |d| d.min_size);
                let slot = if self.is_splitter(c) {
                    proportional::Slot::splitter()
                } else if self.is_collapsed(c) {
                    proportional::Slot::collapsed(proportion)
                } else {
                    proportional::Slot::content(proportion)
                };
                slot.with_min_size(min_size)
            })
            .collect()
    }

    /// The content proportion sum of a proportional `dock`, if it is off. Unassigned
    /// members may take up the rest later, so with any of them a sum below 1 is fine.
    pub fn unbalanced_sum(&self, dock: NodeId) -> Option<f64> {
        if !matches!(self.get(dock)?.kind, DockKind::Proportional { .. }) {
            return None;
        }
        let slots = self.slots(dock);
        let content: Vec<f64> = slots.iter().filter(|s| s.is_content()).map(|s| s.proportion).collect();
        if content.iter().all(|p| p.is_nan()) {
            return None;
        }
        let sum = proportional::content_sum(&slots);
        let unassigned = content.iter().any(|p| p.is_nan());
        let off = if unassigned { sum > 1.0 + EPSILON } else { (sum - 1.0).abs() > EPSILON };
        off.then_some(sum)
    }

    /// Structural problems, one line each. Empty means the model is consistent.
    pub fn violations(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let map = &self.tree.map;
        for root in self.roots() {
            for node in root.traverse_preorder(map) {
                let Some(d) = self.get(node) else {
                    issues.push(format!("{node:?} has no dockable data"));
                    continue;
                };
                if let Some(parent) = node.parent(map)
                    && d.owner != Some(parent)
                {
                    issues.push(format!("{} is visible in {parent:?} but owned by {:?}", d.id, d.owner));
                }
                if let Some(active) = d.active_dockable
                    && active.parent(map) != Some(node)
                {
                    issues.push(format!("{} has an active dockable that is not a member", d.id));
                }
                if d.kind.is_leaf() && !node.is_empty(map) {
                    issues.push(format!("{} is a {} with members", d.id, d.kind.tag()));
                }
                if d.kind.is_splitter() && !node.is_empty(map) {
                    issues.push(format!("splitter {} holds dockables", d.id));
                }
                if let Some(sum) = self.unbalanced_sum(node) {
                    issues.push(format!("proportions in {} sum to {sum}", d.id));
                }
            }
            if let Some(state) = self.root_state(root) {
                for parked in state.hidden.iter().copied().chain(state.pinned.iter()) {
                    if parked.parent(map).is_some() {
                        issues.push(format!("{parked:?} is parked but still visible"));
                    }
                }
                if let Some(focused) = state.focused
                    && !self.is_descendant_of(focused, root)
                {
                    issues.push(format!("focused dockable {focused:?} is not under its root"));
                }
            }
        }
        issues
    }

    pub fn draw_tree(&self, root: NodeId) -> String {
        let mut out = String::new();
        let _ = ascii_tree::write_tree(&mut out, &self.ascii_tree(root));
        out
    }

    fn ascii_tree(&self, node: NodeId) -> ascii_tree::Tree {
        let map = &self.tree.map;
        let status = match node.parent(map) {
            None => "",
            Some(parent) if self.get(parent).and_then(|p| p.active_dockable) == Some(node) => "☒ ",
            _ => "☐ ",
        };
        let desc = match self.get(node) {
            Some(d) if d.has_proportion() => {
                format!("{status}{} [{}] {:.3}", d.id, d.kind.tag(), d.proportion)
            }
            Some(d) => format!("{status}{} [{}]", d.id, d.kind.tag()),
            None => format!("{status}{node:?}"),
        };
        let children: Vec<_> = node.children(map).map(|c| self.ascii_tree(c)).collect();
        if children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            ascii_tree::Tree::Node(desc, children)
        }
    }
}

impl std::fmt::Debug for DockModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockModel")
            .field("root", &self.root)
            .field("nodes", &self.tree.map.len())
            .field("windows", &self.windows.len())
            .finish()
    }
}

/// Walks owner back-references from a dockable to its root.
///
/// Cloning gives an independent walk from the same position; [`OwnerChain::restart`] goes
/// back to the start. The walk is bounded by the number of nodes so a corrupted chain still
/// ends.
#[derive(Clone)]
pub struct OwnerChain<'a> {
    model: &'a DockModel,
    start: NodeId,
    next: Option<NodeId>,
    budget: usize,
}

impl<'a> OwnerChain<'a> {
    pub fn restart(&self) -> OwnerChain<'a> { self.model.owner_chain(self.start) }
}

impl Iterator for OwnerChain<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.next?;
        if self.budget == 0 {
            trace!(?node, "owner chain exceeded node count");
            self.next = None;
            return None;
        }
        self.budget -= 1;
        self.next = self.model.get(node).and_then(|d| d.owner);
        Some(node)
    }
}
