//! Saving and loading layouts.
//!
//! [`capture`] walks a [`DockModel`] into a [`LayoutSnapshot`], a plain serde tree that any
//! format can carry; [`restore`] checks a snapshot and builds a model from it for
//! [`Factory::init_layout`]. RON is the format used on disk.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::common::collections::HashMap;
use crate::common::geometry::Rect;
use crate::factory::Factory;
use crate::layout_engine::Edge;
use crate::model::{
    Capabilities, CapabilityOverride, DockKind, DockModel, DockWindow, Dockable, KindTag, NodeId,
    WindowId, WindowOptions,
};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LayoutSnapshot {
    #[serde(default = "format_version")]
    pub version: u32,
    pub root: DockableSnapshot,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DockableSnapshot {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub kind: DockKind,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<CapabilityOverride>,
    /// `None` while unassigned.
    #[serde(default)]
    pub proportion: Option<f64>,
    #[serde(default)]
    pub min_size: f64,
    /// `None` takes the kind's default.
    #[serde(default)]
    pub is_collapsable: Option<bool>,
    #[serde(default = "yes")]
    pub can_close_last_dockable: bool,
    /// Index of the active member in `children`.
    #[serde(default)]
    pub active: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DockableSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<RootSnapshot>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RootSnapshot {
    #[serde(default)]
    pub hidden: Vec<ParkedSnapshot>,
    #[serde(default)]
    pub pinned: PinnedSnapshot,
    /// Single pinned list written before pins were kept per edge. Sorted onto edges on load.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pinned_dockables: Vec<ParkedSnapshot>,
    #[serde(default)]
    pub windows: Vec<WindowSnapshot>,
    #[serde(default)]
    pub focused: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PinnedSnapshot {
    #[serde(default)]
    pub left: Vec<ParkedSnapshot>,
    #[serde(default)]
    pub right: Vec<ParkedSnapshot>,
    #[serde(default)]
    pub top: Vec<ParkedSnapshot>,
    #[serde(default)]
    pub bottom: Vec<ParkedSnapshot>,
}

impl PinnedSnapshot {
    fn edge(&self, edge: Edge) -> &Vec<ParkedSnapshot> {
        match edge {
            Edge::Left => &self.left,
            Edge::Right => &self.right,
            Edge::Top => &self.top,
            Edge::Bottom => &self.bottom,
        }
    }

    fn edge_mut(&mut self, edge: Edge) -> &mut Vec<ParkedSnapshot> {
        match edge {
            Edge::Left => &mut self.left,
            Edge::Right => &mut self.right,
            Edge::Top => &mut self.top,
            Edge::Bottom => &mut self.bottom,
        }
    }
}

/// A pinned or hidden dockable and the id of the dock it goes back to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParkedSnapshot {
    pub dockable: DockableSnapshot,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub frame: Rect,
    #[serde(default)]
    pub options: WindowOptions,
    #[serde(default)]
    pub topmost: bool,
    #[serde(default)]
    pub parent: Option<String>,
    pub layout: DockableSnapshot,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("unsupported layout version {0}")]
    UnsupportedVersion(u32),
    #[error("{0:?} is a {1} where a root is required")]
    NotARoot(String, KindTag),
    #[error("{0:?} is a {1} and cannot hold dockables")]
    NotAContainer(String, KindTag),
    #[error("id {0:?} is used more than once")]
    DuplicateId(String),
    #[error("proportion {1} of {0:?} is outside 0..=1")]
    BadProportion(String, f64),
    #[error("proportions in {0:?} sum to {1}")]
    UnbalancedProportions(String, f64),
    #[error("root {0:?} is nested inside another dock")]
    NestedRoot(String),
    #[error("active member {index} of {id:?} does not exist")]
    ActiveOutOfRange { id: String, index: usize },
    #[error("focused dockable {0:?} is not in its layout")]
    UnknownFocus(String),
    #[error("parent window {0:?} does not exist")]
    UnknownWindow(String),
}

fn format_version() -> u32 { FORMAT_VERSION }
fn yes() -> bool { true }

/// Snapshot of the main root together with its parked dockables and floating windows.
pub fn capture(model: &DockModel) -> LayoutSnapshot {
    LayoutSnapshot {
        version: FORMAT_VERSION,
        root: capture_node(model, model.root()).unwrap_or_else(|| DockableSnapshot::from(&Dockable::root("root"))),
    }
}

fn capture_node(model: &DockModel, node: NodeId) -> Option<DockableSnapshot> {
    let d = model.get(node)?;
    let members: Vec<NodeId> = model.visible_dockables(node).collect();
    let mut snap = DockableSnapshot::from(d);
    snap.overrides = model.tree.data.overrides.get(node).copied();
    snap.active = d.active_dockable.and_then(|a| members.iter().position(|&m| m == a));
    snap.children = members.iter().filter_map(|&m| capture_node(model, m)).collect();
    snap.root = model.root_state(node).map(|state| {
        let mut pinned = PinnedSnapshot::default();
        for edge in [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom] {
            *pinned.edge_mut(edge) = state.pinned.edge(edge).iter().filter_map(|&n| capture_parked(model, n)).collect();
        }
        RootSnapshot {
            hidden: state.hidden.iter().filter_map(|&n| capture_parked(model, n)).collect(),
            pinned,
            pinned_dockables: vec![],
            windows: state.windows.iter().filter_map(|&w| capture_window(model, w)).collect(),
            focused: state.focused.and_then(|f| model.get(f)).map(|f| f.id.clone()),
        }
    });
    Some(snap)
}

fn capture_parked(model: &DockModel, node: NodeId) -> Option<ParkedSnapshot> {
    let owner = model.get(node)?.owner.and_then(|o| model.get(o)).map(|o| o.id.clone());
    Some(ParkedSnapshot { dockable: capture_node(model, node)?, owner })
}

fn capture_window(model: &DockModel, window: WindowId) -> Option<WindowSnapshot> {
    let w = model.window(window).filter(|w| w.state.is_open())?;
    Some(WindowSnapshot {
        id: w.id.clone(),
        title: w.title.clone(),
        frame: w.frame,
        options: w.options,
        topmost: w.topmost,
        parent: w.parent_window.and_then(|p| model.window(p)).map(|p| p.id.clone()),
        layout: capture_node(model, w.layout)?,
    })
}

impl From<&Dockable> for DockableSnapshot {
    fn from(d: &Dockable) -> Self {
        DockableSnapshot {
            id: d.id.clone(),
            title: d.title.clone(),
            kind: d.kind.clone(),
            capabilities: d.capabilities,
            overrides: None,
            proportion: d.has_proportion().then_some(d.proportion),
            min_size: d.min_size,
            is_collapsable: Some(d.is_collapsable),
            can_close_last_dockable: d.can_close_last_dockable,
            active: None,
            bounds: d.bounds,
            children: vec![],
            root: None,
        }
    }
}

impl From<&DockableSnapshot> for Dockable {
    fn from(s: &DockableSnapshot) -> Self {
        let mut d = Dockable::new(s.id.as_str(), s.title.as_str(), s.kind.clone())
            .with_capabilities(s.capabilities)
            .with_min_size(s.min_size)
            .with_can_close_last_dockable(s.can_close_last_dockable)
            .with_proportion(s.proportion.unwrap_or(f64::NAN));
        if let Some(collapsable) = s.is_collapsable {
            d.is_collapsable = collapsable;
        }
        d.bounds = s.bounds;
        d
    }
}

/// Builds a model from `snapshot`, rejecting anything that would not be a well-formed tree.
pub fn restore(snapshot: &LayoutSnapshot) -> Result<DockModel, SnapshotError> {
    if snapshot.version > FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version));
    }
    let root = &snapshot.root;
    if !root.kind.is_root() {
        return Err(SnapshotError::NotARoot(root.id.clone(), root.kind.tag()));
    }
    let mut r = Restorer {
        model: DockModel::with_root(Dockable::from(root)),
        ids: HashMap::default(),
        parked: vec![],
        parents: vec![],
        focus: vec![],
    };
    let top = r.model.root();
    r.fill(top, root)?;
    r.finish()
}

enum Place {
    Hidden,
    Pinned(Edge),
    /// Flat pinned list; the edge comes from the owner's alignment.
    Legacy,
}

struct Parked {
    node: NodeId,
    root: NodeId,
    owner: Option<String>,
    place: Place,
}

struct Restorer {
    model: DockModel,
    ids: HashMap<String, NodeId>,
    parked: Vec<Parked>,
    parents: Vec<(WindowId, String)>,
    focus: Vec<(NodeId, String)>,
}

impl Restorer {
    fn node(&mut self, snap: &DockableSnapshot, parent: Option<NodeId>) -> Result<NodeId, SnapshotError> {
        let node = match parent {
            Some(parent) => self.model.insert(parent, Dockable::from(snap)),
            None => self.model.create(Dockable::from(snap)),
        };
        self.fill(node, snap)?;
        Ok(node)
    }

    fn fill(&mut self, node: NodeId, snap: &DockableSnapshot) -> Result<(), SnapshotError> {
        if self.ids.insert(snap.id.clone(), node).is_some() {
            return Err(SnapshotError::DuplicateId(snap.id.clone()));
        }
        if let Some(p) = snap.proportion
            && !(0.0..=1.0).contains(&p)
        {
            return Err(SnapshotError::BadProportion(snap.id.clone(), p));
        }
        if !snap.children.is_empty() && !snap.kind.is_container() {
            return Err(SnapshotError::NotAContainer(snap.id.clone(), snap.kind.tag()));
        }
        if let Some(over) = snap.overrides {
            self.model.set_override(node, over);
        }
        for child in &snap.children {
            if child.kind.is_root() {
                return Err(SnapshotError::NestedRoot(child.id.clone()));
            }
            self.node(child, Some(node))?;
        }
        if let Some(sum) = self.model.unbalanced_sum(node) {
            return Err(SnapshotError::UnbalancedProportions(snap.id.clone(), sum));
        }
        let active = match snap.active {
            Some(index) => Some(node.children(self.model.map()).nth(index).ok_or_else(|| {
                SnapshotError::ActiveOutOfRange { id: snap.id.clone(), index }
            })?),
            None => None,
        };
        self.model.tree.data.set_active(node, active);

        if let Some(state) = &snap.root {
            if !snap.kind.is_root() {
                return Err(SnapshotError::NotARoot(snap.id.clone(), snap.kind.tag()));
            }
            self.root_state(node, state)?;
        }
        Ok(())
    }

    fn root_state(&mut self, root: NodeId, state: &RootSnapshot) -> Result<(), SnapshotError> {
        let pinned = [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom]
            .into_iter()
            .flat_map(|edge| state.pinned.edge(edge).iter().map(move |p| (p, Place::Pinned(edge))));
        let parked = state
            .hidden
            .iter()
            .map(|p| (p, Place::Hidden))
            .chain(pinned)
            .chain(state.pinned_dockables.iter().map(|p| (p, Place::Legacy)));
        for (p, place) in parked {
            if p.dockable.kind.is_root() {
                return Err(SnapshotError::NestedRoot(p.dockable.id.clone()));
            }
            let node = self.node(&p.dockable, None)?;
            self.parked.push(Parked { node, root, owner: p.owner.clone(), place });
        }

        for w in &state.windows {
            if !w.layout.kind.is_root() {
                return Err(SnapshotError::NotARoot(w.layout.id.clone(), w.layout.kind.tag()));
            }
            let layout = self.node(&w.layout, None)?;
            let mut entry = DockWindow::new(w.id.as_str(), w.frame, layout, root);
            entry.title = w.title.clone();
            entry.options = w.options;
            entry.topmost = w.topmost;
            let window = self.model.windows.insert(entry);
            if let Some(s) = self.model.root_state_mut(layout) {
                s.window = Some(window);
            }
            if let Some(s) = self.model.root_state_mut(root) {
                s.windows.push(window);
            }
            if let Some(parent) = &w.parent {
                self.parents.push((window, parent.clone()));
            }
        }

        if let Some(focused) = &state.focused {
            self.focus.push((root, focused.clone()));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<DockModel, SnapshotError> {
        for Parked { node, root, owner, place } in std::mem::take(&mut self.parked) {
            let owner = match owner.as_ref().and_then(|o| self.ids.get(o)) {
                Some(&o) if self.model.is_container(o) => o,
                _ => {
                    if owner.is_some() {
                        warn!(?owner, "owner of a parked dockable is missing, using its root");
                    }
                    root
                }
            };
            if let Some(d) = self.model.get_mut(node) {
                d.owner = Some(owner);
            }
            let edge = match place {
                Place::Hidden => None,
                Place::Pinned(edge) => Some(edge),
                Place::Legacy => Some(match self.model.get(owner).map(|o| &o.kind) {
                    Some(DockKind::ToolDock { alignment, .. }) => *alignment,
                    _ => Edge::default(),
                }),
            };
            let Some(state) = self.model.root_state_mut(root) else { continue };
            match edge {
                Some(edge) => state.pinned.edge_mut(edge).push(node),
                None => state.hidden.push(node),
            }
        }

        for (window, parent) in std::mem::take(&mut self.parents) {
            let found = self.model.windows().find(|(_, w)| w.id == parent).map(|(id, _)| id);
            let Some(found) = found else {
                return Err(SnapshotError::UnknownWindow(parent));
            };
            if let Some(w) = self.model.window_mut(window) {
                w.parent_window = Some(found);
            }
        }

        for (root, id) in std::mem::take(&mut self.focus) {
            let node = self
                .ids
                .get(&id)
                .copied()
                .filter(|&n| n == root || self.model.is_descendant_of(n, root))
                .ok_or_else(|| SnapshotError::UnknownFocus(id.clone()))?;
            if let Some(d) = self.model.get_mut(node) {
                d.is_focused = true;
            }
            if let Some(state) = self.model.root_state_mut(root) {
                state.focused = Some(node);
            }
        }

        debug!(nodes = self.ids.len(), "layout restored");
        Ok(self.model)
    }
}

impl Factory {
    pub fn snapshot(&self) -> LayoutSnapshot { capture(self.model()) }

    /// Replaces the whole layout with `snapshot`. Nothing changes if it is rejected.
    pub fn restore_snapshot(&mut self, snapshot: &LayoutSnapshot) -> Result<(), SnapshotError> {
        let model = restore(snapshot)?;
        self.init_layout(model);
        Ok(())
    }
}

pub fn to_ron_string(snapshot: &LayoutSnapshot) -> anyhow::Result<String> {
    Ok(ron::ser::to_string_pretty(snapshot, ron::ser::PrettyConfig::default())?)
}

pub fn from_ron_str(text: &str) -> anyhow::Result<LayoutSnapshot> { Ok(ron::from_str(text)?) }

pub fn save_ron(snapshot: &LayoutSnapshot, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let text = to_ron_string(snapshot)?;
    File::create(path)
        .and_then(|mut f| f.write_all(text.as_bytes()))
        .with_context(|| format!("writing layout to {}", path.display()))?;
    info!(path = %path.display(), "layout saved");
    Ok(())
}

pub fn load_ron(path: &Path) -> anyhow::Result<LayoutSnapshot> {
    let mut buf = String::new();
    File::open(path)
        .and_then(|mut f| f.read_to_string(&mut buf))
        .with_context(|| format!("reading layout from {}", path.display()))?;
    from_ron_str(&buf).with_context(|| format!("parsing layout in {}", path.display()))
}
