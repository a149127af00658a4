use tracing::debug;

use crate::layout_engine::Edge;
use crate::model::{DockModel, NodeId, TrackingState, WindowId};

/// One semantic change to the layout, emitted after the change is applied.
#[derive(Clone, Debug, PartialEq, strum::IntoStaticStr)]
pub enum DockEvent {
    DockableAdded { dockable: NodeId, owner: NodeId, index: usize },
    DockableRemoved { dockable: NodeId, id: String, owner: Option<NodeId>, index: Option<usize> },
    DockableMoved { dockable: NodeId, from: NodeId, from_index: usize, to: NodeId, index: usize },
    DockableClosed { dockable: NodeId, id: String, owner: Option<NodeId>, index: Option<usize> },
    DockablePinned { dockable: NodeId, owner: Option<NodeId>, edge: Edge },
    DockableUnpinned { dockable: NodeId, owner: NodeId },
    DockableHidden { dockable: NodeId, owner: Option<NodeId> },
    DockableRestored { dockable: NodeId, owner: NodeId },
    PinnedPreviewChanged { root: NodeId, dockable: Option<NodeId> },
    ActiveDockableChanged { dockable: NodeId, previous: Option<NodeId> },
    FocusedDockableChanged { root: NodeId, dockable: NodeId, previous: Option<NodeId> },
    ProportionsChanged { dock: NodeId },
    WindowAdded { window: WindowId, root: NodeId },
    WindowRemoved { window: WindowId, root: NodeId },
    WindowOpened { window: WindowId },
    WindowClosing { window: WindowId },
    WindowClosed { window: WindowId },
    LayoutInitialized { root: NodeId },
}

/// Something a listener can narrow its subscription to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subject {
    Dockable(NodeId),
    Window(WindowId),
}

impl DockEvent {
    pub fn name(&self) -> &'static str { self.into() }

    /// Whether the event is about `subject`, either as the changed entity or as the container
    /// it moved out of or into.
    pub fn concerns(&self, subject: Subject) -> bool {
        use DockEvent::*;
        match subject {
            Subject::Dockable(node) => match self {
                DockableAdded { dockable, owner, .. } => *dockable == node || *owner == node,
                DockableRemoved { dockable, owner, .. } | DockableClosed { dockable, owner, .. } => {
                    *dockable == node || *owner == Some(node)
                }
                DockableMoved { dockable, from, to, .. } => {
                    *dockable == node || *from == node || *to == node
                }
                DockablePinned { dockable, owner, .. } | DockableHidden { dockable, owner } => {
                    *dockable == node || *owner == Some(node)
                }
                DockableUnpinned { dockable, owner } | DockableRestored { dockable, owner } => {
                    *dockable == node || *owner == node
                }
                PinnedPreviewChanged { root, dockable } => *root == node || *dockable == Some(node),
                ActiveDockableChanged { dockable, previous } => {
                    *dockable == node || *previous == Some(node)
                }
                FocusedDockableChanged { root, dockable, previous } => {
                    *root == node || *dockable == node || *previous == Some(node)
                }
                ProportionsChanged { dock } => *dock == node,
                WindowAdded { root, .. } | WindowRemoved { root, .. } => *root == node,
                LayoutInitialized { root } => *root == node,
                WindowOpened { .. } | WindowClosing { .. } | WindowClosed { .. } => false,
            },
            Subject::Window(w) => match self {
                WindowAdded { window, .. }
                | WindowRemoved { window, .. }
                | WindowOpened { window }
                | WindowClosing { window }
                | WindowClosed { window } => *window == w,
                _ => false,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&DockModel, &DockEvent)>;
pub type TrackingListener = Box<dyn FnMut(&TrackingState)>;

/// Synchronous fan-out of [`DockEvent`]s and tracking changes.
///
/// Listeners run in subscription order, on the caller's stack, and see the model as it is
/// right after the change.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Option<Subject>, Listener)>,
    tracking: Vec<(SubscriptionId, TrackingListener)>,
}

impl EventBus {
    pub fn subscribe(&mut self, listener: impl FnMut(&DockModel, &DockEvent) + 'static) -> SubscriptionId {
        self.add(None, Box::new(listener))
    }

    /// Only events that [concern](DockEvent::concerns) `subject` are delivered.
    pub fn subscribe_to(
        &mut self,
        subject: Subject,
        listener: impl FnMut(&DockModel, &DockEvent) + 'static,
    ) -> SubscriptionId {
        self.add(Some(subject), Box::new(listener))
    }

    pub fn on_tracking_changed(&mut self, listener: impl FnMut(&TrackingState) + 'static) -> SubscriptionId {
        let id = self.next();
        self.tracking.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len() + self.tracking.len();
        self.listeners.retain(|(i, ..)| *i != id);
        self.tracking.retain(|(i, _)| *i != id);
        before != self.listeners.len() + self.tracking.len()
    }

    pub fn emit(&mut self, model: &DockModel, event: DockEvent) {
        debug!(event = event.name(), ?event, "emit");
        for (_, subject, listener) in &mut self.listeners {
            if subject.is_none_or(|s| event.concerns(s)) {
                listener(model, &event);
            }
        }
    }

    pub fn emit_tracking(&mut self, state: &TrackingState) {
        debug!(?state, "tracking changed");
        for (_, listener) in &mut self.tracking {
            listener(state);
        }
    }

    fn add(&mut self, subject: Option<Subject>, listener: Listener) -> SubscriptionId {
        let id = self.next();
        self.listeners.push((id, subject, listener));
        id
    }

    fn next(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}
