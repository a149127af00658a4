use crate::model::tree::NodeId;
use crate::model::window::{HostHandle, WindowId};

/// What is currently active across every root and window the factory manages.
///
/// Only the factory's transition functions update this; each returns whether anything
/// changed so listeners are told once per real change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackingState {
    pub dockable: Option<NodeId>,
    pub root: Option<NodeId>,
    pub window: Option<WindowId>,
    pub host: Option<HostHandle>,
}

impl TrackingState {
    pub fn track_dockable(
        &mut self,
        dockable: NodeId,
        root: Option<NodeId>,
        window: Option<WindowId>,
        host: Option<HostHandle>,
    ) -> bool {
        self.replace(TrackingState {
            dockable: Some(dockable),
            root,
            window,
            host,
        })
    }

    /// Activating a root keeps the tracked dockable only if it lives under that root.
    pub fn track_root(
        &mut self,
        root: NodeId,
        dockable: Option<NodeId>,
        window: Option<WindowId>,
        host: Option<HostHandle>,
    ) -> bool {
        self.replace(TrackingState { dockable, root: Some(root), window, host })
    }

    /// Clears everything, but only when `window` is the tracked one.
    pub fn clear_window(&mut self, window: WindowId) -> bool {
        if self.window != Some(window) {
            return false;
        }
        self.replace(TrackingState::default())
    }

    /// Drops references to a node that left the forest.
    pub fn forget(&mut self, node: NodeId) -> bool {
        let mut next = *self;
        if next.dockable == Some(node) {
            next.dockable = None;
        }
        if next.root == Some(node) {
            next = TrackingState::default();
        }
        self.replace(next)
    }

    fn replace(&mut self, next: TrackingState) -> bool {
        if *self == next {
            return false;
        }
        *self = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_reports_only_real_changes() {
        let mut nodes = slotmap::SlotMap::<NodeId, ()>::with_key();
        let (root, doc) = (nodes.insert(()), nodes.insert(()));
        let mut windows = slotmap::SlotMap::<WindowId, ()>::with_key();
        let (w1, w2) = (windows.insert(()), windows.insert(()));

        let mut t = TrackingState::default();
        assert!(t.track_dockable(doc, Some(root), Some(w1), None));
        assert!(!t.track_dockable(doc, Some(root), Some(w1), None));

        assert!(!t.clear_window(w2));
        assert_eq!(t.dockable, Some(doc));
        assert!(t.clear_window(w1));
        assert_eq!(t, TrackingState::default());
    }

    #[test]
    fn forgetting_the_root_clears_everything() {
        let mut nodes = slotmap::SlotMap::<NodeId, ()>::with_key();
        let (root, doc) = (nodes.insert(()), nodes.insert(()));
        let mut t = TrackingState::default();
        t.track_dockable(doc, Some(root), None, None);
        assert!(t.forget(doc));
        assert_eq!(t.root, Some(root));
        assert!(t.forget(root));
        assert_eq!(t, TrackingState::default());
        assert!(!t.forget(root));
    }
}
