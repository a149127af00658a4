//! Collaborators the factory calls out to.

use tracing::trace;

use crate::model::{DockModel, DockWindow, Dockable, HostHandle, NodeId, WindowId};

/// Creates and drives the native windows floating layouts are shown in.
pub trait WindowHost {
    fn create_host_window(&mut self, window: WindowId, entry: &DockWindow) -> HostHandle;
    fn present(&mut self, handle: HostHandle, is_dialog: bool);
    fn set_position(&mut self, handle: HostHandle, x: f64, y: f64);
    fn set_size(&mut self, handle: HostHandle, width: f64, height: f64);
    fn set_title(&mut self, handle: HostHandle, title: &str);
    fn close(&mut self, handle: HostHandle);
}

/// Host without any native windows; hands out sequential handles.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    next: u64,
}

impl WindowHost for HeadlessHost {
    fn create_host_window(&mut self, window: WindowId, entry: &DockWindow) -> HostHandle {
        self.next += 1;
        trace!(?window, id = %entry.id, handle = self.next, "create host window");
        HostHandle(self.next)
    }

    fn present(&mut self, handle: HostHandle, is_dialog: bool) {
        trace!(?handle, is_dialog, "present");
    }

    fn set_position(&mut self, handle: HostHandle, x: f64, y: f64) {
        trace!(?handle, x, y, "set position");
    }

    fn set_size(&mut self, handle: HostHandle, width: f64, height: f64) {
        trace!(?handle, width, height, "set size");
    }

    fn set_title(&mut self, handle: HostHandle, title: &str) {
        trace!(?handle, title, "set title");
    }

    fn close(&mut self, handle: HostHandle) {
        trace!(?handle, "close");
    }
}

/// Gets a say before something is closed. Returning `false` vetoes the close.
pub trait LifecycleObserver {
    fn dockable_closing(&mut self, _model: &DockModel, _dockable: NodeId) -> bool { true }

    fn window_closing(&mut self, _model: &DockModel, _window: WindowId) -> bool { true }
}

/// Produces a new document for a document dock.
pub type DocumentFactory = Box<dyn FnMut(&DockModel, NodeId) -> Option<Dockable>>;
