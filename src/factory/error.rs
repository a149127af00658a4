use thiserror::Error;

use crate::model::{Capabilities, NodeId, WindowId, WindowState};

pub type DockResult<T> = Result<T, DockError>;

/// Why a factory operation was rejected. Every variant means the tree was left untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DockError {
    #[error("dockable not found: {0:?}")]
    NotFound(NodeId),
    #[error("window not found: {0:?}")]
    WindowNotFound(WindowId),
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] Violation),
    #[error("vetoed: {0}")]
    Vetoed(Lifecycle),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Violation {
    #[error("the last dockable of {0:?} cannot be closed")]
    LastDockable(NodeId),
    #[error("{0:?} cannot be moved into its own descendant {1:?}")]
    IntoDescendant(NodeId, NodeId),
    #[error("{0:?} is already a member of {1:?}")]
    AlreadyMember(NodeId, NodeId),
    #[error("{0:?} already has an owner")]
    AlreadyOwned(NodeId),
    #[error("{0:?} is not a member of {1:?}")]
    NotAMember(NodeId, NodeId),
    #[error("{0:?} cannot hold dockables")]
    NotAContainer(NodeId),
    #[error("splitter {0:?} only moves with its neighbours")]
    SplitterNotMovable(NodeId),
    #[error("{0:?} is not in a visible tree")]
    Detached(NodeId),
    #[error("a root dock cannot be split")]
    CannotSplitRoot,
    #[error("splitting {0:?} would leave it empty")]
    SplitWouldEmptyTarget(NodeId),
    #[error("{1:?} is not permitted on {0:?}")]
    NotPermitted(NodeId, Capabilities),
    #[error("{0:?} is already pinned or hidden")]
    AlreadyParked(NodeId),
    #[error("{0:?} is not pinned")]
    NotPinned(NodeId),
    #[error("{0:?} is not hidden")]
    NotHidden(NodeId),
    #[error("{0:?} is not a splitter between two resizable members")]
    NotASplitter(NodeId),
    #[error("{0:?} cannot create documents")]
    CannotCreateDocument(NodeId),
    #[error("window cannot go from {from} to {to}")]
    InvalidTransition { from: WindowState, to: WindowState },
}

/// The lifecycle step an observer refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    #[error("closing dockable {0:?}")]
    CloseDockable(NodeId),
    #[error("closing window {0:?}")]
    CloseWindow(WindowId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    InvariantViolation,
    VetoedLifecycle,
    NotFound,
}

impl DockError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DockError::NotFound(_) | DockError::WindowNotFound(_) => ErrorCategory::NotFound,
            DockError::InvariantViolation(_) => ErrorCategory::InvariantViolation,
            DockError::Vetoed(_) => ErrorCategory::VetoedLifecycle,
        }
    }
}
