use serde::{Deserialize, Serialize};

use crate::common::geometry::Rect;
use crate::model::tree::NodeId;

slotmap::new_key_type! {
    /// A floating window owned by some root.
    pub struct WindowId;
}

/// Opaque handle the host hands back for the native window it created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostHandle(pub u64);

/// Who owns the native window a [`DockWindow`] is presented in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OwnerMode {
    /// No owner.
    #[default]
    Default,
    /// Owned by the application's main window.
    ParentWindow,
    /// Owned by the window hosting the dockable at the time it was floated.
    DockableWindow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowOptions {
    pub owner_mode: OwnerMode,
    pub is_modal: bool,
    pub show_in_taskbar: bool,
}

impl Default for WindowOptions {
    fn default() -> Self {
        WindowOptions {
            owner_mode: OwnerMode::Default,
            is_modal: false,
            show_in_taskbar: true,
        }
    }
}

/// Lifecycle of a floating window.
///
/// ```text
/// Created -> Presented -> Active <-> Inactive
///     \          \           \          /
///      `----------`---------> Closing -> Closed
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum WindowState {
    #[default]
    Created,
    Presented,
    Active,
    Inactive,
    Closing,
    Closed,
}

impl WindowState {
    pub fn can_transition_to(self, next: WindowState) -> bool {
        use WindowState::*;
        match (self, next) {
            (Created, Presented) => true,
            (Presented | Inactive, Active) => true,
            (Active, Inactive) => true,
            (Created | Presented | Active | Inactive, Closing) => true,
            (Closing, Closed) => true,
            _ => false,
        }
    }

    pub fn is_open(self) -> bool { !matches!(self, WindowState::Closing | WindowState::Closed) }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DockWindow {
    pub id: String,
    pub title: String,
    pub frame: Rect,
    /// Root dock holding this window's layout.
    pub layout: NodeId,
    /// Root this window is registered on.
    pub owner_root: NodeId,
    pub parent_window: Option<WindowId>,
    pub options: WindowOptions,
    pub topmost: bool,
    pub state: WindowState,
    pub host: Option<HostHandle>,
}

impl DockWindow {
    pub fn new(id: impl Into<String>, frame: Rect, layout: NodeId, owner_root: NodeId) -> Self {
        DockWindow {
            id: id.into(),
            title: String::new(),
            frame,
            layout,
            owner_root,
            parent_window: None,
            options: WindowOptions::default(),
            topmost: false,
            state: WindowState::Created,
            host: None,
        }
    }

    /// Moves to `next` if the lifecycle allows it, returning the state that was left.
    pub fn transition(&mut self, next: WindowState) -> Result<WindowState, WindowState> {
        if self.state.can_transition_to(next) {
            Ok(std::mem::replace(&mut self.state, next))
        } else {
            Err(self.state)
        }
    }
}
