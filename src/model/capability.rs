use serde::{Deserialize, Serialize};

use crate::model::DockModel;
use crate::model::dockable::Capabilities;
use crate::model::tree::NodeId;

/// Explicit per-node decision for some capabilities. Bits in neither set are left to
/// ancestors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOverride {
    pub allow: Capabilities,
    pub deny: Capabilities,
}

impl CapabilityOverride {
    pub fn allow(capabilities: Capabilities) -> Self {
        CapabilityOverride { allow: capabilities, deny: Capabilities::empty() }
    }

    pub fn deny(capabilities: Capabilities) -> Self {
        CapabilityOverride { allow: Capabilities::empty(), deny: capabilities }
    }

    fn decides(&self, capability: Capabilities) -> Option<bool> {
        if self.deny.contains(capability) {
            Some(false)
        } else if self.allow.contains(capability) {
            Some(true)
        } else {
            None
        }
    }
}

impl DockModel {
    pub fn set_override(&mut self, node: NodeId, over: CapabilityOverride) {
        if self.contains(node) {
            self.tree.data.overrides.insert(node, over);
        }
    }

    pub fn clear_override(&mut self, node: NodeId) { self.tree.data.overrides.remove(node); }

    /// Whether `capability` is available on `node`.
    ///
    /// The node's own flags must allow it; then the nearest override along the owner chain
    /// (starting at the node itself) decides, and without one the answer is yes.
    pub fn can(&self, node: NodeId, capability: Capabilities) -> bool {
        let Some(dockable) = self.get(node) else {
            return false;
        };
        if !dockable.can(capability) {
            return false;
        }
        self.owner_chain(node)
            .find_map(|n| self.tree.data.overrides.get(n).and_then(|o| o.decides(capability)))
            .unwrap_or(true)
    }

    pub fn effective_capabilities(&self, node: NodeId) -> Capabilities {
        Capabilities::all()
            .iter()
            .filter(|&c| self.can(node, c))
            .fold(Capabilities::empty(), |acc, c| acc | c)
    }
}
