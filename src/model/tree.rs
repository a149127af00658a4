use std::ops::{Index, IndexMut};

use slotmap::SlotMap;

/// N-ary forest of dock nodes.
///
/// Structure lives in [`NodeMap`]; everything a node *is* lives in the observer `O`, which is
/// told about every structural change so it can keep derived state (owners, active children)
/// consistent.
pub struct Tree<O> {
    pub map: NodeMap,
    pub data: O,
}

impl<O: Observer> Tree<O> {
    pub fn with_observer(data: O) -> Self { Tree { map: NodeMap::new(), data } }

    pub fn mk_node(&mut self) -> UnattachedNode<'_, O> {
        let id = self.map.map.insert(Node::default());
        self.data.added_to_forest(&self.map, id);
        UnattachedNode { id, tree: self }
    }
}

/// Map that holds the structure of the forest.
///
/// Several roots (the main layout, each floating window's layout, pinned and hidden
/// dockables) share one map so branches can move between them without copying.
pub struct NodeMap {
    map: SlotMap<NodeId, Node>,
}

impl NodeMap {
    fn new() -> NodeMap { NodeMap { map: SlotMap::default() } }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ { self.map.keys() }

    pub fn contains(&self, id: NodeId) -> bool { self.map.contains_key(id) }
}

impl Index<NodeId> for NodeMap {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output { &self.map[index] }
}

impl IndexMut<NodeId> for NodeMap {
    fn index_mut(&mut self, index: NodeId) -> &mut Self::Output { &mut self.map[index] }
}

slotmap::new_key_type! {
    /// A dockable somewhere in the forest.
    pub struct NodeId;
}

impl NodeId {
    #[track_caller]
    pub fn detach<'a, O: Observer>(self, tree: &'a mut Tree<O>) -> DetachedNode<'a, O> {
        DetachedNode { id: self, tree }
    }

    pub fn parent(self, map: &NodeMap) -> Option<NodeId> { map.map.get(self).and_then(|n| n.parent) }

    pub fn children(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        Siblings {
            cur: map.map.get(self).and_then(|n| n.first_child),
            step: |n: &Node| n.next_sibling,
            map,
        }
    }

    /// Position of this node among its parent's children.
    pub fn index_in_parent(self, map: &NodeMap) -> Option<usize> {
        let parent = self.parent(map)?;
        parent.children(map).position(|c| c == self)
    }

    pub fn traverse_preorder(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        PreorderTraversal { top: self, cur: Some(self), map }
    }

    /// Returns an iterator over all ancestors of the current node, including itself.
    pub fn ancestors(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let node = next;
            next = node.and_then(|n| n.parent(map));
            node
        })
    }

    pub fn next_sibling(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.next_sibling)
    }

    pub fn prev_sibling(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.prev_sibling)
    }

    pub fn first_child(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.first_child)
    }

    pub fn is_empty(self, map: &NodeMap) -> bool {
        map.map.get(self).map(|n| n.first_child.is_none()).unwrap_or(true)
    }
}

pub trait Observer
where Self: Sized {
    fn added_to_forest(&mut self, map: &NodeMap, node: NodeId);
    fn added_to_parent(&mut self, map: &NodeMap, node: NodeId);
    fn removing_from_parent(&mut self, map: &NodeMap, node: NodeId);
    fn removed_from_forest(&mut self, map: &NodeMap, node: NodeId);
}

#[must_use = "Unattached nodes should be inserted into the tree or kept as a root via into_id"]
pub struct UnattachedNode<'a, O> {
    id: NodeId,
    tree: &'a mut Tree<O>,
}

impl<'a, O: Observer> UnattachedNode<'a, O> {
    /// Keeps the node in the forest as a root.
    pub fn into_id(self) -> NodeId { self.id }

    pub fn push_back(self, parent: NodeId) -> NodeId {
        self.id.detach(self.tree).insert_at(parent, usize::MAX)
    }
}

#[must_use = "Detached nodes should be reattached, orphaned or removed"]
pub struct DetachedNode<'a, O> {
    id: NodeId,
    tree: &'a mut Tree<O>,
}

impl<'a, O: Observer> DetachedNode<'a, O> {
    pub fn push_back(self, parent: NodeId) -> NodeId { self.insert_at(parent, usize::MAX) }

    /// Inserts under `parent` so that the node ends up at `index` (clamped to the end).
    pub fn insert_at(self, parent: NodeId, index: usize) -> NodeId {
        if !self.tree.map.contains(parent)
            || parent.ancestors(&self.tree.map).any(|a| a == self.id)
        {
            return self.id;
        }
        let old_parent = self.id.parent(&self.tree.map);
        let reparenting = old_parent != Some(parent);
        if reparenting && old_parent.is_some() {
            self.tree.data.removing_from_parent(&self.tree.map, self.id);
        }
        self.tree.map.unlink(self.id);
        let next = parent.children(&self.tree.map).nth(index);
        match next {
            Some(next) => self.tree.map.link_before(self.id, next),
            None => self.tree.map.link_last(self.id, parent),
        }
        if reparenting {
            self.tree.data.added_to_parent(&self.tree.map, self.id);
        }
        self.id
    }

    pub fn insert_before(self, sibling: NodeId) -> NodeId {
        match (sibling.parent(&self.tree.map), sibling.index_in_parent(&self.tree.map)) {
            (Some(parent), Some(index)) => {
                let index = self.adjusted_index(parent, index);
                self.insert_at(parent, index)
            }
            _ => self.id,
        }
    }

    /// Unlinks the node from its parent but keeps it (and its subtree) alive as a root.
    pub fn orphan(self) -> NodeId {
        if self.id.parent(&self.tree.map).is_some() {
            self.tree.data.removing_from_parent(&self.tree.map, self.id);
            self.tree.map.unlink(self.id);
        }
        self.id
    }

    /// Unlinks the node and deletes it together with its subtree.
    pub fn remove(self) {
        let id = self.id;
        if id.parent(&self.tree.map).is_some() {
            self.tree.data.removing_from_parent(&self.tree.map, id);
            self.tree.map.unlink(id);
        }
        if let Some(node) = self.tree.map.map.remove(id) {
            node.delete_recursive(self.tree, id);
        }
    }

    // Moving forward within the same parent shifts every later index down by one.
    fn adjusted_index(&self, parent: NodeId, index: usize) -> usize {
        match self.id.index_in_parent(&self.tree.map) {
            Some(current) if self.id.parent(&self.tree.map) == Some(parent) && current < index => {
                index - 1
            }
            _ => index,
        }
    }
}

#[derive(Default, PartialEq, Debug)]
pub struct Node {
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

impl NodeMap {
    fn link_last(&mut self, id: NodeId, parent: NodeId) {
        let prev = self.map[parent].last_child.replace(id);
        self.map[parent].first_child.get_or_insert(id);
        let node = &mut self.map[id];
        node.parent = Some(parent);
        node.prev_sibling = prev;
        node.next_sibling = None;
        if let Some(prev) = prev {
            self.map[prev].next_sibling = Some(id);
        }
    }

    fn link_before(&mut self, id: NodeId, next: NodeId) {
        let Some(parent) = self.map[next].parent else {
            return;
        };
        let prev = self.map[next].prev_sibling.replace(id);
        let node = &mut self.map[id];
        node.parent = Some(parent);
        node.prev_sibling = prev;
        node.next_sibling = Some(next);
        match prev {
            Some(prev) => self.map[prev].next_sibling = Some(id),
            None => self.map[parent].first_child = Some(id),
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let Some((prev, next, parent)) =
            self.map.get(id).map(|n| (n.prev_sibling, n.next_sibling, n.parent))
        else {
            return;
        };
        if let Some(prev) = prev {
            self.map[prev].next_sibling = next;
        }
        if let Some(next) = next {
            self.map[next].prev_sibling = prev;
        }
        if let Some(parent) = parent {
            let parent_node = &mut self.map[parent];
            if parent_node.first_child == Some(id) {
                parent_node.first_child = next;
            }
            if parent_node.last_child == Some(id) {
                parent_node.last_child = prev;
            }
        }
        let node = &mut self.map[id];
        node.prev_sibling = None;
        node.next_sibling = None;
        node.parent = None;
    }
}

impl Node {
    fn delete_recursive(&self, cx: &mut Tree<impl Observer>, id: NodeId) {
        cx.data.removed_from_forest(&cx.map, id);
        let mut iter = self.first_child;
        while let Some(child) = iter {
            let next = cx.map.map.get(child).and_then(|n| n.next_sibling);
            if let Some(node) = cx.map.map.remove(child) {
                node.delete_recursive(cx, child);
            }
            iter = next;
        }
    }
}

struct Siblings<'a> {
    cur: Option<NodeId>,
    step: fn(&Node) -> Option<NodeId>,
    map: &'a NodeMap,
}

impl<'a> Iterator for Siblings<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = self.map.map.get(id).and_then(self.step);
        Some(id)
    }
}

struct PreorderTraversal<'a> {
    top: NodeId,
    cur: Option<NodeId>,
    map: &'a NodeMap,
}

impl<'a> Iterator for PreorderTraversal<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur?;
        self.cur = node.first_child(self.map).or_else(|| {
            node.ancestors(self.map)
                .take_while(|&a| a != self.top)
                .find_map(|a| a.next_sibling(self.map))
        });
        Some(node)
    }
}
