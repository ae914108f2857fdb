//! Transform hierarchy
//!
//! Nodes live in an arena owned by [`SceneGraph`] and are addressed by
//! generational [`NodeId`] handles, so a stale handle to a removed node is
//! reported as [`SceneError::UnknownNode`] instead of aliasing a new one.
//! A parent link is a plain id and never keeps a node alive.
//!
//! World transforms are derived on every call by folding local transforms
//! from the root down; nothing is cached, so reads after a mutation are never
//! stale.
//!
//! Single writer: the graph is mutated only from the tick thread (in Bevy,
//! through `ResMut<SceneGraph>`). `&mut self` enforces this within one
//! owner; nothing else synchronizes it.

use std::fmt;

use bevy::math::{DQuat, DVec3};
use bevy::prelude::*;

use crate::error::SceneError;
use crate::scene::transform::{LocalTransform, WorldTransform};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Node {
    local: LocalTransform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(SceneError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(SceneError::UnknownNode(id))
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId { index, generation: 0 }
    }

    /// New node, appended as the last child of `parent` when given.
    pub fn spawn(
        &mut self,
        local: LocalTransform,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        let id = self.alloc(Node {
            local,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.push(id);
        }
        Ok(id)
    }

    pub fn spawn_root(&mut self, local: LocalTransform) -> NodeId {
        self.alloc(Node {
            local,
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(id)?.parent)
    }

    /// Children in insertion order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(&self.node(id)?.children)
    }

    /// Parentless nodes in arena order.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let node = slot.node.as_ref()?;
            node.parent.is_none().then_some(NodeId {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    /// True when `ancestor` is `id` itself or lies on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> Result<bool, SceneError> {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return Ok(true);
            }
            current = self.node(node)?.parent;
        }
        Ok(false)
    }

    /// Reparent `id` under `parent`, appended as its last child.
    ///
    /// Fails with [`SceneError::Cycle`], leaving the graph untouched, when
    /// `parent` is `id` or one of its descendants.
    pub fn attach(&mut self, id: NodeId, parent: NodeId) -> Result<(), SceneError> {
        self.node(id)?;
        if self.is_ancestor_or_self(id, parent)? {
            return Err(SceneError::Cycle { node: id, parent });
        }
        self.unlink_from_parent(id)?;
        self.node_mut(id)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(id);
        Ok(())
    }

    /// Make `id` a root, keeping its own subtree.
    pub fn detach(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.unlink_from_parent(id)?;
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    fn unlink_from_parent(&mut self, id: NodeId) -> Result<(), SceneError> {
        if let Some(old) = self.node(id)?.parent {
            self.node_mut(old)?.children.retain(|child| *child != id);
        }
        Ok(())
    }

    pub fn local(&self, id: NodeId) -> Result<&LocalTransform, SceneError> {
        Ok(&self.node(id)?.local)
    }

    pub fn set_local(&mut self, id: NodeId, local: LocalTransform) -> Result<(), SceneError> {
        self.node_mut(id)?.local = local;
        Ok(())
    }

    pub fn translate(&mut self, id: NodeId, delta: DVec3) -> Result<(), SceneError> {
        self.node_mut(id)?.local.translation += delta;
        Ok(())
    }

    pub fn set_translation(&mut self, id: NodeId, translation: DVec3) -> Result<(), SceneError> {
        self.node_mut(id)?.local.translation = translation;
        Ok(())
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: DQuat) -> Result<(), SceneError> {
        self.node_mut(id)?.local.rotation = rotation;
        Ok(())
    }

    pub fn set_scale(&mut self, id: NodeId, scale: DVec3) -> Result<(), SceneError> {
        self.node_mut(id)?.local.scale = scale;
        Ok(())
    }

    /// Ancestors' transforms composed root-to-leaf with the node's own.
    pub fn world_transform(&self, id: NodeId) -> Result<WorldTransform, SceneError> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            chain.push(node.local);
            current = node.parent;
        }
        Ok(chain
            .into_iter()
            .rev()
            .fold(WorldTransform::IDENTITY, |world, local| world * local))
    }

    /// Lazy depth-first walk of the subtree at `root`: parents before
    /// children, siblings in insertion order. Calling again restarts it.
    pub fn traverse(&self, root: NodeId) -> Traverse<'_> {
        let stack = if self.contains(root) { vec![root] } else { Vec::new() };
        Traverse { graph: self, stack }
    }

    /// [`Self::traverse`] over every root in turn.
    pub fn traverse_all(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots().flat_map(move |root| self.traverse(root))
    }

    /// Remove one node. Its children become roots.
    pub fn remove(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.unlink_from_parent(id)?;
        let children = std::mem::take(&mut self.node_mut(id)?.children);
        for child in children {
            self.node_mut(child)?.parent = None;
        }
        self.free_slot(id);
        Ok(())
    }

    /// Remove `id` and all of its descendants. Returns the number removed.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<usize, SceneError> {
        self.unlink_from_parent(id)?;
        let doomed: Vec<NodeId> = self.traverse(id).collect();
        for node in &doomed {
            self.free_slot(*node);
        }
        Ok(doomed.len())
    }

    fn free_slot(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize)
            && slot.generation == id.generation
            && slot.node.take().is_some()
        {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
            self.len -= 1;
        }
    }
}

/// Depth-first iterator returned by [`SceneGraph::traverse`].
pub struct Traverse<'a> {
    graph: &'a SceneGraph,
    stack: Vec<NodeId>,
}

impl Iterator for Traverse<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Ok(children) = self.graph.children(id) {
            self.stack.extend(children.iter().rev());
        }
        Some(id)
    }
}
