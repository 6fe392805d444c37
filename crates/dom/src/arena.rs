//! Arena-based snapshot tree storage
//!
//! Ownership flows strictly child-ward: a node's `children_ids` is the only
//! owning edge. Parent and sibling links are plain indices, so there are no
//! reference cycles and no `Rc<RefCell<_>>` juggling.
//!
//! ## Memory Layout
//!
//! ```text
//! Arena: Vec<DomNode>
//!        [Node0][Node1][Node2]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```

use crate::error::{DomError, Result};
use crate::types::{DomNode, ElementLocation, NodeId, NodeType};
use ahash::AHashMap;

/// Arena allocator for snapshot nodes
///
/// Design:
/// - Single Vec<DomNode> for sequential allocation
/// - HashMap for snapshot element id → NodeId lookup
/// - No Rc/Arc: use indices everywhere
#[derive(Debug, Clone)]
pub struct DomArena {
    /// All nodes stored sequentially (cache-friendly)
    nodes: Vec<DomNode>,

    /// Snapshot element id → NodeId lookup (for cross-referencing reports)
    element_id_map: AHashMap<u32, NodeId>,

    /// Root node ID (if set)
    root_id: Option<NodeId>,
}

impl DomArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            element_id_map: AHashMap::with_capacity(capacity),
            root_id: None,
        }
    }

    /// Add a node to the arena, returns its ID
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        if let Some(element_id) = node.element_id {
            self.element_id_map.insert(element_id, node_id);
        }
        self.nodes.push(node);
        node_id
    }

    pub fn create_document(&mut self) -> NodeId {
        self.add_node(DomNode::new(NodeType::Document, "#document"))
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.add_node(DomNode::new(NodeType::Element, tag))
    }

    pub fn create_text(&mut self, data: &str) -> NodeId {
        let mut node = DomNode::new(NodeType::Text, "#text");
        node.node_value = data.to_string();
        self.add_node(node)
    }

    pub fn create_comment(&mut self, data: &str) -> NodeId {
        let mut node = DomNode::new(NodeType::Comment, "#comment");
        node.node_value = data.to_string();
        self.add_node(node)
    }

    pub fn create_doctype(&mut self, name: &str) -> NodeId {
        self.add_node(DomNode::new(NodeType::DocumentType, name))
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node ID by the snapshot's element id
    pub fn node_id_by_element_id(&self, element_id: u32) -> Option<NodeId> {
        self.element_id_map.get(&element_id).copied()
    }

    pub fn set_element_id(&mut self, node_id: NodeId, element_id: u32) -> Result<()> {
        let node = self.get_mut(node_id)?;
        node.element_id = Some(element_id);
        self.element_id_map.insert(element_id, node_id);
        Ok(())
    }

    pub fn set_attribute(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let node = self.get_mut(node_id)?;
        if !node.is_element() {
            return Err(DomError::InvalidNodeType {
                expected: NodeType::Element.as_str().to_string(),
                actual: node.node_type.as_str().to_string(),
            });
        }
        node.set_attr(name, value);
        Ok(())
    }

    pub fn set_location(&mut self, node_id: NodeId, location: ElementLocation) -> Result<()> {
        self.get_mut(node_id)?.location = Some(Box::new(location));
        Ok(())
    }

    /// Append `child` as the last child of `parent`
    ///
    /// The child must be detached. Sibling links are kept in sync with
    /// `children_ids`.
    pub fn append_child(&mut self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        let child = self.get(child_id)?;
        if child.parent_id.is_some() {
            return Err(DomError::InvalidHierarchy(format!(
                "node {} already has a parent",
                child_id
            )));
        }
        if self.is_inclusive_ancestor(child_id, parent_id)? {
            return Err(DomError::InvalidHierarchy(format!(
                "node {} cannot be appended to its own descendant {}",
                child_id, parent_id
            )));
        }

        let parent = self.get(parent_id)?;
        if matches!(parent.node_type, NodeType::Text | NodeType::Comment | NodeType::DocumentType) {
            return Err(DomError::InvalidHierarchy(format!(
                "{} node {} cannot have children",
                parent.node_type.as_str(),
                parent_id
            )));
        }

        let last_id = parent.children_ids.last().copied();
        if let Some(last_id) = last_id {
            self.get_mut(last_id)?.next_sibling_id = Some(child_id);
        }

        let child = self.get_mut(child_id)?;
        child.parent_id = Some(parent_id);
        child.prev_sibling_id = last_id;
        child.next_sibling_id = None;

        self.get_mut(parent_id)?.children_ids.push(child_id);
        Ok(())
    }

    fn is_inclusive_ancestor(&self, ancestor_id: NodeId, node_id: NodeId) -> Result<bool> {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == ancestor_id {
                return Ok(true);
            }
            current = self.get(id)?.parent_id;
        }
        Ok(false)
    }

    /// Set root node
    pub fn set_root(&mut self, node_id: NodeId) -> Result<()> {
        // Verify node exists
        self.get(node_id)?;
        self.root_id = Some(node_id);
        Ok(())
    }

    /// Get root node ID
    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    /// Get root node
    pub fn root(&self) -> Result<&DomNode> {
        let root_id = self
            .root_id
            .ok_or_else(|| DomError::SnapshotError("No root node set".to_string()))?;
        self.get(root_id)
    }

    /// Total number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterator over all nodes
    pub fn iter(&self) -> impl Iterator<Item = &DomNode> {
        self.nodes.iter()
    }

    /// Get children of a node
    pub fn children(&self, node_id: NodeId) -> Result<Vec<&DomNode>> {
        let node = self.get(node_id)?;
        node.children_ids
            .iter()
            .map(|&child_id| self.get(child_id))
            .collect()
    }

    /// Get parent of a node
    pub fn parent(&self, node_id: NodeId) -> Result<Option<&DomNode>> {
        let node = self.get(node_id)?;
        match node.parent_id {
            Some(parent_id) => Ok(Some(self.get(parent_id)?)),
            None => Ok(None),
        }
    }

    /// Parent, but only when it is an element
    pub fn parent_element(&self, node_id: NodeId) -> Option<NodeId> {
        let parent_id = self.get(node_id).ok()?.parent_id?;
        self.get(parent_id)
            .ok()
            .filter(|parent| parent.is_element())
            .map(|parent| parent.node_id)
    }

    /// Closest preceding sibling that is an element
    pub fn prev_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let mut current = self.get(node_id).ok()?.prev_sibling_id;
        while let Some(id) = current {
            let node = self.get(id).ok()?;
            if node.is_element() {
                return Some(id);
            }
            current = node.prev_sibling_id;
        }
        None
    }

    /// Closest following sibling that is an element
    pub fn next_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let mut current = self.get(node_id).ok()?.next_sibling_id;
        while let Some(id) = current {
            let node = self.get(id).ok()?;
            if node.is_element() {
                return Some(id);
            }
            current = node.next_sibling_id;
        }
        None
    }

    /// Traverse tree depth-first (iterative, no recursion)
    ///
    /// Visits in document order.
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// All elements with the given tag name, in document order
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let Some(root_id) = self.root_id else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let walked = self.traverse_df(root_id, |node| {
            if node.has_tag(tag) {
                found.push(node.node_id);
            }
            Ok(())
        });

        match walked {
            Ok(()) => found,
            Err(_) => Vec::new(),
        }
    }

    /// Temporarily move `node_id` into a fresh fragment
    ///
    /// The returned guard puts the node back exactly where it was when it
    /// is dropped: parent, child slot, sibling links and the neighbours'
    /// links to it. The fragment node is removed again, so the arena is
    /// observably unchanged afterwards, including on early return or panic.
    pub fn detach_into_fragment(&mut self, node_id: NodeId) -> Result<Detached<'_>> {
        let node = self.get(node_id)?;
        if matches!(node.node_type, NodeType::Document | NodeType::DocumentFragment) {
            return Err(DomError::InvalidHierarchy(format!(
                "{} node {} cannot be moved into a fragment",
                node.node_type.as_str(),
                node_id
            )));
        }

        let parent_id = node.parent_id;
        let prev_id = node.prev_sibling_id;
        let next_id = node.next_sibling_id;

        let slot = match parent_id {
            Some(parent_id) => self
                .get(parent_id)?
                .children_ids
                .iter()
                .position(|&id| id == node_id),
            None => None,
        };
        if let Some(id) = prev_id {
            self.get(id)?;
        }
        if let Some(id) = next_id {
            self.get(id)?;
        }

        // Unlink, letting the neighbours close the gap
        if let (Some(parent_id), Some(slot)) = (parent_id, slot) {
            self.nodes[parent_id as usize].children_ids.remove(slot);
        }
        if let Some(id) = prev_id {
            self.nodes[id as usize].next_sibling_id = next_id;
        }
        if let Some(id) = next_id {
            self.nodes[id as usize].prev_sibling_id = prev_id;
        }

        let mut fragment = DomNode::new(NodeType::DocumentFragment, "#document-fragment");
        fragment.children_ids.push(node_id);
        let fragment_id = self.add_node(fragment);

        let node = &mut self.nodes[node_id as usize];
        node.parent_id = Some(fragment_id);
        node.prev_sibling_id = None;
        node.next_sibling_id = None;

        Ok(Detached {
            arena: self,
            node_id,
            fragment_id,
            parent_id,
            slot,
            prev_id,
            next_id,
        })
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

/// A node parked in a transient fragment, see [`DomArena::detach_into_fragment`]
pub struct Detached<'a> {
    arena: &'a mut DomArena,
    node_id: NodeId,
    fragment_id: NodeId,
    parent_id: Option<NodeId>,
    slot: Option<usize>,
    prev_id: Option<NodeId>,
    next_id: Option<NodeId>,
}

impl Detached<'_> {
    pub fn arena(&self) -> &DomArena {
        &*self.arena
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn fragment_id(&self) -> NodeId {
        self.fragment_id
    }
}

impl Drop for Detached<'_> {
    fn drop(&mut self) {
        let arena = &mut *self.arena;

        // The fragment is always the last node: nothing else can allocate
        // while this guard holds the arena mutably.
        if arena.nodes.len() == self.fragment_id as usize + 1 {
            arena.nodes.pop();
        }

        if let Some(node) = arena.nodes.get_mut(self.node_id as usize) {
            node.parent_id = self.parent_id;
            node.prev_sibling_id = self.prev_id;
            node.next_sibling_id = self.next_id;
        }

        if let (Some(parent_id), Some(slot)) = (self.parent_id, self.slot) {
            if let Some(parent) = arena.nodes.get_mut(parent_id as usize) {
                let slot = slot.min(parent.children_ids.len());
                parent.children_ids.insert(slot, self.node_id);
            }
        }
        if let Some(prev) = self.prev_id.and_then(|id| arena.nodes.get_mut(id as usize)) {
            prev.next_sibling_id = Some(self.node_id);
        }
        if let Some(next) = self.next_id.and_then(|id| arena.nodes.get_mut(id as usize)) {
            next.prev_sibling_id = Some(self.node_id);
        }
    }
}
