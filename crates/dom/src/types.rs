//! Core type definitions for the snapshot tree
//!
//! Key design principles:
//! 1. Use u32 for indices (4 bytes vs 8 bytes pointer)
//! 2. Parent and sibling links are plain indices, never owners
//! 3. Use SmallVec for small arrays (avoid heap allocation)
//! 4. Use Option<Box<T>> for large optional fields (reduce struct size)

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Node identifier (index into arena)
///
/// This is the node's identity: two handles to the same node always carry
/// the same `NodeId`, regardless of what the node contains.
pub type NodeId = u32;

/// Node type, numbered after the DOM specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Element => "element",
            NodeType::Text => "text",
            NodeType::Comment => "comment",
            NodeType::Document => "document",
            NodeType::DocumentType => "doctype",
            NodeType::DocumentFragment => "fragment",
        }
    }
}

/// One attribute as declared in markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Span of a single tag in source, one-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSpan {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

/// Source location of an element as reported by the parser, one-based
///
/// `start_tag` covers just the opening tag. Content of `<style>` and
/// `<script>` starts right after `start_tag.end_col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementLocation {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    #[serde(default)]
    pub start_tag: Option<TagSpan>,
}

/// Zero-based location used when reporting problems
///
/// `-1` means unknown. The element id survives even when the position
/// cannot be resolved, so reports can still point at the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemLocation {
    pub line: i32,
    pub column: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<u32>,
}

impl ProblemLocation {
    pub fn new(line: i32, column: i32) -> Self {
        Self {
            line,
            column,
            element_id: None,
        }
    }

    pub fn unknown(element_id: Option<u32>) -> Self {
        Self {
            line: -1,
            column: -1,
            element_id,
        }
    }

    pub fn is_known(&self) -> bool {
        self.line >= 0 && self.column >= 0
    }
}

/// The tree node stored in the arena
///
/// Design philosophy:
/// - Small fixed-size fields first (better packing)
/// - Children are owned through `children_ids`; `parent_id`,
///   `prev_sibling_id` and `next_sibling_id` are back-links only
/// - Use Option<Box<T>> for large optional data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    pub node_id: NodeId,
    pub node_type: NodeType,

    // Navigation indices
    pub parent_id: Option<NodeId>,
    pub prev_sibling_id: Option<NodeId>,
    pub next_sibling_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>, // Most nodes have <4 children

    /// Tag name for elements, doctype name for doctypes
    pub node_name: String,
    /// Character data for text and comments
    pub node_value: String,
    pub attributes: SmallVec<[Attribute; 4]>,

    /// Identifier assigned by whoever produced the snapshot
    pub element_id: Option<u32>,
    pub location: Option<Box<ElementLocation>>,
}

impl DomNode {
    /// Create a new detached node
    pub fn new(node_type: NodeType, node_name: impl Into<String>) -> Self {
        Self {
            node_id: 0,
            node_type,
            parent_id: None,
            prev_sibling_id: None,
            next_sibling_id: None,
            children_ids: SmallVec::new(),
            node_name: node_name.into(),
            node_value: String::new(),
            attributes: SmallVec::new(),
            element_id: None,
            location: None,
        }
    }

    /// Get tag name for element nodes
    pub fn tag_name(&self) -> Option<&str> {
        if self.is_element() {
            Some(&self.node_name)
        } else {
            None
        }
    }

    /// Elements, including `<script>` and `<style>`
    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Check the tag name, ignoring ASCII case
    pub fn has_tag(&self, tag: &str) -> bool {
        self.is_element() && self.node_name.eq_ignore_ascii_case(tag)
    }

    /// Get attribute value; `None` when absent, `Some("")` when empty
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Set an attribute, keeping its original position if it already exists
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute::new(name, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_absent_vs_empty() {
        let mut node = DomNode::new(NodeType::Element, "input");
        node.set_attr("disabled", "");

        assert_eq!(node.attr("disabled"), Some(""));
        assert_eq!(node.attr("value"), None);
    }

    #[test]
    fn test_set_attr_keeps_position() {
        let mut node = DomNode::new(NodeType::Element, "a");
        node.set_attr("href", "/a");
        node.set_attr("rel", "next");
        node.set_attr("href", "/b");

        let names: Vec<_> = node.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["href", "rel"]);
        assert_eq!(node.attr("href"), Some("/b"));
    }

    #[test]
    fn test_problem_location_serializes_camel_case() {
        let location = ProblemLocation {
            line: 3,
            column: 7,
            element_id: Some(12),
        };

        let json = serde_json::to_value(location).unwrap();
        assert_eq!(json, serde_json::json!({ "line": 3, "column": 7, "elementId": 12 }));

        let unknown = serde_json::to_value(ProblemLocation::unknown(None)).unwrap();
        assert_eq!(unknown, serde_json::json!({ "line": -1, "column": -1 }));
    }
}
