//! Snapshot loader - builds a `DomArena` from a serialized parse tree
//!
//! The parser itself lives outside this crate. What it hands over is an
//! htmlparser2-shaped JSON tree, with parse5 source locations attached:
//!
//! ```json
//! {
//!   "type": "root",
//!   "children": [{
//!     "type": "tag",
//!     "name": "html",
//!     "id": 1,
//!     "attribs": { "lang": "en" },
//!     "sourceCodeLocation": {
//!       "startLine": 1, "startCol": 1, "endLine": 9, "endCol": 8,
//!       "startTag": { "startLine": 1, "startCol": 1, "endLine": 1, "endCol": 17 }
//!     },
//!     "children": [...]
//!   }]
//! }
//! ```

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::*;
use serde_json::Value;

/// Builds arenas from JSON snapshots
pub struct SnapshotLoader;

impl SnapshotLoader {
    /// Parse a snapshot tree and build an arena rooted at its document node
    pub fn load(snapshot: &Value) -> Result<DomArena> {
        let mut arena = DomArena::new();
        let root_id = Self::parse_node(&mut arena, snapshot, None)?;
        arena.set_root(root_id)?;

        tracing::debug!(nodes = arena.len(), "Loaded snapshot");
        Ok(arena)
    }

    /// Same as [`SnapshotLoader::load`], from JSON text
    pub fn load_str(snapshot: &str) -> Result<DomArena> {
        let value: Value = serde_json::from_str(snapshot)?;
        Self::load(&value)
    }

    /// Recursively parse a snapshot node
    fn parse_node(arena: &mut DomArena, raw: &Value, parent_id: Option<NodeId>) -> Result<NodeId> {
        let kind = raw["type"]
            .as_str()
            .ok_or_else(|| DomError::SnapshotError("Missing node type".to_string()))?;

        let node_type = match kind {
            "root" => NodeType::Document,
            "tag" | "script" | "style" => NodeType::Element,
            "text" => NodeType::Text,
            "comment" => NodeType::Comment,
            "directive" => NodeType::DocumentType,
            other => {
                return Err(DomError::InvalidNodeType {
                    expected: "root, tag, script, style, text, comment or directive".to_string(),
                    actual: other.to_string(),
                })
            }
        };

        if parent_id.is_none() && node_type != NodeType::Document {
            return Err(DomError::SnapshotError(format!(
                "Snapshot root must be a document, got `{}`",
                kind
            )));
        }

        let data = raw["data"].as_str().unwrap_or("");

        let mut node = match node_type {
            NodeType::Document => DomNode::new(node_type, "#document"),
            NodeType::Element => {
                let name = raw["name"]
                    .as_str()
                    .ok_or_else(|| DomError::SnapshotError("Element without a name".to_string()))?;
                DomNode::new(node_type, name)
            }
            NodeType::Text => DomNode::new(node_type, "#text"),
            NodeType::Comment => DomNode::new(node_type, "#comment"),
            _ => DomNode::new(node_type, doctype_name(data)),
        };

        if matches!(node_type, NodeType::Text | NodeType::Comment) {
            node.node_value = data.to_string();
        }

        // Attribute order is declaration order (serde_json keeps it)
        if let Some(attribs) = raw["attribs"].as_object() {
            for (name, value) in attribs {
                node.set_attr(name.as_str(), value.as_str().unwrap_or(""));
            }
        }

        node.element_id = raw["id"]
            .as_u64()
            .map(|id| {
                u32::try_from(id).map_err(|_| {
                    DomError::SnapshotError(format!("element id {} does not fit in 32 bits", id))
                })
            })
            .transpose()?;

        if node_type == NodeType::Element {
            if let Some(location) = raw.get("sourceCodeLocation").filter(|v| !v.is_null()) {
                let location: ElementLocation = serde_json::from_value(location.clone())?;
                node.location = Some(Box::new(location));
            }
        }

        let current_id = arena.add_node(node);

        if let Some(parent_id) = parent_id {
            arena.append_child(parent_id, current_id)?;
        }

        if let Some(children) = raw["children"].as_array() {
            for child in children {
                Self::parse_node(arena, child, Some(current_id))?;
            }
        }

        Ok(current_id)
    }
}

/// `!DOCTYPE html` → `html`
fn doctype_name(data: &str) -> &str {
    let data = data.trim_start_matches('!');
    let rest = match data.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("doctype") => &data[7..],
        _ => data,
    };
    rest.split_whitespace().next().unwrap_or("html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_snapshot() {
        let snapshot = serde_json::json!({
            "type": "root",
            "children": [{
                "type": "tag",
                "name": "html",
                "id": 7,
                "attribs": { "lang": "en", "dir": "ltr" },
                "sourceCodeLocation": {
                    "startLine": 1, "startCol": 1, "startOffset": 0,
                    "endLine": 1, "endCol": 30, "endOffset": 29,
                    "startTag": { "startLine": 1, "startCol": 1, "endLine": 1, "endCol": 23 }
                },
                "children": [{ "type": "text", "data": "hi" }]
            }]
        });

        let arena = SnapshotLoader::load(&snapshot).unwrap();

        assert_eq!(arena.root_id(), Some(0));
        assert_eq!(arena.len(), 3);

        let html = arena.get(1).unwrap();
        assert_eq!(html.node_name, "html");
        assert_eq!(html.element_id, Some(7));
        assert_eq!(arena.node_id_by_element_id(7), Some(1));

        let names: Vec<_> = html.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["lang", "dir"]);

        let location = html.location.as_deref().unwrap();
        assert_eq!(location.end_col, 30);
        assert_eq!(location.start_tag.unwrap().end_col, 23);

        assert_eq!(arena.get(2).unwrap().node_value, "hi");
        assert_eq!(arena.get(2).unwrap().parent_id, Some(1));
    }

    #[test]
    fn test_script_and_style_are_elements() {
        let arena = SnapshotLoader::load_str(
            r#"{"type":"root","children":[
                {"type":"script","name":"script","children":[]},
                {"type":"style","name":"style"}
            ]}"#,
        )
        .unwrap();

        assert!(arena.get(1).unwrap().is_element());
        assert!(arena.get(2).unwrap().is_element());
        assert_eq!(arena.get(1).unwrap().next_sibling_id, Some(2));
    }

    #[test]
    fn test_doctype_name() {
        assert_eq!(doctype_name("!DOCTYPE html"), "html");
        assert_eq!(doctype_name("!doctype HTML PUBLIC"), "HTML");
        assert_eq!(doctype_name("!DOCTYPE"), "html");
    }

    #[test]
    fn test_rejects_unknown_node_type() {
        let err = SnapshotLoader::load(&serde_json::json!({
            "type": "root",
            "children": [{ "type": "cdata", "data": "x" }]
        }))
        .unwrap_err();

        assert!(matches!(err, DomError::InvalidNodeType { .. }));
    }

    #[test]
    fn test_rejects_non_document_root() {
        let err = SnapshotLoader::load(&serde_json::json!({ "type": "tag", "name": "div" })).unwrap_err();
        assert!(matches!(err, DomError::SnapshotError(_)));
    }

    #[test]
    fn test_rejects_element_id_beyond_u32() {
        let snapshot = serde_json::json!({
            "type": "root",
            "children": [
                { "type": "tag", "name": "p", "id": 1 },
                { "type": "tag", "name": "p", "id": u64::from(u32::MAX) + 2 }
            ]
        });

        let err = SnapshotLoader::load(&snapshot).unwrap_err();
        assert!(matches!(err, DomError::SnapshotError(_)));

        let ok = SnapshotLoader::load(&serde_json::json!({
            "type": "root",
            "children": [{ "type": "tag", "name": "p", "id": u32::MAX }]
        }))
        .unwrap();
        assert!(ok.node_id_by_element_id(u32::MAX).is_some());
    }
}
