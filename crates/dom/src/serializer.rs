//! Markup serializer
//!
//! Produces the same markup parse5 would for the snapshot tree:
//! - Serializing a node means serializing its *children*
//! - Text under raw-text elements (`<style>`, `<script>`, ...) is verbatim
//! - Void elements get no end tag
//!
//! There is no "serialize this node itself" primitive. Outer markup is
//! obtained by parking the node in a fragment and serializing the fragment,
//! see [`HtmlSerializer::outer_html`].

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::*;
use crate::utils;

/// Markup serializer
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlSerializer;

impl HtmlSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Serialize the whole tree, starting at the arena root
    pub fn serialize_document(&self, arena: &DomArena) -> Result<String> {
        match arena.root_id() {
            Some(root_id) => self.serialize_children(arena, root_id),
            None => Ok(String::new()),
        }
    }

    /// Serialize the children of a node (inner markup)
    pub fn serialize_children(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut output = String::with_capacity(1024);
        let node = arena.get(node_id)?;

        for &child_id in &node.children_ids {
            self.serialize_node(arena, child_id, &mut output)?;
        }

        Ok(output)
    }

    /// Serialize a node together with its own tag
    ///
    /// The node is moved into a transient fragment for the duration of the
    /// call. The arena is restored before returning, on every path.
    pub fn outer_html(&self, arena: &mut DomArena, node_id: NodeId) -> Result<String> {
        let detached = arena.detach_into_fragment(node_id)?;
        self.serialize_children(detached.arena(), detached.fragment_id())
    }

    /// Serialize a single node recursively
    fn serialize_node(&self, arena: &DomArena, node_id: NodeId, output: &mut String) -> Result<()> {
        let node = arena.get(node_id)?;

        match node.node_type {
            NodeType::Element => {
                output.push('<');
                output.push_str(&node.node_name);

                for attr in &node.attributes {
                    output.push(' ');
                    output.push_str(&attr.name);
                    output.push_str("=\"");
                    utils::escape_attribute(&attr.value, output);
                    output.push('"');
                }

                output.push('>');

                if utils::is_void_element(&node.node_name) {
                    return Ok(());
                }

                for &child_id in &node.children_ids {
                    self.serialize_node(arena, child_id, output)?;
                }

                output.push_str("</");
                output.push_str(&node.node_name);
                output.push('>');
            }
            NodeType::Text => {
                let raw = arena
                    .parent(node_id)?
                    .and_then(|parent| parent.tag_name())
                    .is_some_and(utils::is_raw_text_element);

                if raw {
                    output.push_str(&node.node_value);
                } else {
                    utils::escape_text(&node.node_value, output);
                }
            }
            NodeType::Comment => {
                output.push_str("<!--");
                output.push_str(&node.node_value);
                output.push_str("-->");
            }
            NodeType::DocumentType => {
                output.push_str("<!DOCTYPE ");
                output.push_str(&node.node_name);
                output.push('>');
            }
            NodeType::Document | NodeType::DocumentFragment => {
                for &child_id in &node.children_ids {
                    self.serialize_node(arena, child_id, output)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SnapshotLoader;

    fn page() -> DomArena {
        SnapshotLoader::load(&serde_json::json!({
            "type": "root",
            "children": [
                { "type": "directive", "name": "!doctype", "data": "!DOCTYPE html" },
                {
                    "type": "tag",
                    "name": "html",
                    "attribs": { "lang": "en" },
                    "children": [
                        {
                            "type": "tag",
                            "name": "head",
                            "children": [
                                {
                                    "type": "style",
                                    "name": "style",
                                    "children": [{ "type": "text", "data": "a > b { color: red }" }]
                                }
                            ]
                        },
                        {
                            "type": "tag",
                            "name": "body",
                            "children": [
                                { "type": "comment", "data": " nav " },
                                { "type": "tag", "name": "img", "attribs": { "alt": "\"quoted\" & more", "src": "a.png" } },
                                { "type": "tag", "name": "p", "children": [{ "type": "text", "data": "1 < 2" }] }
                            ]
                        }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_serialize_document() {
        let arena = page();
        let output = HtmlSerializer::new().serialize_document(&arena).unwrap();

        assert_eq!(
            output,
            "<!DOCTYPE html><html lang=\"en\"><head><style>a > b { color: red }</style></head>\
             <body><!-- nav --><img alt=\"&quot;quoted&quot; &amp; more\" src=\"a.png\">\
             <p>1 &lt; 2</p></body></html>"
        );
    }

    #[test]
    fn test_serialize_children_is_inner_markup() {
        let arena = page();
        let p = arena.elements_by_tag("p")[0];

        let inner = HtmlSerializer::new().serialize_children(&arena, p).unwrap();
        assert_eq!(inner, "1 &lt; 2");
    }

    #[test]
    fn test_outer_html_leaves_tree_untouched() {
        let mut arena = page();
        let img = arena.elements_by_tag("img")[0];
        let before = HtmlSerializer::new().serialize_document(&arena).unwrap();
        let len = arena.len();

        let outer = HtmlSerializer::new().outer_html(&mut arena, img).unwrap();
        assert_eq!(outer, "<img alt=\"&quot;quoted&quot; &amp; more\" src=\"a.png\">");

        let again = HtmlSerializer::new().outer_html(&mut arena, img).unwrap();
        assert_eq!(again, outer);

        assert_eq!(arena.len(), len);
        assert_eq!(HtmlSerializer::new().serialize_document(&arena).unwrap(), before);
    }

    #[test]
    fn test_outer_html_of_raw_text_element() {
        let mut arena = page();
        let style = arena.elements_by_tag("style")[0];

        let outer = HtmlSerializer::new().outer_html(&mut arena, style).unwrap();
        assert_eq!(outer, "<style>a > b { color: red }</style>");
    }
}
