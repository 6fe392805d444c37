//! Original element lookup
//!
//! Elements produced by template expansion or scripting have no source
//! location of their own. When the page was also parsed straight from its
//! source, the "same" element usually exists there, and its location is
//! what diagnostics should point at.

use crate::document::HtmlDocument;
use crate::element::ElementView;
use crate::types::Attribute;
use crate::utils;

/// Finds the counterpart of an element in another document
pub trait OriginalElementFinder: Send + Sync {
    fn find<'o>(
        &self,
        original: &'o HtmlDocument,
        element: &ElementView<'_>,
    ) -> Option<ElementView<'o>>;
}

/// Default heuristic, in order:
///
/// 1. A unique same-named element with the same literal `id`
/// 2. A unique same-named element carrying all of the element's literal
///    attributes (templated values are ignored)
/// 3. The same-named element at the same position, when both documents
///    have the same number of them
/// 4. The first element from step 2, if any
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralFinder;

impl OriginalElementFinder for StructuralFinder {
    fn find<'o>(
        &self,
        original: &'o HtmlDocument,
        element: &ElementView<'_>,
    ) -> Option<ElementView<'o>> {
        let name = element.node_name();
        let candidates = original.elements_by_tag(&name);
        if candidates.is_empty() {
            return None;
        }

        let literal: Vec<Attribute> = element
            .attributes()
            .into_iter()
            .filter(|attr| !utils::is_template_expression(&attr.value))
            .collect();

        if let Some(id) = literal.iter().find(|attr| attr.name == "id") {
            let mut by_id = candidates
                .iter()
                .filter(|candidate| candidate.get_attribute("id").as_deref() == Some(id.value.as_str()));
            if let (Some(found), None) = (by_id.next(), by_id.next()) {
                return Some(*found);
            }
        }

        let same_attributes: Vec<ElementView<'o>> = candidates
            .iter()
            .copied()
            .filter(|candidate| {
                literal
                    .iter()
                    .all(|attr| candidate.get_attribute(&attr.name).as_deref() == Some(attr.value.as_str()))
            })
            .collect();
        if same_attributes.len() == 1 {
            return same_attributes.first().copied();
        }

        let own = element.owner_document().elements_by_tag(&name);
        if own.len() == candidates.len() {
            if let Some(index) = own.iter().position(|e| e.is_same(element)) {
                return candidates.get(index).copied();
            }
        }

        same_attributes.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SnapshotLoader;
    use serde_json::{json, Value};

    fn doc(body: Value) -> HtmlDocument {
        let arena = SnapshotLoader::load(&json!({
            "type": "root",
            "children": [{ "type": "tag", "name": "html", "children": [
                { "type": "tag", "name": "body", "children": body }
            ]}]
        }))
        .unwrap();
        HtmlDocument::new(arena, "https://a.test/", None).unwrap()
    }

    fn tag(name: &str, attribs: Value) -> Value {
        json!({ "type": "tag", "name": name, "attribs": attribs })
    }

    #[test]
    fn test_matches_by_id() {
        let original = doc(json!([tag("div", json!({ "id": "a" })), tag("div", json!({ "id": "b" }))]));
        let rendered = doc(json!([tag("div", json!({ "id": "b", "class": "added" }))]));

        let element = rendered.query_selector_all("div").unwrap()[0];
        let found = StructuralFinder.find(&original, &element).unwrap();

        assert_eq!(found.get_attribute("id").as_deref(), Some("b"));
    }

    #[test]
    fn test_matches_by_literal_attributes() {
        let original = doc(json!([
            tag("img", json!({ "src": "a.png" })),
            tag("img", json!({ "src": "{{ hero }}", "alt": "hero" }))
        ]));
        let rendered = doc(json!([tag("img", json!({ "src": "{{ hero }}", "alt": "hero" }))]));

        let element = rendered.query_selector_all("img").unwrap()[0];
        let found = StructuralFinder.find(&original, &element).unwrap();

        assert_eq!(found.get_attribute("alt").as_deref(), Some("hero"));
    }

    #[test]
    fn test_falls_back_to_position() {
        let original = doc(json!([tag("li", json!({})), tag("li", json!({})), tag("li", json!({}))]));
        let rendered = doc(json!([tag("li", json!({})), tag("li", json!({})), tag("li", json!({}))]));

        let element = rendered.query_selector_all("li").unwrap()[2];
        let found = StructuralFinder.find(&original, &element).unwrap();

        assert!(found.is_same(&original.query_selector_all("li").unwrap()[2]));
    }

    #[test]
    fn test_no_candidates() {
        let original = doc(json!([tag("p", json!({}))]));
        let rendered = doc(json!([tag("span", json!({}))]));

        let element = rendered.query_selector_all("span").unwrap()[0];
        assert!(StructuralFinder.find(&original, &element).is_none());
    }
}
