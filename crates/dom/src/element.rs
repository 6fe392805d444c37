//! Element View - what rule code holds on to
//!
//! A view is a document reference plus a `NodeId`: `Copy`, cheap, and
//! never mutates the tree. Two views are the same element iff they come
//! from the same document and carry the same id.

use crate::document::HtmlDocument;
use crate::error::Result;
use crate::types::*;
use crate::utils;
use std::fmt;

#[derive(Clone, Copy)]
pub struct ElementView<'a> {
    document: &'a HtmlDocument,
    node_id: NodeId,
}

impl<'a> ElementView<'a> {
    pub(crate) fn new(document: &'a HtmlDocument, node_id: NodeId) -> Self {
        Self { document, node_id }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn owner_document(&self) -> &'a HtmlDocument {
        self.document
    }

    fn with_node<R>(&self, f: impl FnOnce(&DomNode) -> R) -> Option<R> {
        self.document
            .with_arena(|arena| arena.get(self.node_id).ok().map(f))
    }

    /// Tag name as it appears in the tree
    pub fn node_name(&self) -> String {
        self.with_node(|node| node.node_name.clone())
            .unwrap_or_default()
    }

    /// Identifier the snapshot producer gave this element
    pub fn element_id(&self) -> Option<u32> {
        self.with_node(|node| node.element_id).flatten()
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> Vec<Attribute> {
        self.with_node(|node| node.attributes.to_vec())
            .unwrap_or_default()
    }

    /// Element children only; text and comments are skipped
    pub fn children(&self) -> Vec<ElementView<'a>> {
        self.document.with_arena(|arena| {
            arena
                .children(self.node_id)
                .map(|children| {
                    children
                        .into_iter()
                        .filter(|child| child.is_element())
                        .map(|child| ElementView::new(self.document, child.node_id))
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    /// `None` for the document element and anything else whose parent is
    /// not an element
    pub fn parent_element(&self) -> Option<ElementView<'a>> {
        self.document
            .with_arena(|arena| arena.parent_element(self.node_id))
            .map(|parent_id| ElementView::new(self.document, parent_id))
    }

    /// `None` when absent, `Some("")` when present but empty
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.with_node(|node| node.attr(name).map(str::to_string))
            .flatten()
    }

    /// Check if the value of an attribute was provided as a template
    /// expression, meaning the exact value of the attribute is unknown.
    pub fn is_attribute_expression(&self, name: &str) -> bool {
        self.get_attribute(name)
            .is_some_and(|value| utils::is_template_expression(&value))
    }

    pub fn text_content(&self) -> String {
        self.document
            .with_arena(|arena| utils::get_text_content(arena, self.node_id))
            .unwrap_or_default()
    }

    fn direct_location(&self) -> Option<ElementLocation> {
        self.with_node(|node| node.location.as_deref().copied())
            .flatten()
    }

    /// Best known source location.
    ///
    /// A direct location always wins. Without one, look for the matching
    /// element in the original document and borrow its location.
    fn source_location(&self) -> Option<ElementLocation> {
        if let Some(location) = self.direct_location() {
            return Some(location);
        }

        let original = self.document.original_document()?;
        let found = self.document.finder().find(original, self)?;
        let location = found.direct_location();

        if location.is_some() {
            tracing::debug!(
                node_id = self.node_id,
                original_node_id = found.node_id(),
                "Using location of matching element in original document"
            );
        }

        location
    }

    /// Zero-based location of the element
    ///
    /// Both line and column drop the parser's one-based offset, so a record
    /// starting at (5, 3) reports (4, 2). With parse5 records, whose
    /// `startCol` is the one-based column of `<`, the column lands on `<`
    /// itself rather than on the tag name. Callers that want the raw record
    /// can read it from [`ElementView::source_start`].
    ///
    /// Unknown locations come back as `-1`, still carrying the element id.
    pub fn get_location(&self) -> ProblemLocation {
        let element_id = self.element_id();

        match self.source_location() {
            Some(location) => ProblemLocation {
                line: location.start_line as i32 - 1,
                column: location.start_col as i32 - 1,
                element_id,
            },
            None => ProblemLocation::unknown(element_id),
        }
    }

    /// Raw one-based `(line, column)` of the element start, as recorded by
    /// the parser (or borrowed from the original document)
    pub fn source_start(&self) -> Option<(u32, u32)> {
        self.source_location()
            .map(|location| (location.start_line, location.start_col))
    }

    /// Calculate the document location of content within this element.
    /// Used to determine offsets for CSS-in-HTML and JS-in-HTML reports.
    pub fn get_content_location(&self, offset: ProblemLocation) -> Option<ProblemLocation> {
        let start_tag = self.source_location()?.start_tag?;

        // End of the start tag, zero-based
        let column = start_tag.end_col as i32 - 1;
        let line = start_tag.end_line as i32 - 1;

        // Content on the tag's own line is shifted by the tag's end
        if offset.line == 0 {
            return Some(ProblemLocation::new(line, column + offset.column));
        }

        Some(ProblemLocation::new(line + offset.line, offset.column))
    }

    pub fn is_same(&self, other: &ElementView<'_>) -> bool {
        self.node_id == other.node_id && self.document.id() == other.document.id()
    }

    /// Markup of the children
    pub fn inner_markup(&self) -> Result<String> {
        self.document.inner_html(self.node_id)
    }

    /// Markup of the element itself, its tag included
    pub fn outer_markup(&self) -> Result<String> {
        self.document.outer_html(self.node_id)
    }

    pub fn resolve_url(&self, url: &str) -> String {
        self.document.resolve_url(url)
    }
}

impl PartialEq for ElementView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for ElementView<'_> {}

impl fmt::Debug for ElementView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementView")
            .field("document", &self.document.id())
            .field("node_id", &self.node_id)
            .field("name", &self.node_name())
            .finish()
    }
}
