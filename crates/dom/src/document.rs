//! Document View - one parsed page (or template fragment)
//!
//! Holds the tree, the base URL and the serialized page. Everything is
//! computed once at construction; afterwards the document is read-only.
//!
//! ```text
//! DomArena ──► HtmlDocument ──query_selector_all──► SelectorCache ──► Matcher
//!                   │                                                   │
//!                   └──────────────── ElementView ◄─────────────────────┘
//!                                          │ no location?
//!                                          ▼
//!                               original HtmlDocument (finder)
//! ```

use crate::arena::DomArena;
use crate::cache::SelectorCache;
use crate::element::ElementView;
use crate::error::{DomError, Result};
use crate::finder::{OriginalElementFinder, StructuralFinder};
use crate::serializer::HtmlSerializer;
use crate::types::NodeId;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use url::Url;
use uuid::Uuid;

/// Collaborators a document works with
#[derive(Clone)]
pub struct DocumentConfig {
    pub selector_cache: Arc<SelectorCache>,
    pub finder: Arc<dyn OriginalElementFinder>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            selector_cache: SelectorCache::global(),
            finder: Arc::new(StructuralFinder),
        }
    }
}

pub struct HtmlDocument {
    id: Uuid,
    // Only written by outer markup serialization, which restores it
    arena: RwLock<DomArena>,
    document_element: Option<NodeId>,
    base: Url,
    page_html: String,
    original: Option<Arc<HtmlDocument>>,
    selector_cache: Arc<SelectorCache>,
    finder: Arc<dyn OriginalElementFinder>,
}

impl HtmlDocument {
    /// Wrap a parsed tree
    ///
    /// `final_href` is the page URL after redirects. `original` is the same
    /// page parsed straight from source, used to locate elements that have
    /// no location of their own.
    pub fn new(arena: DomArena, final_href: &str, original: Option<Arc<HtmlDocument>>) -> Result<Self> {
        Self::with_config(arena, final_href, original, DocumentConfig::default())
    }

    pub fn with_config(
        arena: DomArena,
        final_href: &str,
        original: Option<Arc<HtmlDocument>>,
        config: DocumentConfig,
    ) -> Result<Self> {
        let final_url = Url::parse(final_href).map_err(|source| DomError::InvalidUrl {
            url: final_href.to_string(),
            source,
        })?;

        let document_element = find_document_element(&arena);
        let page_html = HtmlSerializer::new().serialize_document(&arena)?;

        let mut document = Self {
            id: Uuid::new_v4(),
            arena: RwLock::new(arena),
            document_element,
            base: final_url.clone(),
            page_html,
            original,
            selector_cache: config.selector_cache,
            finder: config.finder,
        };
        document.base = document.compute_base_url(final_url)?;

        tracing::debug!(
            document = %document.id,
            base = document.base.as_str(),
            fragment = document.is_fragment(),
            "Created document"
        );

        Ok(document)
    }

    /// First `<base href>` wins; an empty or unusable href means no override
    fn compute_base_url(&self, final_url: Url) -> Result<Url> {
        let href = self
            .query_selector_all("base[href]")?
            .first()
            .and_then(|base| base.get_attribute("href"))
            .filter(|href| !href.is_empty());

        let Some(href) = href else {
            return Ok(final_url);
        };

        match final_url.join(&href) {
            Ok(base) => Ok(base),
            Err(err) => {
                tracing::warn!(href = href.as_str(), error = %err, "Ignoring unusable <base href>");
                Ok(final_url)
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn read_arena(&self) -> RwLockReadGuard<'_, DomArena> {
        self.arena.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_arena(&self) -> RwLockWriteGuard<'_, DomArena> {
        self.arena.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with read access to the tree. `f` must not serialize outer
    /// markup: that takes the write lock on the same tree.
    pub(crate) fn with_arena<R>(&self, f: impl FnOnce(&DomArena) -> R) -> R {
        f(&self.read_arena())
    }

    pub(crate) fn finder(&self) -> &dyn OriginalElementFinder {
        self.finder.as_ref()
    }

    pub fn original_document(&self) -> Option<&HtmlDocument> {
        self.original.as_deref()
    }

    /// The root `<html>` element, if the tree has one
    pub fn document_element(&self) -> Option<ElementView<'_>> {
        self.document_element
            .map(|node_id| ElementView::new(self, node_id))
    }

    /// Absolute base URL for resolving relative links
    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Check if this represents a template fragment as opposed to a full document.
    ///
    /// A document is a fragment if `<html>` wasn't part of the original source.
    pub fn is_fragment(&self) -> bool {
        if self.original.is_some() {
            return false;
        }

        let Some(node_id) = self.document_element else {
            return true;
        };
        self.with_arena(|arena| {
            arena
                .get(node_id)
                .map(|node| node.location.is_none())
                .unwrap_or(true)
        })
    }

    /// The serialized page, as captured at construction
    pub fn page_html(&self) -> &str {
        &self.page_html
    }

    /// All elements matching `selector`, in document order
    ///
    /// Only a malformed selector is an error.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementView<'_>>> {
        let matcher = self.selector_cache.get_or_compile(selector)?;

        let matches = {
            let arena = self.read_arena();
            let roots = match arena.root_id() {
                Some(root_id) => arena.get(root_id)?.children_ids.to_vec(),
                None => Vec::new(),
            };
            matcher.run(&arena, &roots)?
        };

        Ok(matches
            .into_iter()
            .map(|node_id| ElementView::new(self, node_id))
            .collect())
    }

    /// Elements by tag name, ignoring case, in document order
    pub fn elements_by_tag(&self, tag: &str) -> Vec<ElementView<'_>> {
        self.with_arena(|arena| arena.elements_by_tag(tag))
            .into_iter()
            .map(|node_id| ElementView::new(self, node_id))
            .collect()
    }

    /// Look an element up by the id carried in a `ProblemLocation`
    pub fn element_by_id(&self, element_id: u32) -> Option<ElementView<'_>> {
        self.with_arena(|arena| {
            arena
                .node_id_by_element_id(element_id)
                .filter(|&node_id| arena.get(node_id).is_ok_and(|node| node.is_element()))
        })
        .map(|node_id| ElementView::new(self, node_id))
    }

    /// Resolve `url` against the base URL
    ///
    /// Falls back to `url` itself when it cannot be resolved.
    pub fn resolve_url(&self, url: &str) -> String {
        match self.base.join(url) {
            Ok(resolved) => resolved.into(),
            Err(err) => {
                tracing::debug!(url, error = %err, "Could not resolve URL");
                url.to_string()
            }
        }
    }

    pub(crate) fn inner_html(&self, node_id: NodeId) -> Result<String> {
        HtmlSerializer::new().serialize_children(&self.read_arena(), node_id)
    }

    /// Exclusive access: concurrent serializations of the same tree queue
    /// up here instead of detaching the same node twice.
    pub(crate) fn outer_html(&self, node_id: NodeId) -> Result<String> {
        HtmlSerializer::new().outer_html(&mut self.write_arena(), node_id)
    }
}

impl fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlDocument")
            .field("id", &self.id)
            .field("base", &self.base.as_str())
            .field("has_original", &self.original.is_some())
            .finish()
    }
}

/// First root-level `<html>` element
fn find_document_element(arena: &DomArena) -> Option<NodeId> {
    let root = arena.root().ok()?;
    root.children_ids.iter().copied().find(|&child_id| {
        arena
            .get(child_id)
            .is_ok_and(|child| child.has_tag("html"))
    })
}
