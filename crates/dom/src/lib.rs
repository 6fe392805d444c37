//! DOM Snapshot Library
//!
//! Read-mostly view over a parsed HTML tree, for analysis code that needs to
//! query elements and report problems at exact source positions.
//!
//! ## Philosophy
//!
//! - **Data structures first**: one arena, `u32` handles, no ownership cycles
//! - **Degrade, don't fail**: unknown locations are `-1`, absent attributes
//!   are `None`; only malformed selectors are errors
//! - **Read-only**: the one transient mutation (outer markup) is undone by RAII
//!
//! ## Core Design
//!
//! ```text
//! snapshot JSON → SnapshotLoader → DomArena → HtmlDocument → ElementView
//!                                                  │               │
//!                                           SelectorCache    location / markup
//!                                             (shared)
//! ```

pub mod arena;
pub mod cache;
pub mod document;
pub mod element;
pub mod error;
pub mod finder;
pub mod loader;
pub mod selector;
pub mod serializer;
pub mod types;
pub mod utils;

pub use arena::DomArena;
pub use cache::{SelectorCache, SelectorCacheConfig};
pub use document::{DocumentConfig, HtmlDocument};
pub use element::ElementView;
pub use error::{DomError, Result};
pub use finder::{OriginalElementFinder, StructuralFinder};
pub use loader::SnapshotLoader;
pub use selector::{CssCompiler, Matcher, SelectorCompiler};
pub use serializer::HtmlSerializer;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::CountingCompiler;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn full_page() -> DomArena {
        SnapshotLoader::load(&json!({
            "type": "root",
            "children": [{
                "type": "tag", "name": "html",
                "sourceCodeLocation": {
                    "startLine": 1, "startCol": 1, "endLine": 8, "endCol": 8,
                    "startTag": { "startLine": 1, "startCol": 1, "endLine": 1, "endCol": 7 }
                },
                "children": [
                    { "type": "tag", "name": "head" },
                    { "type": "tag", "name": "body", "children": [
                        { "type": "tag", "name": "ul", "children": [
                            { "type": "tag", "name": "li", "attribs": { "class": "a" } },
                            { "type": "text", "data": " " },
                            { "type": "tag", "name": "li", "attribs": { "class": "b" } },
                            { "type": "tag", "name": "li", "attribs": { "class": "c" } }
                        ]},
                        { "type": "tag", "name": "button", "attribs": { "id": "go" },
                          "sourceCodeLocation": {
                              "startLine": 6, "startCol": 5, "endLine": 6, "endCol": 30,
                              "startTag": { "startLine": 6, "startCol": 5, "endLine": 6, "endCol": 21 }
                          }
                        }
                    ]}
                ]
            }]
        }))
        .unwrap()
    }

    /// Same page after a client-side render: no locations anywhere
    fn rendered_page() -> DomArena {
        SnapshotLoader::load(&json!({
            "type": "root",
            "children": [{
                "type": "tag", "name": "html",
                "children": [
                    { "type": "tag", "name": "head" },
                    { "type": "tag", "name": "body", "children": [
                        { "type": "tag", "name": "div", "attribs": { "class": "injected" } },
                        { "type": "tag", "name": "button", "attribs": { "id": "go", "class": "ready" } }
                    ]}
                ]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_outer_markup_has_no_side_effects() {
        let doc = HtmlDocument::new(full_page(), "https://a.test/", None).unwrap();
        let items = doc.query_selector_all("li").unwrap();
        let b = items[1];
        let ul = b.parent_element().unwrap();

        for _ in 0..3 {
            assert_eq!(b.outer_markup().unwrap(), "<li class=\"b\"></li>");
        }

        assert!(b.parent_element().unwrap().is_same(&ul));
        assert!(b.is_same(&b));
        assert_eq!(ul.children(), items);
        assert_eq!(ul.inner_markup().unwrap(), "<li class=\"a\"></li> <li class=\"b\"></li><li class=\"c\"></li>");
        assert_eq!(doc.query_selector_all("li.a + li").unwrap(), vec![b]);
    }

    #[test]
    fn test_queries_are_deterministic_and_compiled_once() {
        let compiler = Arc::new(CountingCompiler::default());
        let config = DocumentConfig {
            selector_cache: Arc::new(SelectorCache::new(compiler.clone())),
            ..DocumentConfig::default()
        };
        let doc = HtmlDocument::with_config(full_page(), "https://a.test/", None, config).unwrap();
        let baseline = compiler.calls.load(Ordering::SeqCst);

        let first = doc.query_selector_all("ul > li").unwrap();
        let second = doc.query_selector_all("ul > li").unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(compiler.calls.load(Ordering::SeqCst), baseline + 1);
    }

    #[test]
    fn test_direct_location() {
        let mut arena = DomArena::new();
        let root = arena.create_document();
        let html = arena.create_element("html");
        let img = arena.create_element("img");
        arena.append_child(root, html).unwrap();
        arena.append_child(html, img).unwrap();
        arena.set_root(root).unwrap();
        arena
            .set_location(
                img,
                ElementLocation {
                    start_line: 5,
                    start_col: 3,
                    end_line: 5,
                    end_col: 20,
                    start_tag: None,
                },
            )
            .unwrap();

        let doc = HtmlDocument::new(arena, "https://a.test/", None).unwrap();
        let img = doc.query_selector_all("img").unwrap()[0];

        assert_eq!(img.get_location(), ProblemLocation::new(4, 2));
        assert_eq!(img.get_content_location(ProblemLocation::new(0, 1)), None);
    }

    #[test]
    fn test_location_falls_back_to_original_document() {
        let original = Arc::new(HtmlDocument::new(full_page(), "https://a.test/", None).unwrap());
        let doc = HtmlDocument::new(rendered_page(), "https://a.test/", Some(original)).unwrap();

        let button = doc.query_selector_all("#go").unwrap()[0];
        assert_eq!(button.get_location(), ProblemLocation::new(5, 4));
        assert_eq!(
            button.get_content_location(ProblemLocation::new(0, 2)),
            Some(ProblemLocation::new(5, 22))
        );

        let injected = doc.query_selector_all(".injected").unwrap()[0];
        assert_eq!(injected.get_location(), ProblemLocation::unknown(None));
    }

    #[test]
    fn test_no_location_without_original() {
        let doc = HtmlDocument::new(rendered_page(), "https://a.test/", None).unwrap();
        let button = doc.query_selector_all("button").unwrap()[0];

        let location = button.get_location();
        assert_eq!((location.line, location.column), (-1, -1));
        assert!(!location.is_known());
        assert_eq!(button.get_content_location(ProblemLocation::new(0, 0)), None);
    }

    #[test]
    fn test_is_fragment() {
        let full = HtmlDocument::new(full_page(), "https://a.test/", None).unwrap();
        assert!(!full.is_fragment());

        let template = HtmlDocument::new(rendered_page(), "https://a.test/", None).unwrap();
        assert!(template.is_fragment());

        let with_original =
            HtmlDocument::new(rendered_page(), "https://a.test/", Some(Arc::new(full))).unwrap();
        assert!(!with_original.is_fragment());
    }

    #[test]
    fn test_concurrent_outer_markup_of_one_element() {
        let doc = HtmlDocument::new(full_page(), "https://a.test/", None).unwrap();
        let ul = doc.query_selector_all("ul").unwrap()[0];
        let items = ul.children();
        let b = items[1];

        let outputs: Vec<String> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let mut last = String::new();
                        for _ in 0..50 {
                            last = b.outer_markup().unwrap();
                        }
                        last
                    })
                })
                .collect();
            workers.into_iter().map(|worker| worker.join().unwrap()).collect()
        });

        assert!(outputs.iter().all(|markup| markup == "<li class=\"b\"></li>"));
        assert_eq!(ul.children(), items);
        assert!(b.parent_element().unwrap().is_same(&ul));

        let reserialized = doc.with_arena(|arena| HtmlSerializer::new().serialize_document(arena)).unwrap();
        assert_eq!(reserialized, doc.page_html());
    }

    #[test]
    fn test_documents_across_threads() {
        let original = Arc::new(HtmlDocument::new(full_page(), "https://a.test/", None).unwrap());

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let original = Arc::clone(&original);
                scope.spawn(move || {
                    let doc = HtmlDocument::new(rendered_page(), "https://a.test/", Some(original)).unwrap();
                    let button = doc.query_selector_all("button#go").unwrap()[0];
                    assert_eq!(button.get_location(), ProblemLocation::new(5, 4));
                    assert_eq!(button.outer_markup().unwrap(), "<button id=\"go\" class=\"ready\"></button>");
                });
            }
        });
    }
}
