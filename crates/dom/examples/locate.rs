//! Locate example - report where elements of a rendered page live in source
//!
//! The rendered snapshot has no locations (it came out of a template), so
//! every position below is borrowed from the original page.

use dom_snapshot::{HtmlDocument, ProblemLocation, SnapshotLoader};
use serde_json::json;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let original = SnapshotLoader::load(&json!({
        "type": "root",
        "children": [{
            "type": "tag", "name": "html",
            "sourceCodeLocation": {
                "startLine": 1, "startCol": 1, "endLine": 6, "endCol": 8,
                "startTag": { "startLine": 1, "startCol": 1, "endLine": 1, "endCol": 7 }
            },
            "children": [{
                "type": "style", "name": "style",
                "sourceCodeLocation": {
                    "startLine": 2, "startCol": 3, "endLine": 4, "endCol": 11,
                    "startTag": { "startLine": 2, "startCol": 3, "endLine": 2, "endCol": 10 }
                },
                "children": [{ "type": "text", "data": "p { colr: red }" }]
            }]
        }]
    }))?;
    let original = Arc::new(HtmlDocument::new(original, "https://example.test/docs/", None)?);

    let rendered = SnapshotLoader::load(&json!({
        "type": "root",
        "children": [{
            "type": "tag", "name": "html",
            "children": [
                { "type": "style", "name": "style", "children": [{ "type": "text", "data": "p { colr: red }" }] },
                { "type": "tag", "name": "base", "attribs": { "href": "/assets/" } }
            ]
        }]
    }))?;
    let rendered = HtmlDocument::new(rendered, "https://example.test/docs/", Some(original))?;

    println!("base: {}", rendered.base());
    println!("fragment: {}", rendered.is_fragment());

    for style in rendered.query_selector_all("style")? {
        println!("{} at {:?}", style.outer_markup()?, style.get_location());

        // "colr" starts at offset 4 of the style text
        if let Some(location) = style.get_content_location(ProblemLocation::new(0, 4)) {
            println!("unknown property at {}:{}", location.line + 1, location.column + 1);
        }
    }

    println!("logo: {}", rendered.resolve_url("logo.svg"));

    Ok(())
}
