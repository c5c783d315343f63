use scraper::{ElementRef, Html, Selector};

pub const UNTITLED: &str = "Untitled";
pub const MISSING_CONTENT: &str = "Konten tidak ditemukan";

/// Content containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &["div.item-page", "article"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub title: String,
    pub content: String,
}

/// Title and body text of a manuscript page. Missing markers fall back to
/// [`UNTITLED`] and [`MISSING_CONTENT`]; this never fails.
#[must_use]
pub fn extract_manuscript(html: &str) -> ExtractedText {
    let document = Html::parse_document(html);

    let title = first_match(&document, "h1")
        .map(|h1| text_nodes(h1).concat())
        .unwrap_or_else(|| UNTITLED.to_owned());

    let content = CONTENT_SELECTORS
        .iter()
        .find_map(|css| first_match(&document, css))
        .map(|container| text_nodes(container).join("\n"))
        .unwrap_or_else(|| MISSING_CONTENT.to_owned());

    ExtractedText { title, content }
}

fn first_match<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = match Selector::parse(css) {
        Ok(selector) => selector,
        Err(err) => {
            tracing::debug!(css, %err, "invalid content selector");
            return None;
        }
    };
    document.select(&selector).next()
}

/// Trimmed, non-empty text nodes in document order.
fn text_nodes(element: ElementRef<'_>) -> Vec<&str> {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect()
}
