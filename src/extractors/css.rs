//! CSS selector reads scoped to a listing fragment
//!
//! Uses the scraper crate to select elements by CSS selectors.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// All elements in the document matching a selector, in document order.
pub fn select_all<'a>(document: &'a Html, selector: &Selector) -> Vec<ElementRef<'a>> {
    document.select(selector).collect()
}

/// First descendant's text content, surrounding whitespace trimmed.
pub fn first_text(fragment: ElementRef<'_>, selector: &Selector) -> Option<String> {
    fragment
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// First descendant's attribute value.
pub fn first_attr(fragment: ElementRef<'_>, selector: &Selector, attr_name: &str) -> Option<String> {
    fragment
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr_name))
        .map(|v| v.trim().to_string())
}

/// Make an attribute URL absolute against the page it was found on.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    if let Ok(absolute) = Url::parse(href) {
        if absolute.has_host() {
            return Some(absolute.to_string());
        }
    }
    base.join(href).ok().map(|u| u.to_string())
}
