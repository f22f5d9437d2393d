//! Catalog markup parsing
//!
//! Selector configuration, tagged field extraction, and the two parsers the
//! snapshot builder drives: pagination discovery on the first page and
//! listing extraction on every page.

pub mod config;
pub mod fields;
pub mod pagination_parser;
pub mod product_list_parser;

pub use config::{CatalogSelectors, PaginationSelectors, ParsingConfig};
pub use fields::Field;
pub use pagination_parser::PaginationParser;
pub use product_list_parser::{ExtractionReport, ProductListParser};

pub use crate::infrastructure::parsing_error::{FieldError, ParsingError, ParsingResult};

use scraper::Selector;
use url::Url;

/// Compile one configured selector
pub(crate) fn compile_selector(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Resolve an href against the shop's base URL.
///
/// Empty hrefs, fragments and `javascript:` links resolve to nothing.
pub(crate) fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|mut url| {
        url.set_fragment(None);
        url.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_resolution() {
        let base = Url::parse("https://coins.bank.gov.ua/").unwrap();

        assert_eq!(
            resolve_url(&base, "/catalog.html?page=2").as_deref(),
            Some("https://coins.bank.gov.ua/catalog.html?page=2")
        );
        assert_eq!(
            resolve_url(&base, "https://other.example/x").as_deref(),
            Some("https://other.example/x")
        );
        assert_eq!(
            resolve_url(&base, "moneta/p-1.html").as_deref(),
            Some("https://coins.bank.gov.ua/moneta/p-1.html")
        );
        assert_eq!(resolve_url(&base, ""), None);
        assert_eq!(resolve_url(&base, "#top"), None);
        assert_eq!(resolve_url(&base, "javascript:void(0)"), None);
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let err = compile_selector("div[").unwrap_err();
        assert!(matches!(err, ParsingError::InvalidSelector { .. }));
    }
}
