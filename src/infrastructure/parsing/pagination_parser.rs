//! Pagination discovery on the first catalog page

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::config::ParsingConfig;
use super::{ParsingError, ParsingResult, compile_selector, resolve_url};

/// Finds the additional catalog pages linked from the first page
pub struct PaginationParser {
    base_url: Url,
    first_page_url: Option<String>,
    container_selector: Selector,
    link_selector: Selector,
    container_css: String,
}

impl PaginationParser {
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> ParsingResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ParsingError::invalid_base_url(&config.base_url, e))?;
        let first_page_url = resolve_url(&base_url, &config.catalog_url);
        let selectors = &config.pagination_selectors;

        Ok(Self {
            base_url,
            first_page_url,
            container_selector: compile_selector(&selectors.navigation_container)?,
            link_selector: compile_selector(&selectors.page_links)?,
            container_css: selectors.navigation_container.clone(),
        })
    }

    /// Additional page URLs, de-duplicated in first-seen order.
    ///
    /// A missing navigation container is logged and yields no pages.
    pub fn discover_pages(&self, first_page_markup: &str) -> Vec<String> {
        match self.try_discover_pages(first_page_markup) {
            Ok(pages) => pages,
            Err(e) => {
                warn!("⚠️ Pagination not discovered: {}", e);
                Vec::new()
            }
        }
    }

    pub fn try_discover_pages(&self, first_page_markup: &str) -> ParsingResult<Vec<String>> {
        let document = Html::parse_document(first_page_markup);

        let Some(container) = document.select(&self.container_selector).next() else {
            return Err(ParsingError::structure_missing(&self.container_css, "pagination"));
        };

        let mut seen = HashSet::new();
        let pages: Vec<String> = container
            .select(&self.link_selector)
            .filter_map(|link| link.value().attr("href"))
            .filter_map(|href| resolve_url(&self.base_url, href))
            .filter(|url| self.first_page_url.as_deref() != Some(url.as_str()))
            .filter(|url| seen.insert(url.clone()))
            .collect();

        debug!("Discovered {} additional catalog pages", pages.len());
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!("<html><body>{body}</body></html>")
    }

    #[test]
    fn test_links_resolved_and_deduplicated() {
        let parser = PaginationParser::new().unwrap();
        let html = page(
            r##"<div id="block">
                <ul class="pagination">
                    <li><a href="/catalog.html">1</a></li>
                    <li><a href="/catalog.html?page=2">2</a></li>
                    <li><a href="/catalog.html?page=3">3</a></li>
                    <li><a href="/catalog.html?page=2">&raquo;</a></li>
                    <li><a href="#">...</a></li>
                    <li><a href="javascript:void(0)">x</a></li>
                </ul>
            </div>"##,
        );

        assert_eq!(
            parser.discover_pages(&html),
            vec![
                "https://coins.bank.gov.ua/catalog.html?page=2".to_string(),
                "https://coins.bank.gov.ua/catalog.html?page=3".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_container_is_structure_missing() {
        let parser = PaginationParser::new().unwrap();
        let html = page(r#"<ul class="pagination"><li><a href="/catalog.html?page=2">2</a></li></ul>"#);

        assert!(parser.discover_pages(&html).is_empty());
        assert!(matches!(
            parser.try_discover_pages(&html),
            Err(ParsingError::StructureMissing { .. })
        ));
    }

    #[test]
    fn test_single_page_catalog_has_no_pages() {
        let parser = PaginationParser::new().unwrap();
        let html = page(r#"<div id="block"><p>nothing to paginate</p></div>"#);

        assert_eq!(parser.try_discover_pages(&html), Ok(Vec::new()));
    }
}
