//! Product list parser for catalog pages
//!
//! Extraction runs in two stages. Listing nodes without the "add to cart"
//! marker are skipped outright; every purchasable node is then extracted
//! field by field into tagged results and validated as a whole. A bad node
//! is dropped with a diagnostic and never affects its siblings.

#![allow(clippy::uninlined_format_args)]

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::config::ParsingConfig;
use super::fields::Field;
use super::{FieldError, ParsingError, ParsingResult, compile_selector, resolve_url};
use crate::domain::product::{Circulation, ExternalId, ProductListing};

const LEADING_DIGITS: &str = r"^\d+";
const LEADING_YEAR: &str = r"^\d{1,4}";

/// Everything one page yielded
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub products: Vec<ProductListing>,
    /// One diagnostic per dropped purchasable listing
    pub rejected: Vec<ParsingError>,
    /// Listings without the cart marker
    pub skipped_unavailable: usize,
    /// Set when the page had no catalog grid at all
    pub container_missing: Option<ParsingError>,
}

/// Raw parameter triplet: material, circulation, year
struct Parameters {
    material: Option<String>,
    circulation: Option<Circulation>,
    year: Field<i32>,
}

/// Parser for extracting purchasable listings from catalog pages
pub struct ProductListParser {
    base_url: Url,
    require_year: bool,
    external_id_attr: String,
    container_css: String,

    container_selector: Selector,
    item_selector: Selector,
    cart_selector: Selector,
    name_selector: Selector,
    price_selector: Selector,
    link_selector: Selector,
    image_selector: Selector,
    parameter_selector: Selector,

    price_pattern: Regex,
    year_pattern: Regex,
}

impl ProductListParser {
    /// Create a parser with the shop's default selectors
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> ParsingResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ParsingError::invalid_base_url(&config.base_url, e))?;
        let selectors = &config.catalog_selectors;

        Ok(Self {
            base_url,
            require_year: config.require_year,
            external_id_attr: selectors.external_id_attr.clone(),
            container_css: selectors.catalog_container.clone(),
            container_selector: compile_selector(&selectors.catalog_container)?,
            item_selector: compile_selector(&selectors.product_item)?,
            cart_selector: compile_selector(&selectors.cart_button)?,
            name_selector: compile_selector(&selectors.name)?,
            price_selector: compile_selector(&selectors.price)?,
            link_selector: compile_selector(&selectors.image_link)?,
            image_selector: compile_selector(&selectors.image)?,
            parameter_selector: compile_selector(&selectors.parameters)?,
            price_pattern: compile_pattern(LEADING_DIGITS)?,
            year_pattern: compile_pattern(LEADING_YEAR)?,
        })
    }

    /// Purchasable listings of one page; every rejection is logged
    pub fn extract_available(&self, page_markup: &str) -> Vec<ProductListing> {
        let report = self.extract_report(page_markup);
        if let Some(missing) = &report.container_missing {
            warn!("⚠️ {}", missing);
        }
        for rejection in &report.rejected {
            warn!("Listing dropped: {}", rejection);
        }
        report.products
    }

    pub fn extract_report(&self, page_markup: &str) -> ExtractionReport {
        let document = Html::parse_document(page_markup);
        let mut report = ExtractionReport::default();

        let Some(container) = document.select(&self.container_selector).next() else {
            report.container_missing =
                Some(ParsingError::structure_missing(&self.container_css, "catalog listings"));
            return report;
        };

        for (index, element) in container.select(&self.item_selector).enumerate() {
            let Some(cart) = element.select(&self.cart_selector).next() else {
                report.skipped_unavailable += 1;
                continue;
            };

            match self.extract_listing(&element, &cart, index) {
                Ok(listing) => report.products.push(listing),
                Err(e) => report.rejected.push(e),
            }
        }

        debug!(
            "Extracted {} listings ({} rejected, {} unavailable)",
            report.products.len(),
            report.rejected.len(),
            report.skipped_unavailable
        );
        report
    }

    fn extract_listing(
        &self,
        element: &ElementRef,
        cart: &ElementRef,
        index: usize,
    ) -> ParsingResult<ProductListing> {
        let external_id = self.extract_external_id(cart, index)?;

        let name = Field::from_option(
            self.extract_text_by_selector(element, &self.name_selector),
            "name element missing or empty",
        );
        let price = self.extract_price(element, index)?;
        let detail_url = Field::from_option(
            self.extract_detail_url(element),
            "detail link missing or without href",
        );
        let image_url = Field::from_option(self.extract_image_url(element), "image missing or without source");
        let parameters = self.extract_parameters(element, external_id, index);

        let mut field_errors = Vec::new();
        collect_missing(&mut field_errors, "name", &name);
        collect_missing(&mut field_errors, "price", &price);
        collect_missing(&mut field_errors, "detail_url", &detail_url);
        collect_missing(&mut field_errors, "image_url", &image_url);
        if self.require_year {
            collect_missing(&mut field_errors, "year_of_production", &parameters.year);
        }

        let (Field::Found(name), Field::Found(price), Field::Found(detail_url), Field::Found(image_url)) =
            (name, price, detail_url, image_url)
        else {
            return Err(validation_failed(external_id, index, field_errors));
        };
        if !field_errors.is_empty() {
            return Err(validation_failed(external_id, index, field_errors));
        }

        Ok(ProductListing {
            external_id,
            name,
            price,
            detail_url,
            image_url,
            material: parameters.material,
            circulation: parameters.circulation,
            year_of_production: parameters.year.found(),
        })
    }

    fn extract_external_id(&self, cart: &ElementRef, index: usize) -> ParsingResult<ExternalId> {
        let raw = cart.value().attr(&self.external_id_attr).ok_or_else(|| {
            ParsingError::field_extraction_failed(
                "external_id",
                format!("cart button has no {} attribute", self.external_id_attr),
                index,
            )
        })?;

        raw.trim().parse::<i64>().map(ExternalId).map_err(|e| {
            ParsingError::field_extraction_failed("external_id", format!("'{}' is not an integer: {}", raw, e), index)
        })
    }

    /// Price in whole units; a price element without a leading digit run is a hard failure
    fn extract_price(&self, element: &ElementRef, index: usize) -> ParsingResult<Field<u64>> {
        let Some(price_element) = element.select(&self.price_selector).next() else {
            return Ok(Field::missing("price element missing"));
        };

        let compact: String = price_element.text().flat_map(str::chars).filter(|c| !c.is_whitespace()).collect();
        let digits = self.price_pattern.find(&compact).ok_or_else(|| {
            ParsingError::field_extraction_failed("price", format!("no leading digits in '{}'", compact), index)
        })?;

        digits
            .as_str()
            .parse::<u64>()
            .map(Field::Found)
            .map_err(|e| ParsingError::field_extraction_failed("price", e.to_string(), index))
    }

    fn extract_detail_url(&self, element: &ElementRef) -> Option<String> {
        element
            .select(&self.link_selector)
            .find_map(|link| link.value().attr("href"))
            .and_then(|href| resolve_url(&self.base_url, href))
    }

    fn extract_image_url(&self, element: &ElementRef) -> Option<String> {
        let image = element.select(&self.image_selector).next()?;
        let value = image.value();
        value
            .attr("data-src")
            .filter(|src| !src.trim().is_empty())
            .or_else(|| value.attr("src"))
            .and_then(|src| resolve_url(&self.base_url, src))
    }

    fn extract_parameters(&self, element: &ElementRef, external_id: ExternalId, index: usize) -> Parameters {
        let values: Vec<String> = element
            .select(&self.parameter_selector)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .collect();

        let [material, circulation, year] = values.as_slice() else {
            info!(
                "Listing {} (#{}) has {} parameter values instead of 3; parameters left unset",
                external_id,
                index,
                values.len()
            );
            return Parameters {
                material: None,
                circulation: None,
                year: Field::missing(format!("expected 3 parameter values, found {}", values.len())),
            };
        };

        let year = Field::from_option(
            self.year_pattern.find(year).and_then(|m| m.as_str().parse::<i32>().ok()),
            "no leading digits in year",
        );

        Parameters {
            material: Some(material.clone()).filter(|m| !m.is_empty()),
            circulation: Circulation::parse(circulation),
            year,
        }
    }

    /// Extract text content using a single CSS selector
    fn extract_text_by_selector(&self, element: &ElementRef, selector: &Selector) -> Option<String> {
        element
            .select(selector)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

fn compile_pattern(pattern: &str) -> ParsingResult<Regex> {
    Regex::new(pattern).map_err(|e| ParsingError::InvalidSelector {
        selector: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn collect_missing<T>(errors: &mut Vec<FieldError>, field: &'static str, value: &Field<T>) {
    if let Some(reason) = value.missing_reason() {
        errors.push(FieldError::new(field, reason));
    }
}

fn validation_failed(external_id: ExternalId, listing_index: usize, field_errors: Vec<FieldError>) -> ParsingError {
    ParsingError::ProductValidationFailed {
        external_id: Some(external_id.value()),
        listing_index,
        field_errors,
    }
}
