//! Parsing configuration for catalog extraction
//!
//! Centralized CSS selectors for the shop's catalog markup.

use serde::{Deserialize, Serialize};

use crate::infrastructure::config::{AppConfig, nbu_shop};

/// Main parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// Base URL for resolving relative links
    pub base_url: String,

    /// Absolute URL of the first catalog page (excluded from discovered pages)
    pub catalog_url: String,

    /// Reject listings without a year of production
    pub require_year: bool,

    /// Catalog listing selectors
    pub catalog_selectors: CatalogSelectors,

    /// Pagination selectors
    pub pagination_selectors: PaginationSelectors,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            base_url: nbu_shop::BASE_URL.to_string(),
            catalog_url: format!("{}{}", nbu_shop::BASE_URL, nbu_shop::CATALOG_PATH),
            require_year: true,
            catalog_selectors: CatalogSelectors::default(),
            pagination_selectors: PaginationSelectors::default(),
        }
    }
}

impl ParsingConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.catalog.base_url.clone(),
            catalog_url: config.catalog.catalog_url(),
            require_year: config.reconciliation.require_year,
            ..Self::default()
        }
    }
}

/// CSS selectors for catalog listing pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSelectors {
    /// Grid holding all listings of a page
    pub catalog_container: String,

    /// One listing inside the grid
    pub product_item: String,

    /// "Add to cart" button; present only on purchasable listings, carries the id
    pub cart_button: String,

    /// Attribute of the cart button holding the external id
    pub external_id_attr: String,

    pub name: String,

    pub price: String,

    /// Image link; its href is the detail page
    pub image_link: String,

    pub image: String,

    /// Parameter values: material, circulation, year
    pub parameters: String,
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            catalog_container: "div.row_catalog_products".to_string(),
            product_item: "div.product".to_string(),
            cart_button: ".basked_product_bank .add2cart".to_string(),
            external_id_attr: "data-id".to_string(),
            name: "a.model_product".to_string(),
            price: "span.new_price".to_string(),
            image_link: "a.p_img_href".to_string(),
            image: "a.p_img_href img".to_string(),
            parameters: "div.product_bank_parameters p".to_string(),
        }
    }
}

/// CSS selectors for the catalog navigation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationSelectors {
    /// Main content block; its absence means the catalog did not render
    pub navigation_container: String,

    /// Page links inside the navigation block
    pub page_links: String,
}

impl Default for PaginationSelectors {
    fn default() -> Self {
        Self {
            navigation_container: "div#block".to_string(),
            page_links: "ul.pagination a".to_string(),
        }
    }
}
