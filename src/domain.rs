//! Domain module - Core business logic and entities
//!
//! Product state, the persistence interface and the collaborator
//! interfaces (page fetcher, notifier) the monitor is wired with.

pub mod product;
pub mod repositories;
pub mod services;

// Re-export commonly used items
pub use product::{
    Circulation, ExternalId, ProductFilter, ProductListing, ProductRecord, ProductState,
    ProductUpdate, StorageKey, StoredProduct,
};
pub use repositories::{ProductRepository, StorageError, StorageResult};
pub use services::{FetchError, NotificationError, PageFetcher, ProductNotifier};
