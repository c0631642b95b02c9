//! Amazon Product Advertising API 5 access

pub mod client;
pub mod response;
pub mod signer;

pub use client::PaApiClient;

use async_trait::async_trait;

use crate::domain::product::ProductSnapshot;
use crate::shared::errors::FetchError;
use crate::shared::types::Asin;

/// ASIN the marketplace permanently could not describe (invalid, delisted, not accessible)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingItem {
    pub asin: Asin,
    pub reason: String,
}

/// Result of one batch call
#[derive(Debug, Clone, Default)]
pub struct GetItemsOutcome {
    pub snapshots: Vec<ProductSnapshot>,
    pub missing: Vec<MissingItem>,
}

/// Marketplace product data source
#[async_trait]
pub trait ProductApi: Send + Sync {
    /// Fetch one batch. `Err` means the whole call failed; per-item problems
    /// are reported through `GetItemsOutcome::missing`.
    async fn get_items(&self, asins: &[Asin]) -> Result<GetItemsOutcome, FetchError>;
}
