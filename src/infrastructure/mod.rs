//! Infrastructure layer - marketplace access, persistence and social channels

pub mod catalog;
pub mod channels;
pub mod fetcher;
pub mod paapi;
pub mod state_store;

pub use catalog::{Catalog, CatalogStore};
pub use channels::{Channel, DeliveryResult, Message};
pub use fetcher::{FetchFailure, FetchOutcome, FetchSettings, ProductFetcher};
pub use paapi::{PaApiClient, ProductApi};
pub use state_store::{JsonFileStateStore, StateStore};
