//! Core business logic abstractions

pub mod analytics;
pub mod config;
pub mod dashboard;
pub mod log;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod refresh;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for cleaner imports
pub use dashboard::{Dashboard, Report};
pub use model::{PortfolioSnapshot, PricePoint, ProviderId, SectorSummary, StockRecord};
pub use provider::{ProviderError, ProviderResult, QuoteProvider};
pub use refresh::{RefreshReport, Refresher};
pub use resolver::{FetchOutcome, OutcomeStatus, Resolver};
pub use store::StockStore;
