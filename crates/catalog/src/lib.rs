pub mod aggregator;
pub mod normalize;
pub mod policy;
pub mod router;
pub mod service;

#[cfg(test)]
mod testing;

pub use aggregator::{Aggregator, CatalogContext};
pub use normalize::NormalizeError;
pub use policy::{CachePolicy, CatalogConfig};
pub use router::{AdapterRef, IdRouter, RouterError};
pub use service::{CatalogService, ResolvedStream};
