//! Routes opaque ids back to the adapter that produced them.

use std::sync::Arc;

use thiserror::Error;
use zeustv_core::ids::DELIMITER;
use zeustv_sources::SourceAdapter;

pub use zeustv_core::ids::{compose_stream_id, decompose_stream_id};

pub type AdapterRef = Arc<dyn SourceAdapter>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("no source owns id `{0}`")]
    UnknownSource(String),
    #[error("prefix `{0}` is already registered")]
    DuplicatePrefix(String),
}

/// Registry of `(prefix, adapter)` pairs.
///
/// Ids route to the adapter with the longest matching prefix. The adapter
/// registered with the empty prefix is the default: it owns every id that
/// matches no other prefix and carries no composite delimiter.
#[derive(Clone, Default)]
pub struct IdRouter {
    adapters: Vec<AdapterRef>,
}

impl IdRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: AdapterRef) -> Result<(), RouterError> {
        let prefix = adapter.prefix();
        if self.adapters.iter().any(|a| a.prefix() == prefix) {
            return Err(RouterError::DuplicatePrefix(prefix.to_string()));
        }
        self.adapters.push(adapter);
        Ok(())
    }

    /// Registered adapters, in registration order.
    pub fn adapters(&self) -> &[AdapterRef] {
        &self.adapters
    }

    pub fn default_adapter(&self) -> Option<&AdapterRef> {
        self.adapters.iter().find(|a| a.prefix().is_empty())
    }

    pub fn route_for(&self, id: &str) -> Result<&AdapterRef, RouterError> {
        let owner = self
            .adapters
            .iter()
            .filter(|a| !a.prefix().is_empty() && id.starts_with(a.prefix()))
            .max_by_key(|a| a.prefix().len());
        if let Some(adapter) = owner {
            return Ok(adapter);
        }
        if !id.is_empty() && !id.contains(DELIMITER) {
            if let Some(adapter) = self.default_adapter() {
                return Ok(adapter);
            }
        }
        Err(RouterError::UnknownSource(id.to_string()))
    }
}

/// Resource id as it arrives in a Stremio path: trailing `.json` removed.
pub fn strip_json(id: &str) -> &str {
    let id = id.trim();
    id.strip_suffix(".json").unwrap_or(id)
}
