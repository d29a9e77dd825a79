pub mod cache;
pub mod error;
pub mod ids;
pub mod types;
