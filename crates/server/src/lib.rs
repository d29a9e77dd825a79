pub mod bootstrap;
pub mod config;
pub mod error;
pub mod manifest;
pub mod routes;
pub mod state;
pub mod stremio;
pub mod subtitles;
pub mod tasks;
