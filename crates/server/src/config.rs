//! Process configuration: optional TOML file, then environment overrides.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use zeustv_catalog::CatalogConfig;
use zeustv_sources::channels::{ChannelRule, MatchPolicy, default_rules};
use zeustv_sources::dizipal::DizipalConfig;
use zeustv_sources::dizipal1513::Dizipal1513Config;
use zeustv_sources::http::HttpConfig;
use zeustv_sources::neonspor::NeonSporConfig;
use zeustv_sources::rectv::RecTvConfig;
use zeustv_sources::tvdiziler::TvDizilerConfig;

pub const DEFAULT_BIND: &str = "0.0.0.0:7000";
pub const DEFAULT_HOSTING_URL: &str = "http://localhost:7000";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind: String,
    /// Public base URL of this server, used in manifest artwork and subtitle links.
    pub hosting_url: String,
    pub static_dir: PathBuf,
    pub sweep_secs: u64,
    pub subtitles: SubtitleConfig,
    pub http: HttpConfig,
    pub catalog: CatalogConfig,
    pub sources: SourcesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            hosting_url: DEFAULT_HOSTING_URL.to_string(),
            static_dir: PathBuf::from("static"),
            sweep_secs: 120,
            subtitles: SubtitleConfig::default(),
            http: HttpConfig::default(),
            catalog: CatalogConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub download_timeout_secs: u64,
    /// The subtitle directory is emptied once it holds more files than this.
    pub max_files: usize,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: 10,
            max_files: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub dizipal: DizipalConfig,
    pub dizipal1513: Dizipal1513Config,
    pub tvdiziler: TvDizilerConfig,
    pub rectv: RecTvConfig,
    pub neonspor: NeonSporConfig,
    pub channels: Vec<ChannelRule>,
    pub match_policy: MatchPolicy,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            dizipal: DizipalConfig::default(),
            dizipal1513: Dizipal1513Config::default(),
            tvdiziler: TvDizilerConfig::default(),
            rectv: RecTvConfig::default(),
            neonspor: NeonSporConfig::default(),
            channels: default_rules(),
            match_policy: MatchPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Read `ZEUSTV_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("ZEUSTV_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("failed to parse {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(bind) = var("ZEUSTV_BIND") {
            self.bind = bind;
        }
        if let Some(url) = var("HOSTING_URL") {
            self.hosting_url = url.trim_end_matches('/').to_string();
        }
        if let Some(proxy) = var("PROXY_URL") {
            self.sources.dizipal.base_url = Some(proxy.trim_end_matches('/').to_string());
        }
        if let Some(dir) = var("ZEUSTV_STATIC_DIR") {
            self.static_dir = PathBuf::from(dir);
        }
    }

    pub fn subs_dir(&self) -> PathBuf {
        self.static_dir.join("subs")
    }
}
