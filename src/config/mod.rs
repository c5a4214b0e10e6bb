// src/config/mod.rs
pub mod rules;
pub mod watch;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use rules::{DetailedRule, PushRule};

pub const ENV_CONFIG_PATH: &str = "BILIPUSH_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/bot.toml";
pub const DEFAULT_JSON_PATH: &str = "config/bot.json";

/// Polling never runs more often than this.
pub const MIN_PUSH_INTERVAL_SECS: u64 = 30;

fn default_push_interval() -> u64 {
    MIN_PUSH_INTERVAL_SECS
}
fn default_dispatch_delay_ms() -> u64 {
    1000
}
fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_api_base() -> String {
    "http://127.0.0.1:5700".to_string()
}
fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_onebot_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub onebot: OneBotConfig,
    #[serde(default)]
    pub bilibili: BilibiliConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OneBotConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_onebot_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            access_token: None,
            listen: default_listen(),
            timeout_secs: default_onebot_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BilibiliConfig {
    /// Seconds between push checks; values below the floor are raised to it.
    #[serde(default = "default_push_interval", alias = "pushCheckInterval")]
    pub push_check_interval: u64,
    /// Pause between two outgoing push messages.
    #[serde(default = "default_dispatch_delay_ms")]
    pub dispatch_delay_ms: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default, alias = "getVideoInfo")]
    pub get_video_info: bool,
    #[serde(default, alias = "getDynamicInfo")]
    pub get_dynamic_info: bool,
    #[serde(default, alias = "getArticleInfo")]
    pub get_article_info: bool,
    #[serde(default, alias = "getLiveRoomInfo")]
    pub get_live_room_info: bool,
    /// Delete our reply when the message that triggered it is recalled.
    #[serde(default, alias = "respondRecall")]
    pub respond_recall: bool,
    /// uid → rules. Keys stay strings here; expansion validates them.
    #[serde(default, deserialize_with = "rules::deserialize_push")]
    pub push: BTreeMap<String, Vec<PushRule>>,
}

impl Default for BilibiliConfig {
    fn default() -> Self {
        Self {
            push_check_interval: default_push_interval(),
            dispatch_delay_ms: default_dispatch_delay_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            get_video_info: false,
            get_dynamic_info: false,
            get_article_info: false,
            get_live_room_info: false,
            respond_recall: false,
            push: BTreeMap::new(),
        }
    }
}

/// Load config from an explicit path. TOML or JSON, picked by extension then content.
pub fn load_from(path: &Path) -> Result<BotConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))
}

/// Resolve the config path:
/// 1) $BILIPUSH_CONFIG_PATH
/// 2) config/bot.toml
/// 3) config/bot.json
pub fn resolve_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(anyhow!(
        "no config found (set {ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH})"
    ))
}

pub fn load_default() -> Result<(BotConfig, PathBuf)> {
    let path = resolve_path()?;
    let cfg = load_from(&path)?;
    Ok((cfg, path))
}

pub fn parse_config(s: &str, hint_ext: &str) -> Result<BotConfig> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        return serde_json::from_str(s).context("invalid JSON config");
    }
    toml::from_str(s).context("invalid TOML config")
}
