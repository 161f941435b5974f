// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_SOURCES_PATH: &str = "SOURCES_PATH";
const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    ApiStream,
    UserTimeline,
    PageScrape,
}

/// Static description of one monitored source. Immutable for the process
/// lifetime; the set is read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    /// Account handle for `user-timeline`; a full URL for the other kinds.
    pub target: String,
    /// CSS selector for `page-scrape`; defaults to plain anchors.
    #[serde(default)]
    pub selector: Option<String>,
}

#[derive(Deserialize)]
struct SourcesFile {
    sources: Vec<SourceDescriptor>,
}

/// Load source descriptors from an explicit TOML file.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceDescriptor>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let parsed: SourcesFile =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    if parsed.sources.is_empty() {
        return Err(anyhow!("no sources configured in {}", path.display()));
    }
    Ok(parsed.sources)
}

/// Load source descriptors using env var + fallback:
/// 1) $SOURCES_PATH
/// 2) config/sources.toml
pub fn load_sources_default() -> Result<Vec<SourceDescriptor>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("SOURCES_PATH points to non-existent path"));
        }
        return load_sources_from(&pb);
    }
    load_sources_from(Path::new(DEFAULT_SOURCES_PATH))
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub publisher_url: String,
    pub relay_secret: String,
    pub db_path: PathBuf,
    pub check_interval: Duration,
    pub stagger: Duration,
    pub debug_dir: Option<PathBuf>,
    pub sources: Vec<SourceDescriptor>,
}

impl WatcherConfig {
    /// Read the watcher's configuration from the environment. Missing
    /// credentials are fatal; everything else has a default.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: require_env("TIMELINE_API_KEY")?,
            api_base_url: env_or("TIMELINE_API_BASE", "https://api.twitterapi.io/twitter"),
            publisher_url: env_or("PUBLISHER_API", "http://127.0.0.1:8000/incoming"),
            relay_secret: require_env("RELAY_SECRET")?,
            db_path: PathBuf::from(env_or("WATCHER_DB", "watcher.db")),
            check_interval: env_secs("CHECK_INTERVAL_SECS", 120)?,
            stagger: env_secs("SOURCE_STAGGER_SECS", 4)?,
            debug_dir: std::env::var("WATCHER_DEBUG_DIR").ok().map(PathBuf::from),
            sources: load_sources_default()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub relay_secret: String,
    pub db_path: PathBuf,
    pub port: u16,
    pub bot_token: String,
    pub channel_id: u64,
    pub discord_api_base: String,
}

impl PublisherConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            relay_secret: require_env("RELAY_SECRET")?,
            db_path: PathBuf::from(env_or("PUBLISHER_DB", "publisher.db")),
            port: env_or("PORT", "8000")
                .parse()
                .context("PORT must be a port number")?,
            bot_token: require_env("DISCORD_BOT_TOKEN")?,
            channel_id: require_env("POST_CHANNEL_ID")?
                .parse()
                .context("POST_CHANNEL_ID must be a numeric channel id")?,
            discord_api_base: env_or(
                "DISCORD_API_BASE",
                crate::publish::discord::DEFAULT_API_BASE,
            ),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("{name} must be set"))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_secs(name: &str, default: u64) -> Result<Duration> {
    let raw = env_or(name, &default.to_string());
    let secs: u64 = raw
        .parse()
        .with_context(|| format!("{name} must be whole seconds"))?;
    Ok(Duration::from_secs(secs))
}
