//! Configuration layer: typed settings with layered precedence (file → env).

use std::{path::PathBuf, str::FromStr, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "taccuino";
const ENV_PREFIX: &str = "TACCUINO";
const DEFAULT_CMS_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_COMMENTS_TIMEOUT_SECS: u64 = 5;
const DEFAULT_NEWSLETTER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_INCREMENT_DELAY_MS: u64 = 800;
const DEFAULT_IDENTITY_PATH: &str = ".taccuino/client-id";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub cms: CmsSettings,
    pub comments: CommentsSettings,
    pub newsletter: NewsletterSettings,
    pub identity: IdentitySettings,
    pub counters: CounterSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Remote counter store endpoint. An absent endpoint means the store is
/// unconfigured and counters run against the local fallback.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub endpoint: Option<Url>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub fallback_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CmsSettings {
    pub endpoint: Option<Url>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CommentsSettings {
    pub shortname: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct NewsletterSettings {
    pub endpoint: Option<Url>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CounterSettings {
    /// Pause between the initial count fetch and the auto-increment, so the
    /// fetch establishes a baseline before the optimistic bump lands.
    pub increment_delay: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment).
pub fn load() -> Result<Settings, LoadError> {
    let raw: RawSettings = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    Settings::from_raw(raw)
}

/// Load settings from an explicit file, still honoring environment
/// overrides. Used by embedders and tests.
pub fn load_from_path(path: &std::path::Path) -> Result<Settings, LoadError> {
    let raw: RawSettings = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    cms: RawCmsSettings,
    comments: RawCommentsSettings,
    newsletter: RawNewsletterSettings,
    identity: RawIdentitySettings,
    counters: RawCounterSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_seconds: Option<u64>,
    fallback_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCmsSettings {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommentsSettings {
    shortname: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNewsletterSettings {
    endpoint: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawIdentitySettings {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCounterSettings {
    increment_delay_ms: Option<u64>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            store,
            cms,
            comments,
            newsletter,
            identity,
            counters,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            store: build_store_settings(store)?,
            cms: build_cms_settings(cms)?,
            comments: build_comments_settings(comments)?,
            newsletter: build_newsletter_settings(newsletter)?,
            identity: build_identity_settings(identity),
            counters: build_counter_settings(counters),
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    Ok(StoreSettings {
        endpoint: parse_optional_url(store.endpoint, "store.endpoint")?,
        api_key: non_empty(store.api_key),
        timeout: timeout_from_secs(
            store.timeout_seconds,
            DEFAULT_STORE_TIMEOUT_SECS,
            "store.timeout_seconds",
        )?,
        fallback_path: store.fallback_path,
    })
}

fn build_cms_settings(cms: RawCmsSettings) -> Result<CmsSettings, LoadError> {
    Ok(CmsSettings {
        endpoint: parse_optional_url(cms.endpoint, "cms.endpoint")?,
        api_key: non_empty(cms.api_key),
        timeout: timeout_from_secs(
            cms.timeout_seconds,
            DEFAULT_CMS_TIMEOUT_SECS,
            "cms.timeout_seconds",
        )?,
    })
}

fn build_comments_settings(comments: RawCommentsSettings) -> Result<CommentsSettings, LoadError> {
    Ok(CommentsSettings {
        shortname: non_empty(comments.shortname),
        timeout: timeout_from_secs(
            comments.timeout_seconds,
            DEFAULT_COMMENTS_TIMEOUT_SECS,
            "comments.timeout_seconds",
        )?,
    })
}

fn build_newsletter_settings(
    newsletter: RawNewsletterSettings,
) -> Result<NewsletterSettings, LoadError> {
    Ok(NewsletterSettings {
        endpoint: parse_optional_url(newsletter.endpoint, "newsletter.endpoint")?,
        timeout: timeout_from_secs(
            newsletter.timeout_seconds,
            DEFAULT_NEWSLETTER_TIMEOUT_SECS,
            "newsletter.timeout_seconds",
        )?,
    })
}

fn build_identity_settings(identity: RawIdentitySettings) -> IdentitySettings {
    IdentitySettings {
        path: identity
            .path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_PATH)),
    }
}

fn build_counter_settings(counters: RawCounterSettings) -> CounterSettings {
    CounterSettings {
        increment_delay: Duration::from_millis(
            counters
                .increment_delay_ms
                .unwrap_or(DEFAULT_INCREMENT_DELAY_MS),
        ),
    }
}

fn parse_optional_url(value: Option<String>, key: &'static str) -> Result<Option<Url>, LoadError> {
    match non_empty(value) {
        Some(raw) => Url::parse(&raw)
            .map(Some)
            .map_err(|err| LoadError::invalid(key, format!("invalid url `{raw}`: {err}"))),
        None => Ok(None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn timeout_from_secs(
    value: Option<u64>,
    default: u64,
    key: &'static str,
) -> Result<Duration, LoadError> {
    let seconds = value.unwrap_or(default);
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}
