//! Service configuration loaded from environment variables.

use anyhow::{Context, bail};
use killwatch_core::Watchlist;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::poller::{BackoffPolicy, PollSettings};

/// Contact address in parentheses, as ESI and zKillboard ask for.
const USER_AGENT_PATTERN: &str = r"^.+\(.+@.+\)$";

/// Matrix connection settings.
#[derive(Clone)]
pub struct MatrixConfig {
    /// Homeserver base URL, without trailing slash.
    pub homeserver_url: String,
    pub access_token: String,
    /// Room that receives notifications (`!id:server`).
    pub room_id: String,
}

impl fmt::Debug for MatrixConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixConfig")
            .field("homeserver_url", &self.homeserver_url)
            .field("access_token", &"<redacted>")
            .field("room_id", &self.room_id)
            .finish()
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Corporation/alliance ids to report on. Empty reports everything.
    pub watchlist: Watchlist,

    pub matrix: MatrixConfig,

    /// User-Agent sent to RedisQ, ESI and the image server.
    pub user_agent: String,

    /// RedisQ queue identifier.
    pub queue_id: String,

    /// Health server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    pub redisq_url: String,
    pub esi_base_url: String,
    pub image_base_url: String,

    pub poll: PollSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `MATRIX_HOMESERVER_URL`: Matrix homeserver URL
    /// - `MATRIX_ACCESS_TOKEN`: Access token of the bot account
    /// - `MATRIX_ROOM_ID`: Room to post notifications to
    /// - `KILLWATCH_USER_AGENT`: Descriptive User-Agent with a contact e-mail,
    ///   e.g. `killwatch/0.1 (ops@example.com)`
    ///
    /// Optional:
    /// - `KILLWATCH_WATCHED_IDS`: Comma-separated corporation/alliance ids (default: all)
    /// - `KILLWATCH_QUEUE_ID`: RedisQ queue id (default: "killwatch-<random>")
    /// - `KILLWATCH_BIND_ADDR`: Health server address (default: "0.0.0.0:8080")
    /// - `REDISQ_URL`: Feed URL (default: "https://redisq.zkillboard.com/listen.php")
    /// - `ESI_BASE_URL`: ESI base URL (default: "https://esi.evetech.net/latest")
    /// - `EVE_IMAGE_BASE_URL`: Image server (default: "https://images.evetech.net")
    /// - `KILLWATCH_IDLE_DELAY_SECS`: Pause after an empty poll (default: 10)
    /// - `KILLWATCH_RETRY_INITIAL_MS`: First retry delay (default: 500)
    /// - `KILLWATCH_RETRY_MAX_MS`: Retry delay cap (default: 30000)
    pub fn from_env() -> anyhow::Result<Self> {
        let watchlist = Watchlist::parse(&optional("KILLWATCH_WATCHED_IDS", ""))
            .context("KILLWATCH_WATCHED_IDS")?;

        let homeserver_url = required("MATRIX_HOMESERVER_URL")?;
        Url::parse(&homeserver_url)
            .with_context(|| format!("MATRIX_HOMESERVER_URL is not a valid URL: {homeserver_url}"))?;
        let matrix = MatrixConfig {
            homeserver_url: homeserver_url.trim_end_matches('/').to_string(),
            access_token: required("MATRIX_ACCESS_TOKEN")?,
            room_id: required("MATRIX_ROOM_ID")?,
        };

        let user_agent = required("KILLWATCH_USER_AGENT")?;
        validate_user_agent(&user_agent)?;

        let queue_id = match std::env::var("KILLWATCH_QUEUE_ID") {
            Ok(id) if id.trim().is_empty() => bail!("KILLWATCH_QUEUE_ID must not be empty"),
            Ok(id) => id.trim().to_string(),
            Err(_) => random_queue_id(),
        };

        let bind_addr = optional("KILLWATCH_BIND_ADDR", "0.0.0.0:8080");
        let redisq_url = optional("REDISQ_URL", "https://redisq.zkillboard.com/listen.php");
        let esi_base_url = optional("ESI_BASE_URL", "https://esi.evetech.net/latest")
            .trim_end_matches('/')
            .to_string();
        let image_base_url = optional("EVE_IMAGE_BASE_URL", "https://images.evetech.net")
            .trim_end_matches('/')
            .to_string();

        let idle_delay = Duration::from_secs(parse_env("KILLWATCH_IDLE_DELAY_SECS", 10)?);
        let initial = Duration::from_millis(parse_env("KILLWATCH_RETRY_INITIAL_MS", 500)?);
        let max = Duration::from_millis(parse_env("KILLWATCH_RETRY_MAX_MS", 30_000)?);
        if max < initial {
            bail!("KILLWATCH_RETRY_MAX_MS must be at least KILLWATCH_RETRY_INITIAL_MS");
        }
        let poll = PollSettings {
            idle_delay,
            backoff: BackoffPolicy {
                initial,
                max,
                ..BackoffPolicy::default()
            },
        };

        tracing::info!(
            watched_ids = watchlist.len(),
            homeserver = %matrix.homeserver_url,
            room_id = %matrix.room_id,
            queue_id = %queue_id,
            bind_addr = %bind_addr,
            "configuration loaded"
        );

        Ok(Self {
            watchlist,
            matrix,
            user_agent,
            queue_id,
            bind_addr,
            redisq_url,
            esi_base_url,
            image_base_url,
            poll,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Ok(_) => bail!("{key} must not be empty"),
        Err(_) => bail!("{key} is required"),
    }
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{key} is not a valid number: {value}")),
        Err(_) => Ok(default),
    }
}

fn validate_user_agent(user_agent: &str) -> anyhow::Result<()> {
    if user_agent.len() < 5 {
        bail!("KILLWATCH_USER_AGENT must be descriptive");
    }
    let pattern = Regex::new(USER_AGENT_PATTERN)?;
    if !pattern.is_match(user_agent) {
        bail!("KILLWATCH_USER_AGENT must include a contact e-mail in parentheses");
    }
    Ok(())
}

fn random_queue_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("killwatch-{}", &id[..12])
}
