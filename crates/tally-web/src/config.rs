use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tally_core::DEFAULT_DAILY_LIMIT;

/// How a voter is recognised across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityScheme {
    /// Signed session cookie issued on the first vote.
    Session,
    /// Client IP address.
    Ip,
}

impl std::str::FromStr for IdentityScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "session" | "cookie" => Ok(IdentityScheme::Session),
            "ip" => Ok(IdentityScheme::Ip),
            other => anyhow::bail!("unknown identity scheme: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub voting: VotingConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    /// Days of vote history to keep before today. Unset keeps everything.
    #[serde(default)]
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VotingConfig {
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_scheme")]
    pub scheme: IdentityScheme,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub secure_cookie: bool,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_vote_rpm")]
    pub vote_requests_per_minute: u32,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}
fn default_database_path() -> PathBuf { PathBuf::from("data").join("votes.db") }
fn default_daily_limit() -> u32 { DEFAULT_DAILY_LIMIT }
fn default_scheme() -> IdentityScheme { IdentityScheme::Session }
fn default_cookie_name() -> String { "tally_session".to_string() }
fn default_session_ttl_hours() -> u64 { 24 * 30 }
fn default_vote_rpm() -> u32 { 30 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            retention_days: None,
        }
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self { daily_limit: default_daily_limit() }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            cookie_name: default_cookie_name(),
            secret: String::new(),
            secure_cookie: false,
            session_ttl_hours: default_session_ttl_hours(),
            trust_forwarded_for: false,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { vote_requests_per_minute: default_vote_rpm() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database: DatabaseConfig::default(),
            voting: VotingConfig::default(),
            identity: IdentityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("TALLY_WEB_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?,
            Err(_) => ServerConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.finalize()?;
        Ok(config)
    }

    /// Overlays environment variables on top of file values.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(addr) = var("TALLY_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }
        if let Some(port) = var("PORT") {
            self.bind_addr.set_port(port.parse()?);
        }
        if let Some(path) = var("TALLY_DATABASE") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(secret) = var("TALLY_SECRET_KEY") {
            self.identity.secret = secret;
        }
        if let Some(scheme) = var("TALLY_IDENTITY_SCHEME") {
            self.identity.scheme = scheme.parse()?;
        }
        if let Some(limit) = var("TALLY_DAILY_LIMIT") {
            self.voting.daily_limit = limit.parse()?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        if self.voting.daily_limit == 0 {
            anyhow::bail!("voting.daily_limit must be at least 1");
        }

        const WEAK_SECRETS: &[&str] = &["default_secret_key", "secret", "change-me"];
        if WEAK_SECRETS.iter().any(|&w| self.identity.secret == w) {
            anyhow::bail!(
                "Session secret matches a known placeholder value. \
                 Set a strong random secret via TALLY_SECRET_KEY."
            );
        }
        if self.identity.secret.is_empty() {
            self.identity.secret = uuid::Uuid::new_v4().to_string();
            if self.identity.scheme == IdentityScheme::Session {
                tracing::warn!(
                    "No session secret configured. Generated random secret (sessions reset on restart)."
                );
            }
        }
        Ok(())
    }
}
