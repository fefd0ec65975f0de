use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use tether_resolver::discord::DEFAULT_API_BASE;

/// Tokens that MUST NOT be used.
const PLACEHOLDER_TOKENS: &[&str] = &["change-me", "your-bot-token-here"];

const DEFAULT_DB_PATH: &str = "tether.db";
const DEFAULT_SANITY_INTERVAL_SECS: u64 = 3600;

#[derive(Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub discord_token: String,
    pub discord_api: String,
    /// `None` runs a single reconciliation pass and exits
    pub sanity_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("TETHER_DISCORD_TOKEN").unwrap_or_default();
        if discord_token.is_empty() || PLACEHOLDER_TOKENS.contains(&discord_token.as_str()) {
            bail!("TETHER_DISCORD_TOKEN is unset or still a placeholder");
        }

        let db_path = lookup("TETHER_DB_PATH")
            .unwrap_or_else(|| DEFAULT_DB_PATH.into())
            .into();
        let discord_api = lookup("TETHER_DISCORD_API").unwrap_or_else(|| DEFAULT_API_BASE.into());

        let secs: u64 = match lookup("TETHER_SANITY_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("TETHER_SANITY_INTERVAL_SECS is not a number: {:?}", raw))?,
            None => DEFAULT_SANITY_INTERVAL_SECS,
        };
        let sanity_interval = (secs > 0).then(|| Duration::from_secs(secs));

        Ok(Self {
            db_path,
            discord_token,
            discord_api,
            sanity_interval,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("db_path", &self.db_path)
            .field("discord_token", &"<redacted>")
            .field("discord_api", &self.discord_api)
            .field("sanity_interval", &self.sanity_interval)
            .finish()
    }
}
