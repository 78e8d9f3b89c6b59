//! Configuration loading.
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `spotify-remote.{toml,json,yaml}` in the working directory (or the file
//! named by `SPOTIFY_REMOTE_CONFIG`), then `SPOTIFY_REMOTE_*` environment
//! variables.

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::auth::Credentials;

const ENV_PREFIX: &str = "SPOTIFY_REMOTE";
const CONFIG_PATH_VAR: &str = "SPOTIFY_REMOTE_CONFIG";
const DEFAULT_CONFIG_NAME: &str = "spotify-remote";

#[derive(Clone, Deserialize)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub api_base: String,
    pub token_url: String,
    /// ISO country code sent with playback queries.
    pub market: String,
    pub poll_interval_ms: u64,
    pub token_skew_secs: u32,
    pub retry_ceiling: u32,
    pub retry_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub rotate_debounce_ms: u64,
    pub playlist_limit: u32,
    /// Largest single playlist object the streaming decoder will hold.
    pub object_capacity: usize,
    /// Largest non-streamed response body.
    pub body_capacity: usize,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn token_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.token_skew_secs))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn rotate_debounce(&self) -> Duration {
        Duration::from_millis(self.rotate_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn with_defaults() -> Result<::config::ConfigBuilder<::config::builder::DefaultState>> {
    Ok(::config::Config::builder()
        .set_default("api_base", "https://api.spotify.com/v1")?
        .set_default("token_url", "https://accounts.spotify.com/api/token")?
        .set_default("market", "AR")?
        .set_default("poll_interval_ms", 10_000)?
        .set_default("token_skew_secs", 10)?
        .set_default("retry_ceiling", 2)?
        .set_default("retry_delay_ms", 1_000)?
        .set_default("settle_delay_ms", 1_000)?
        .set_default("rotate_debounce_ms", 500)?
        .set_default("playlist_limit", 50)?
        .set_default("object_capacity", 8_192)?
        .set_default("body_capacity", 8_192)?
        .set_default("request_timeout_secs", 15)?)
}

pub fn load_config() -> Result<Config> {
    let file = match std::env::var(CONFIG_PATH_VAR) {
        Ok(path) => ::config::File::with_name(&path).required(true),
        Err(_) => ::config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
    };

    let config = with_defaults()?
        .add_source(file)
        // SPOTIFY_REMOTE_CLIENT_ID, SPOTIFY_REMOTE_POLL_INTERVAL_MS, ...
        .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?;

    let config: Config = config.try_deserialize()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    for (key, value) in [
        ("client_id", &config.client_id),
        ("client_secret", &config.client_secret),
        ("refresh_token", &config.refresh_token),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("{key} is empty");
        }
    }
    if config.object_capacity < 2 || config.body_capacity == 0 {
        anyhow::bail!("buffer capacities must be positive");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::config::{File, FileFormat};

    fn from_toml(text: &str) -> Result<Config> {
        let config: Config = with_defaults()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        validate(&config)?;
        Ok(config)
    }

    const SECRETS: &str = r#"
        client_id = "abc"
        client_secret = "def"
        refresh_token = "ghi"
    "#;

    #[test]
    fn defaults_fill_everything_but_secrets() {
        let config = from_toml(SECRETS).unwrap();

        assert_eq!(config.api_base, "https://api.spotify.com/v1");
        assert_eq!(config.market, "AR");
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.retry_ceiling, 2);
        assert_eq!(config.token_skew(), chrono::Duration::seconds(10));
        assert_eq!(config.playlist_limit, 50);
        assert_eq!(config.object_capacity, 8192);
    }

    #[test]
    fn file_values_override_defaults() {
        let config = from_toml(&format!("{SECRETS}\nmarket = \"DE\"\nretry_ceiling = 5\n")).unwrap();
        assert_eq!(config.market, "DE");
        assert_eq!(config.retry_ceiling, 5);
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(from_toml("client_id = \"abc\"\nclient_secret = \"def\"").is_err());
        assert!(from_toml(&SECRETS.replace("\"ghi\"", "\"  \"")).is_err());
    }
}
