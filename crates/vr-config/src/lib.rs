//! # vr-config
//!
//! Layered configuration for the Verity binary.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. `config/verity.toml` (optional)
//! 3. `VERITY__SECTION__KEY` environment variables (a `.env` file is loaded first)

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

const MIN_SECRET_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub classifier: ClassifierSettings,
    pub auth: AuthSettings,
    pub explore: ExploreSettings,
    #[serde(default)]
    pub badges: BadgeSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// e.g. `sqlite://data/verity.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    /// Shared with the upstream auth provider that mints identity tokens.
    pub token_secret: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExploreSettings {
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BadgeSettings {
    pub early_adopter_cutoff: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

/// What happened to the optional `.env` file. Reported by the caller once
/// logging is up, since loading happens before the subscriber exists.
#[derive(Debug)]
pub enum DotEnv {
    Loaded(PathBuf),
    Missing,
    Unreadable(String),
}

impl DotEnv {
    fn from_result(result: Result<PathBuf, dotenvy::Error>) -> Self {
        match result {
            Ok(path) => DotEnv::Loaded(path),
            Err(e) if e.not_found() => DotEnv::Missing,
            Err(e) => DotEnv::Unreadable(e.to_string()),
        }
    }

    pub fn log(&self) {
        match self {
            DotEnv::Loaded(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            DotEnv::Missing => {}
            DotEnv::Unreadable(error) => tracing::warn!(%error, "ignoring unreadable .env"),
        }
    }
}

impl Settings {
    /// Loads `.env`, then the default file and environment layers.
    pub fn load() -> Result<(Self, DotEnv), ConfigError> {
        let dotenv = DotEnv::from_result(dotenvy::dotenv());
        let settings = Self::from_builder(
            Self::defaults()?
                .add_source(File::with_name("config/verity").required(false))
                .add_source(
                    Environment::with_prefix("VERITY")
                        .separator("__")
                        .try_parsing(true),
                ),
        )?;
        Ok((settings, dotenv))
    }

    /// Built-in defaults; everything except `auth.token_secret` has one.
    pub fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://data/verity.db")?
            .set_default("database.max_connections", 8)?
            .set_default("classifier.base_url", "https://deepfake-api-txer.onrender.com")?
            .set_default("classifier.timeout_secs", 60)?
            .set_default("classifier.max_upload_bytes", 25 * 1024 * 1024)?
            .set_default("explore.default_limit", 50)?
            .set_default("explore.max_limit", 200)?
            .set_default("log.filter", "info,sqlx=warn")?
            .set_default("log.format", "json")?)
    }

    pub fn from_builder(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token_secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.token_secret must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        if self.explore.default_limit == 0 || self.explore.default_limit > self.explore.max_limit {
            return Err(ConfigError::Invalid(
                "explore.default_limit must be between 1 and explore.max_limit".into(),
            ));
        }
        if !self.classifier.base_url.starts_with("http://") && !self.classifier.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid("classifier.base_url must be an http(s) URL".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret() -> ConfigBuilder<config::builder::DefaultState> {
        Settings::defaults()
            .unwrap()
            .set_override("auth.token_secret", "0123456789abcdef-test")
            .unwrap()
    }

    #[test]
    fn defaults_load_once_a_secret_is_supplied() {
        let settings = Settings::from_builder(with_secret()).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.explore.default_limit, 50);
        assert!(settings.badges.early_adopter_cutoff.is_none());
        assert_eq!(settings.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn dotenv_outcome_is_kept_for_later_logging() {
        let missing = dotenvy::Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(DotEnv::from_result(Err(missing)), DotEnv::Missing));

        let garbled = dotenvy::Error::LineParse("KEY VALUE".into(), 3);
        assert!(matches!(DotEnv::from_result(Err(garbled)), DotEnv::Unreadable(_)));

        let loaded = DotEnv::from_result(Ok(PathBuf::from("/srv/verity/.env")));
        assert!(matches!(loaded, DotEnv::Loaded(p) if p.ends_with(".env")));
    }

    #[test]
    fn missing_secret_fails() {
        assert!(matches!(
            Settings::from_builder(Settings::defaults().unwrap()),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn short_secret_is_rejected() {
        let builder = Settings::defaults()
            .unwrap()
            .set_override("auth.token_secret", "short")
            .unwrap();
        assert!(matches!(Settings::from_builder(builder), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn overrides_parse_dates_and_formats() {
        let builder = with_secret()
            .set_override("badges.early_adopter_cutoff", "2025-02-01T00:00:00Z")
            .unwrap()
            .set_override("log.format", "pretty")
            .unwrap();
        let settings = Settings::from_builder(builder).unwrap();
        assert_eq!(settings.log.format, LogFormat::Pretty);
        assert_eq!(
            settings.badges.early_adopter_cutoff.unwrap().to_rfc3339(),
            "2025-02-01T00:00:00+00:00"
        );
    }
}
