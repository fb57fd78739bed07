use config::ConfigError;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

use crate::services::image_store::{ImageStoreConfig, DEFAULT_ALLOWED_EXTENSIONS};
use crate::services::oauth::google::GOOGLE_TOKENINFO_URL;
use crate::services::search::SearchConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Google sign-in
    pub google_client_id: Option<String>,
    pub google_tokeninfo_url: String,

    // Session tokens
    pub jwt_secret: Secret<String>,
    pub token_expire_minutes: i64,

    // Image uploads
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub allowed_image_extensions: Vec<String>,

    // Access control
    pub admin_emails: Vec<String>,
    pub require_verified_publishers: bool,

    // Search
    pub default_radius_km: f64,
    pub max_radius_km: f64,

    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        Self::from_source(config::Environment::default())
    }

    /// Reads settings from `source` on top of the defaults. A key that is
    /// present but malformed is an error, never a silent fallback.
    fn from_source(source: config::Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8000_i64)?
            .set_default("google_tokeninfo_url", GOOGLE_TOKENINFO_URL)?
            .set_default("token_expire_minutes", 30_i64)?
            .set_default("upload_dir", "uploads")?
            .set_default("max_upload_bytes", 5_i64 * 1024 * 1024)?
            .set_default(
                "allowed_image_extensions",
                DEFAULT_ALLOWED_EXTENSIONS.join(","),
            )?
            .set_default("admin_emails", "")?
            .set_default("require_verified_publishers", false)?
            .set_default("default_radius_km", 10.0)?
            .set_default("max_radius_km", 1000.0)?
            .set_default("cors_allowed_origins", "")?
            .add_source(source.separator("__"))
            .build()?;

        let loaded = Self {
            database_url: config.get("database_url")?,
            host: config.get("host")?,
            port: config.get("port")?,

            google_client_id: optional(config.get::<String>("google_client_id"))?
                .filter(|id| !id.trim().is_empty()),
            google_tokeninfo_url: config.get("google_tokeninfo_url")?,

            jwt_secret: Secret::new(config.get("jwt_secret")?),
            token_expire_minutes: config.get("token_expire_minutes")?,

            upload_dir: PathBuf::from(config.get::<String>("upload_dir")?),
            max_upload_bytes: config.get("max_upload_bytes")?,
            allowed_image_extensions: split_list(
                &config.get::<String>("allowed_image_extensions")?,
                true,
            ),

            admin_emails: split_list(&config.get::<String>("admin_emails")?, false),
            require_verified_publishers: config.get("require_verified_publishers")?,

            default_radius_km: config.get("default_radius_km")?,
            max_radius_km: config.get("max_radius_km")?,

            cors_allowed_origins: split_list(
                &config.get::<String>("cors_allowed_origins")?,
                false,
            ),
        };

        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.expose_secret().len() < 16 {
            return Err(ConfigError::Message(
                "JWT_SECRET must be at least 16 characters".to_string(),
            ));
        }
        if self.token_expire_minutes <= 0 {
            return Err(ConfigError::Message(
                "TOKEN_EXPIRE_MINUTES must be positive".to_string(),
            ));
        }
        if !(self.max_radius_km > 0.0 && self.default_radius_km > 0.0)
            || self.default_radius_km > self.max_radius_km
        {
            return Err(ConfigError::Message(
                "Search radii must be positive and DEFAULT_RADIUS_KM <= MAX_RADIUS_KM".to_string(),
            ));
        }
        Url::parse(&self.google_tokeninfo_url)
            .map_err(|e| ConfigError::Message(format!("GOOGLE_TOKENINFO_URL: {}", e)))?;
        Ok(())
    }

    pub fn tokeninfo_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.google_tokeninfo_url)
    }

    pub fn image_store(&self) -> ImageStoreConfig {
        ImageStoreConfig {
            root: self.upload_dir.clone(),
            allowed_extensions: self.allowed_image_extensions.clone(),
            max_bytes: self.max_upload_bytes,
            public_prefix: "/uploads".to_string(),
        }
    }

    pub fn search(&self) -> SearchConfig {
        SearchConfig {
            default_radius_km: self.default_radius_km,
            max_radius_km: self.max_radius_km,
        }
    }
}

/// Maps an absent key to `None`, keeping every other error
fn optional<T>(result: Result<T, ConfigError>) -> Result<Option<T>, ConfigError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Splits a comma-separated setting, dropping blanks and leading dots
fn split_list(raw: &str, lowercase: bool) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_start_matches('.'))
        .filter(|item| !item.is_empty())
        .map(|item| {
            if lowercase {
                item.to_ascii_lowercase()
            } else {
                item.to_string()
            }
        })
        .collect()
}
