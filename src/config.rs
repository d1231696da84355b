//! Configuration management

use std::time::Duration;

use anyhow::{self, Context, Result};

use crate::services::takeoff::IdentityScope;
use crate::services::takeoff::vocabulary::ComponentTypeVocabulary;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// NATS credentials (optional, both or neither)
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string (required for the postgres component store)
    pub database_url: Option<String>,

    /// JWT secret key for token validation
    pub jwt_secret: String,

    /// "postgres" or "mock"
    pub component_store: String,

    pub import: ImportSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let nats_url = lookup("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let component_store = lookup("COMPONENT_STORE").unwrap_or_else(|| "postgres".to_string());

        let database_url = lookup("DATABASE_URL");
        if component_store == "postgres" && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when COMPONENT_STORE=postgres");
        }

        let jwt_secret = lookup("JWT_SECRET")
            .context("JWT_SECRET must be set — generate one with: openssl rand -base64 48")?;

        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
                jwt_secret.len()
            );
        }

        const KNOWN_DEV_SECRETS: &[&str] = &[
            "dev-secret-change-in-production-min-32-bytes!!",
        ];
        if KNOWN_DEV_SECRETS.contains(&jwt_secret.as_str()) {
            tracing::warn!("⚠ JWT_SECRET matches a known default — change it for production!");
        }

        Ok(Self {
            nats_url,
            nats_user: lookup("NATS_USER"),
            nats_password: lookup("NATS_PASSWORD"),
            database_url,
            jwt_secret,
            component_store,
            import: ImportSettings::from_lookup(&lookup)?,
        })
    }
}

/// Limits and vocabulary for takeoff imports
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Upload size ceiling in bytes (UTF-8 length of the CSV text)
    pub max_file_bytes: usize,
    /// Data row ceiling, header excluded
    pub max_rows: usize,
    pub max_qty_per_row: u32,
    /// Ceiling on components one import may create after quantity fan-out
    pub max_components: usize,
    pub identity_scope: IdentityScope,
    /// How long a single store call may take
    pub store_timeout: Duration,
    /// Default component types when a project defines none
    pub component_types: ComponentTypeVocabulary,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            max_rows: 10_000,
            max_qty_per_row: 10_000,
            max_components: 100_000,
            identity_scope: IdentityScope::default(),
            store_timeout: Duration::from_secs(30),
            component_types: ComponentTypeVocabulary::default(),
        }
    }
}

impl ImportSettings {
    /// Settings from TAKEOFF_* environment variables, defaults for anything unset
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let identity_scope = match lookup("TAKEOFF_IDENTITY_SCOPE") {
            Some(raw) => raw.parse().map_err(anyhow::Error::msg).context("TAKEOFF_IDENTITY_SCOPE")?,
            None => defaults.identity_scope,
        };

        let component_types = match lookup("TAKEOFF_COMPONENT_TYPES") {
            Some(raw) => {
                let vocabulary = ComponentTypeVocabulary::from_list(&raw);
                if vocabulary.is_empty() {
                    anyhow::bail!("TAKEOFF_COMPONENT_TYPES must list at least one component type");
                }
                vocabulary
            }
            None => defaults.component_types,
        };

        Ok(Self {
            max_file_bytes: parse_or(&lookup, "TAKEOFF_MAX_FILE_BYTES", defaults.max_file_bytes)?,
            max_rows: parse_or(&lookup, "TAKEOFF_MAX_ROWS", defaults.max_rows)?,
            max_qty_per_row: parse_or(&lookup, "TAKEOFF_MAX_QTY_PER_ROW", defaults.max_qty_per_row)?,
            max_components: parse_or(&lookup, "TAKEOFF_MAX_COMPONENTS", defaults.max_components)?,
            identity_scope,
            store_timeout: Duration::from_secs(parse_or(
                &lookup,
                "TAKEOFF_STORE_TIMEOUT_SECS",
                defaults.store_timeout.as_secs(),
            )?),
            component_types,
        })
    }
}

fn parse_or<T>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", key, raw)),
        None => Ok(default),
    }
}
