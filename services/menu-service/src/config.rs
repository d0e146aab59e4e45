use anyhow::{anyhow, bail, Context, Result};
use common_auth::config::jwks_url_for_domain;
use common_auth::JwtConfig;
use jsonwebtoken::Algorithm;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_LEEWAY_SECONDS: u32 = 30;
const DEFAULT_JWKS_REFRESH_SECONDS: u64 = 300;
const MIN_JWKS_REFRESH_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct MenuConfig {
    pub auth0_domain: String,
    pub api_audience: String,
    pub algorithm: Algorithm,
    pub leeway_seconds: u32,
    pub jwks_url: String,
    pub dev_public_key_pem: Option<String>,
    pub jwks_refresh: Duration,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub reset_on_start: bool,
    pub host: IpAddr,
    pub port: u16,
}

impl MenuConfig {
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::for_domain(&self.auth0_domain, self.api_audience.clone())
            .with_algorithm(self.algorithm)
            .with_leeway(self.leeway_seconds)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

pub fn load_menu_config() -> Result<MenuConfig> {
    load_from(|key| env::var(key).ok())
}

/// Builds the configuration from any key lookup; `load_menu_config` reads the
/// process environment.
pub fn load_from<F>(lookup: F) -> Result<MenuConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

    let auth0_domain = var("AUTH0_DOMAIN").context("AUTH0_DOMAIN must be set")?;
    let api_audience = var("API_AUDIENCE").context("API_AUDIENCE must be set")?;

    let algorithm = var("JWT_ALGORITHM")
        .map(|value| parse_algorithm(&value))
        .transpose()
        .context("Failed to parse JWT_ALGORITHM")?
        .unwrap_or(Algorithm::RS256);

    let leeway_seconds = var("JWT_LEEWAY_SECONDS")
        .map(|value| value.parse::<u32>())
        .transpose()
        .context("Failed to parse JWT_LEEWAY_SECONDS")?
        .unwrap_or(DEFAULT_LEEWAY_SECONDS);

    let jwks_url = var("JWT_JWKS_URL").unwrap_or_else(|| jwks_url_for_domain(&auth0_domain));
    let dev_public_key_pem = var("JWT_DEV_PUBLIC_KEY_PEM");

    let jwks_refresh_secs = var("JWKS_REFRESH_SECONDS")
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_JWKS_REFRESH_SECONDS)
        .max(MIN_JWKS_REFRESH_SECONDS);

    let store = var("MENU_STORE")
        .map(|value| parse_store_backend(&value))
        .transpose()
        .context("Failed to parse MENU_STORE")?
        .unwrap_or(StoreBackend::Postgres);

    let database_url = var("DATABASE_URL");
    if store == StoreBackend::Postgres && database_url.is_none() {
        bail!("DATABASE_URL must be set when MENU_STORE=postgres");
    }

    let reset_on_start = var("MENU_RESET_ON_START")
        .map(|value| parse_bool(&value))
        .unwrap_or(false);

    let host = var("HOST")
        .unwrap_or_else(|| "0.0.0.0".to_string())
        .parse::<IpAddr>()
        .context("Failed to parse HOST")?;
    let port = var("PORT")
        .map(|value| value.parse::<u16>())
        .transpose()
        .context("Failed to parse PORT")?
        .unwrap_or(DEFAULT_PORT);

    Ok(MenuConfig {
        auth0_domain,
        api_audience,
        algorithm,
        leeway_seconds,
        jwks_url,
        dev_public_key_pem,
        jwks_refresh: Duration::from_secs(jwks_refresh_secs),
        store,
        database_url,
        reset_on_start,
        host,
        port,
    })
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// JWKS keys are RSA, so only the RSA signature family is usable.
fn parse_algorithm(value: &str) -> Result<Algorithm> {
    match value.trim().to_ascii_uppercase().as_str() {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        other => Err(anyhow!(
            "Unsupported JWT algorithm '{other}'. Use RS256, RS384, or RS512."
        )),
    }
}

fn parse_store_backend(value: &str) -> Result<StoreBackend> {
    match value.trim().to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
        "memory" => Ok(StoreBackend::Memory),
        other => Err(anyhow!(
            "Unsupported store backend '{other}'. Use postgres or memory."
        )),
    }
}
