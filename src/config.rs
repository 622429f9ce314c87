use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

/// Secret used to sign real-time tokens when `JWT_SECRET` is unset outside prod.
pub const DEV_JWT_SECRET: &str = "alora-dev-secret-change-me";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub host: String,
    pub port: u16,

    // Internal API relay
    pub api_key: Option<String>,
    pub internal_api_url: String,
    pub upstream_timeout_seconds: u64,
    pub max_upload_bytes: usize,

    // Geocoding relay
    pub geocoding_url: String,
    pub geocoding_api_key: Option<String>,

    // Real-time channel
    pub jwt_secret: String,
    pub ws_idle_timeout_seconds: u64,
    pub ws_ping_interval_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Environment::Dev,
            host: "0.0.0.0".to_string(),
            port: 5000,
            api_key: None,
            internal_api_url: "http://127.0.0.1:5000/api".to_string(),
            upstream_timeout_seconds: 30,
            max_upload_bytes: 25 * 1024 * 1024,
            geocoding_url: "https://nominatim.openstreetmap.org".to_string(),
            geocoding_api_key: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            ws_idle_timeout_seconds: 120,
            ws_ping_interval_seconds: 30,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let env = Environment::from_str(&var("ENV").unwrap_or_else(|| "dev".to_string()));
        let host = var("HOST").unwrap_or(defaults.host);
        let port: u16 = parse_or("PORT", var("PORT"), defaults.port)?;

        // Internal API relay
        let api_key = var("API_KEY");
        let internal_api_url = var("INTERNAL_API_URL")
            .unwrap_or_else(|| format!("http://127.0.0.1:{}/api", port));
        url::Url::parse(&internal_api_url).context("INTERNAL_API_URL must be an absolute URL")?;
        let upstream_timeout_seconds = parse_or(
            "UPSTREAM_TIMEOUT_SECONDS",
            var("UPSTREAM_TIMEOUT_SECONDS"),
            defaults.upstream_timeout_seconds,
        )?;
        let max_upload_bytes =
            parse_or("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"), defaults.max_upload_bytes)?;

        // Geocoding relay
        let geocoding_url = var("GEOCODING_URL").unwrap_or(defaults.geocoding_url);
        url::Url::parse(&geocoding_url).context("GEOCODING_URL must be an absolute URL")?;
        let geocoding_api_key = var("GEOCODING_API_KEY");

        // Real-time auth
        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if env.is_prod() => bail!("JWT_SECRET must be set in production"),
            None => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let ws_idle_timeout_seconds = parse_or(
            "WS_IDLE_TIMEOUT_SECONDS",
            var("WS_IDLE_TIMEOUT_SECONDS"),
            defaults.ws_idle_timeout_seconds,
        )?;
        let ws_ping_interval_seconds = parse_or(
            "WS_PING_INTERVAL_SECONDS",
            var("WS_PING_INTERVAL_SECONDS"),
            defaults.ws_ping_interval_seconds,
        )?;
        // Pongs to the heartbeat are what keep a listen-only socket inside the idle window
        if ws_ping_interval_seconds == 0 || ws_ping_interval_seconds >= ws_idle_timeout_seconds {
            bail!(
                "WS_PING_INTERVAL_SECONDS ({}) must be between 1 and WS_IDLE_TIMEOUT_SECONDS ({})",
                ws_ping_interval_seconds,
                ws_idle_timeout_seconds
            );
        }

        // CORS
        let cors_allow_origins = var("CORS_ALLOW_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_allow_origins);

        if api_key.is_none() {
            tracing::warn!("API_KEY not set, proxy routes will answer 500");
        }

        Ok(Settings {
            env,
            host,
            port,
            api_key,
            internal_api_url,
            upstream_timeout_seconds,
            max_upload_bytes,
            geocoding_url,
            geocoding_api_key,
            jwt_secret,
            ws_idle_timeout_seconds,
            ws_ping_interval_seconds,
            cors_allow_origins,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
