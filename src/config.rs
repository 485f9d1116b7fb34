use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub const DEFAULT_API_BASE: &str = "https://api.exchange.coinbase.com";
pub const DEFAULT_WS_URL: &str = "wss://ws-feed.exchange.coinbase.com";

/// Non-secret settings, one environment variable per field.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base: String,
    pub ws_url: String,
    pub log_dir: PathBuf,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            api_base: std::env::var("CBPRO_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            ws_url: std::env::var("CBPRO_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string()),
            log_dir: std::env::var("ROBERTO_LOG_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./log")),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
        }
    }

    /// CLI `--log-dir` wins over `ROBERTO_LOG_DIR`.
    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.log_dir = dir;
        }
        self
    }
}

/// API credentials. `api_secret` is the base64 secret issued by the exchange.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Load from a dotenv-format file. Keys in the file win; the process
    /// environment fills in whatever the file lacks. A missing file is not an
    /// error on its own, a missing key is.
    pub fn load(env_file: &Path) -> Result<Self> {
        let mut values = HashMap::new();
        if env_file.exists() {
            let iter = dotenv::from_path_iter(env_file)
                .with_context(|| format!("reading {}", env_file.display()))?;
            for item in iter {
                let (key, value) = item.with_context(|| format!("parsing {}", env_file.display()))?;
                values.insert(key, value);
            }
        }
        for key in ["API_KEY", "API_SECRET", "PASSPHRASE"] {
            if !values.contains_key(key) {
                if let Ok(value) = std::env::var(key) {
                    values.insert(key.to_string(), value);
                }
            }
        }
        Self::from_map(&values).with_context(|| format!("loading credentials from {}", env_file.display()))
    }

    pub fn from_map(values: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            values
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("missing {}", key))
        };
        let creds = Self {
            api_key: get("API_KEY")?,
            api_secret: get("API_SECRET")?,
            passphrase: get("PASSPHRASE")?,
        };
        STANDARD
            .decode(&creds.api_secret)
            .map_err(|e| anyhow!("API_SECRET is not valid base64: {}", e))?;
        Ok(creds)
    }
}
