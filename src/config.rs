// src/config.rs

use serde::Deserialize;

use crate::error::KronosError;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client configuration, read from `KRONOS_*` environment variables.
///
/// `api_base_url` is the bare host (the `/api/v1` prefix is added by the
/// client), `token_url` is the external identity provider's token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct KronosConfig {
    pub api_base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl KronosConfig {
    /// Loads configuration from the environment (and a `.env` file if
    /// present), expecting variables prefixed with `KRONOS_`.
    pub fn from_env() -> Result<Self, KronosError> {
        dotenv::dotenv().ok();
        envy::prefixed("KRONOS_")
            .from_env::<KronosConfig>()
            .map_err(|e| KronosError::Config(e.to_string()))
    }
}
