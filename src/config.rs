use serde::{Deserialize, Serialize};
use std::{env, fs};
use tracing::{info, warn};

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub search: SearchConfig,
    pub filters: FilterConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchConfig {
    pub max_results: u32,       // Page size requested from the offers endpoint
    pub cache_ttl_seconds: u64, // Freshness window for repeated identical searches
    pub city_debounce_ms: u64,  // Quiet period before a city lookup is dispatched
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FilterConfig {
    pub default_max_price: f64,
}

impl Config {
    /// Loads config.toml from the working directory.
    /// If it doesn't exist, creates a default one.
    pub fn load() -> Self {
        let config_path = "config.toml";

        if let Ok(content) = fs::read_to_string(config_path) {
            match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to parse config.toml: {}. Using defaults.", e),
            }
        }

        let default_config = Config {
            api: ApiConfig {
                base_url: "https://test.api.amadeus.com".to_string(),
            },
            search: SearchConfig {
                max_results: 50,
                cache_ttl_seconds: 300,
                city_debounce_ms: 500,
            },
            filters: FilterConfig {
                default_max_price: 2000.0,
            },
        };

        // Save default config to disk for the user to edit later
        match toml::to_string_pretty(&default_config) {
            Ok(toml_string) => {
                if fs::write(config_path, toml_string).is_err() {
                    warn!("Could not write default config.toml to disk.");
                }
            }
            Err(e) => warn!("Could not serialize default config: {}", e),
        }

        info!("Loaded default configuration.");
        default_config
    }
}

/// API credentials, read from the environment once at startup.
/// These never go into config.toml.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, Error> {
        let client_id = env::var("AMADEUS_CLIENT_ID")
            .map_err(|_| Error::Config("AMADEUS_CLIENT_ID is not set".to_string()))?;
        let client_secret = env::var("AMADEUS_CLIENT_SECRET")
            .map_err(|_| Error::Config("AMADEUS_CLIENT_SECRET is not set".to_string()))?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_is_config_error() {
        env::remove_var("AMADEUS_CLIENT_ID");
        env::remove_var("AMADEUS_CLIENT_SECRET");
        assert!(matches!(Credentials::from_env(), Err(Error::Config(_))));
    }
}
