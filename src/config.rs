//! Environment-driven settings for the three binaries.
//!
//! Values come from the process environment, with a `.env` file honoured via
//! `dotenv`. Every setting except `JWT_SECRET` has a default.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/";
pub const DEFAULT_DATA_API_KEY: &str = "change-me-insecure-key";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable '{0}' must be set")]
    Missing(&'static str),

    #[error("environment variable '{name}' is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Settings of the public API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub database_path: String,
    pub jwt: JwtConfig,
    pub bcrypt_cost: u32,
    pub data_service_url: String,
    pub data_api_key: String,
    pub coingecko_url: String,
    pub market_cache_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_hours: i64,
}

/// Settings of the XML data service.
#[derive(Debug, Clone)]
pub struct DataServiceConfig {
    pub bind_addr: SocketAddr,
    pub database_path: String,
    pub api_key: String,
}

/// Settings of the SOAP market summary service.
#[derive(Debug, Clone)]
pub struct MarketServiceConfig {
    pub bind_addr: SocketAddr,
    pub coingecko_url: String,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let bcrypt_cost = parsed(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                reason: format!("{bcrypt_cost} is outside 4..=31"),
            });
        }

        let ttl_hours: i64 = parsed(&lookup, "JWT_TTL_HOURS", 24)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_TTL_HOURS",
                reason: "must be positive".to_string(),
            });
        }

        Ok(ApiConfig {
            bind_addr: parsed(&lookup, "API_BIND_ADDR", default_addr(3000))?,
            database_path: lookup("API_DATABASE_PATH").unwrap_or_else(|| "users.sqlite".into()),
            jwt: JwtConfig {
                secret,
                issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "cryptofolio".into()),
                audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "cryptofolio-clients".into()),
                ttl_hours,
            },
            bcrypt_cost,
            data_service_url: lookup("DATA_SERVICE_URL")
                .unwrap_or_else(|| "http://localhost:5001/".into()),
            data_api_key: lookup("DATA_API_KEY").unwrap_or_else(|| DEFAULT_DATA_API_KEY.into()),
            coingecko_url: lookup("COINGECKO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_COINGECKO_URL.into()),
            market_cache_ttl: Duration::from_secs(parsed(&lookup, "COINGECKO_CACHE_SECS", 60)?),
        })
    }
}

impl DataServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(DataServiceConfig {
            bind_addr: parsed(&lookup, "DATA_BIND_ADDR", default_addr(5001))?,
            database_path: lookup("DATA_DATABASE_PATH").unwrap_or_else(|| "data.sqlite".into()),
            api_key: lookup("DATA_API_KEY").unwrap_or_else(|| DEFAULT_DATA_API_KEY.into()),
        })
    }
}

impl MarketServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(MarketServiceConfig {
            bind_addr: parsed(&lookup, "SOAP_BIND_ADDR", default_addr(5002))?,
            coingecko_url: lookup("COINGECKO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_COINGECKO_URL.into()),
        })
    }
}

fn env_lookup(name: &str) -> Option<String> {
    dotenv::var(name).ok()
}

fn default_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn api_config_requires_a_jwt_secret() {
        let err = ApiConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn api_config_fills_in_defaults() {
        let config = ApiConfig::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.jwt.ttl_hours, 24);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.coingecko_url, DEFAULT_COINGECKO_URL);
        assert_eq!(config.market_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.data_api_key, DEFAULT_DATA_API_KEY);
    }

    #[test]
    fn malformed_numbers_are_reported_by_name() {
        let err = ApiConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("COINGECKO_CACHE_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "COINGECKO_CACHE_SECS", .. }));
    }

    #[test]
    fn bcrypt_cost_must_be_in_range() {
        let err = ApiConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("BCRYPT_COST", "2"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BCRYPT_COST", .. }));
    }

    #[test]
    fn service_configs_read_their_own_addresses() {
        let data = DataServiceConfig::from_lookup(lookup_from(&[
            ("DATA_BIND_ADDR", "127.0.0.1:6001"),
            ("DATA_API_KEY", "k"),
        ]))
        .unwrap();
        assert_eq!(data.bind_addr, "127.0.0.1:6001".parse().unwrap());
        assert_eq!(data.api_key, "k");

        let soap = MarketServiceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(soap.bind_addr.port(), 5002);
    }
}
