use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use anyhow::Context;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub supabase_url: Option<String>,
    pub public_base_url: String,
    pub notifier_capacity: usize,
}

impl Config {
    /// Reads the process environment (after `.env`, if any).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = optional(&lookup, "DATABASE_URL");
        if database_url.is_none() {
            warn!("DATABASE_URL not set, polls are kept in memory only");
        }

        let supabase_url = optional(&lookup, "SUPABASE_URL");
        if supabase_url.is_none() {
            warn!("SUPABASE_URL not set, every caller is treated as anonymous");
        }

        Ok(Self {
            bind_addr: parse(&lookup, "BIND_ADDR", "0.0.0.0:3000")?,
            database_url,
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            supabase_url,
            public_base_url: optional(&lookup, "PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            notifier_capacity: parse(&lookup, "NOTIFIER_CAPACITY", "64")?,
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = optional(lookup, key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.supabase_url, None);
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert_eq!(config.notifier_capacity, 64);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("BIND_ADDR", "127.0.0.1:8000"),
            ("DATABASE_URL", "postgres://localhost/polls"),
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("PUBLIC_BASE_URL", "https://polls.example.com/"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/polls"));
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.public_base_url, "https://polls.example.com");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config(&[("DATABASE_URL", "  "), ("BIND_ADDR", "")]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.bind_addr.port(), 3000);
    }

    #[test]
    fn bad_numbers_name_the_variable() {
        let err = config(&[("NOTIFIER_CAPACITY", "lots")]).unwrap_err();
        assert!(err.to_string().contains("NOTIFIER_CAPACITY"));
    }
}
