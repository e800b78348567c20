//! Server configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::cache::CacheConfig;
use crate::proximity::ProximityConfig;
use crate::schedule::StitchConfig;

/// Error from reading the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddr {
        var: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("{var} is set but empty")]
    Empty { var: &'static str },
}

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (`NEARBY_ADDR`).
    pub addr: SocketAddr,

    /// JSON array of POIs for all networks (`NEARBY_POIS`).
    pub pois_path: PathBuf,

    /// Flat schedule directory (`NEARBY_SCHEDULE_DIR`).
    pub schedule_dir: PathBuf,

    /// Schedule cache directory (`NEARBY_CACHE_DIR`).
    pub cache_dir: PathBuf,

    pub proximity: ProximityConfig,
    pub stitch: StitchConfig,
    pub cache: CacheConfig,
}

impl ServerConfig {
    pub const ADDR_VAR: &'static str = "NEARBY_ADDR";
    pub const POIS_VAR: &'static str = "NEARBY_POIS";
    pub const SCHEDULE_DIR_VAR: &'static str = "NEARBY_SCHEDULE_DIR";
    pub const CACHE_DIR_VAR: &'static str = "NEARBY_CACHE_DIR";

    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = match lookup(Self::ADDR_VAR) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidAddr {
                    var: Self::ADDR_VAR,
                    value,
                    source,
                })?,
            None => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        Ok(Self {
            addr,
            pois_path: path_var(&lookup, Self::POIS_VAR, "data/pois.json")?,
            schedule_dir: path_var(&lookup, Self::SCHEDULE_DIR_VAR, "data/schedule")?,
            cache_dir: path_var(&lookup, Self::CACHE_DIR_VAR, "data/cache")?,
            proximity: ProximityConfig::default(),
            stitch: StitchConfig::default(),
            cache: CacheConfig::default(),
        })
    }
}

fn path_var<F>(lookup: &F, var: &'static str, default: &str) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty { var }),
        Some(value) => Ok(PathBuf::from(value)),
        None => Ok(PathBuf::from(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.pois_path, PathBuf::from("data/pois.json"));
        assert_eq!(config.schedule_dir, PathBuf::from("data/schedule"));
        assert_eq!(config.cache_dir, PathBuf::from("data/cache"));
        assert_eq!(config.proximity.max_results, 25);
    }

    #[test]
    fn reads_variables() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("NEARBY_ADDR", "0.0.0.0:8080"),
            ("NEARBY_POIS", "/srv/pois.json"),
            ("NEARBY_SCHEDULE_DIR", "/srv/schedule"),
            ("NEARBY_CACHE_DIR", "/var/cache/nearby"),
        ]))
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.pois_path, PathBuf::from("/srv/pois.json"));
        assert_eq!(config.schedule_dir, PathBuf::from("/srv/schedule"));
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/nearby"));
    }

    #[test]
    fn invalid_addr() {
        let err = ServerConfig::from_lookup(lookup(&[("NEARBY_ADDR", "localhost")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddr { .. }));
        assert_eq!(
            err.to_string(),
            "NEARBY_ADDR is not a valid socket address: localhost"
        );
    }

    #[test]
    fn empty_path() {
        let err = ServerConfig::from_lookup(lookup(&[("NEARBY_CACHE_DIR", " ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Empty { var: "NEARBY_CACHE_DIR" }));
    }
}
