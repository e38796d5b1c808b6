//! Server configuration loaded from the environment

use std::time::Duration;

use geotemp_shared::BoundingBox;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_CATALOG_SEARCH_URL: &str =
    "https://planetarycomputer.microsoft.com/api/stac/v1/search";
const DEFAULT_CATALOG_COLLECTION: &str = "goes-lst";
const DEFAULT_CATALOG_LIMIT: u32 = 100;
const DEFAULT_PROCESS_PROGRAM: &str = "python3";
const DEFAULT_PROCESS_ARGS: &str = "get_temperature_data.py";
/// 8 MiB of JSON is far beyond any realistic station grid for the region
const DEFAULT_PROCESS_MAX_OUTPUT_BYTES: usize = 8 * 1024 * 1024;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// Minimum signing secret length in bytes (256 bits)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where registered users are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialBackend {
    Postgres,
    /// Process-local store, lost on restart. Development only.
    Memory,
}

/// Which retrieval strategy serves temperature requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureSource {
    Catalog,
    Process,
    Fixture,
}

impl TemperatureSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureSource::Catalog => "catalog",
            TemperatureSource::Process => "process",
            TemperatureSource::Fixture => "fixture",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub allowed_origins: Vec<String>,

    pub credential_backend: CredentialBackend,
    pub database_url: Option<String>,
    pub run_migrations: bool,

    pub jwt_secret: String,
    pub session_ttl: Duration,
    /// Adds `Secure` to the session cookie; enable behind TLS
    pub cookie_secure: bool,

    pub temperature_source: TemperatureSource,
    pub region: BoundingBox,
    pub upstream_timeout: Duration,

    pub catalog_search_url: String,
    pub catalog_collection: String,
    pub catalog_limit: u32,

    pub process_program: String,
    pub process_args: Vec<String>,
    pub process_max_output_bytes: usize,
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let credential_backend = match get("CREDENTIAL_STORE").as_deref() {
            None | Some("postgres") => CredentialBackend::Postgres,
            Some("memory") => CredentialBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "CREDENTIAL_STORE",
                    reason: format!("unknown backend '{other}' (expected postgres or memory)"),
                })
            }
        };

        let database_url = get("DATABASE_URL");
        if credential_backend == CredentialBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LENGTH} bytes"),
            });
        }

        let temperature_source = match get("TEMPERATURE_SOURCE").as_deref() {
            None | Some("catalog") => TemperatureSource::Catalog,
            Some("process") => TemperatureSource::Process,
            Some("fixture") => TemperatureSource::Fixture,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "TEMPERATURE_SOURCE",
                    reason: format!(
                        "unknown source '{other}' (expected catalog, process or fixture)"
                    ),
                })
            }
        };

        let region = match get("REGION_BBOX") {
            Some(raw) => parse_bbox(&raw)?,
            None => BoundingBox::WEST_VIRGINIA,
        };

        Ok(Self {
            bind_address: get_or("BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            allowed_origins: get_or("ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            credential_backend,
            database_url,
            run_migrations: parse_bool(get("RUN_MIGRATIONS"), "RUN_MIGRATIONS", true)?,
            jwt_secret,
            session_ttl: Duration::from_secs(parse_number(
                get("SESSION_TTL_SECS"),
                "SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )?),
            cookie_secure: parse_bool(get("COOKIE_SECURE"), "COOKIE_SECURE", false)?,
            temperature_source,
            region,
            upstream_timeout: Duration::from_secs(parse_number(
                get("UPSTREAM_TIMEOUT_SECS"),
                "UPSTREAM_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )?),
            catalog_search_url: get_or("CATALOG_SEARCH_URL", DEFAULT_CATALOG_SEARCH_URL),
            catalog_collection: get_or("CATALOG_COLLECTION", DEFAULT_CATALOG_COLLECTION),
            catalog_limit: parse_number(
                get("CATALOG_LIMIT"),
                "CATALOG_LIMIT",
                DEFAULT_CATALOG_LIMIT,
            )?,
            process_program: get_or("PROCESS_PROGRAM", DEFAULT_PROCESS_PROGRAM),
            process_args: get_or("PROCESS_ARGS", DEFAULT_PROCESS_ARGS)
                .split_whitespace()
                .map(String::from)
                .collect(),
            process_max_output_bytes: parse_number(
                get("PROCESS_MAX_OUTPUT_BYTES"),
                "PROCESS_MAX_OUTPUT_BYTES",
                DEFAULT_PROCESS_MAX_OUTPUT_BYTES,
            )?,
        })
    }
}

fn parse_number<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    let Ok(value) = raw.trim().parse::<T>() else {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("'{raw}' is not a number"),
        });
    };
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(raw: Option<String>, name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

fn parse_bbox(raw: &str) -> Result<BoundingBox, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name: "REGION_BBOX",
        reason: reason.to_string(),
    };

    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid("expected four comma-separated numbers"))?;

    let corners: [f64; 4] = values
        .try_into()
        .map_err(|_| invalid("expected min_lon,min_lat,max_lon,max_lat"))?;
    let bbox = BoundingBox::from(corners);
    if !bbox.is_valid() {
        return Err(invalid("corners must be ordered and within WGS84 range"));
    }
    Ok(bbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    /// Memory store and a valid secret, overridden by `extra`
    fn load_with(extra: &[(&'static str, &'static str)]) -> Result<Config, ConfigError> {
        let mut pairs = vec![("CREDENTIAL_STORE", "memory"), ("JWT_SECRET", SECRET)];
        pairs.extend_from_slice(extra);
        load(&pairs)
    }

    fn invalid_name(err: ConfigError) -> &'static str {
        match err {
            ConfigError::Invalid { name, .. } => name,
            other => panic!("expected an invalid value, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_with_memory_store() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.credential_backend, CredentialBackend::Memory);
        assert_eq!(config.temperature_source, TemperatureSource::Catalog);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.catalog_limit, 100);
        assert_eq!(config.catalog_collection, "goes-lst");
        assert_eq!(config.region, BoundingBox::WEST_VIRGINIA);
        assert!(!config.cookie_secure);
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = load(&[("JWT_SECRET", SECRET)]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = load_with(&[("JWT_SECRET", "short")]).unwrap_err();
        assert_eq!(invalid_name(err), "JWT_SECRET");
    }

    #[test]
    fn test_unknown_source_rejected() {
        let source = ("TEMPERATURE_SOURCE", "satellite");
        let err = load_with(&[source]).unwrap_err();
        assert_eq!(invalid_name(err), "TEMPERATURE_SOURCE");
    }

    #[test]
    fn test_process_args_and_region_override() {
        let config = load_with(&[
            ("TEMPERATURE_SOURCE", "process"),
            ("PROCESS_ARGS", "-u scripts/get_temperature_data.py"),
            ("REGION_BBOX", "-85.0, 35.0, -75.0, 42.0"),
        ])
        .unwrap();
        assert_eq!(config.temperature_source, TemperatureSource::Process);
        assert_eq!(
            config.process_args,
            vec!["-u", "scripts/get_temperature_data.py"]
        );
        assert_eq!(config.region, BoundingBox::new(-85.0, 35.0, -75.0, 42.0));
    }

    #[test]
    fn test_invalid_region_rejected() {
        let swapped = ("REGION_BBOX", "-75.0,35.0,-85.0,42.0");
        let err = load_with(&[swapped]).unwrap_err();
        assert_eq!(invalid_name(err), "REGION_BBOX");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = load_with(&[("UPSTREAM_TIMEOUT_SECS", "0")]).unwrap_err();
        assert_eq!(invalid_name(err), "UPSTREAM_TIMEOUT_SECS");
    }
}
