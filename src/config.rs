use crate::domain::value_objects::Role;
use anyhow::Context;

/// One connection the router should open at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub role: Role,
    /// Path of the SQLite database file
    pub path: String,
    /// Relative weight (secondaries only)
    pub weight: i64,
}

impl ConnectionConfig {
    pub fn primary(path: impl Into<String>) -> Self {
        Self {
            role: Role::Primary,
            path: path.into(),
            weight: 1,
        }
    }

    pub fn secondary(path: impl Into<String>, weight: i64) -> Self {
        Self {
            role: Role::Secondary,
            path: path.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Pin reads to the primary once it has been used
    pub safe_mode: bool,
    pub connections: Vec<ConnectionConfig>,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            safe_mode: true,
            connections: Vec::new(),
            debug: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set safe mode.
    pub fn safe_mode(mut self, enabled: bool) -> Self {
        self.safe_mode = enabled;
        self
    }

    /// Add a connection entry.
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.connections.push(connection);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let primaries = self
            .connections
            .iter()
            .filter(|c| c.role == Role::Primary)
            .count();
        if primaries > 1 {
            return Err(ConfigError::MultiplePrimaries(primaries));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("at most one primary connection may be configured, found {0}")]
    MultiplePrimaries(usize),
}

/// Parse `role:path[:weight]` entries separated by commas.
///
/// ```
/// use query_router::config::parse_connections;
///
/// let parsed = parse_connections("primary:app.db, secondary:replica.db:3").unwrap();
/// assert_eq!(parsed.len(), 2);
/// assert_eq!(parsed[1].weight, 3);
/// ```
pub fn parse_connections(spec: &str) -> anyhow::Result<Vec<ConnectionConfig>> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_connection)
        .collect()
}

fn parse_connection(entry: &str) -> anyhow::Result<ConnectionConfig> {
    let mut parts = entry.splitn(3, ':');
    let role = parts.next().unwrap_or_default();
    let path = parts
        .next()
        .filter(|p| !p.is_empty())
        .with_context(|| format!("connection entry '{}' has no path", entry))?;
    let weight = match parts.next() {
        Some(w) => w
            .trim()
            .parse::<i64>()
            .with_context(|| format!("connection entry '{}' has a non-numeric weight", entry))?,
        None => 1,
    };

    Ok(ConnectionConfig {
        role: role.parse::<Role>()?,
        path: path.to_string(),
        weight,
    })
}

pub fn load_config() -> anyhow::Result<Config> {
    let safe_mode = std::env::var("QUERY_ROUTER_SAFE_MODE")
        .map(|v| !(v == "0" || v.to_lowercase() == "false"))
        .unwrap_or(true);

    let connections = match std::env::var("QUERY_ROUTER_CONNECTIONS") {
        Ok(spec) => parse_connections(&spec).context("invalid QUERY_ROUTER_CONNECTIONS")?,
        Err(_) => Vec::new(),
    };

    let debug = std::env::var("DEBUG").is_ok();

    let config = Config {
        safe_mode,
        connections,
        debug,
    };
    config.validate()?;
    Ok(config)
}
