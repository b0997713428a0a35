use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

pub const UPLOAD_DIRECTORY_ENV: &str = "UPLOAD_DIRECTORY";
/// Older lower-case spelling, still honored when the upper-case one is unset.
pub const LEGACY_UPLOAD_DIRECTORY_ENV: &str = "upload_directory";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upload_directory: PathBuf,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first when present;
    /// variables already set in the environment win over it.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            tracing::info!("No .env file found: {err}");
        }

        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let upload_directory = [UPLOAD_DIRECTORY_ENV, LEGACY_UPLOAD_DIRECTORY_ENV]
            .into_iter()
            .filter_map(&lookup)
            .find(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(UPLOAD_DIRECTORY_ENV))?;

        let port = match lookup("PORT") {
            Some(port) => port.parse().map_err(|err: std::num::ParseIntError| {
                ConfigError::Invalid {
                    name: "PORT",
                    reason: err.to_string(),
                }
            })?,
            None => 8080,
        };

        Ok(Self {
            upload_directory,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::Invalid {
                name: "HOST",
                reason: err.to_string(),
            })
    }
}
