//! Process configuration from the environment.
//!
//! | Variable                    | Default | Meaning                             |
//! |-----------------------------|---------|-------------------------------------|
//! | `HOUSING_DATA_DIR`          | `data`  | Directory scanned for CSV datasets  |
//! | `HOUSING_PORT`              | `3000`  | HTTP port                           |
//! | `HOUSING_PREFERRED_DATASET` | unset   | File name or keyword to prefer      |
//!
//! A `.env` file in the working directory is loaded first. CLI flags
//! override whatever is read here.

use std::env;
use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

pub const DATA_DIR_VAR: &str = "HOUSING_DATA_DIR";
pub const PORT_VAR: &str = "HOUSING_PORT";
pub const PREFERRED_DATASET_VAR: &str = "HOUSING_PREFERRED_DATASET";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    pub preferred_dataset: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            port: DEFAULT_PORT,
            preferred_dataset: None,
        }
    }
}

impl AppConfig {
    /// Read the configuration from `.env` and the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        // Try loading .env file
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match set(PORT_VAR) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: PORT_VAR.to_string(),
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            data_dir: set(DATA_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            port,
            preferred_dataset: set(PREFERRED_DATASET_VAR).map(|v| v.trim().to_string()),
        })
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.data_dir = dir;
        }
        self
    }
}
