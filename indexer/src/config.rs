use clap::Parser;
use db::is_valid_dataset_name;
use serde::{Deserialize, Serialize};
use std::num::{NonZeroU64, NonZeroUsize};
use std::time::Duration;
use std::{fs, io};
use thiserror::Error;
use tracing::info;

use crate::planner::WindowPolicy;

const DEFAULT_WINDOW_SIZE: NonZeroU64 = match NonZeroU64::new(150) {
    Some(size) => size,
    None => unreachable!(),
};
const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(size) => size,
    None => unreachable!(),
};

#[derive(Parser, Debug, Default)]
#[clap(about = "Loads the most recent blocks of a chain into a Postgres warehouse")]
pub struct CLIArguments {
    #[clap(long, value_parser)]
    pub config_path: Option<String>,

    /// Overrides `window_size` from the config file.
    #[clap(long, value_parser)]
    pub window_size: Option<NonZeroU64>,

    /// Overrides `batch_size` from the config file.
    #[clap(long, value_parser)]
    pub batch_size: Option<NonZeroUsize>,

    /// Load into memory instead of Postgres.
    #[clap(long, action)]
    pub dry_run: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a proper toml file: {source}")]
    Malformed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IndexerConfig {
    pub rpc_url: String,
    /// Postgres schema the `blocks` table lives in.
    pub dataset_name: String,
    pub window_size: NonZeroU64,
    pub batch_size: NonZeroUsize,
    pub max_concurrent_requests: NonZeroUsize,
    pub request_timeout_secs: u64,
    pub window_policy: WindowPolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            rpc_url: "https://ethereum-rpc.publicnode.com".to_string(),
            dataset_name: "ethereum".to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_requests: NonZeroUsize::MIN,
            request_timeout_secs: 30,
            window_policy: WindowPolicy::Trailing,
        }
    }
}

impl IndexerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn apply(&mut self, args: &CLIArguments) {
        if let Some(window_size) = args.window_size {
            self.window_size = window_size;
        }
        if let Some(batch_size) = args.batch_size {
            self.batch_size = batch_size;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "rpc_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !is_valid_dataset_name(&self.dataset_name) {
            return Err(ConfigError::Invalid {
                field: "dataset_name",
                reason: format!("{:?} is not a lowercase SQL identifier", self.dataset_name),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

pub fn parse_config(config_str: &str, path: &str) -> Result<IndexerConfig, ConfigError> {
    let config: IndexerConfig =
        toml::from_str(config_str).map_err(|source| ConfigError::Malformed {
            path: path.to_string(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

/// Reads the config at `config_path`; a missing file means defaults.
pub fn load_config(config_path: Option<&str>) -> Result<IndexerConfig, ConfigError> {
    let path = match config_path {
        Some(path) => path,
        None => {
            info!("no config path given, using defaults");
            return Ok(IndexerConfig::default());
        }
    };

    match fs::read_to_string(path) {
        Ok(file_str) => parse_config(&file_str, path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("{} not found, using defaults", path);
            Ok(IndexerConfig::default())
        }
        Err(source) => Err(ConfigError::Unreadable {
            path: path.to_string(),
            source,
        }),
    }
}
