//! Configuration for the VNSI TCP server.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. environment variables
//!    - `VNSI_BIND_ADDR`   (default: "0.0.0.0")
//!    - `VNSI_PORT`        (default: "34890")
//!    - `VNSI_MAX_CLIENTS` (default: "64")
//!    - `VNSI_LOG`         (default: "info")
//! 4. command line flags

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use vnsi_core::EngineConfig;

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PORT: u16 = 34890;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Minimum seconds between two EPG change notices for one channel.
    pub epg_min_interval_secs: u64,

    /// Name reported to clients on login.
    pub server_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_clients: 64,
            log_level: "info".to_string(),
            epg_min_interval_secs: 5,
            server_name: EngineConfig::default().server_name,
        }
    }
}

#[derive(Debug, Default, Parser)]
#[command(name = "vnsi-server", version)]
#[command(about = "VDR network streaming interface server")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to
    #[arg(short, long)]
    pub bind: Option<String>,

    /// TCP port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum number of connected clients
    #[arg(long)]
    pub max_clients: Option<usize>,

    /// Log filter, e.g. "debug" or "vnsi_core=trace"
    #[arg(short, long)]
    pub log_level: Option<String>,
}

impl Config {
    /// Build the effective configuration for `cli`.
    pub fn load(cli: &Cli) -> ServerResult<Self> {
        let config = match &cli.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        let mut config = config.with_env(|key| env::var(key).ok())?;
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            ServerError::config(format!("cannot read {}: {err}", path.display()))
        })?;
        Config::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|err| ServerError::config(err.to_string()))
    }

    /// Override fields from environment variables, read through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("VNSI_BIND_ADDR") {
            self.bind_addr = addr;
        }
        self.port = read_var_or(&lookup, "VNSI_PORT", self.port)?;
        self.max_clients = read_var_or(&lookup, "VNSI_MAX_CLIENTS", self.max_clients)?;
        if let Some(level) = lookup("VNSI_LOG") {
            self.log_level = level;
        }
        Ok(self)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(bind) = &cli.bind {
            self.bind_addr = bind.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(max) = cli.max_clients {
            self.max_clients = max;
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Per-connection settings handed to every engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            server_name: self.server_name.clone(),
            epg_min_interval: Duration::from_secs(self.epg_min_interval_secs),
            ..EngineConfig::default()
        }
    }
}

fn read_var_or<T, F>(lookup: &F, key: &str, default: T) -> ServerResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => val
            .parse::<T>()
            .map_err(|err| ServerError::config(format!("{key}={val:?}: {err}"))),
        None => Ok(default),
    }
}
