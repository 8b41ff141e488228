//! Server configuration parsed from the command line and environment.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::conn::DEFAULT_MAX_REQUEST_BYTES;

/// Lowest port the server will listen on (start of the dynamic range).
pub const MIN_PORT: u16 = 49152;
pub const MAX_PORT: u16 = 65535;

pub const USAGE: &str = "Usage: server <listening_port>";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("listening_port must be a number, got `{0}`")]
    InvalidPort(String),
    #[error("listening_port must be between {MIN_PORT} and {MAX_PORT}, got {0}")]
    PortOutOfRange(u64),
}

#[derive(Parser, Debug)]
#[command(name = "server", about = "Serves video manifests and chunks over length-prefixed TCP frames")]
pub struct ServerArgs {
    /// Port to listen on (49152-65535).
    pub listening_port: String,

    #[arg(long, env = "ABR_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    #[arg(long = "bind", env = "ABR_BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    #[arg(long, env = "ABR_MAX_REQUEST_BYTES", default_value_t = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_request_bytes: u32,
}

impl ServerConfig {
    /// Validate parsed arguments into a typed config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the port is not a number in the dynamic range.
    pub fn from_args(args: ServerArgs) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: args.bind_addr,
            port: parse_port(&args.listening_port)?,
            data_dir: args.data_dir,
            max_request_bytes: args.max_request_bytes,
        })
    }
}

/// Parse a listening port, accepting only 49152-65535.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPort`] for non-numeric input and
/// [`ConfigError::PortOutOfRange`] for numbers outside the range.
pub fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPort(raw.to_owned()))?;
    match u16::try_from(value) {
        Ok(port) if port >= MIN_PORT => Ok(port),
        _ => Err(ConfigError::PortOutOfRange(value)),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
