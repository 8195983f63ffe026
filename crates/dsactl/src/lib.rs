//! dsactl: drive a DSA master described by a TOML topology.
//!
//! The topology is built from software switch and MAC models, the master
//! is attached to the first CPU port, and a single control-surface,
//! ethtool or ioctl command is run against it.

pub mod commands;
pub mod config;
pub mod error;
pub mod system;

pub use config::{DsactlConfig, DEFAULT_CONFIG_PATH};
pub use error::{CommandError, CommandResult, ConfigError, Result};
pub use system::System;
