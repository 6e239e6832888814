// PathSim: Packet path simulation and topology validation for virtual networks
// Copyright (C) 2026 The PathSim Developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! This module contains the code for reading the configuration.
//!
//! ```toml
//! max_hops = 20
//! trace_capacity = 1024
//! ping_count = 4
//!
//! [traceroute]
//! max_ttl = 20
//! timeout = 2
//! mode = "simulated"
//! ```

use std::path::Path;

use log::*;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Environment variable pointing to the configuration file.
pub const CONFIG_ENV: &str = "PATHSIM_CONFIG";

/// Configuration of the path simulation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Maximum number of forwarding steps of a trace.
    #[serde(deserialize_with = "deserialize_nonzero")]
    pub max_hops: usize,
    /// Maximum number of traces kept in memory.
    #[serde(deserialize_with = "deserialize_nonzero")]
    pub trace_capacity: usize,
    /// Number of probes sent by a ping if the caller does not specify it.
    pub ping_count: usize,
    /// Traceroute settings
    pub traceroute: TracerouteConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_hops: 20,
            trace_capacity: 1024,
            ping_count: 4,
            traceroute: TracerouteConfig::default(),
        }
    }
}

/// Configuration of traceroute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerouteConfig {
    /// Maximum TTL (number of hops).
    #[serde(deserialize_with = "deserialize_nonzero")]
    pub max_ttl: usize,
    /// Time to wait for a response, in seconds.
    pub timeout: u64,
    /// Where the traceroute is computed.
    pub mode: TracerouteMode,
}

impl Default for TracerouteConfig {
    fn default() -> Self {
        Self {
            max_ttl: 20,
            timeout: 2,
            mode: TracerouteMode::Simulated,
        }
    }
}

/// How a traceroute is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracerouteMode {
    /// Run the forwarding simulation.
    Simulated,
    /// Run `traceroute` on the source node of the emulation backend and parse its output.
    Backend,
}

/// Errors while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file cannot be read.
    #[error("Cannot read the configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The file is no valid configuration.
    #[error("Cannot parse the configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SimConfig {
    /// Parse the configuration from a TOML string. Missing keys get their default value.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read the configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path.as_ref())?;
        debug!("Read configuration from {}", path.as_ref().display());
        Self::from_toml_str(&s)
    }

    /// Read the configuration from the file in `PATHSIM_CONFIG`, or use the default if the
    /// variable is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }
}

fn deserialize_nonzero<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let x = usize::deserialize(deserializer)?;
    if x == 0 {
        Err(serde::de::Error::custom("value must be greater than zero"))
    } else {
        Ok(x)
    }
}
