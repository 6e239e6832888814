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

//! Module containing all type definitions

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use petgraph::prelude::*;
use probe_craft::ProbeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) type IndexType = u32;
/// Node Identification (and index into the graph of the emulated network)
pub type NodeId = NodeIndex<IndexType>;

/// Prefix length assumed for addresses that are given without one.
pub const DEFAULT_PREFIX_LEN: u8 = 24;

/// The kind of a node. It is resolved once when the node is created, and never inferred from the
/// name afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// End host with a single address
    Host,
    /// Layer-2 switch, forwarding purely by link topology
    Switch,
    /// Router with one address per interface and a static routing table
    Router,
}

impl NodeKind {
    /// Infer the kind from the legacy naming convention (`h*`, `s*` and `r*`). This is only meant
    /// for importing topologies that carry no explicit kind.
    pub fn from_name_prefix(name: &str) -> Option<Self> {
        match name.chars().next()?.to_ascii_lowercase() {
            'h' => Some(Self::Host),
            's' => Some(Self::Switch),
            'r' => Some(Self::Router),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Host => write!(f, "Host"),
            NodeKind::Switch => write!(f, "Switch"),
            NodeKind::Router => write!(f, "Router"),
        }
    }
}

/// Parse an address with an optional prefix length (`10.0.0.1` or `10.0.0.1/24`). Addresses
/// without a prefix length get `default_len`. The unspecified address `0.0.0.0` counts as no
/// address at all.
pub fn parse_addr(s: &str, default_len: u8) -> Option<Ipv4Net> {
    let s = s.trim();
    let net = if s.contains('/') {
        s.parse::<Ipv4Net>().ok()?
    } else {
        Ipv4Net::new(s.parse::<Ipv4Addr>().ok()?, default_len).ok()?
    };
    if net.addr().is_unspecified() {
        None
    } else {
        Some(net)
    }
}

/// Errors raised while building or modifying the emulated network.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A node with that name already exists.
    #[error("Node {0} already exists")]
    DuplicateNode(String),
    /// The node is not part of the topology.
    #[error("Node was not found in the topology: {0}")]
    NodeNotFound(String),
    /// The node id is not part of the topology.
    #[error("Node id was not found in the topology: {0:?}")]
    NodeIdNotFound(NodeId),
    /// A link would connect a node to itself.
    #[error("Cannot connect node {0} to itself")]
    SelfLink(String),
    /// The link does not exist.
    #[error("Link does not exist: {0} -- {1}")]
    LinkNotFound(String, String),
    /// The node has no interface that could be configured.
    #[error("Node {0} has no interface")]
    NoInterface(String),
    /// The operation expects a node of a different kind.
    #[error("Node {0} is a {1}, but expected a {2}")]
    WrongKind(String, NodeKind, NodeKind),
    /// The address could not be parsed.
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),
    /// No free address is left in the pool for automatic assignment.
    #[error("The address pool {0} is exhausted")]
    PoolExhausted(Ipv4Net),
    /// Json error
    #[error("{0}")]
    JsonError(Box<serde_json::Error>),
}

impl From<serde_json::Error> for TopologyError {
    fn from(value: serde_json::Error) -> Self {
        Self::JsonError(Box::new(value))
    }
}

impl PartialEq for TopologyError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::DuplicateNode(l0), Self::DuplicateNode(r0)) => l0 == r0,
            (Self::NodeNotFound(l0), Self::NodeNotFound(r0)) => l0 == r0,
            (Self::NodeIdNotFound(l0), Self::NodeIdNotFound(r0)) => l0 == r0,
            (Self::SelfLink(l0), Self::SelfLink(r0)) => l0 == r0,
            (Self::LinkNotFound(l0, l1), Self::LinkNotFound(r0, r1)) => l0 == r0 && l1 == r1,
            (Self::NoInterface(l0), Self::NoInterface(r0)) => l0 == r0,
            (Self::WrongKind(l0, l1, l2), Self::WrongKind(r0, r1, r2)) => {
                l0 == r0 && l1 == r1 && l2 == r2
            }
            (Self::InvalidAddress(l0), Self::InvalidAddress(r0)) => l0 == r0,
            (Self::PoolExhausted(l0), Self::PoolExhausted(r0)) => l0 == r0,
            (Self::JsonError(l), Self::JsonError(r)) => l.to_string() == r.to_string(),
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// Errors reported by the emulation backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The network is not running.
    #[error("The network is not running")]
    NotRunning,
    /// The node does not exist in the running network.
    #[error("Node was not found in the network: {0}")]
    NodeNotFound(String),
    /// The backend cannot execute this command.
    #[error("Unsupported command on {node}: {cmd}")]
    UnsupportedCommand {
        /// Node on which the command should run
        node: String,
        /// The command line
        cmd: String,
    },
    /// The command was executed, but it failed.
    #[error("Command failed on {node}: {reason}")]
    CommandFailed {
        /// Node on which the command ran
        node: String,
        /// Error output of the command
        reason: String,
    },
}

/// Errors of the path simulation engine and the topology validator.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// The node does not exist in the topology.
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    /// The node has no resolvable IP address.
    #[error("Node {0} has no IP address")]
    NoAddress(String),
    /// The packet would visit a node twice.
    #[error("Routing loop detected at {0}")]
    RoutingLoop(String),
    /// A node has no next hop towards the destination.
    #[error("No route to destination from {0}")]
    NoRoute(String),
    /// The hop limit is reached before the packet arrives at the destination.
    #[error("Hop limit of {0} exceeded")]
    HopLimitExceeded(usize),
    /// The emulation backend is not running or a command failed.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),
    /// The topology validation found structural errors.
    #[error("Topology validation failed: {}", errors.join("; "))]
    ValidationFailure {
        /// Structural errors
        errors: Vec<String>,
        /// Warnings, reported alongside the errors
        warnings: Vec<String>,
    },
    /// No trace with this id is known.
    #[error("Trace not found: {0}")]
    TraceNotFound(String),
    /// The trace is already completed.
    #[error("Trace {0} is already completed")]
    TraceAlreadyCompleted(String),
    /// Another trace with this id is still in progress.
    #[error("Trace {0} is still in progress")]
    TraceInProgress(String),
    /// Error while modifying the topology
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
    /// The probe packet could not be crafted.
    #[error("Cannot craft the probe: {0}")]
    Probe(#[from] ProbeError),
}
