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

//! # Emulation backend
//!
//! The path simulation engine and the validator only see the live network through the
//! [`EmulationBackend`] trait. [`crate::network::Network`] is the in-memory implementation.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::types::{BackendError, NodeKind};

/// Name of the loopback interface, which is ignored everywhere.
pub const LOOPBACK: &str = "lo";

/// A node of the live network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique name
    pub name: String,
    /// Kind of the node
    pub kind: NodeKind,
    /// Interfaces in creation order
    pub interfaces: Vec<Interface>,
    /// Management address (switches only)
    pub management_ip: Option<Ipv4Net>,
}

/// An interface of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Interface name, like `r1-eth0`
    pub name: String,
    /// Configured address with prefix length
    pub addr: Option<Ipv4Net>,
    /// Remote end of the link attached to this interface
    pub link: Option<LinkEnd>,
}

/// The remote endpoint of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEnd {
    /// Remote node
    pub node: String,
    /// Remote interface
    pub interface: String,
}

impl Interface {
    /// Whether this is the loopback interface.
    pub fn is_loopback(&self) -> bool {
        self.name == LOOPBACK
    }

    /// The short name without the node prefix (`eth0` for `r1-eth0`).
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit_once('-')
            .map(|(_, short)| short)
            .unwrap_or(&self.name)
    }

    /// Check if `name` refers to this interface, either by its full or by its short name.
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.short_name() == name
    }
}

impl Node {
    /// Create a new node without any interface.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            interfaces: Vec::new(),
            management_ip: None,
        }
    }

    /// Interface by its full or short name.
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.is_named(name))
    }

    /// First address configured on any interface other than the loopback.
    pub fn first_addr(&self) -> Option<Ipv4Net> {
        self.interfaces
            .iter()
            .filter(|i| !i.is_loopback())
            .filter_map(|i| i.addr)
            .find(|a| !a.addr().is_unspecified())
    }

    /// Check if the node owns this address, either on an interface or as its management address.
    pub fn has_ip(&self, ip: Ipv4Addr) -> bool {
        self.interfaces
            .iter()
            .filter_map(|i| i.addr)
            .chain(self.management_ip)
            .any(|a| a.addr() == ip)
    }

    /// Names of all linked nodes, in interface order. A node linked twice appears twice.
    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.interfaces
            .iter()
            .filter_map(|i| i.link.as_ref())
            .map(|l| l.node.as_str())
    }

    /// Check if this node is directly linked to `other`.
    pub fn is_linked_to(&self, other: &str) -> bool {
        self.peers().any(|p| p == other)
    }
}

/// Capabilities of the network emulation backend.
pub trait EmulationBackend: Send + Sync + std::fmt::Debug {
    /// Whether the network is currently running.
    fn is_running(&self) -> bool;

    /// Get the node with that name.
    fn node(&self, name: &str) -> Option<&Node>;

    /// Get the node that owns this address, on any interface or as management address.
    fn node_by_ip(&self, ip: Ipv4Addr) -> Option<&Node>;

    /// All nodes, always in the same order.
    fn nodes(&self) -> Vec<&Node>;

    /// Execute a shell command inside the namespace of `node` and return its output.
    fn run_command(&self, node: &str, cmd: &str) -> Result<String, BackendError>;
}
