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

//! # Persisted topology
//!
//! The [`TopologyRecord`] is the persisted description of a topology, as it is stored by the
//! persistence layer and read from JSON files. It only holds data; the emulated network is built
//! from it by [`crate::network::Network::from_record`]. The record is also the fallback for
//! addresses that are not (yet) configured on the live network.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use log::*;
use serde::{Deserialize, Serialize};

use crate::types::{parse_addr, TopologyError, DEFAULT_PREFIX_LEN};

/// Persisted topology definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyRecord {
    /// Name of the topology
    #[serde(default)]
    pub name: String,
    /// All hosts
    #[serde(default)]
    pub hosts: Vec<NodeRecord>,
    /// All switches. The `ip` of a switch is its management address.
    #[serde(default)]
    pub switches: Vec<NodeRecord>,
    /// All routers
    #[serde(default)]
    pub routers: Vec<RouterRecord>,
    /// All links
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

/// Persisted host or switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Unique name
    pub name: String,
    /// Configured address, optionally with prefix length.
    #[serde(default)]
    pub ip: Option<String>,
    /// Horizontal position in the editor
    #[serde(default)]
    pub x: f64,
    /// Vertical position in the editor
    #[serde(default)]
    pub y: f64,
    /// Name shown in the editor
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Persisted router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterRecord {
    /// Unique name
    pub name: String,
    /// Router address, used only if no interface is configured.
    #[serde(default)]
    pub ip: Option<String>,
    /// Horizontal position in the editor
    #[serde(default)]
    pub x: f64,
    /// Vertical position in the editor
    #[serde(default)]
    pub y: f64,
    /// Name shown in the editor
    #[serde(default)]
    pub display_name: Option<String>,
    /// Interface configuration
    #[serde(default)]
    pub interfaces: Vec<InterfaceRecord>,
    /// Static routing table, in configured order.
    #[serde(default)]
    pub routes: Vec<RouteRecord>,
}

/// Persisted router interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    /// Interface name, either the full name (`r1-eth0`) or the short one (`eth0`).
    pub name: String,
    /// Address, optionally with prefix length
    #[serde(default)]
    pub ip: Option<String>,
    /// Prefix length, used if `ip` carries none.
    #[serde(default = "default_subnet_mask")]
    pub subnet_mask: u8,
}

fn default_subnet_mask() -> u8 {
    DEFAULT_PREFIX_LEN
}

impl InterfaceRecord {
    /// Parsed address of the interface, if any.
    pub fn addr(&self) -> Option<Ipv4Net> {
        parse_addr(self.ip.as_deref()?, self.subnet_mask)
    }

    /// Check if this record describes the interface `full_name` of node `node`. Both the full
    /// name and the short name without the node prefix match.
    pub fn matches(&self, node: &str, full_name: &str) -> bool {
        self.name == full_name || format!("{}-{}", node, self.name) == full_name
    }
}

/// Persisted static route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Target network
    pub network: String,
    /// Address of the next hop
    #[serde(default)]
    pub next_hop: Option<String>,
    /// Name of the egress interface
    #[serde(default)]
    pub interface: Option<String>,
}

impl RouteRecord {
    /// Create a new route record.
    pub fn new(
        network: impl Into<String>,
        next_hop: Option<&str>,
        interface: Option<&str>,
    ) -> Self {
        Self {
            network: network.into(),
            next_hop: next_hop.map(String::from),
            interface: interface.map(String::from),
        }
    }
}

/// Persisted link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkRecord {
    /// First endpoint
    pub node1: String,
    /// Second endpoint
    pub node2: String,
}

/// A static route with parsed addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRoute {
    /// Target network
    pub network: Ipv4Net,
    /// Address of the next hop
    pub next_hop: Option<Ipv4Addr>,
    /// Name of the egress interface
    pub interface: Option<String>,
}

impl TopologyRecord {
    /// Parse a topology record from JSON.
    pub fn from_json(s: &str) -> Result<Self, TopologyError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Get the persisted host with that name.
    pub fn host(&self, name: &str) -> Option<&NodeRecord> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Get the persisted switch with that name.
    pub fn switch(&self, name: &str) -> Option<&NodeRecord> {
        self.switches.iter().find(|s| s.name == name)
    }

    /// Get the persisted router with that name.
    pub fn router(&self, name: &str) -> Option<&RouterRecord> {
        self.routers.iter().find(|r| r.name == name)
    }

    /// Get a mutable reference to the persisted router with that name.
    pub fn router_mut(&mut self, name: &str) -> Option<&mut RouterRecord> {
        self.routers.iter_mut().find(|r| r.name == name)
    }

    /// Parsed static routes of a router in configured order. Routes that cannot be parsed are
    /// skipped.
    pub fn routes(&self, router: &str) -> Vec<StaticRoute> {
        let Some(r) = self.router(router) else {
            return Vec::new();
        };
        r.routes
            .iter()
            .filter_map(|route| {
                let Some(network) = parse_addr(&route.network, DEFAULT_PREFIX_LEN) else {
                    warn!("Skip route with invalid network {} on {}", route.network, router);
                    return None;
                };
                let next_hop = match route.next_hop.as_deref().map(str::trim) {
                    None | Some("") => None,
                    Some(nh) => match nh.parse() {
                        Ok(nh) => Some(nh),
                        Err(_) => {
                            warn!("Skip route with invalid next hop {} on {}", nh, router);
                            return None;
                        }
                    },
                };
                let interface = route.interface.clone().filter(|i| !i.is_empty());
                Some(StaticRoute {
                    network: network.trunc(),
                    next_hop,
                    interface,
                })
            })
            .collect()
    }
}
