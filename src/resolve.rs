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

//! # IP resolution
//!
//! The [`TopologyView`] combines the live network with the persisted record. It prefers the
//! state reported by the emulation backend, and falls back to the persisted configuration if
//! the live network has no address. All lookups return `None` for "not found"; none of them fail.
//!
//! Live addresses are read by running `ip -o -4 addr show` on the node. If the backend cannot
//! run the command, the interfaces it reports for the node are used instead.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use itertools::Itertools;
use lazy_static::lazy_static;
use log::*;
use regex::Regex;

use crate::{
    backend::{EmulationBackend, Node, LOOPBACK},
    topology::{StaticRoute, TopologyRecord},
    types::{parse_addr, NodeKind, DEFAULT_PREFIX_LEN},
};

/// An address attached to a router interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedSubnet {
    /// Interface name (as found in the live network, or as persisted)
    pub interface: String,
    /// Interface address with prefix length
    pub addr: Ipv4Net,
}

/// Command that lists the IPv4 addresses of all interfaces of a node, one per line.
pub const IP_ADDR_SHOW: &str = "ip -o -4 addr show";

/// Parse the output of `ip -o -4 addr show` into `(interface, address)` pairs, skipping the
/// loopback.
pub fn parse_ip_addr(output: &str) -> Vec<(String, Ipv4Net)> {
    lazy_static! {
        static ref INET: Regex = Regex::new(r"^\d+:\s+(\S+)\s+inet\s+(\S+)").unwrap();
    }
    output
        .lines()
        .filter_map(|line| {
            let caps = INET.captures(line)?;
            let name = caps.get(1)?.as_str();
            let addr = caps.get(2)?.as_str().parse().ok()?;
            (name != LOOPBACK).then(|| (name.to_string(), addr))
        })
        .collect()
}

impl AttachedSubnet {
    /// The network of the interface address.
    pub fn network(&self) -> Ipv4Net {
        self.addr.trunc()
    }
}

/// Read-only view on the live network and its persisted record.
#[derive(Debug, Clone, Copy)]
pub struct TopologyView<'a> {
    backend: &'a dyn EmulationBackend,
    record: &'a TopologyRecord,
}

impl<'a> TopologyView<'a> {
    /// Create a new view.
    pub fn new(backend: &'a dyn EmulationBackend, record: &'a TopologyRecord) -> Self {
        Self { backend, record }
    }

    /// The emulation backend.
    pub fn backend(&self) -> &'a dyn EmulationBackend {
        self.backend
    }

    /// The persisted record.
    pub fn record(&self) -> &'a TopologyRecord {
        self.record
    }

    /// The live node with that name.
    pub fn node(&self, name: &str) -> Option<&'a Node> {
        self.backend.node(name)
    }

    /// Addresses of the live interfaces of a node in interface order, without the loopback.
    pub fn live_addrs(&self, name: &str) -> Vec<(String, Ipv4Net)> {
        match self.backend.run_command(name, IP_ADDR_SHOW) {
            Ok(output) => parse_ip_addr(&output),
            Err(e) => {
                trace!("Use the reported interfaces of {}: {}", name, e);
                self.node(name)
                    .map(|n| {
                        n.interfaces
                            .iter()
                            .filter(|i| !i.is_loopback())
                            .filter_map(|i| Some((i.name.clone(), i.addr?)))
                            .collect()
                    })
                    .unwrap_or_default()
            }
        }
    }

    /// First live address of a node, ignoring `0.0.0.0`.
    fn first_live_addr(&self, name: &str) -> Option<Ipv4Net> {
        self.live_addrs(name)
            .into_iter()
            .map(|(_, a)| a)
            .find(|a| !a.addr().is_unspecified())
    }

    /// Kind of the node with that name.
    pub fn kind(&self, name: &str) -> Option<NodeKind> {
        self.node(name).map(|n| n.kind)
    }

    /// Effective address (with prefix length) of a node.
    ///
    /// - Host: first address on a live interface, else the persisted address.
    /// - Switch: only its management address, live or persisted.
    /// - Router: first address on a live interface, else the first persisted interface address,
    ///   else the persisted router address.
    pub fn resolve_addr(&self, name: &str) -> Option<Ipv4Net> {
        let node = self.node(name);
        let kind = node.map(|n| n.kind).or_else(|| {
            if self.record.host(name).is_some() {
                Some(NodeKind::Host)
            } else if self.record.switch(name).is_some() {
                Some(NodeKind::Switch)
            } else if self.record.router(name).is_some() {
                Some(NodeKind::Router)
            } else {
                None
            }
        })?;
        match kind {
            NodeKind::Host => self.first_live_addr(name).or_else(|| {
                parse_addr(self.record.host(name)?.ip.as_deref()?, DEFAULT_PREFIX_LEN)
            }),
            NodeKind::Switch => node.and_then(|n| n.management_ip).or_else(|| {
                parse_addr(self.record.switch(name)?.ip.as_deref()?, DEFAULT_PREFIX_LEN)
            }),
            NodeKind::Router => self.first_live_addr(name).or_else(|| {
                let r = self.record.router(name)?;
                r.interfaces
                    .iter()
                    .find_map(|i| i.addr())
                    .or_else(|| parse_addr(r.ip.as_deref()?, DEFAULT_PREFIX_LEN))
            }),
        }
    }

    /// Effective address of a node, without prefix length.
    pub fn resolve_ip(&self, name: &str) -> Option<Ipv4Addr> {
        self.resolve_addr(name).map(|a| a.addr())
    }

    /// Find the node that owns an address. Live interface and management addresses are checked
    /// first, then persisted hosts, router interfaces and switches.
    pub fn node_by_ip(&self, ip: Ipv4Addr) -> Option<&'a Node> {
        if let Some(node) = self.backend.node_by_ip(ip) {
            return Some(node);
        }
        let matches = |s: Option<&str>| {
            s.and_then(|s| parse_addr(s, DEFAULT_PREFIX_LEN))
                .map(|a| a.addr() == ip)
                .unwrap_or(false)
        };
        self.record
            .hosts
            .iter()
            .filter(|h| matches(h.ip.as_deref()))
            .map(|h| h.name.as_str())
            .chain(
                self.record
                    .routers
                    .iter()
                    .filter(|r| r.interfaces.iter().any(|i| i.addr().map(|a| a.addr()) == Some(ip)))
                    .map(|r| r.name.as_str()),
            )
            .chain(
                self.record
                    .switches
                    .iter()
                    .filter(|s| matches(s.ip.as_deref()))
                    .map(|s| s.name.as_str()),
            )
            .find_map(|name| self.node(name))
    }

    /// Like [`Self::node_by_ip`], but additionally scans all nodes for one whose effective
    /// address is `ip`.
    pub fn find_node_by_ip(&self, ip: Ipv4Addr) -> Option<&'a Node> {
        self.node_by_ip(ip).or_else(|| {
            self.backend
                .nodes()
                .into_iter()
                .find(|n| self.resolve_ip(&n.name) == Some(ip))
        })
    }

    /// All nodes directly linked to `name`, in interface order and without duplicates.
    pub fn neighbors(&self, name: &str) -> Vec<&'a Node> {
        self.node(name)
            .map(|n| {
                n.peers()
                    .unique()
                    .filter_map(|p| self.node(p))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check if two nodes are directly linked.
    pub fn are_linked(&self, a: &str, b: &str) -> bool {
        self.node(a).map(|n| n.is_linked_to(b)).unwrap_or(false)
    }

    /// The node on the other end of an interface.
    pub fn peer_via(&self, node: &str, interface: &str) -> Option<&'a Node> {
        let link = self.node(node)?.interface(interface)?.link.as_ref()?;
        self.node(&link.node)
    }

    /// All addresses attached to the interfaces of a router. Live interfaces come first;
    /// persisted interfaces are added if no live interface has the same name or address.
    pub fn router_subnets(&self, name: &str) -> Vec<AttachedSubnet> {
        let mut subnets: Vec<AttachedSubnet> = self
            .live_addrs(name)
            .into_iter()
            .map(|(interface, addr)| AttachedSubnet { interface, addr })
            .collect();

        if let Some(r) = self.record.router(name) {
            for intf in r.interfaces.iter() {
                let Some(addr) = intf.addr() else { continue };
                let known = subnets
                    .iter()
                    .any(|s| intf.matches(name, &s.interface) || s.addr.addr() == addr.addr());
                if !known {
                    subnets.push(AttachedSubnet {
                        interface: intf.name.clone(),
                        addr,
                    });
                }
            }
        }

        subnets
    }

    /// Static routes of a router in configured order.
    pub fn routes(&self, name: &str) -> Vec<StaticRoute> {
        self.record.routes(name)
    }
}
