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

//! # Emulated Network
//!
//! This module contains the in-memory emulation backend. All nodes are stored on an undirected
//! graph, and every link creates one interface on each of its endpoints.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt::Write,
    net::Ipv4Addr,
};

use ipnet::Ipv4Net;
use lazy_static::lazy_static;
use log::*;
use petgraph::stable_graph::StableGraph;
use petgraph::Undirected;
use serde::{Deserialize, Serialize};

use crate::{
    backend::{EmulationBackend, Interface, LinkEnd, Node},
    next_hop::NextHopResolver,
    resolve::TopologyView,
    topology::TopologyRecord,
    types::{
        parse_addr, BackendError, IndexType, NodeId, NodeKind, TopologyError, DEFAULT_PREFIX_LEN,
    },
};

/// Hop limit of `traceroute` if `-m` is not given.
const TRACEROUTE_MAX_TTL: usize = 30;

/// Graph that stores the emulated network.
pub type NetGraph = StableGraph<Node, (), Undirected, IndexType>;

lazy_static! {
    /// Pool from which hosts without a configured address get one.
    static ref ADDRESS_POOL: Ipv4Net = "10.0.0.0/24".parse().unwrap();
}

/// # Emulated Network
///
/// In-memory network emulation. Nodes are created with an explicit [`NodeKind`], links create
/// interfaces named `<node>-eth<n>`, and addresses are stored on the interfaces.
#[derive(Debug, Clone, Default)]
pub struct Network {
    net: NetGraph,
    names: HashMap<String, NodeId>,
    host_addrs: HashMap<NodeId, Ipv4Net>,
    running: bool,
}

/// Summary of the running network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Names of all hosts
    pub hosts: Vec<String>,
    /// Names of all switches
    pub switches: Vec<String>,
    /// Names of all routers
    pub routers: Vec<String>,
    /// All links, as pairs of node names
    pub links: Vec<(String, String)>,
}

impl Network {
    /// Create an empty network that is not running.
    pub fn new() -> Self {
        Self::default()
    }

    fn add_node(&mut self, name: String, kind: NodeKind) -> Result<NodeId, TopologyError> {
        if self.names.contains_key(&name) {
            return Err(TopologyError::DuplicateNode(name));
        }
        let id = self.net.add_node(Node::new(name.clone(), kind));
        self.names.insert(name, id);
        Ok(id)
    }

    /// Add a new host. Its address is placed on the first interface, as soon as the host gets
    /// linked.
    pub fn add_host(
        &mut self,
        name: impl Into<String>,
        ip: Option<&str>,
    ) -> Result<NodeId, TopologyError> {
        let addr = match ip {
            Some(ip) => Some(
                parse_addr(ip, DEFAULT_PREFIX_LEN)
                    .ok_or_else(|| TopologyError::InvalidAddress(ip.to_string()))?,
            ),
            None => None,
        };
        let id = self.add_node(name.into(), NodeKind::Host)?;
        if let Some(addr) = addr {
            self.host_addrs.insert(id, addr);
        }
        Ok(id)
    }

    /// Add a new switch.
    pub fn add_switch(&mut self, name: impl Into<String>) -> Result<NodeId, TopologyError> {
        self.add_node(name.into(), NodeKind::Switch)
    }

    /// Add a new router.
    pub fn add_router(&mut self, name: impl Into<String>) -> Result<NodeId, TopologyError> {
        self.add_node(name.into(), NodeKind::Router)
    }

    /// Get the id of the node with that name.
    pub fn get_node_id(&self, name: impl AsRef<str>) -> Result<NodeId, TopologyError> {
        self.names
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| TopologyError::NodeNotFound(name.as_ref().to_string()))
    }

    /// Get the node with that id.
    pub fn get_node(&self, id: NodeId) -> Result<&Node, TopologyError> {
        self.net
            .node_weight(id)
            .ok_or(TopologyError::NodeIdNotFound(id))
    }

    fn get_node_mut(&mut self, id: NodeId) -> Result<&mut Node, TopologyError> {
        self.net
            .node_weight_mut(id)
            .ok_or(TopologyError::NodeIdNotFound(id))
    }

    /// Connect two nodes. This creates a new interface on each side. The first interface of a
    /// host gets the address of that host.
    pub fn add_link(&mut self, a: NodeId, b: NodeId) -> Result<(), TopologyError> {
        let name_a = self.get_node(a)?.name.clone();
        let name_b = self.get_node(b)?.name.clone();
        if a == b {
            return Err(TopologyError::SelfLink(name_a));
        }

        let if_a = self.next_interface_name(a)?;
        let if_b = self.next_interface_name(b)?;

        for (id, local, remote, remote_if) in [
            (a, &if_a, &name_b, &if_b),
            (b, &if_b, &name_a, &if_a),
        ] {
            let first = self.get_node(id)?.interfaces.is_empty();
            let addr = self.host_addrs.get(&id).copied().filter(|_| first);
            self.get_node_mut(id)?.interfaces.push(Interface {
                name: local.clone(),
                addr,
                link: Some(LinkEnd {
                    node: remote.clone(),
                    interface: remote_if.clone(),
                }),
            });
        }

        self.net.add_edge(a, b, ());
        debug!("Added link {} ({}) -- {} ({})", name_a, if_a, name_b, if_b);
        Ok(())
    }

    fn next_interface_name(&self, id: NodeId) -> Result<String, TopologyError> {
        let node = self.get_node(id)?;
        Ok(format!("{}-eth{}", node.name, node.interfaces.len()))
    }

    /// Remove one link between two nodes. Both interfaces stay on the nodes, but are detached.
    pub fn remove_link(&mut self, a: NodeId, b: NodeId) -> Result<(), TopologyError> {
        let name_a = self.get_node(a)?.name.clone();
        let name_b = self.get_node(b)?.name.clone();
        let edge = self
            .net
            .find_edge(a, b)
            .ok_or_else(|| TopologyError::LinkNotFound(name_a.clone(), name_b.clone()))?;
        self.net.remove_edge(edge);

        let remote_if = self
            .get_node_mut(a)?
            .interfaces
            .iter_mut()
            .find(|i| i.link.as_ref().map(|l| l.node == name_b).unwrap_or(false))
            .and_then(|i| i.link.take())
            .map(|l| l.interface);
        if let Some(remote_if) = remote_if {
            if let Some(i) = self
                .get_node_mut(b)?
                .interfaces
                .iter_mut()
                .find(|i| i.name == remote_if)
            {
                i.link = None;
            }
        }
        debug!("Removed link {} -- {}", name_a, name_b);
        Ok(())
    }

    /// Assign an address to a router interface. The interface may be given by its full name
    /// (`r1-eth0`) or its short name (`eth0`). If no interface matches, the first interface
    /// without an address is used instead. Returns the name of the configured interface.
    pub fn configure_interface(
        &mut self,
        router: NodeId,
        interface: &str,
        addr: Ipv4Net,
    ) -> Result<String, TopologyError> {
        let node = self.get_node_mut(router)?;
        if node.kind != NodeKind::Router {
            return Err(TopologyError::WrongKind(
                node.name.clone(),
                node.kind,
                NodeKind::Router,
            ));
        }
        let pos = match node.interfaces.iter().position(|i| i.is_named(interface)) {
            Some(pos) => pos,
            None => {
                let pos = node
                    .interfaces
                    .iter()
                    .position(|i| i.addr.is_none() && !i.is_loopback())
                    .or_else(|| node.interfaces.iter().position(|i| !i.is_loopback()))
                    .ok_or_else(|| TopologyError::NoInterface(node.name.clone()))?;
                warn!(
                    "Interface {} not found on {}, using {} instead",
                    interface, node.name, node.interfaces[pos].name
                );
                pos
            }
        };
        let intf = &mut node.interfaces[pos];
        intf.addr = Some(addr);
        debug!("Configured {} on {}", addr, intf.name);
        Ok(intf.name.clone())
    }

    /// Set the management address of a switch.
    pub fn set_management_ip(&mut self, switch: NodeId, addr: Ipv4Net) -> Result<(), TopologyError> {
        let node = self.get_node_mut(switch)?;
        if node.kind != NodeKind::Switch {
            return Err(TopologyError::WrongKind(
                node.name.clone(),
                node.kind,
                NodeKind::Switch,
            ));
        }
        node.management_ip = Some(addr);
        Ok(())
    }

    /// Start the network.
    pub fn start(&mut self) {
        if !self.running {
            info!("Network started with {} nodes", self.net.node_count());
        }
        self.running = true;
    }

    /// Stop the network.
    pub fn stop(&mut self) {
        if self.running {
            info!("Network stopped");
        }
        self.running = false;
    }

    /// Names of all nodes and links of the network.
    pub fn info(&self) -> NetworkInfo {
        let mut info = NetworkInfo::default();
        for node in self.nodes() {
            let list = match node.kind {
                NodeKind::Host => &mut info.hosts,
                NodeKind::Switch => &mut info.switches,
                NodeKind::Router => &mut info.routers,
            };
            list.push(node.name.clone());
        }
        info.links = self
            .net
            .edge_indices()
            .filter_map(|e| self.net.edge_endpoints(e))
            .filter_map(|(a, b)| Some((self.net.node_weight(a)?, self.net.node_weight(b)?)))
            .map(|(a, b)| (a.name.clone(), b.name.clone()))
            .collect();
        info
    }

    /// Build and start a network from a persisted topology. Hosts without an address get the
    /// next free address of `10.0.0.0/24`.
    pub fn from_record(record: &TopologyRecord) -> Result<Self, TopologyError> {
        let mut net = Self::new();

        let mut used: BTreeSet<Ipv4Addr> = record
            .hosts
            .iter()
            .chain(record.switches.iter())
            .filter_map(|n| parse_addr(n.ip.as_deref()?, DEFAULT_PREFIX_LEN))
            .chain(
                record
                    .routers
                    .iter()
                    .flat_map(|r| r.interfaces.iter().filter_map(|i| i.addr())),
            )
            .map(|a| a.addr())
            .collect();

        for host in record.hosts.iter() {
            match host.ip.as_deref().filter(|ip| !ip.trim().is_empty()) {
                Some(ip) => net.add_host(&host.name, Some(ip))?,
                None => {
                    let ip = ADDRESS_POOL
                        .hosts()
                        .find(|ip| !used.contains(ip))
                        .ok_or(TopologyError::PoolExhausted(*ADDRESS_POOL))?;
                    used.insert(ip);
                    debug!("Assign {} to host {}", ip, host.name);
                    net.add_host(&host.name, Some(&ip.to_string()))?
                }
            };
        }
        for switch in record.switches.iter() {
            let id = net.add_switch(&switch.name)?;
            if let Some(addr) = switch
                .ip
                .as_deref()
                .and_then(|ip| parse_addr(ip, DEFAULT_PREFIX_LEN))
            {
                net.set_management_ip(id, addr)?;
            }
        }
        for router in record.routers.iter() {
            net.add_router(&router.name)?;
        }

        for link in record.links.iter() {
            match (net.get_node_id(&link.node1), net.get_node_id(&link.node2)) {
                (Ok(a), Ok(b)) => net.add_link(a, b)?,
                _ => warn!(
                    "Skip link {} -- {}: unknown endpoint",
                    link.node1, link.node2
                ),
            }
        }

        for router in record.routers.iter() {
            let id = net.get_node_id(&router.name)?;
            let mut interfaces: Vec<(&str, Ipv4Net)> = router
                .interfaces
                .iter()
                .filter_map(|i| Some((i.name.as_str(), i.addr()?)))
                .collect();
            if router.interfaces.is_empty() {
                if let Some(addr) = router
                    .ip
                    .as_deref()
                    .and_then(|ip| parse_addr(ip, DEFAULT_PREFIX_LEN))
                {
                    interfaces.push(("eth0", addr));
                }
            }
            for (name, addr) in interfaces {
                if let Err(e) = net.configure_interface(id, name, addr) {
                    warn!("Cannot configure {} on {}: {}", name, router.name, e);
                }
            }
        }

        net.start();
        Ok(net)
    }

    fn ip_addr_show(node: &Node, dev: Option<&str>) -> Result<String, BackendError> {
        let mut out = String::new();
        if dev.is_none() || dev == Some("lo") {
            out.push_str("1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever\n");
        }
        let mut found = dev.is_none() || dev == Some("lo");
        for (idx, intf) in node.interfaces.iter().enumerate() {
            if dev.map(|d| intf.name != d).unwrap_or(false) {
                continue;
            }
            found = true;
            if let Some(addr) = intf.addr {
                // writing into a String never fails
                let _ = writeln!(
                    out,
                    "{}: {}    inet {} brd {} scope global {}\\       valid_lft forever preferred_lft forever",
                    idx + 2,
                    intf.name,
                    addr,
                    addr.broadcast(),
                    intf.name
                );
            }
        }
        if found {
            Ok(out)
        } else {
            Err(BackendError::CommandFailed {
                node: node.name.clone(),
                reason: format!("Device \"{}\" does not exist.", dev.unwrap_or_default()),
            })
        }
    }

    /// Answer `traceroute -n [-m <max_ttl>] ... <dst>` by walking the forwarding path from
    /// `source`. Only routers and the destination answer; switches are invisible.
    fn traceroute(&self, source: &str, args: &[&str]) -> Result<String, BackendError> {
        let failed = |reason: String| BackendError::CommandFailed {
            node: source.to_string(),
            reason,
        };
        let dst: Ipv4Addr = args
            .last()
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| failed(String::from("traceroute: missing destination address")))?;
        let max_ttl: usize = match args.iter().position(|a| *a == "-m") {
            Some(i) => args
                .get(i + 1)
                .and_then(|m| m.parse().ok())
                .filter(|m| *m > 0)
                .ok_or_else(|| failed(String::from("traceroute: invalid max hops")))?,
            None => TRACEROUTE_MAX_TTL,
        };

        let record = TopologyRecord::default();
        let view = TopologyView::new(self, &record);
        let mut resolver = NextHopResolver::new(view, dst);
        if let Some(dest) = self.node_by_ip(dst) {
            resolver = resolver.with_destination(dest.name.clone());
        }

        let mut out = format!(
            "traceroute to {} ({}), {} hops max, 60 byte packets\n",
            dst, dst, max_ttl
        );
        let rtt = |ttl: usize| {
            let t = 0.05 * ttl as f64;
            format!("{:.3} ms  {:.3} ms  {:.3} ms", t, t, t)
        };

        let mut ttl = 0;
        let mut current = source.to_string();
        let mut previous: Option<String> = None;
        let mut visited: HashSet<String> = HashSet::from([current.clone()]);
        while ttl < max_ttl {
            let Some(hop) = resolver.resolve(&current, previous.as_deref()) else {
                break;
            };
            if !visited.insert(hop.node.clone()) {
                break;
            }
            previous = Some(std::mem::replace(&mut current, hop.node));
            let Some(node) = self.node(&current) else {
                break;
            };
            if node.has_ip(dst) {
                ttl += 1;
                let _ = writeln!(out, "{:>2}  {}  {}", ttl, dst, rtt(ttl));
                return Ok(out);
            }
            if node.kind == NodeKind::Router {
                ttl += 1;
                // routers answer from the interface the probe arrived on
                let ingress = node
                    .interfaces
                    .iter()
                    .find(|i| i.link.as_ref().map(|l| &l.node) == previous.as_ref())
                    .and_then(|i| i.addr)
                    .or_else(|| node.first_addr());
                let _ = match ingress {
                    Some(addr) => writeln!(out, "{:>2}  {}  {}", ttl, addr.addr(), rtt(ttl)),
                    None => writeln!(out, "{:>2}  * * *", ttl),
                };
            }
        }
        for ttl in ttl + 1..=max_ttl {
            let _ = writeln!(out, "{:>2}  * * *", ttl);
        }
        Ok(out)
    }
}

impl EmulationBackend for Network {
    fn is_running(&self) -> bool {
        self.running
    }

    fn node(&self, name: &str) -> Option<&Node> {
        self.names.get(name).and_then(|id| self.net.node_weight(*id))
    }

    fn node_by_ip(&self, ip: Ipv4Addr) -> Option<&Node> {
        self.nodes().into_iter().find(|n| n.has_ip(ip))
    }

    fn nodes(&self) -> Vec<&Node> {
        self.net.node_weights().collect()
    }

    fn run_command(&self, node: &str, cmd: &str) -> Result<String, BackendError> {
        if !self.running {
            return Err(BackendError::NotRunning);
        }
        let n = self
            .node(node)
            .ok_or_else(|| BackendError::NodeNotFound(node.to_string()))?;
        let args: Vec<&str> = cmd.split_whitespace().collect();
        match args.as_slice() {
            ["ip", "-o", "-4", "addr", "show"] | ["ip", "-4", "-o", "addr", "show"] => {
                Self::ip_addr_show(n, None)
            }
            ["ip", "-o", "-4", "addr", "show", "dev", dev]
            | ["ip", "-4", "-o", "addr", "show", "dev", dev] => Self::ip_addr_show(n, Some(*dev)),
            ["traceroute", rest @ ..] => self.traceroute(node, rest),
            _ => Err(BackendError::UnsupportedCommand {
                node: node.to_string(),
                cmd: cmd.to_string(),
            }),
        }
    }
}
