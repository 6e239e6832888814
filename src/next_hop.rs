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

//! # Next-hop resolution
//!
//! Decides which adjacent node a packet moves to next. Hosts send everything to their gateway
//! (a router if linked to one, else a switch). Switches have no table: they deliver to the
//! destination if linked to it, and otherwise forward towards anything except the node the
//! packet came from, preferring routers over switches over hosts. Routers look at their attached
//! subnets first, then at their static routes (first match, not longest prefix), then at the
//! `/24` around the destination, and finally forward to any neighbor.
//!
//! The resolver never proposes the node the packet came from.

use std::{
    collections::{HashSet, VecDeque},
    net::Ipv4Addr,
};

use ipnet::Ipv4Net;
use log::*;

use crate::{backend::Node, resolve::TopologyView, types::NodeKind};

/// Outcome of a next-hop decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHop {
    /// The node to forward to
    pub node: String,
    /// Whether `node` is reached over a direct link to the destination
    pub direct: bool,
    /// Egress interface of the router taking the decision, if known
    pub interface: Option<String>,
}

impl NextHop {
    fn new(node: &Node, direct: bool) -> Self {
        Self {
            node: node.name.clone(),
            direct,
            interface: None,
        }
    }

    fn via(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }
}

/// Next-hop resolver for one destination address.
#[derive(Debug, Clone)]
pub struct NextHopResolver<'a> {
    view: TopologyView<'a>,
    dest_ip: Ipv4Addr,
    dest: Option<String>,
}

/// Compute the next hop from `current` towards `dest_ip`, never returning `came_from`.
pub fn next_hop(
    view: TopologyView<'_>,
    current: &str,
    dest_ip: Ipv4Addr,
    came_from: Option<&str>,
) -> Option<NextHop> {
    NextHopResolver::new(view, dest_ip).resolve(current, came_from)
}

impl<'a> NextHopResolver<'a> {
    /// Create a resolver. The destination node is looked up by its address.
    pub fn new(view: TopologyView<'a>, dest_ip: Ipv4Addr) -> Self {
        let dest = view.find_node_by_ip(dest_ip).map(|n| n.name.clone());
        Self {
            view,
            dest_ip,
            dest,
        }
    }

    /// Use `dest` as the destination node instead of looking it up by address.
    pub fn with_destination(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Name of the destination node, if known.
    pub fn destination(&self) -> Option<&str> {
        self.dest.as_deref()
    }

    /// Decide the next hop of a packet at `current` that arrived from `came_from`.
    pub fn resolve(&self, current: &str, came_from: Option<&str>) -> Option<NextHop> {
        let node = self.view.node(current)?;
        let neighbors: Vec<&Node> = self
            .view
            .neighbors(current)
            .into_iter()
            .filter(|n| Some(n.name.as_str()) != came_from)
            .collect();

        let hop = match node.kind {
            NodeKind::Host => self.host(&neighbors),
            NodeKind::Switch => self.switch(&neighbors),
            NodeKind::Router => self.router(node, &neighbors, came_from),
        };
        debug!(
            "next hop at {} towards {}: {:?}",
            current,
            self.dest_ip,
            hop.as_ref().map(|h| h.node.as_str())
        );
        hop
    }

    fn linked_dest<'n>(&self, neighbors: &[&'n Node]) -> Option<&'n Node> {
        let dest = self.dest.as_deref()?;
        neighbors.iter().copied().find(|n| n.name == dest)
    }

    fn first_of_kind<'n>(neighbors: &[&'n Node], kind: NodeKind) -> Option<&'n Node> {
        neighbors.iter().copied().find(|n| n.kind == kind)
    }

    fn host(&self, neighbors: &[&Node]) -> Option<NextHop> {
        if let Some(dest) = self.linked_dest(neighbors) {
            return Some(NextHop::new(dest, true));
        }
        Self::first_of_kind(neighbors, NodeKind::Router)
            .or_else(|| Self::first_of_kind(neighbors, NodeKind::Switch))
            .map(|n| NextHop::new(n, false))
    }

    fn switch(&self, neighbors: &[&Node]) -> Option<NextHop> {
        if let Some(dest) = self.linked_dest(neighbors) {
            return Some(NextHop::new(dest, true));
        }
        if let Some(host) = neighbors
            .iter()
            .find(|n| n.kind == NodeKind::Host && self.view.resolve_ip(&n.name) == Some(self.dest_ip))
        {
            return Some(NextHop::new(host, true));
        }
        [NodeKind::Router, NodeKind::Switch, NodeKind::Host]
            .into_iter()
            .find_map(|kind| Self::first_of_kind(neighbors, kind))
            .map(|n| NextHop::new(n, false))
    }

    fn router(&self, node: &Node, neighbors: &[&Node], came_from: Option<&str>) -> Option<NextHop> {
        let subnets = self.view.router_subnets(&node.name);

        // 1. destination in an attached subnet
        if let Some(attached) = subnets.iter().find(|s| s.network().contains(&self.dest_ip)) {
            if let Some(dest) = self.linked_dest(neighbors) {
                return Some(NextHop::new(dest, true).via(&attached.interface));
            }
            if let Some(hop) = self.dest.as_deref().and_then(|d| self.towards(node, neighbors, d)) {
                return Some(hop.via(&attached.interface));
            }
            if let Some(peer) = self.peer_via(node, &attached.interface, came_from) {
                return Some(NextHop::new(peer, false).via(&attached.interface));
            }
        }

        // 2. static routes, first match
        for route in self.view.routes(&node.name) {
            if !route.network.contains(&self.dest_ip) {
                continue;
            }
            if let Some(hop) = self.route_target(node, neighbors, route.next_hop, came_from) {
                return Some(hop);
            }
            if let Some(intf) = route.interface.as_deref() {
                if let Some(peer) = self.peer_via(node, intf, came_from) {
                    let full = node.interface(intf).map(|i| i.name.clone());
                    return Some(
                        NextHop::new(peer, self.is_dest(peer)).via(full.unwrap_or_else(|| intf.to_string())),
                    );
                }
            }
            debug!("skip unresolvable route to {} on {}", route.network, node.name);
        }

        // 3. interface whose subnet overlaps the /24 of the destination
        if let Ok(loose) = Ipv4Net::new(self.dest_ip, 24).map(|n| n.trunc()) {
            for attached in subnets.iter() {
                let net = attached.network();
                if !(net.contains(&loose) || loose.contains(&net)) {
                    continue;
                }
                if let Some(peer) = self.peer_via(node, &attached.interface, came_from) {
                    return Some(NextHop::new(peer, self.is_dest(peer)).via(&attached.interface));
                }
            }
        }

        // 4. forward to anything, preferring a switch linked to the destination
        if let Some(dest) = self.dest.as_deref() {
            if let Some(sw) = neighbors
                .iter()
                .find(|n| n.kind == NodeKind::Switch && n.is_linked_to(dest))
            {
                return Some(NextHop::new(sw, false));
            }
        }
        [NodeKind::Switch, NodeKind::Host, NodeKind::Router]
            .into_iter()
            .find_map(|kind| Self::first_of_kind(neighbors, kind))
            .map(|n| NextHop::new(n, self.is_dest(n)))
    }

    fn is_dest(&self, node: &Node) -> bool {
        self.dest.as_deref() == Some(node.name.as_str())
    }

    /// Neighbor on the other end of an interface, unless it is `came_from`.
    fn peer_via(&self, node: &Node, interface: &str, came_from: Option<&str>) -> Option<&'a Node> {
        self.view
            .peer_via(&node.name, interface)
            .filter(|p| Some(p.name.as_str()) != came_from)
    }

    /// Resolve the next-hop address of a static route to a neighbor.
    fn route_target(
        &self,
        node: &Node,
        neighbors: &[&Node],
        next_hop: Option<Ipv4Addr>,
        came_from: Option<&str>,
    ) -> Option<NextHop> {
        let next_hop = next_hop?;
        let target = self.view.node_by_ip(next_hop)?;
        if Some(target.name.as_str()) == came_from {
            return None;
        }
        let egress = self
            .view
            .router_subnets(&node.name)
            .into_iter()
            .find(|s| s.network().contains(&next_hop))
            .map(|s| s.interface);
        let hop = if let Some(n) = neighbors.iter().find(|n| n.name == target.name) {
            NextHop::new(n, self.is_dest(n))
        } else {
            self.towards(node, neighbors, &target.name)?
        };
        Some(match egress {
            Some(e) => hop.via(e),
            None => hop,
        })
    }

    /// Find the neighbor switch from which `target` is reachable over a chain of switches.
    fn towards(&self, node: &Node, neighbors: &[&Node], target: &str) -> Option<NextHop> {
        neighbors
            .iter()
            .filter(|n| n.kind == NodeKind::Switch)
            .find(|sw| self.switch_chain_reaches(&node.name, &sw.name, target))
            .map(|sw| NextHop::new(sw, false))
    }

    /// Breadth-first search from `start` over switches only, not passing `from`.
    fn switch_chain_reaches(&self, from: &str, start: &str, target: &str) -> bool {
        let mut seen: HashSet<&str> = HashSet::from([from, start]);
        let mut queue: VecDeque<&str> = VecDeque::from([start]);
        while let Some(sw) = queue.pop_front() {
            let Some(node) = self.view.node(sw) else {
                continue;
            };
            if node.is_linked_to(target) {
                return true;
            }
            for peer in node.peers() {
                if seen.contains(peer) {
                    continue;
                }
                if self.view.kind(peer) == Some(NodeKind::Switch) {
                    seen.insert(peer);
                    queue.push_back(peer);
                }
            }
        }
        false
    }
}
