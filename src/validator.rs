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

//! # Topology validation
//!
//! Structural checks on the live topology. Each check is independent and only produces its own
//! list of errors and warnings; the lists are merged in a fixed order afterwards. With the
//! `parallel-validation` feature, the checks run on the rayon thread pool.
//!
//! - **Addressing**: every host has a valid address, no address is used by two nodes, and every
//!   router has at least one interface address.
//! - **Connectivity**: every host is linked to a switch or a router, and never to another host.
//! - **Loops**: the switch-to-switch links contain no cycle.
//! - **Subnets**: hosts behind one switch should share a subnet, and every such subnet must be
//!   attached to a router.
//! - **Routers**: a router should not have two interfaces in the same subnet.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    net::Ipv4Addr,
};

use ipnet::Ipv4Net;
use itertools::Itertools;
use log::*;
use petgraph::graphmap::UnGraphMap;
use serde::{Deserialize, Serialize};

use crate::{
    backend::{EmulationBackend, Node},
    resolve::TopologyView,
    session::NetworkSession,
    types::{parse_addr, NodeKind, SimError, DEFAULT_PREFIX_LEN},
};

/// Result of a topology validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// `true` if there are no errors
    pub valid: bool,
    /// Structural errors
    pub errors: Vec<String>,
    /// Warnings
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Turn the report into an error if it is not valid.
    pub fn into_result(self) -> Result<Self, SimError> {
        if self.valid {
            Ok(self)
        } else {
            Err(SimError::ValidationFailure {
                errors: self.errors,
                warnings: self.warnings,
            })
        }
    }
}

/// Errors and warnings of a single check.
#[derive(Debug, Default)]
struct CheckOutcome {
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate the topology of a session, holding the read lock for the whole pass.
pub fn validate_topology<B: EmulationBackend>(session: &NetworkSession<B>) -> ValidationReport {
    let state = session.read();
    validate(&state.view())
}

/// Validate the topology of a view.
pub fn validate(view: &TopologyView<'_>) -> ValidationReport {
    if !view.backend().is_running() {
        return ValidationReport {
            valid: false,
            errors: vec![String::from(
                "The network is not running. Please start the topology first.",
            )],
            warnings: Vec::new(),
        };
    }

    let outcomes = run_checks(view);

    let mut report = ValidationReport::default();
    for outcome in outcomes {
        report.errors.extend(outcome.errors);
        report.warnings.extend(outcome.warnings);
    }
    report.valid = report.errors.is_empty();
    info!(
        "Validation finished with {} errors and {} warnings",
        report.errors.len(),
        report.warnings.len()
    );
    report
}

#[cfg(feature = "parallel-validation")]
fn run_checks(view: &TopologyView<'_>) -> [CheckOutcome; 5] {
    let ((addressing, connectivity), (loops, (subnets, routers))) = rayon::join(
        || rayon::join(|| check_addressing(view), || check_connectivity(view)),
        || {
            rayon::join(
                || check_loops(view),
                || rayon::join(|| check_subnets(view), || check_routers(view)),
            )
        },
    );
    [addressing, connectivity, loops, subnets, routers]
}

#[cfg(not(feature = "parallel-validation"))]
fn run_checks(view: &TopologyView<'_>) -> [CheckOutcome; 5] {
    [
        check_addressing(view),
        check_connectivity(view),
        check_loops(view),
        check_subnets(view),
        check_routers(view),
    ]
}

fn nodes_of_kind<'a>(view: &TopologyView<'a>, kind: NodeKind) -> Vec<&'a Node> {
    view.backend()
        .nodes()
        .into_iter()
        .filter(|n| n.kind == kind)
        .collect()
}

fn check_addressing(view: &TopologyView<'_>) -> CheckOutcome {
    let mut out = CheckOutcome::default();
    let mut owners: BTreeMap<Ipv4Addr, BTreeSet<&str>> = BTreeMap::new();

    for host in nodes_of_kind(view, NodeKind::Host) {
        match view.resolve_ip(&host.name) {
            Some(ip) => {
                owners.entry(ip).or_default().insert(&host.name);
            }
            None => {
                let configured = view
                    .record()
                    .host(&host.name)
                    .and_then(|h| h.ip.as_deref())
                    .filter(|ip| !ip.trim().is_empty());
                match configured {
                    Some(ip) if parse_addr(ip, DEFAULT_PREFIX_LEN).is_none() => out
                        .errors
                        .push(format!("Invalid IP address format {} on host {}", ip, host.name)),
                    _ => out
                        .errors
                        .push(format!("Host {} has no valid IP address", host.name)),
                }
            }
        }
    }

    for switch in nodes_of_kind(view, NodeKind::Switch) {
        if let Some(ip) = view.resolve_ip(&switch.name) {
            owners.entry(ip).or_default().insert(&switch.name);
        }
    }

    for router in nodes_of_kind(view, NodeKind::Router) {
        let subnets = view.router_subnets(&router.name);
        if subnets.is_empty() {
            out.errors.push(format!(
                "Router {} has no valid interface IP address",
                router.name
            ));
        }
        for s in subnets {
            owners.entry(s.addr.addr()).or_default().insert(&router.name);
        }
    }

    for (ip, names) in owners {
        if names.len() > 1 {
            out.errors.push(format!(
                "IP address {} is used by multiple nodes: {}",
                ip,
                names.iter().join(", ")
            ));
        }
    }

    out
}

fn check_connectivity(view: &TopologyView<'_>) -> CheckOutcome {
    let mut out = CheckOutcome::default();
    for host in nodes_of_kind(view, NodeKind::Host) {
        let neighbors = view.neighbors(&host.name);
        if !neighbors
            .iter()
            .any(|n| matches!(n.kind, NodeKind::Switch | NodeKind::Router))
        {
            out.errors.push(format!(
                "Host {} is not connected to any switch or router",
                host.name
            ));
        }
        let hosts = neighbors
            .iter()
            .filter(|n| n.kind == NodeKind::Host)
            .map(|n| n.name.as_str())
            .collect::<Vec<_>>();
        if !hosts.is_empty() {
            out.errors.push(format!(
                "Host {} is directly connected to other hosts: {}",
                host.name,
                hosts.join(", ")
            ));
        }
    }
    out
}

fn check_loops(view: &TopologyView<'_>) -> CheckOutcome {
    let mut out = CheckOutcome::default();
    let mut graph: UnGraphMap<&str, ()> = UnGraphMap::new();
    for switch in nodes_of_kind(view, NodeKind::Switch) {
        graph.add_node(switch.name.as_str());
        for peer in view.neighbors(&switch.name) {
            if peer.kind == NodeKind::Switch {
                graph.add_edge(switch.name.as_str(), peer.name.as_str(), ());
            }
        }
    }

    if let Some(cycle) = find_cycle(&graph) {
        out.errors.push(format!(
            "The switch topology contains a loop ({}), which can cause broadcast storms. Remove the loop or add STP.",
            cycle.join(" - ")
        ));
    }
    out
}

/// Depth-first search for a cycle. A back-edge to a node on the current path (other than the
/// parent) closes a cycle, which is returned.
fn find_cycle<'a>(graph: &UnGraphMap<&'a str, ()>) -> Option<Vec<&'a str>> {
    fn dfs<'a>(
        graph: &UnGraphMap<&'a str, ()>,
        node: &'a str,
        parent: Option<&'a str>,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<&'a str>> {
        visited.insert(node);
        path.push(node);
        for next in graph.neighbors(node).sorted() {
            if Some(next) == parent {
                continue;
            }
            if let Some(pos) = path.iter().position(|x| *x == next) {
                return Some(path[pos..].to_vec());
            }
            if !visited.contains(next) {
                if let Some(cycle) = dfs(graph, next, Some(node), visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }

    let mut visited = HashSet::new();
    for start in graph.nodes().sorted() {
        if visited.contains(start) {
            continue;
        }
        let mut path = Vec::new();
        if let Some(cycle) = dfs(graph, start, None, &mut visited, &mut path) {
            return Some(cycle);
        }
    }
    None
}

fn check_subnets(view: &TopologyView<'_>) -> CheckOutcome {
    let mut out = CheckOutcome::default();
    let mut observed: BTreeSet<Ipv4Net> = BTreeSet::new();

    for switch in nodes_of_kind(view, NodeKind::Switch) {
        let subnets: BTreeSet<Ipv4Net> = view
            .neighbors(&switch.name)
            .into_iter()
            .filter(|n| n.kind == NodeKind::Host)
            .filter_map(|h| view.resolve_addr(&h.name))
            .map(|a| a.trunc())
            .collect();
        if subnets.len() > 1 {
            out.warnings.push(format!(
                "Switch {} has hosts in different subnets: {}",
                switch.name,
                subnets.iter().join(", ")
            ));
        }
        observed.extend(subnets);
    }

    let router_nets: Vec<Ipv4Net> = nodes_of_kind(view, NodeKind::Router)
        .into_iter()
        .flat_map(|r| view.router_subnets(&r.name))
        .map(|s| s.network())
        .collect();

    for subnet in observed {
        if !router_nets
            .iter()
            .any(|r| r.contains(&subnet) || subnet.contains(r))
        {
            out.errors.push(format!(
                "Subnet {} is not connected to any router and is unreachable from other subnets",
                subnet
            ));
        }
    }
    out
}

fn check_routers(view: &TopologyView<'_>) -> CheckOutcome {
    let mut out = CheckOutcome::default();
    for router in nodes_of_kind(view, NodeKind::Router) {
        let mut by_subnet: BTreeMap<Ipv4Net, Vec<Ipv4Addr>> = BTreeMap::new();
        for s in view.router_subnets(&router.name) {
            by_subnet.entry(s.network()).or_default().push(s.addr.addr());
        }
        for (subnet, ips) in by_subnet {
            if ips.len() > 1 {
                out.warnings.push(format!(
                    "Router {} has multiple interfaces in subnet {}: {}",
                    router.name,
                    subnet,
                    ips.iter().join(", ")
                ));
            }
        }
    }
    out
}
