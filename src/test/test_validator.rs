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

use pretty_assertions::assert_eq;
use serde_json::json;
use test_log::test;

use super::{scenario_a, scenario_b, session};
use crate::{
    network::Network,
    resolve::TopologyView,
    session::NetworkSession,
    topology::TopologyRecord,
    types::SimError,
    validator::{validate, validate_topology, ValidationReport},
};

fn errors(report: &ValidationReport) -> Vec<&str> {
    report.errors.iter().map(String::as_str).collect()
}

fn warnings(report: &ValidationReport) -> Vec<&str> {
    report.warnings.iter().map(String::as_str).collect()
}

#[test]
fn valid_topology() {
    let report = validate_topology(&session(scenario_b()));
    assert_eq!(report, ValidationReport {
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    });
    assert!(report.into_result().is_ok());
}

#[test]
fn subnet_without_router() {
    let report = validate_topology(&session(scenario_a()));
    assert!(!report.valid);
    assert_eq!(
        errors(&report),
        vec!["Subnet 10.0.0.0/24 is not connected to any router and is unreachable from other subnets"]
    );
    assert_eq!(
        report.clone().into_result(),
        Err(SimError::ValidationFailure {
            errors: report.errors,
            warnings: report.warnings,
        })
    );
}

#[test]
fn switch_loop() {
    let report = validate_topology(&session(json!({
        "switches": [{"name": "s1"}, {"name": "s2"}, {"name": "s3"}],
        "links": [
            {"node1": "s1", "node2": "s2"},
            {"node1": "s2", "node2": "s3"},
            {"node1": "s3", "node2": "s1"}
        ]
    })));
    assert!(!report.valid);
    assert_eq!(
        errors(&report),
        vec!["The switch topology contains a loop (s1 - s2 - s3), which can cause broadcast storms. Remove the loop or add STP."]
    );
    assert!(report.warnings.is_empty());
}

#[test]
fn switch_tree_has_no_loop() {
    let report = validate_topology(&session(json!({
        "switches": [{"name": "s1"}, {"name": "s2"}, {"name": "s3"}, {"name": "s4"}],
        "links": [
            {"node1": "s1", "node2": "s2"},
            {"node1": "s1", "node2": "s3"},
            {"node1": "s3", "node2": "s4"}
        ]
    })));
    assert!(report.valid);
}

#[test]
fn isolated_host_without_address() {
    let mut net = Network::new();
    net.add_host("h1", None).unwrap();
    net.start();
    let report = validate_topology(&NetworkSession::new(net, TopologyRecord::default()));
    assert!(!report.valid);
    assert_eq!(
        errors(&report),
        vec![
            "Host h1 has no valid IP address",
            "Host h1 is not connected to any switch or router",
        ]
    );
}

#[test]
fn invalid_address_format() {
    let mut net = Network::new();
    let h1 = net.add_host("h1", None).unwrap();
    let r1 = net.add_router("r1").unwrap();
    net.add_link(h1, r1).unwrap();
    net.start();
    let record: TopologyRecord = serde_json::from_value(json!({
        "hosts": [{"name": "h1", "ip": "10.0.0.300"}],
        "routers": [{"name": "r1"}]
    }))
    .unwrap();
    let view = TopologyView::new(&net, &record);
    assert_eq!(
        errors(&validate(&view)),
        vec![
            "Invalid IP address format 10.0.0.300 on host h1",
            "Router r1 has no valid interface IP address",
        ]
    );
}

#[test]
fn router_with_two_interfaces_in_one_subnet() {
    let report = validate_topology(&session(json!({
        "switches": [{"name": "s1"}, {"name": "s2"}],
        "routers": [{
            "name": "r1",
            "interfaces": [
                {"name": "eth0", "ip": "10.0.0.1"},
                {"name": "eth1", "ip": "10.0.0.2"}
            ]
        }],
        "links": [
            {"node1": "r1", "node2": "s1"},
            {"node1": "r1", "node2": "s2"}
        ]
    })));
    assert!(report.valid);
    assert_eq!(
        warnings(&report),
        vec!["Router r1 has multiple interfaces in subnet 10.0.0.0/24: 10.0.0.1, 10.0.0.2"]
    );
}

#[test]
fn duplicate_addresses_and_host_links() {
    let report = validate_topology(&session(json!({
        "hosts": [
            {"name": "h1", "ip": "10.0.0.1"},
            {"name": "h2", "ip": "10.0.0.1"},
            {"name": "h3", "ip": "10.0.0.3"}
        ],
        "switches": [{"name": "s1"}],
        "routers": [{"name": "r1", "interfaces": [{"name": "eth0", "ip": "10.0.0.254"}]}],
        "links": [
            {"node1": "h1", "node2": "s1"},
            {"node1": "h2", "node2": "s1"},
            {"node1": "s1", "node2": "r1"},
            {"node1": "h3", "node2": "h1"}
        ]
    })));
    assert_eq!(
        errors(&report),
        vec![
            "IP address 10.0.0.1 is used by multiple nodes: h1, h2",
            "Host h1 is directly connected to other hosts: h3",
            "Host h3 is not connected to any switch or router",
            "Host h3 is directly connected to other hosts: h1",
        ]
    );
    assert!(report.warnings.is_empty());
}

#[test]
fn switch_with_mixed_subnets() {
    let report = validate_topology(&session(json!({
        "hosts": [
            {"name": "h1", "ip": "10.0.0.1"},
            {"name": "h2", "ip": "10.0.1.1"}
        ],
        "switches": [{"name": "s1", "ip": "10.0.0.250"}],
        "routers": [{"name": "r1", "interfaces": [{"name": "eth0", "ip": "10.0.0.254"}]}],
        "links": [
            {"node1": "h1", "node2": "s1"},
            {"node1": "h2", "node2": "s1"},
            {"node1": "s1", "node2": "r1"}
        ]
    })));
    assert_eq!(
        warnings(&report),
        vec!["Switch s1 has hosts in different subnets: 10.0.0.0/24, 10.0.1.0/24"]
    );
    assert_eq!(
        errors(&report),
        vec!["Subnet 10.0.1.0/24 is not connected to any router and is unreachable from other subnets"]
    );
}

#[test]
fn not_running() {
    let session = session(scenario_b());
    session.write().backend.stop();
    assert_eq!(
        validate_topology(&session),
        ValidationReport {
            valid: false,
            errors: vec!["The network is not running. Please start the topology first.".to_string()],
            warnings: Vec::new(),
        }
    );
}

#[test]
fn deterministic() {
    let session = session(json!({
        "hosts": [
            {"name": "h1", "ip": "10.0.0.1"},
            {"name": "h2", "ip": "10.0.1.1"},
            {"name": "h3"}
        ],
        "switches": [{"name": "s1"}, {"name": "s2"}, {"name": "s3"}],
        "links": [
            {"node1": "h1", "node2": "s1"},
            {"node1": "h2", "node2": "s1"},
            {"node1": "s1", "node2": "s2"},
            {"node1": "s2", "node2": "s3"},
            {"node1": "s3", "node2": "s1"}
        ]
    }));
    let first = validate_topology(&session);
    assert!(!first.valid);
    assert!(!first.warnings.is_empty());
    for _ in 0..10 {
        assert_eq!(validate_topology(&session), first);
    }
}
