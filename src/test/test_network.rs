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

use std::net::Ipv4Addr;

use pretty_assertions::assert_eq;
use test_log::test;

use super::{record, scenario_a, scenario_b, session};
use crate::{
    backend::EmulationBackend,
    network::{Network, NetworkInfo},
    topology::RouteRecord,
    types::{parse_addr, BackendError, NodeKind, TopologyError},
};

fn addr(s: &str) -> ipnet::Ipv4Net {
    parse_addr(s, 24).unwrap()
}

#[test]
fn interfaces_are_created_per_link() {
    let mut net = Network::new();
    let h1 = net.add_host("h1", Some("10.0.0.1")).unwrap();
    let s1 = net.add_switch("s1").unwrap();
    let r1 = net.add_router("r1").unwrap();
    net.add_link(h1, s1).unwrap();
    net.add_link(s1, r1).unwrap();

    let s1 = net.get_node(s1).unwrap();
    assert_eq!(
        s1.interfaces.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
        vec!["s1-eth0", "s1-eth1"]
    );
    assert_eq!(s1.peers().collect::<Vec<_>>(), vec!["h1", "r1"]);

    let h1 = net.get_node(h1).unwrap();
    assert_eq!(h1.interfaces.len(), 1);
    assert_eq!(h1.interfaces[0].addr, Some(addr("10.0.0.1/24")));
    assert_eq!(h1.first_addr(), Some(addr("10.0.0.1/24")));

    // routers get no address from linking
    assert_eq!(net.get_node(r1).unwrap().first_addr(), None);
}

#[test]
fn only_first_host_interface_gets_address() {
    let mut net = Network::new();
    let h1 = net.add_host("h1", Some("10.0.0.1/16")).unwrap();
    let s1 = net.add_switch("s1").unwrap();
    let s2 = net.add_switch("s2").unwrap();
    net.add_link(h1, s1).unwrap();
    net.add_link(h1, s2).unwrap();
    let h1 = net.get_node(h1).unwrap();
    assert_eq!(h1.interfaces[0].addr, Some(addr("10.0.0.1/16")));
    assert_eq!(h1.interfaces[1].addr, None);
}

#[test]
fn building_errors() {
    let mut net = Network::new();
    let h1 = net.add_host("h1", None).unwrap();
    assert_eq!(
        net.add_switch("h1"),
        Err(TopologyError::DuplicateNode("h1".to_string()))
    );
    assert_eq!(
        net.add_host("h2", Some("10.0.0.300")),
        Err(TopologyError::InvalidAddress("10.0.0.300".to_string()))
    );
    assert_eq!(
        net.add_link(h1, h1),
        Err(TopologyError::SelfLink("h1".to_string()))
    );
    assert_eq!(
        net.get_node_id("h9"),
        Err(TopologyError::NodeNotFound("h9".to_string()))
    );
}

#[test]
fn configure_interface_by_name() {
    let mut net = Network::new();
    let r1 = net.add_router("r1").unwrap();
    let s1 = net.add_switch("s1").unwrap();
    let s2 = net.add_switch("s2").unwrap();
    net.add_link(r1, s1).unwrap();
    net.add_link(r1, s2).unwrap();

    assert_eq!(
        net.configure_interface(r1, "eth1", addr("10.0.1.254")),
        Ok("r1-eth1".to_string())
    );
    assert_eq!(
        net.configure_interface(r1, "r1-eth0", addr("10.0.0.254")),
        Ok("r1-eth0".to_string())
    );
    let r1 = net.get_node(r1).unwrap();
    assert_eq!(r1.interface("eth0").unwrap().addr, Some(addr("10.0.0.254")));
    assert_eq!(r1.interface("r1-eth1").unwrap().addr, Some(addr("10.0.1.254")));
}

#[test]
fn configure_interface_fallback() {
    let mut net = Network::new();
    let r1 = net.add_router("r1").unwrap();
    let s1 = net.add_switch("s1").unwrap();
    let s2 = net.add_switch("s2").unwrap();
    let h1 = net.add_host("h1", None).unwrap();

    assert_eq!(
        net.configure_interface(r1, "eth0", addr("10.0.0.254")),
        Err(TopologyError::NoInterface("r1".to_string()))
    );
    assert_eq!(
        net.configure_interface(h1, "eth0", addr("10.0.0.1")),
        Err(TopologyError::WrongKind(
            "h1".to_string(),
            NodeKind::Host,
            NodeKind::Router
        ))
    );

    net.add_link(r1, s1).unwrap();
    net.add_link(r1, s2).unwrap();
    net.configure_interface(r1, "eth0", addr("10.0.0.254")).unwrap();

    // unknown name: first interface without an address
    assert_eq!(
        net.configure_interface(r1, "eth7", addr("10.0.1.254")),
        Ok("r1-eth1".to_string())
    );
    // unknown name and all interfaces addressed: first interface
    assert_eq!(
        net.configure_interface(r1, "eth8", addr("10.0.2.254")),
        Ok("r1-eth0".to_string())
    );
}

#[test]
fn management_ip_only_on_switches() {
    let mut net = Network::new();
    let s1 = net.add_switch("s1").unwrap();
    let r1 = net.add_router("r1").unwrap();
    net.set_management_ip(s1, addr("10.0.0.250")).unwrap();
    assert!(net.get_node(s1).unwrap().has_ip("10.0.0.250".parse().unwrap()));
    assert_eq!(
        net.set_management_ip(r1, addr("10.0.0.251")),
        Err(TopologyError::WrongKind(
            "r1".to_string(),
            NodeKind::Router,
            NodeKind::Switch
        ))
    );
}

#[test]
fn remove_link_detaches_interfaces() {
    let mut net = Network::new();
    let h1 = net.add_host("h1", Some("10.0.0.1")).unwrap();
    let s1 = net.add_switch("s1").unwrap();
    net.add_link(h1, s1).unwrap();
    net.remove_link(s1, h1).unwrap();

    assert!(!net.get_node(h1).unwrap().is_linked_to("s1"));
    assert!(!net.get_node(s1).unwrap().is_linked_to("h1"));
    assert_eq!(net.get_node(h1).unwrap().interfaces.len(), 1);
    assert!(net.info().links.is_empty());
    assert_eq!(
        net.remove_link(h1, s1),
        Err(TopologyError::LinkNotFound("h1".to_string(), "s1".to_string()))
    );
}

#[test]
fn from_record_assigns_free_addresses() {
    let net = Network::from_record(&record(serde_json::json!({
        "hosts": [{"name": "h1", "ip": "10.0.0.2"}, {"name": "h2"}, {"name": "h3", "ip": ""}],
        "switches": [{"name": "s1"}],
        "links": [
            {"node1": "h1", "node2": "s1"},
            {"node1": "h2", "node2": "s1"},
            {"node1": "h3", "node2": "s1"},
            {"node1": "h4", "node2": "s1"}
        ]
    })))
    .unwrap();

    assert!(net.is_running());
    let first = |name: &str| net.node(name).unwrap().first_addr();
    assert_eq!(first("h1"), Some(addr("10.0.0.2")));
    assert_eq!(first("h2"), Some(addr("10.0.0.1")));
    assert_eq!(first("h3"), Some(addr("10.0.0.3")));
    // the link to the unknown h4 is skipped
    assert_eq!(net.info().links.len(), 3);
}

#[test]
fn from_record_router_without_interfaces() {
    let net = Network::from_record(&record(serde_json::json!({
        "switches": [{"name": "s1"}],
        "routers": [{"name": "r1", "ip": "10.0.0.254"}],
        "links": [{"node1": "s1", "node2": "r1"}]
    })))
    .unwrap();
    assert_eq!(
        net.node("r1").unwrap().interface("eth0").unwrap().addr,
        Some(addr("10.0.0.254"))
    );
    assert_eq!(
        net.node_by_ip("10.0.0.254".parse().unwrap()).map(|n| n.name.as_str()),
        Some("r1")
    );
}

#[test]
fn info() {
    let net = Network::from_record(&record(scenario_b())).unwrap();
    let s = |x: &str| x.to_string();
    assert_eq!(
        net.info(),
        NetworkInfo {
            hosts: vec![s("h1"), s("h2")],
            switches: vec![s("s1"), s("s2")],
            routers: vec![s("r1")],
            links: vec![
                (s("h1"), s("s1")),
                (s("s1"), s("r1")),
                (s("r1"), s("s2")),
                (s("s2"), s("h2")),
            ],
        }
    );
}

#[test]
fn run_command_ip_addr() {
    let net = Network::from_record(&record(scenario_a())).unwrap();

    let out = net.run_command("h1", "ip -o -4 addr show").unwrap();
    let lines = out.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("1: lo    inet 127.0.0.1/8"));
    assert!(lines[1].starts_with("2: h1-eth0    inet 10.0.0.1/24 brd 10.0.0.255 scope global h1-eth0"));

    let out = net.run_command("h1", "ip -o -4 addr show dev h1-eth0").unwrap();
    assert_eq!(out.lines().count(), 1);
    assert!(out.contains("inet 10.0.0.1/24"));

    // switches have no addresses on their interfaces
    let out = net.run_command("s1", "ip -4 -o addr show").unwrap();
    assert_eq!(out.lines().count(), 1);

    assert_eq!(
        net.run_command("h1", "ip -o -4 addr show dev h1-eth7"),
        Err(BackendError::CommandFailed {
            node: "h1".to_string(),
            reason: "Device \"h1-eth7\" does not exist.".to_string(),
        })
    );
}

#[test]
fn run_command_errors() {
    let mut net = Network::from_record(&record(scenario_a())).unwrap();

    assert_eq!(
        net.run_command("h9", "ip -o -4 addr show"),
        Err(BackendError::NodeNotFound("h9".to_string()))
    );
    assert_eq!(
        net.run_command("h1", "rm -rf /"),
        Err(BackendError::UnsupportedCommand {
            node: "h1".to_string(),
            cmd: "rm -rf /".to_string(),
        })
    );
    assert_eq!(
        net.run_command("h1", "traceroute -n"),
        Err(BackendError::CommandFailed {
            node: "h1".to_string(),
            reason: "traceroute: missing destination address".to_string(),
        })
    );
    assert_eq!(
        net.run_command("h1", "traceroute -n -m 0 10.0.0.2"),
        Err(BackendError::CommandFailed {
            node: "h1".to_string(),
            reason: "traceroute: invalid max hops".to_string(),
        })
    );

    net.stop();
    assert!(!net.is_running());
    assert_eq!(
        net.run_command("h1", "ip -o -4 addr show"),
        Err(BackendError::NotRunning)
    );
}

#[test]
fn run_command_traceroute() {
    let net = Network::from_record(&record(scenario_b())).unwrap();
    assert_eq!(
        net.run_command("h1", "traceroute -n -m 5 -w 2 -I 10.0.1.1")
            .unwrap(),
        "traceroute to 10.0.1.1 (10.0.1.1), 5 hops max, 60 byte packets
 1  10.0.0.254  0.050 ms  0.050 ms  0.050 ms
 2  10.0.1.1  0.100 ms  0.100 ms  0.100 ms
"
    );

    // switches never answer
    let net = Network::from_record(&record(scenario_a())).unwrap();
    assert_eq!(
        net.run_command("h1", "traceroute -n 10.0.0.2").unwrap(),
        "traceroute to 10.0.0.2 (10.0.0.2), 30 hops max, 60 byte packets
 1  10.0.0.2  0.050 ms  0.050 ms  0.050 ms
"
    );

    // nobody owns the address, so every probe stays silent
    let out = net.run_command("h1", "traceroute -n -m 3 10.9.9.9").unwrap();
    assert_eq!(
        out.lines().skip(1).collect::<Vec<_>>(),
        vec![" 1  * * *", " 2  * * *", " 3  * * *"]
    );
}

#[test]
fn session_structural_changes() {
    let session = session(scenario_b());
    session.add_link("h1", "s2").unwrap();
    {
        let state = session.read();
        assert_eq!(state.record.links.len(), 5);
        assert!(state.view().are_linked("h1", "s2"));
    }
    assert_eq!(
        session.add_link("h1", "h9"),
        Err(TopologyError::NodeNotFound("h9".to_string()))
    );

    let mut state = session.write();
    state
        .add_route("r1", RouteRecord::new("10.0.5.0/24", Some("10.0.1.1"), None))
        .unwrap();
    let routes = state.view().routes("r1");
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].next_hop, Some(Ipv4Addr::new(10, 0, 1, 1)));
    assert_eq!(
        state.add_route("r1", RouteRecord::new("nonsense", None, None)),
        Err(TopologyError::InvalidAddress("nonsense".to_string()))
    );
    assert_eq!(
        state.add_route("r9", RouteRecord::new("10.0.5.0/24", None, None)),
        Err(TopologyError::NodeNotFound("r9".to_string()))
    );
}

#[test]
fn session_reload() {
    let session = session(scenario_a());
    session.reload(record(scenario_b())).unwrap();
    {
        let state = session.read();
        assert!(state.backend.is_running());
        assert_eq!(state.backend.info().routers, vec!["r1".to_string()]);
        assert_eq!(state.record.links.len(), 4);
    }

    // an invalid record leaves the session untouched
    let broken = record(serde_json::json!({
        "hosts": [{"name": "h1", "ip": "10.0.0.1"}, {"name": "h1", "ip": "10.0.0.2"}]
    }));
    assert_eq!(
        session.reload(broken),
        Err(TopologyError::DuplicateNode("h1".to_string()))
    );
    assert_eq!(session.read().backend.info().routers, vec!["r1".to_string()]);
}
