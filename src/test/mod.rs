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

use serde_json::json;

use crate::{session::NetworkSession, topology::TopologyRecord};

mod test_network;
mod test_trace;
mod test_traceroute;
mod test_validator;

/// Parse a record from a JSON value.
pub(crate) fn record(value: serde_json::Value) -> TopologyRecord {
    serde_json::from_value(value).unwrap()
}

/// Build and start a session from a JSON value.
pub(crate) fn session(value: serde_json::Value) -> NetworkSession {
    NetworkSession::from_record(record(value)).unwrap()
}

/// # Two hosts on one switch
///
/// ```text
/// h1 (10.0.0.1) ---- s1 ---- h2 (10.0.0.2)
/// ```
pub(crate) fn scenario_a() -> serde_json::Value {
    json!({
        "name": "scenario a",
        "hosts": [
            {"name": "h1", "ip": "10.0.0.1/24"},
            {"name": "h2", "ip": "10.0.0.2/24"}
        ],
        "switches": [{"name": "s1"}],
        "links": [
            {"node1": "h1", "node2": "s1"},
            {"node1": "h2", "node2": "s1"}
        ]
    })
}

/// # Two subnets connected by a router
///
/// ```text
/// h1 (10.0.0.1) ---- s1 ---- r1 ---- s2 ---- h2 (10.0.1.1)
///                    eth0: 10.0.0.254  eth1: 10.0.1.254
/// ```
pub(crate) fn scenario_b() -> serde_json::Value {
    json!({
        "name": "scenario b",
        "hosts": [
            {"name": "h1", "ip": "10.0.0.1/24"},
            {"name": "h2", "ip": "10.0.1.1/24"}
        ],
        "switches": [{"name": "s1"}, {"name": "s2"}],
        "routers": [{
            "name": "r1",
            "interfaces": [
                {"name": "eth0", "ip": "10.0.0.254", "subnet_mask": 24},
                {"name": "eth1", "ip": "10.0.1.254", "subnet_mask": 24}
            ]
        }],
        "links": [
            {"node1": "h1", "node2": "s1"},
            {"node1": "s1", "node2": "r1"},
            {"node1": "r1", "node2": "s2"},
            {"node1": "s2", "node2": "h2"}
        ]
    })
}

/// # Three routers with static routes that form a loop
///
/// ```text
/// h1 ---- r1 ---- r2          h9 ---- s9
///          \      /
///           \    /
///            r3
/// ```
///
/// Every router sends `10.0.9.0/24` to the next one: r1 -> r2 -> r3 -> r1.
pub(crate) fn routing_loop() -> serde_json::Value {
    json!({
        "name": "routing loop",
        "hosts": [
            {"name": "h1", "ip": "10.0.0.1/24"},
            {"name": "h9", "ip": "10.0.9.1/24"}
        ],
        "switches": [{"name": "s9"}],
        "routers": [
            {
                "name": "r1",
                "interfaces": [
                    {"name": "eth0", "ip": "10.0.0.254"},
                    {"name": "eth1", "ip": "10.1.12.1"},
                    {"name": "eth2", "ip": "10.1.13.1"}
                ],
                "routes": [{"network": "10.0.9.0/24", "next_hop": "10.1.12.2"}]
            },
            {
                "name": "r2",
                "interfaces": [
                    {"name": "eth0", "ip": "10.1.12.2"},
                    {"name": "eth1", "ip": "10.1.23.2"}
                ],
                "routes": [{"network": "10.0.9.0/24", "next_hop": "10.1.23.3"}]
            },
            {
                "name": "r3",
                "interfaces": [
                    {"name": "eth0", "ip": "10.1.23.3"},
                    {"name": "eth1", "ip": "10.1.13.3"}
                ],
                "routes": [{"network": "10.0.9.0/24", "next_hop": "10.1.13.1"}]
            }
        ],
        "links": [
            {"node1": "h1", "node2": "r1"},
            {"node1": "r1", "node2": "r2"},
            {"node1": "r2", "node2": "r3"},
            {"node1": "r3", "node2": "r1"},
            {"node1": "h9", "node2": "s9"}
        ]
    })
}
