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
use probe_craft::{ProbeConfig, Protocol};
use test_log::test;

use crate::{
    config::TracerouteConfig,
    traceroute::{parse_traceroute, traceroute_command, TracerouteLine},
};

const OUTPUT: &str = "traceroute to 10.0.1.1 (10.0.1.1), 20 hops max, 60 byte packets
 1  10.0.0.254  0.512 ms  0.401 ms  0.388 ms
 2  * * *
 3  10.0.1.1  1.021 ms  0.998 ms  0.950 ms
";

#[test]
fn parse() {
    assert_eq!(
        parse_traceroute(OUTPUT),
        vec![
            TracerouteLine {
                ttl: 1,
                addr: Some(Ipv4Addr::new(10, 0, 0, 254)),
                rtt_ms: Some(0.512),
            },
            TracerouteLine {
                ttl: 2,
                addr: None,
                rtt_ms: None,
            },
            TracerouteLine {
                ttl: 3,
                addr: Some(Ipv4Addr::new(10, 0, 1, 1)),
                rtt_ms: Some(1.021),
            },
        ]
    );
    assert!(parse_traceroute("").is_empty());
    assert!(parse_traceroute("connect: Network is unreachable").is_empty());
}

#[test]
fn command() {
    let dst = Ipv4Addr::new(10, 0, 1, 1);
    let config = TracerouteConfig::default();
    assert_eq!(
        traceroute_command(dst, &ProbeConfig::default(), &config),
        "traceroute -n -m 20 -w 2 -I 10.0.1.1"
    );
    assert_eq!(
        traceroute_command(dst, &ProbeConfig::new(Protocol::Tcp), &config),
        "traceroute -n -m 20 -w 2 -T -p 80 10.0.1.1"
    );
    assert_eq!(
        traceroute_command(
            dst,
            &ProbeConfig::new(Protocol::Udp).with_dport(5353),
            &TracerouteConfig {
                max_ttl: 5,
                timeout: 1,
                ..Default::default()
            }
        ),
        "traceroute -n -m 5 -w 1 -U -p 5353 10.0.1.1"
    );
}
