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

//! Building the `traceroute` command line and parsing its output.

use std::net::Ipv4Addr;

use lazy_static::lazy_static;
use probe_craft::{Protocol, ProbeConfig, DEFAULT_TCP_PORT, DEFAULT_UDP_PORT};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{config::TracerouteConfig, trace::Hop};

/// One line of traceroute output.
#[derive(Debug, Clone, PartialEq)]
pub struct TracerouteLine {
    /// TTL of the probe
    pub ttl: u8,
    /// Address that answered, `None` for a silent hop
    pub addr: Option<Ipv4Addr>,
    /// Latency of the first answer, in milliseconds
    pub rtt_ms: Option<f64>,
}

/// Result of a traceroute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerouteReport {
    /// Id of the trace that recorded the hops
    pub trace_id: String,
    /// Source node
    pub source: String,
    /// Destination node
    pub destination: String,
    /// Destination address
    pub destination_ip: Ipv4Addr,
    /// Whether the destination answered
    pub success: bool,
    /// All hops
    pub hops: Vec<Hop>,
    /// Error message
    pub error: Option<String>,
}

/// The command line to run on the source node.
pub fn traceroute_command(dst: Ipv4Addr, probe: &ProbeConfig, config: &TracerouteConfig) -> String {
    let proto = match probe.protocol {
        Protocol::Icmp => String::from(" -I"),
        Protocol::Tcp | Protocol::Http => {
            format!(" -T -p {}", probe.dport.unwrap_or(DEFAULT_TCP_PORT))
        }
        Protocol::Udp => format!(" -U -p {}", probe.dport.unwrap_or(DEFAULT_UDP_PORT)),
    };
    format!(
        "traceroute -n -m {} -w {}{} {}",
        config.max_ttl, config.timeout, proto, dst
    )
}

/// Parse the output of `traceroute -n`. The header line and unparsable lines are skipped.
pub fn parse_traceroute(output: &str) -> Vec<TracerouteLine> {
    lazy_static! {
        static ref HOP_LINE: Regex = Regex::new(r"^\s*(\d+)\s+(.*)$").unwrap();
        static ref ADDR: Regex = Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b").unwrap();
        static ref RTT: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*ms").unwrap();
    }

    output
        .lines()
        .filter_map(|line| {
            let caps = HOP_LINE.captures(line)?;
            let ttl = caps.get(1)?.as_str().parse().ok()?;
            let rest = caps.get(2)?.as_str();
            let addr = ADDR
                .captures(rest)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok());
            let rtt_ms = RTT
                .captures(rest)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok());
            Some(TracerouteLine { ttl, addr, rtt_ms })
        })
        .collect()
}
