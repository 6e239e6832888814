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

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use pathsim::prelude::*;

/// Simulate packet paths through a virtual network, and validate its topology.
#[derive(Debug, Parser)]
struct Cli {
    /// Topology record (JSON).
    #[clap(long = "topology", short = 't')]
    topology: PathBuf,
    /// Configuration file (TOML). Falls back to `$PATHSIM_CONFIG`, then to the defaults.
    #[clap(long = "config", short = 'c')]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print all nodes and links of the network.
    Info,
    /// Validate the topology.
    Validate,
    /// Trace a single packet from one node to another.
    Trace {
        /// Source node
        source: String,
        /// Destination node
        destination: String,
        /// Protocol of the probe (icmp, tcp, udp or http)
        #[clap(long, short, default_value = "icmp")]
        protocol: Protocol,
        /// Destination port
        #[clap(long)]
        dport: Option<u16>,
    },
    /// Ping a node, given by name or address.
    Ping {
        /// Source node
        source: String,
        /// Destination node or address
        destination: String,
        /// Number of probes
        #[clap(long, short = 'n')]
        count: Option<usize>,
    },
    /// Trace the route to a node, given by name or address.
    Traceroute {
        /// Source node
        source: String,
        /// Destination node or address
        destination: String,
        /// Protocol of the probe (icmp, tcp, udp or http)
        #[clap(long, short, default_value = "icmp")]
        protocol: Protocol,
        /// Run `traceroute` on the emulation backend instead of simulating.
        #[clap(long)]
        backend: bool,
    },
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();

    let mut config = match args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::from_env()?,
    };

    let record = TopologyRecord::from_json(&std::fs::read_to_string(&args.topology)?)?;
    let session = NetworkSession::from_record(record)?;

    match args.command {
        Command::Info => print_json(&session.read().backend.info())?,
        Command::Validate => print_json(&validate_topology(&session))?,
        Command::Trace {
            source,
            destination,
            protocol,
            dport,
        } => {
            let tracer = PacketTracer::with_config(session, config);
            let probe = ProbeConfig {
                dport,
                ..ProbeConfig::new(protocol)
            };
            let trace = tracer.start_trace(None, &source, &destination, &probe)?;
            print_json(&trace.report())?
        }
        Command::Ping {
            source,
            destination,
            count,
        } => {
            let tracer = PacketTracer::with_config(session, config);
            print_json(&tracer.ping(&source, &destination, count)?)?
        }
        Command::Traceroute {
            source,
            destination,
            protocol,
            backend,
        } => {
            if backend {
                config.traceroute.mode = TracerouteMode::Backend;
            }
            let tracer = PacketTracer::with_config(session, config);
            let report = tracer.traceroute(&source, &destination, &ProbeConfig::new(protocol))?;
            print_json(&report)?
        }
    }

    Ok(())
}
