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

//! # PathSim
//!
//! This library simulates how a packet travels through a virtual network of hosts, switches and
//! routers, and checks whether such a topology is structurally sound. It performs a best-effort
//! logical simulation of forwarding decisions based on static configuration, not a bit-accurate
//! network stack.
//!
//! ## Main Concepts
//!
//! The [`network::Network`] is an in-memory emulation of the live network. It stores all nodes
//! and links on a graph (see [Petgraph](https://docs.rs/petgraph/latest/petgraph/index.html)),
//! and it is built from a persisted [`topology::TopologyRecord`]. The rest of the library only
//! talks to the live network through the [`backend::EmulationBackend`] trait, so the emulator
//! can be swapped out.
//!
//! Both the network and its record are shared through a [`session::NetworkSession`], which
//! allows many readers (traces and validation passes) but only a single writer (structural
//! changes).
//!
//! - The [`resolve::TopologyView`] looks up the effective address of a node, preferring the
//!   live network over the persisted record.
//! - The [`next_hop::NextHopResolver`] decides where a packet goes next, depending on whether it
//!   sits on a host, a switch or a router.
//! - The [`tracer::PacketTracer`] drives the resolver hop by hop and records a
//!   [`trace::Trace`]. It also offers ping and traceroute on top of that.
//! - The [`validator`] runs independent structural checks and reports errors and warnings.
//!
//! Probe packets are crafted by the `probe-craft` crate.
//!
//! ## Optional Features
//!
//! - `parallel-validation` (enabled by default): run the checks of the validator in parallel,
//!   using [rayon](https://docs.rs/rayon/latest/rayon/index.html).
//!
//! ## Example usage
//!
//! ```
//! use pathsim::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let record = TopologyRecord::from_json(r#"{
//!         "name": "two subnets",
//!         "hosts": [{"name": "h1", "ip": "10.0.0.1/24"}, {"name": "h2", "ip": "10.0.1.1/24"}],
//!         "switches": [{"name": "s1"}, {"name": "s2"}],
//!         "routers": [{
//!             "name": "r1",
//!             "interfaces": [
//!                 {"name": "eth0", "ip": "10.0.0.254", "subnet_mask": 24},
//!                 {"name": "eth1", "ip": "10.0.1.254", "subnet_mask": 24}
//!             ]
//!         }],
//!         "links": [
//!             {"node1": "h1", "node2": "s1"},
//!             {"node1": "s1", "node2": "r1"},
//!             {"node1": "r1", "node2": "s2"},
//!             {"node1": "s2", "node2": "h2"}
//!         ]
//!     }"#)?;
//!     let session = NetworkSession::from_record(record)?;
//!
//!     let report = validate_topology(&session);
//!     assert!(report.valid);
//!
//!     let tracer = PacketTracer::new(session);
//!     let trace = tracer.start_trace(None, "h1", "h2", &ProbeConfig::default())?;
//!     assert!(trace.success());
//!     assert!(trace.hops().iter().any(|h| h.action == HopAction::Route));
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod backend;
pub mod config;
pub mod network;
pub mod next_hop;
pub mod prelude;
pub mod resolve;
pub mod session;
pub mod topology;
pub mod trace;
pub mod tracer;
pub mod traceroute;
pub mod types;
pub mod validator;

#[cfg(test)]
mod test;
