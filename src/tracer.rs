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

//! # Path simulation engine
//!
//! The [`PacketTracer`] drives the next-hop resolver hop by hop, and records the journey of the
//! packet in a [`Trace`]. Request-level problems (unknown node, no address, backend down) are
//! returned as errors. Everything that goes wrong later ends up in a completed, failed trace.
//!
//! ```
//! use pathsim::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let record = TopologyRecord::from_json(r#"{
//!     "hosts": [{"name": "h1", "ip": "10.0.0.1"}, {"name": "h2", "ip": "10.0.0.2"}],
//!     "switches": [{"name": "s1"}],
//!     "links": [{"node1": "h1", "node2": "s1"}, {"node1": "h2", "node2": "s1"}]
//! }"#)?;
//! let tracer = PacketTracer::new(NetworkSession::from_record(record)?);
//! let trace = tracer.start_trace(None, "h1", "h2", &ProbeConfig::default())?;
//! assert!(trace.success());
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashSet,
    net::Ipv4Addr,
    sync::{Mutex, MutexGuard, PoisonError},
};

use log::*;
use probe_craft::{Ipv4ProbeBuilder, ProbeBuilder, ProbeConfig};
use serde::{Deserialize, Serialize};

use crate::{
    backend::EmulationBackend,
    config::{SimConfig, TracerouteMode},
    network::Network,
    next_hop::{NextHop, NextHopResolver},
    resolve::TopologyView,
    session::NetworkSession,
    trace::{lock, HopAction, SharedTrace, Trace, TraceStore},
    traceroute::{parse_traceroute, traceroute_command, TracerouteReport},
    types::{BackendError, NodeKind, SimError},
};

/// Result of a single ping probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    /// Sequence number, starting at 1
    pub seq: usize,
    /// Whether the probe reached the destination
    pub success: bool,
    /// Round-trip time in milliseconds
    pub time_ms: Option<f64>,
    /// Reason of a failure
    pub error: Option<String>,
}

/// Aggregated result of a ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingReport {
    /// Source node
    pub source: String,
    /// Source address
    pub source_ip: Ipv4Addr,
    /// Destination address
    pub destination_ip: Ipv4Addr,
    /// Number of probes sent
    pub packets_sent: usize,
    /// Number of probes that arrived
    pub packets_received: usize,
    /// Lost probes in percent
    pub packet_loss: f64,
    /// Per-probe results, ordered by `seq`
    pub results: Vec<PingResult>,
}

/// Simulates the path of packets through the network of a [`NetworkSession`].
#[derive(Debug)]
pub struct PacketTracer<B = Network, P = Ipv4ProbeBuilder> {
    session: NetworkSession<B>,
    prober: P,
    traces: Mutex<TraceStore>,
    config: SimConfig,
}

impl<B: EmulationBackend> PacketTracer<B, Ipv4ProbeBuilder> {
    /// Create a tracer with the default configuration.
    pub fn new(session: NetworkSession<B>) -> Self {
        Self::with_config(session, SimConfig::default())
    }

    /// Create a tracer with the given configuration.
    pub fn with_config(session: NetworkSession<B>, config: SimConfig) -> Self {
        Self::with_probe_builder(session, Ipv4ProbeBuilder, config)
    }
}

impl<B: EmulationBackend, P: ProbeBuilder> PacketTracer<B, P> {
    /// Create a tracer that crafts its probes with `prober`.
    pub fn with_probe_builder(session: NetworkSession<B>, prober: P, config: SimConfig) -> Self {
        Self {
            session,
            prober,
            traces: Mutex::new(TraceStore::new(config.trace_capacity)),
            config,
        }
    }

    /// The session of this tracer.
    pub fn session(&self) -> &NetworkSession<B> {
        &self.session
    }

    /// The configuration of this tracer.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    fn store(&self) -> MutexGuard<'_, TraceStore> {
        self.traces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a snapshot of a trace.
    pub fn get_trace(&self, id: &str) -> Option<Trace> {
        self.store().get(id)
    }

    /// Ids of all stored traces, oldest first.
    pub fn trace_ids(&self) -> Vec<String> {
        self.store().ids().map(String::from).collect()
    }

    /// Append a hop to a trace. Returns `false` if the trace is unknown or already completed, or
    /// if `node` does not exist in the network.
    pub fn add_hop(&self, id: &str, node: &str, action: HopAction, details: impl Into<String>) -> bool {
        if self.session.read().view().node(node).is_none() {
            warn!("Ignore hop of trace {} on unknown node {}", id, node);
            return false;
        }
        let handle = self.store().handle(id);
        match handle {
            Some(trace) => lock(&trace).push_hop(node, action, details),
            None => {
                debug!("Ignore hop for unknown trace {}", id);
                false
            }
        }
    }

    /// Complete a trace. Returns `false` if the trace is unknown or already completed, in which
    /// case nothing changes.
    pub fn complete_trace(&self, id: &str, success: bool, error: Option<String>) -> bool {
        let handle = self.store().handle(id);
        match handle {
            Some(trace) => finish(&trace, success, error),
            None => false,
        }
    }

    /// Cancel a trace in progress.
    pub fn stop_trace(&self, id: &str) -> Result<Trace, SimError> {
        let handle = self
            .store()
            .handle(id)
            .ok_or_else(|| SimError::TraceNotFound(id.to_string()))?;
        let mut trace = lock(&handle);
        if !trace.complete(false, Some(String::from("stopped by caller"))) {
            return Err(SimError::TraceAlreadyCompleted(id.to_string()));
        }
        info!("Trace {} stopped by caller", id);
        Ok(trace.clone())
    }

    /// Simulate a packet from `source` to `destination`, and return the completed trace. A
    /// random id is generated if `id` is `None`.
    ///
    /// This only fails if a node does not exist, has no address, or if the network is not
    /// running. Every other failure results in a completed trace with `success = false`.
    pub fn start_trace(
        &self,
        id: Option<String>,
        source: &str,
        destination: &str,
        probe: &ProbeConfig,
    ) -> Result<Trace, SimError> {
        self.run_trace(id, source, destination, probe, self.config.max_hops)
    }

    fn run_trace(
        &self,
        id: Option<String>,
        source: &str,
        destination: &str,
        probe: &ProbeConfig,
        max_hops: usize,
    ) -> Result<Trace, SimError> {
        let state = self.session.read();
        let view = state.view();
        let (source_ip, destination_ip) = endpoints(&view, source, destination)?;

        let id = id.unwrap_or_else(|| format!("trace-{:016x}", rand::random::<u64>()));
        let trace = Trace::new(
            &id,
            source,
            destination,
            source_ip,
            destination_ip,
            format!(
                "Starting {} trace from {} ({}) to {} ({})",
                probe.protocol.name(),
                source,
                source_ip,
                destination,
                destination_ip
            ),
        );
        let trace = self.publish(trace)?;

        self.forward(&view, &trace, source, destination, destination_ip, probe, max_hops);

        let trace = lock(&trace).clone();
        Ok(trace)
    }

    /// Put a new trace into the store, unless another trace with the same id is in progress.
    fn publish(&self, trace: Trace) -> Result<SharedTrace, SimError> {
        self.store()
            .insert(trace)
            .map_err(|t| SimError::TraceInProgress(t.id().to_string()))
    }

    /// The forwarding loop. Each failure completes the trace.
    #[allow(clippy::too_many_arguments)]
    fn forward(
        &self,
        view: &TopologyView<'_>,
        trace: &SharedTrace,
        source: &str,
        destination: &str,
        destination_ip: Ipv4Addr,
        probe: &ProbeConfig,
        max_hops: usize,
    ) {
        let source_ip = match view.resolve_ip(source) {
            Some(ip) => ip,
            None => {
                fail(trace, SimError::NoAddress(source.to_string()));
                return;
            }
        };
        match self.prober.build_probe(source_ip, destination_ip, probe) {
            Ok(packet) => {
                if !push(trace, source, HopAction::Send, format!("Sending {}", packet)) {
                    return;
                }
            }
            Err(e) => {
                fail(trace, SimError::from(e));
                return;
            }
        }

        let resolver = NextHopResolver::new(*view, destination_ip).with_destination(destination);
        let mut current = source.to_string();
        let mut previous: Option<String> = None;
        let mut visited: HashSet<String> = HashSet::from([current.clone()]);
        let mut visited_subnets: HashSet<String> = HashSet::new();

        for step in 0..=max_hops {
            if current == destination || view.resolve_ip(&current) == Some(destination_ip) {
                let details = format!("Packet received by {} ({})", current, destination_ip);
                if push(trace, &current, HopAction::Receive, details) {
                    finish(trace, true, None);
                }
                return;
            }
            if step == max_hops {
                break;
            }

            let Some(hop) = resolver.resolve(&current, previous.as_deref()) else {
                let details = format!("No route to destination {}", destination_ip);
                if push(trace, &current, HopAction::Drop, details) {
                    fail(trace, SimError::NoRoute(current));
                }
                return;
            };

            if visited.contains(&hop.node) {
                let details = format!("Routing loop detected: {} was already visited", hop.node);
                if push(trace, &current, HopAction::Loop, details) {
                    fail(trace, SimError::RoutingLoop(current));
                }
                return;
            }

            if view.kind(&current) == Some(NodeKind::Router) {
                if let Some((subnet, details)) = route_info(view, &current, &hop) {
                    if visited_subnets.insert(subnet)
                        && !push(trace, &current, HopAction::Route, details)
                    {
                        return;
                    }
                }
            }

            let (action, details) = if hop.direct && hop.node == destination {
                (HopAction::Deliver, format!("Delivering to {}", hop.node))
            } else {
                (HopAction::Forward, format!("Forwarding to {}", hop.node))
            };
            if !push(trace, &current, action, details) {
                return;
            }

            visited.insert(hop.node.clone());
            previous = Some(std::mem::replace(&mut current, hop.node));
        }

        if push(
            trace,
            &current,
            HopAction::Timeout,
            format!("Hop limit of {} reached", max_hops),
        ) {
            fail(trace, SimError::HopLimitExceeded(max_hops));
        }
    }

    /// Find the destination node, given either by name or by address.
    fn lookup_destination(&self, destination: &str) -> Result<String, SimError> {
        let state = self.session.read();
        let view = state.view();
        if view.node(destination).is_some() {
            return Ok(destination.to_string());
        }
        let ip: Ipv4Addr = destination
            .parse()
            .map_err(|_| SimError::NodeNotFound(destination.to_string()))?;
        view.find_node_by_ip(ip)
            .map(|n| n.name.clone())
            .ok_or_else(|| SimError::NodeNotFound(destination.to_string()))
    }

    /// Send `count` ICMP probes one after the other (the configured `ping_count` if `None`). The
    /// destination is either a node name or an address.
    pub fn ping(
        &self,
        source: &str,
        destination: &str,
        count: Option<usize>,
    ) -> Result<PingReport, SimError> {
        let dest = self.lookup_destination(destination)?;
        let (source_ip, resolved_ip) = {
            let state = self.session.read();
            endpoints(&state.view(), source, &dest)?
        };
        // report the address that was asked for, not the first one of its owner
        let destination_ip = destination.parse().unwrap_or(resolved_ip);

        let count = count.unwrap_or(self.config.ping_count);
        let nonce = format!("{:08x}", rand::random::<u32>());
        let mut results = Vec::with_capacity(count);
        for seq in 1..=count {
            let id = format!("ping-{}-{}", nonce, seq);
            let probe = ProbeConfig::icmp_echo(icmp_seq(seq));
            let result = match self.start_trace(Some(id), source, &dest, &probe) {
                Ok(trace) if trace.success() => PingResult {
                    seq,
                    success: true,
                    time_ms: trace.rtt_ms(),
                    error: None,
                },
                Ok(trace) => PingResult {
                    seq,
                    success: false,
                    time_ms: None,
                    error: trace.error().map(String::from),
                },
                Err(e) => PingResult {
                    seq,
                    success: false,
                    time_ms: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);
        }

        let received = results.iter().filter(|r| r.success).count();
        let packet_loss = if count == 0 {
            0.0
        } else {
            (count - received) as f64 * 100.0 / count as f64
        };
        info!(
            "Ping {} -> {}: {}/{} received",
            source, destination_ip, received, count
        );

        Ok(PingReport {
            source: source.to_string(),
            source_ip,
            destination_ip,
            packets_sent: count,
            packets_received: received,
            packet_loss,
            results,
        })
    }

    /// Trace the route from `source` to `destination` (node name or address). Depending on the
    /// configured mode, the hops are simulated or taken from `traceroute` running on the backend.
    pub fn traceroute(
        &self,
        source: &str,
        destination: &str,
        probe: &ProbeConfig,
    ) -> Result<TracerouteReport, SimError> {
        let dest = self.lookup_destination(destination)?;
        let id = format!("traceroute-{:08x}", rand::random::<u32>());
        let trace = match self.config.traceroute.mode {
            TracerouteMode::Simulated => {
                self.run_trace(Some(id), source, &dest, probe, self.config.traceroute.max_ttl)?
            }
            TracerouteMode::Backend => self.backend_traceroute(id, source, &dest, probe)?,
        };
        Ok(TracerouteReport {
            trace_id: trace.id().to_string(),
            source: trace.source().to_string(),
            destination: trace.destination().to_string(),
            destination_ip: trace.destination_ip(),
            success: trace.success(),
            hops: trace.hops().to_vec(),
            error: trace.error().map(String::from),
        })
    }

    fn backend_traceroute(
        &self,
        id: String,
        source: &str,
        destination: &str,
        probe: &ProbeConfig,
    ) -> Result<Trace, SimError> {
        let state = self.session.read();
        let view = state.view();
        let (source_ip, destination_ip) = endpoints(&view, source, destination)?;

        let cmd = traceroute_command(destination_ip, probe, &self.config.traceroute);
        debug!("Run `{}` on {}", cmd, source);
        let output = view.backend().run_command(source, &cmd)?;

        let trace = Trace::new(
            &id,
            source,
            destination,
            source_ip,
            destination_ip,
            format!("Starting traceroute from {} to {}", source, destination_ip),
        );
        let trace = self.publish(trace)?;
        push(&trace, source, HopAction::Send, format!("Running `{}`", cmd));

        let mut last = source.to_string();
        let mut reached = false;
        for line in parse_traceroute(&output) {
            let rtt = line
                .rtt_ms
                .map(|t| format!(", {:.3} ms", t))
                .unwrap_or_default();
            let added = match line.addr {
                Some(addr) if addr == destination_ip => {
                    reached = true;
                    last = destination.to_string();
                    push(
                        &trace,
                        destination,
                        HopAction::Receive,
                        format!("TTL {}: {} reached{}", line.ttl, addr, rtt),
                    )
                }
                Some(addr) => match view.node_by_ip(addr) {
                    Some(node) => {
                        last = node.name.clone();
                        push(
                            &trace,
                            &node.name,
                            HopAction::Hop,
                            format!("TTL {}: {}{}", line.ttl, addr, rtt),
                        )
                    }
                    None => push(
                        &trace,
                        &last,
                        HopAction::Hop,
                        format!("TTL {}: {} (unknown node){}", line.ttl, addr, rtt),
                    ),
                },
                None => push(
                    &trace,
                    &last,
                    HopAction::Hop,
                    format!("TTL {}: * (no response)", line.ttl),
                ),
            };
            if !added || reached {
                break;
            }
        }

        if reached {
            finish(&trace, true, None);
        } else {
            fail(&trace, SimError::HopLimitExceeded(self.config.traceroute.max_ttl));
        }
        let trace = lock(&trace).clone();
        Ok(trace)
    }
}

/// Append a hop to a trace owned by the forwarding loop.
fn push(trace: &SharedTrace, node: &str, action: HopAction, details: impl Into<String>) -> bool {
    lock(trace).push_hop(node, action, details)
}

/// Complete a trace and log the outcome.
fn finish(trace: &SharedTrace, success: bool, error: Option<String>) -> bool {
    let mut trace = lock(trace);
    let done = trace.complete(success, error);
    if done {
        match trace.error() {
            None if trace.success() => {
                info!("Trace {} reached {}", trace.id(), trace.destination())
            }
            e => info!(
                "Trace {} failed: {}",
                trace.id(),
                e.unwrap_or("destination not reached")
            ),
        }
    }
    done
}

fn fail(trace: &SharedTrace, error: SimError) {
    finish(trace, false, Some(error.to_string()));
}

/// ICMP sequence number of the `seq`-th probe. Like ping(8), it wraps around after 65535.
pub(crate) fn icmp_seq(seq: usize) -> u16 {
    (seq % (usize::from(u16::MAX) + 1)) as u16
}

/// Check that both nodes exist and resolve their addresses.
fn endpoints(
    view: &TopologyView<'_>,
    source: &str,
    destination: &str,
) -> Result<(Ipv4Addr, Ipv4Addr), SimError> {
    if !view.backend().is_running() {
        return Err(SimError::BackendUnavailable(BackendError::NotRunning));
    }
    for name in [source, destination] {
        if view.node(name).is_none() {
            return Err(SimError::NodeNotFound(name.to_string()));
        }
    }
    let source_ip = view
        .resolve_ip(source)
        .ok_or_else(|| SimError::NoAddress(source.to_string()))?;
    let destination_ip = view
        .resolve_ip(destination)
        .ok_or_else(|| SimError::NoAddress(destination.to_string()))?;
    Ok((source_ip, destination_ip))
}

/// Subnet entered by a router forwarding to `hop`, and the details of the `route` hop.
fn route_info(view: &TopologyView<'_>, router: &str, hop: &NextHop) -> Option<(String, String)> {
    let egress = hop.interface.as_deref().and_then(|intf| {
        view.router_subnets(router)
            .into_iter()
            .find(|s| s.interface == intf)
    });
    match egress {
        Some(s) => {
            let subnet = s.network().to_string();
            let details = format!("Routing to subnet {} via {}", subnet, s.interface);
            Some((subnet, details))
        }
        None => {
            let subnet = view.resolve_addr(&hop.node)?.trunc().to_string();
            let details = format!("Routing to subnet {} via {}", subnet, hop.node);
            Some((subnet, details))
        }
    }
}
