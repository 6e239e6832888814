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

//! # Traces
//!
//! A [`Trace`] is the hop log of one simulated packet. Hops are only ever appended, and a trace
//! is completed exactly once. The [`TraceStore`] keeps a bounded number of traces in memory, each
//! behind a [`SharedTrace`] handle.

use std::{
    collections::{HashMap, VecDeque},
    net::Ipv4Addr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// What happened to the packet at a hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopAction {
    /// The trace started at the source.
    Start,
    /// The probe packet was sent.
    Send,
    /// A router moved the packet into another subnet.
    Route,
    /// The packet was forwarded to the next node.
    Forward,
    /// The packet was delivered to the destination over a direct link.
    Deliver,
    /// The destination received the packet.
    Receive,
    /// A routing loop was detected.
    Loop,
    /// The packet was dropped.
    Drop,
    /// The hop limit was reached.
    Timeout,
    /// The trace was completed.
    End,
    /// A hop reported by a traceroute.
    Hop,
}

/// One step of the packet through a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    /// Name of the node
    pub node: String,
    /// Unix timestamp in seconds
    pub time: f64,
    /// What happened
    pub action: HopAction,
    /// Human readable description
    pub details: String,
}

/// Lifecycle state of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceState {
    /// Hops are still being recorded.
    InProgress,
    /// The trace is finished; no more hops are recorded.
    Completed,
}

/// Current unix time in seconds.
pub(crate) fn now() -> f64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}

/// The hop log of a simulated packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    id: String,
    source: String,
    destination: String,
    source_ip: Ipv4Addr,
    destination_ip: Ipv4Addr,
    hops: Vec<Hop>,
    state: TraceState,
    success: bool,
    error: Option<String>,
}

impl Trace {
    /// Create a new trace in progress, with a single `start` hop on the source.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
        source_ip: Ipv4Addr,
        destination_ip: Ipv4Addr,
        details: impl Into<String>,
    ) -> Self {
        let source = source.into();
        Self {
            id: id.into(),
            hops: vec![Hop {
                node: source.clone(),
                time: now(),
                action: HopAction::Start,
                details: details.into(),
            }],
            source,
            destination: destination.into(),
            source_ip,
            destination_ip,
            state: TraceState::InProgress,
            success: false,
            error: None,
        }
    }

    /// Append a hop. Returns `false` (and does nothing) if the trace is already completed.
    /// Timestamps never decrease.
    pub fn push_hop(
        &mut self,
        node: impl Into<String>,
        action: HopAction,
        details: impl Into<String>,
    ) -> bool {
        if self.is_completed() {
            return false;
        }
        let last = self.hops.last().map(|h| h.time).unwrap_or(f64::MIN);
        self.hops.push(Hop {
            node: node.into(),
            time: now().max(last),
            action,
            details: details.into(),
        });
        true
    }

    /// Complete the trace and append an `end` hop on the current node. The trace is only
    /// successful if `success` is set, no error is given, and the current node is the
    /// destination. Returns `false` if the trace was already completed, in which case nothing
    /// changes.
    pub fn complete(&mut self, success: bool, error: Option<String>) -> bool {
        if self.is_completed() {
            return false;
        }
        let success = success && error.is_none() && self.current_node() == self.destination;
        let details = match (&error, success) {
            (Some(e), _) => format!("Trace failed: {}", e),
            (None, true) => format!("Trace completed: {} reached", self.destination),
            (None, false) => format!("Trace completed without reaching {}", self.destination),
        };
        let node = self.current_node().to_string();
        self.push_hop(node, HopAction::End, details);
        self.state = TraceState::Completed;
        self.success = success;
        self.error = error;
        true
    }

    /// Id of the trace
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the source node
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Name of the destination node
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Address of the source
    pub fn source_ip(&self) -> Ipv4Addr {
        self.source_ip
    }

    /// Address of the destination
    pub fn destination_ip(&self) -> Ipv4Addr {
        self.destination_ip
    }

    /// All hops, in order
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Lifecycle state
    pub fn state(&self) -> TraceState {
        self.state
    }

    /// Whether the trace is completed
    pub fn is_completed(&self) -> bool {
        self.state == TraceState::Completed
    }

    /// Whether the packet reached its destination. Always `false` while in progress.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Error message of a failed trace
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The node of the last hop.
    pub fn current_node(&self) -> &str {
        self.hops
            .last()
            .map(|h| h.node.as_str())
            .unwrap_or(&self.source)
    }

    /// Time between the `start` hop and the first `receive` hop in milliseconds.
    pub fn rtt_ms(&self) -> Option<f64> {
        let start = self.hops.iter().find(|h| h.action == HopAction::Start)?;
        let recv = self.hops.iter().find(|h| h.action == HopAction::Receive)?;
        Some((recv.time - start.time) * 1000.0)
    }

    /// Serializable snapshot of the trace.
    pub fn report(&self) -> TraceReport {
        TraceReport {
            id: self.id.clone(),
            source_node: self.source.clone(),
            destination_node: self.destination.clone(),
            state: self.state,
            current_node: self.current_node().to_string(),
            source_ip: self.source_ip,
            destination_ip: self.destination_ip,
            hops: self.hops.clone(),
            completed: self.is_completed(),
            success: self.success,
            error: self.error.clone(),
        }
    }
}

/// Serialized form of a [`Trace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    /// Id of the trace
    pub id: String,
    /// Source node
    pub source_node: String,
    /// Destination node
    pub destination_node: String,
    /// Lifecycle state
    pub state: TraceState,
    /// Node of the last hop
    pub current_node: String,
    /// Source address
    pub source_ip: Ipv4Addr,
    /// Destination address
    pub destination_ip: Ipv4Addr,
    /// All hops
    pub hops: Vec<Hop>,
    /// Whether the trace is completed
    pub completed: bool,
    /// Whether the destination was reached
    pub success: bool,
    /// Error message
    pub error: Option<String>,
}

/// A trace shared between the forwarding loop that writes it and the [`TraceStore`].
pub type SharedTrace = Arc<Mutex<Trace>>;

/// Lock a shared trace. A poisoned lock is recovered, since every update of a trace leaves it
/// consistent.
pub fn lock(trace: &SharedTrace) -> MutexGuard<'_, Trace> {
    trace.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded in-memory table of traces.
///
/// Traces in progress are never evicted or replaced. When full, inserting evicts the oldest
/// completed trace; if every trace is still in progress, the store grows beyond its capacity
/// until some of them complete. Inserting a trace with the id of a completed one replaces it.
#[derive(Debug, Clone)]
pub struct TraceStore {
    capacity: usize,
    traces: HashMap<String, SharedTrace>,
    order: VecDeque<String>,
}

impl TraceStore {
    /// Create a store holding at most `capacity` traces (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            traces: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn is_in_progress(&self, id: &str) -> bool {
        self.traces
            .get(id)
            .map(|t| !lock(t).is_completed())
            .unwrap_or(false)
    }

    /// Insert a trace and return the handle through which it is written. Returns `Err` with the
    /// trace if another trace with the same id is still in progress.
    pub fn insert(&mut self, trace: Trace) -> Result<SharedTrace, Trace> {
        let id = trace.id().to_string();
        if self.is_in_progress(&id) {
            return Err(trace);
        }
        self.remove(&id);
        while self.traces.len() >= self.capacity {
            let victim = self
                .order
                .iter()
                .find(|x| !self.is_in_progress(x))
                .cloned();
            match victim {
                Some(victim) => {
                    self.remove(&victim);
                }
                None => {
                    debug!(
                        "All {} stored traces are in progress, grow the trace store",
                        self.traces.len()
                    );
                    break;
                }
            }
        }
        let handle = Arc::new(Mutex::new(trace));
        self.order.push_back(id.clone());
        self.traces.insert(id, handle.clone());
        Ok(handle)
    }

    /// Remove a trace.
    pub fn remove(&mut self, id: &str) -> Option<SharedTrace> {
        self.order.retain(|x| x != id);
        self.traces.remove(id)
    }

    /// Snapshot of a trace.
    pub fn get(&self, id: &str) -> Option<Trace> {
        self.traces.get(id).map(|t| lock(t).clone())
    }

    /// Handle of a trace.
    pub fn handle(&self, id: &str) -> Option<SharedTrace> {
        self.traces.get(id).cloned()
    }

    /// Ids of all traces, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of stored traces
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Maximum number of traces, unless all of them are in progress
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
