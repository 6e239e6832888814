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

//! # Network session
//!
//! A [`NetworkSession`] is the handle to the one live network and its persisted record. Traces
//! and validation passes are readers; structural changes take the write lock, so they never
//! interleave with an in-flight trace.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::*;

use crate::{
    backend::EmulationBackend,
    network::Network,
    resolve::TopologyView,
    topology::{LinkRecord, RouteRecord, TopologyRecord},
    types::{parse_addr, TopologyError, DEFAULT_PREFIX_LEN},
};

/// The shared state behind a [`NetworkSession`].
#[derive(Debug)]
pub struct SessionState<B = Network> {
    /// The live network
    pub backend: B,
    /// The persisted topology the network was built from
    pub record: TopologyRecord,
}

impl<B: EmulationBackend> SessionState<B> {
    /// Read-only view used by the resolver, the engine and the validator.
    pub fn view(&self) -> TopologyView<'_> {
        TopologyView::new(&self.backend, &self.record)
    }

    /// Append a static route to the routing table of a router.
    pub fn add_route(&mut self, router: &str, route: RouteRecord) -> Result<(), TopologyError> {
        if parse_addr(&route.network, DEFAULT_PREFIX_LEN).is_none() {
            return Err(TopologyError::InvalidAddress(route.network));
        }
        let r = self
            .record
            .router_mut(router)
            .ok_or_else(|| TopologyError::NodeNotFound(router.to_string()))?;
        debug!("Add route to {} on {}", route.network, router);
        r.routes.push(route);
        Ok(())
    }
}

/// Handle to the live network, shared between all operations.
#[derive(Debug)]
pub struct NetworkSession<B = Network> {
    state: Arc<RwLock<SessionState<B>>>,
}

impl<B> Clone for NetworkSession<B> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<B: EmulationBackend> NetworkSession<B> {
    /// Create a new session.
    pub fn new(backend: B, record: TopologyRecord) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState { backend, record })),
        }
    }

    /// Acquire the shared read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, SessionState<B>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire the exclusive write lock for structural changes.
    pub fn write(&self) -> RwLockWriteGuard<'_, SessionState<B>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NetworkSession<Network> {
    /// Build and start a network from the record, and wrap it in a session.
    pub fn from_record(record: TopologyRecord) -> Result<Self, TopologyError> {
        let net = Network::from_record(&record)?;
        Ok(Self::new(net, record))
    }

    /// Replace the topology. The new network is built before the old one is dropped, so the
    /// session is unchanged if the record is invalid. Waits for all running traces.
    pub fn reload(&self, record: TopologyRecord) -> Result<(), TopologyError> {
        let net = Network::from_record(&record)?;
        let mut state = self.write();
        state.backend = net;
        state.record = record;
        info!("Reloaded topology with {} links", state.record.links.len());
        Ok(())
    }

    /// Add a link to both the live network and the record.
    pub fn add_link(&self, a: &str, b: &str) -> Result<(), TopologyError> {
        let mut state = self.write();
        let id_a = state.backend.get_node_id(a)?;
        let id_b = state.backend.get_node_id(b)?;
        state.backend.add_link(id_a, id_b)?;
        state.record.links.push(LinkRecord {
            node1: a.to_string(),
            node2: b.to_string(),
        });
        Ok(())
    }
}
