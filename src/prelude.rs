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

//! Convenience re-export of common members.

pub use crate::backend::EmulationBackend;
pub use crate::config::{SimConfig, TracerouteMode};
pub use crate::network::Network;
pub use crate::session::NetworkSession;
pub use crate::topology::{RouteRecord, TopologyRecord};
pub use crate::trace::{Hop, HopAction, Trace, TraceState};
pub use crate::tracer::{PacketTracer, PingReport};
pub use crate::types::{BackendError, NodeId, NodeKind, SimError, TopologyError};
pub use crate::validator::{validate_topology, ValidationReport};
pub use probe_craft::{ProbeConfig, Protocol};
