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

#![deny(missing_docs, missing_debug_implementations)]

//! This library crafts the probe packets that `pathsim` originates when simulating a ping, a
//! traceroute or a custom trace. A probe is a complete IPv4 datagram (header and layer-4 segment,
//! with valid checksums), built with `pnet_packet`.
//!
//! ```
//! use probe_craft::{Ipv4ProbeBuilder, ProbeBuilder, ProbeConfig, Protocol};
//!
//! let probe = Ipv4ProbeBuilder
//!     .build_probe(
//!         "10.0.0.1".parse().unwrap(),
//!         "10.0.0.2".parse().unwrap(),
//!         &ProbeConfig::new(Protocol::Udp).with_dport(5353),
//!     )
//!     .unwrap();
//! assert_eq!(probe.destination_port, Some(5353));
//! ```

use std::{fmt, net::Ipv4Addr, str::FromStr};

use pnet_packet::{
    icmp::{
        echo_request::{IcmpCodes, MutableEchoRequestPacket},
        IcmpTypes,
    },
    ip::{IpNextHeaderProtocol, IpNextHeaderProtocols},
    ipv4::{self, Ipv4Flags, MutableIpv4Packet},
    tcp::{self, MutableTcpPacket, TcpFlags},
    udp::{self, MutableUdpPacket},
    util, Packet,
};
use rand::Rng;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const IPV4_HEADER_LEN: usize = 20;
const ICMP_ECHO_HEADER_LEN: usize = 8;
const TCP_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

/// TTL used when the configuration does not specify one.
pub const DEFAULT_TTL: u8 = 64;
/// Destination port of TCP and HTTP probes if none is configured.
pub const DEFAULT_TCP_PORT: u16 = 80;
/// Destination port of UDP probes if none is configured.
pub const DEFAULT_UDP_PORT: u16 = 53;

/// Layer-4 protocol of a probe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Protocol {
    /// ICMP echo request
    #[default]
    Icmp,
    /// TCP SYN segment
    Tcp,
    /// UDP datagram
    Udp,
    /// HTTP request carried in a TCP segment
    Http,
}

impl Protocol {
    /// Upper-case name, as used in human readable messages.
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Icmp => "ICMP",
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Http => "HTTP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Icmp => "icmp",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Http => "http",
        })
    }
}

impl FromStr for Protocol {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "icmp" => Ok(Protocol::Icmp),
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "http" => Ok(Protocol::Http),
            _ => Err(ProbeError::UnsupportedProtocol(s.to_string())),
        }
    }
}

/// Description of the probe that should be crafted. All fields except the protocol are optional
/// and fall back to sensible defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProbeConfig {
    /// Protocol of the probe.
    pub protocol: Protocol,
    /// Source port (TCP, UDP and HTTP). Random in `1024..=65535` if not set.
    pub sport: Option<u16>,
    /// Destination port (TCP, UDP and HTTP).
    pub dport: Option<u16>,
    /// Payload of UDP probes.
    pub payload: Option<String>,
    /// HTTP method, `GET` if not set.
    pub method: Option<String>,
    /// HTTP path, `/` if not set.
    pub path: Option<String>,
    /// ICMP echo identifier. Random if not set.
    pub identifier: Option<u16>,
    /// ICMP echo sequence number.
    pub seq: Option<u16>,
    /// Time to live of the IPv4 header.
    pub ttl: Option<u8>,
}

impl ProbeConfig {
    /// Create a configuration for the given protocol with all defaults.
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            ..Default::default()
        }
    }

    /// ICMP echo request with the given sequence number.
    pub fn icmp_echo(seq: u16) -> Self {
        Self {
            seq: Some(seq),
            ..Self::new(Protocol::Icmp)
        }
    }

    /// Set the destination port.
    pub fn with_dport(mut self, dport: u16) -> Self {
        self.dport = Some(dport);
        self
    }

    /// Set the source port.
    pub fn with_sport(mut self, sport: u16) -> Self {
        self.sport = Some(sport);
        self
    }

    /// Set the payload of a UDP probe.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// A crafted probe. The bytes contain the entire IPv4 datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// Protocol of the probe
    pub protocol: Protocol,
    /// Source address
    pub source: Ipv4Addr,
    /// Destination address
    pub destination: Ipv4Addr,
    /// Layer-4 source port, if the protocol has ports.
    pub source_port: Option<u16>,
    /// Layer-4 destination port, if the protocol has ports.
    pub destination_port: Option<u16>,
    /// TTL written into the IPv4 header
    pub ttl: u8,
    bytes: Vec<u8>,
}

impl Probe {
    /// Raw bytes of the IPv4 datagram.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the IPv4 datagram in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the probe contains no bytes, which never happens for crafted probes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.source_port, self.destination_port) {
            (Some(sport), Some(dport)) => write!(
                f,
                "{} {}:{} > {}:{} ({} bytes)",
                self.protocol.name(),
                self.source,
                sport,
                self.destination,
                dport,
                self.len()
            ),
            _ => write!(
                f,
                "{} {} > {} ({} bytes)",
                self.protocol.name(),
                self.source,
                self.destination,
                self.len()
            ),
        }
    }
}

/// Errors that can happen while crafting a probe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The buffer cannot hold the header.
    #[error("Buffer is too small to hold the {0} header")]
    BufferTooSmall(&'static str),
    /// The probe would exceed the maximum size of an IPv4 datagram.
    #[error("Probe of {0} bytes exceeds the maximum IPv4 datagram size")]
    TooLarge(usize),
    /// The protocol is not known.
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),
}

/// Something that can craft probe packets. `pathsim` only depends on this trait, such that the
/// packet encoding can be swapped out.
pub trait ProbeBuilder: Send + Sync {
    /// Build a probe from `source` to `destination`.
    fn build_probe(
        &self,
        source: Ipv4Addr,
        destination: Ipv4Addr,
        config: &ProbeConfig,
    ) -> Result<Probe, ProbeError>;
}

/// Default [`ProbeBuilder`] that encodes IPv4 datagrams using `pnet_packet`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ipv4ProbeBuilder;

impl ProbeBuilder for Ipv4ProbeBuilder {
    fn build_probe(
        &self,
        source: Ipv4Addr,
        destination: Ipv4Addr,
        config: &ProbeConfig,
    ) -> Result<Probe, ProbeError> {
        let mut rng = rand::thread_rng();
        let ttl = config.ttl.unwrap_or(DEFAULT_TTL);
        let sport = config.sport.unwrap_or_else(|| rng.gen_range(1024..=65535));

        let (next_protocol, segment, ports) = match config.protocol {
            Protocol::Icmp => {
                let identifier = config.identifier.unwrap_or_else(|| rng.gen());
                let segment = icmp_echo_segment(identifier, config.seq.unwrap_or(1))?;
                (IpNextHeaderProtocols::Icmp, segment, None)
            }
            Protocol::Tcp => {
                let dport = config.dport.unwrap_or(DEFAULT_TCP_PORT);
                let segment = tcp_segment(source, destination, sport, dport, TcpKind::Syn, &[])?;
                (IpNextHeaderProtocols::Tcp, segment, Some((sport, dport)))
            }
            Protocol::Udp => {
                let dport = config.dport.unwrap_or(DEFAULT_UDP_PORT);
                let payload = config.payload.as_deref().unwrap_or_default();
                let segment = udp_segment(source, destination, sport, dport, payload.as_bytes())?;
                (IpNextHeaderProtocols::Udp, segment, Some((sport, dport)))
            }
            Protocol::Http => {
                let dport = config.dport.unwrap_or(DEFAULT_TCP_PORT);
                let request = http_request(config, destination);
                let segment = tcp_segment(
                    source,
                    destination,
                    sport,
                    dport,
                    TcpKind::PushAck,
                    request.as_bytes(),
                )?;
                (IpNextHeaderProtocols::Tcp, segment, Some((sport, dport)))
            }
        };

        let bytes = ipv4_datagram(source, destination, ttl, next_protocol, &segment)?;

        Ok(Probe {
            protocol: config.protocol,
            source,
            destination,
            source_port: ports.map(|(s, _)| s),
            destination_port: ports.map(|(_, d)| d),
            ttl,
            bytes,
        })
    }
}

/// The HTTP request line and headers sent by an HTTP probe.
fn http_request(config: &ProbeConfig, destination: Ipv4Addr) -> String {
    format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\n\r\n",
        config.method.as_deref().unwrap_or("GET"),
        config.path.as_deref().unwrap_or("/"),
        destination
    )
}

fn icmp_echo_segment(identifier: u16, seq: u16) -> Result<Vec<u8>, ProbeError> {
    let mut buf = vec![0u8; ICMP_ECHO_HEADER_LEN];
    {
        let mut packet =
            MutableEchoRequestPacket::new(&mut buf[..]).ok_or(ProbeError::BufferTooSmall("ICMP"))?;
        packet.set_icmp_type(IcmpTypes::EchoRequest);
        packet.set_icmp_code(IcmpCodes::NoCode);
        packet.set_identifier(identifier);
        packet.set_sequence_number(seq);
        // the checksum is the second 16-bit word of the header
        let checksum = util::checksum(packet.packet(), 1);
        packet.set_checksum(checksum);
    }
    Ok(buf)
}

/// Which flags to set on a crafted TCP segment.
#[derive(Debug, Clone, Copy)]
enum TcpKind {
    Syn,
    PushAck,
}

fn tcp_segment(
    source: Ipv4Addr,
    destination: Ipv4Addr,
    sport: u16,
    dport: u16,
    kind: TcpKind,
    payload: &[u8],
) -> Result<Vec<u8>, ProbeError> {
    let mut buf = vec![0u8; TCP_HEADER_LEN + payload.len()];
    {
        let mut packet =
            MutableTcpPacket::new(&mut buf[..]).ok_or(ProbeError::BufferTooSmall("TCP"))?;
        packet.set_source(sport);
        packet.set_destination(dport);
        packet.set_sequence(rand::random());
        packet.set_acknowledgement(0);
        packet.set_data_offset(5);
        match kind {
            TcpKind::Syn => packet.set_flags(TcpFlags::SYN),
            TcpKind::PushAck => packet.set_flags(TcpFlags::PSH | TcpFlags::ACK),
        }
        packet.set_window(64240);
        packet.set_urgent_ptr(0);
        packet.set_payload(payload);
        let checksum = tcp::ipv4_checksum(&packet.to_immutable(), &source, &destination);
        packet.set_checksum(checksum);
    }
    Ok(buf)
}

fn udp_segment(
    source: Ipv4Addr,
    destination: Ipv4Addr,
    sport: u16,
    dport: u16,
    payload: &[u8],
) -> Result<Vec<u8>, ProbeError> {
    let len = UDP_HEADER_LEN + payload.len();
    if len > u16::MAX as usize {
        return Err(ProbeError::TooLarge(len));
    }
    let mut buf = vec![0u8; len];
    {
        let mut packet =
            MutableUdpPacket::new(&mut buf[..]).ok_or(ProbeError::BufferTooSmall("UDP"))?;
        packet.set_source(sport);
        packet.set_destination(dport);
        packet.set_length(len as u16);
        packet.set_payload(payload);
        let checksum = udp::ipv4_checksum(&packet.to_immutable(), &source, &destination);
        packet.set_checksum(checksum);
    }
    Ok(buf)
}

fn ipv4_datagram(
    source: Ipv4Addr,
    destination: Ipv4Addr,
    ttl: u8,
    next_protocol: IpNextHeaderProtocol,
    segment: &[u8],
) -> Result<Vec<u8>, ProbeError> {
    let total = IPV4_HEADER_LEN + segment.len();
    if total > u16::MAX as usize {
        return Err(ProbeError::TooLarge(total));
    }
    let mut buf = vec![0u8; total];
    {
        let mut packet =
            MutableIpv4Packet::new(&mut buf[..]).ok_or(ProbeError::BufferTooSmall("IPv4"))?;
        packet.set_version(4);
        packet.set_header_length(5);
        packet.set_total_length(total as u16);
        packet.set_identification(rand::random());
        packet.set_flags(Ipv4Flags::DontFragment);
        packet.set_fragment_offset(0);
        packet.set_ttl(ttl);
        packet.set_next_level_protocol(next_protocol);
        packet.set_source(source);
        packet.set_destination(destination);
        packet.set_payload(segment);
        let checksum = ipv4::checksum(&packet.to_immutable());
        packet.set_checksum(checksum);
    }
    Ok(buf)
}
