// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DLEP Global Configuration - Single Source of Truth
//!
//! This module centralizes the RFC 8175 transport constants and the runtime
//! session configuration. **NEVER hardcode elsewhere!**
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (registry values, ports,
//!   multicast groups, timing defaults)
//! - **Level 2 (Dynamic)**: [`SessionConfig`] built by the front-end, plus a
//!   couple of environment overrides for testing and debugging

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::time::Duration;

// =======================================================================
// RFC 8175 transport registry (Section 15)
// =======================================================================

/// Well-known IPv4 multicast group for modem discovery (224.0.0.117).
pub const MULTICAST_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 117);

/// Well-known IPv6 multicast group for modem discovery (FF02::1:7).
pub const MULTICAST_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xFF02, 0, 0, 0, 0, 0, 0x0001, 0x0007);

/// Well-known DLEP TCP and UDP port.
///
/// Used both as the discovery destination port and as the default session
/// port when a Peer Offer connection point omits the port field.
pub const DLEP_PORT: u16 = 854;

// =======================================================================
// Timing defaults
// =======================================================================

/// Delay between Peer Discovery signals while no valid offer has arrived.
pub const DISCOVERY_RETRY: Duration = Duration::from_secs(3);

/// Default router Heartbeat Interval in milliseconds.
pub const DEFAULT_HEARTBEAT_MS: u32 = 30_000;

/// Missed intervals before the modem is declared lost.
pub const PEER_LOSS_INTERVALS: u64 = 2;

/// Modem-interval multiple bounding the Session Termination drain.
pub const TERM_DRAIN_INTERVALS: u64 = 4;

/// Router-interval multiple bounding the wait for Session Initialization
/// Response.
pub const INIT_RESP_INTERVALS: u64 = 2;

// =======================================================================
// Frame limits
// =======================================================================

/// Upper bound on an assembled session frame: 4-byte header plus the largest
/// payload a u16 length field can declare.
pub const MAX_FRAME_SIZE: usize = 4 + u16::MAX as usize;

/// Receive buffer for discovery datagrams; a Peer Offer fits in one MTU.
pub const DISCOVERY_RECV_SIZE: usize = 1500;

/// Peer Type text this router advertises.
pub const ROUTER_PEER_TYPE: &str = "dlep-router";

// =======================================================================
// Runtime configuration
// =======================================================================

/// Inputs for one session attempt, assembled by the front-end.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Modem session address supplied by the operator; `None` means run
    /// multicast discovery first.
    pub target: Option<SocketAddr>,
    /// Discover and connect over IPv6 instead of IPv4.
    pub use_ipv6: bool,
    /// Interface carrying the radio link; required for IPv6 link-local
    /// modems (supplies the scope id).
    pub interface: Option<String>,
    /// Router Heartbeat Interval in milliseconds.
    pub router_heartbeat_ms: u32,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            target: None,
            use_ipv6: false,
            interface: None,
            router_heartbeat_ms: DEFAULT_HEARTBEAT_MS,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Discovery retry delay, honoring the `DLEP_DISCOVERY_RETRY` override
/// (seconds, for tests/debugging).
pub fn discovery_retry() -> Duration {
    if let Ok(var) = std::env::var("DLEP_DISCOVERY_RETRY") {
        if let Ok(secs) = var.parse::<u64>() {
            if secs > 0 {
                return Duration::from_secs(secs);
            }
        }
        log::debug!("[config] invalid DLEP_DISCOVERY_RETRY='{}', using default", var);
    }
    DISCOVERY_RETRY
}

/// IPv4 interface address override for multicast sends (`DLEP_MULTICAST_IF`).
pub fn multicast_if_override() -> Option<Ipv4Addr> {
    let var = std::env::var("DLEP_MULTICAST_IF").ok()?;
    match var.parse::<Ipv4Addr>() {
        Ok(addr) => {
            log::debug!("[config] using DLEP_MULTICAST_IF override: {}", addr);
            Some(addr)
        }
        Err(_) => {
            log::debug!("[config] invalid DLEP_MULTICAST_IF='{}', ignoring", var);
            None
        }
    }
}

/// The discovery destination for the chosen address family.
///
/// The IPv6 group is link-scoped, so the scope id of the outgoing interface
/// is part of the destination.
pub fn discovery_group(use_ipv6: bool, scope_id: u32) -> SocketAddr {
    if use_ipv6 {
        SocketAddr::V6(SocketAddrV6::new(MULTICAST_GROUP_V6, DLEP_PORT, 0, scope_id))
    } else {
        SocketAddr::new(IpAddr::V4(MULTICAST_GROUP_V4), DLEP_PORT)
    }
}
