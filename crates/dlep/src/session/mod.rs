// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session lifecycle: discovery, the in-session engine and the destination
//! table.
//!
//! [`run_session`] is the whole story for one session attempt:
//!
//! ```text
//! Discovering -> Initialising -> InSession -> Terminating -> Closed
//! ```
//!
//! The front-end loops over [`SessionOutcome::Retryable`]; `Fatal` ends the
//! process, `Graceful` is a clean operator-visible shutdown.

mod destinations;
mod discovery;
mod engine;

pub use destinations::{AddressSet, Destination, DestinationTable};
pub use discovery::{discover, DiscoveredPeer};
pub use engine::Engine;

use std::net::SocketAddr;

use crate::config::{self, SessionConfig};
use crate::transport::{self, DiscoverySocket, SessionStream};
use crate::wire::MonotonicClock;

/// How one session attempt ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The session closed cleanly (modem-initiated termination).
    Graceful,
    /// The modem went away; discovery is worth another round.
    Retryable(String),
    /// Local misconfiguration or an unrecoverable protocol violation.
    Fatal(String),
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graceful => f.write_str("session closed gracefully"),
            Self::Retryable(reason) => write!(f, "session lost: {}", reason),
            Self::Fatal(reason) => write!(f, "session failed: {}", reason),
        }
    }
}

/// Run one complete session attempt against the configured or discovered
/// modem.
pub fn run_session(cfg: &SessionConfig) -> SessionOutcome {
    let clock = MonotonicClock::new();

    let peer = match cfg.target {
        Some(target) => DiscoveredPeer {
            address: scoped_target(target, cfg.interface.as_deref()),
            peer_type: None,
        },
        None => {
            // The discovery socket lives exactly as long as this state
            let mut socket = match DiscoverySocket::open(cfg.use_ipv6, cfg.interface.as_deref()) {
                Ok(socket) => socket,
                Err(e) => {
                    return SessionOutcome::Fatal(format!(
                        "cannot open the discovery socket: {}",
                        e
                    ))
                }
            };
            let scope_id = socket.scope_id();
            let group = config::discovery_group(cfg.use_ipv6, scope_id);
            match discover(&mut socket, group, cfg.use_ipv6, scope_id, &clock) {
                Ok(peer) => peer,
                Err(e) => return SessionOutcome::Fatal(format!("discovery failed: {}", e)),
            }
        }
    };

    log::info!(
        "[session] connecting to modem at {}",
        crate::wire::format_address(&peer.address)
    );
    let stream = match SessionStream::connect(peer.address) {
        Ok(stream) => stream,
        Err(e) => {
            return SessionOutcome::Retryable(format!(
                "cannot connect to {}: {}",
                crate::wire::format_address(&peer.address),
                e
            ))
        }
    };

    Engine::new(stream, &clock, cfg.router_heartbeat_ms).run()
}

/// Complete an operator-supplied link-local IPv6 target with the scope id
/// of the configured interface.
fn scoped_target(target: SocketAddr, iface: Option<&str>) -> SocketAddr {
    let SocketAddr::V6(mut v6) = target else {
        return target;
    };
    if v6.scope_id() != 0 || !discovery::is_link_local(v6.ip()) {
        return SocketAddr::V6(v6);
    }
    match iface.map(transport::interface_scope_id) {
        Some(Ok(scope)) => {
            v6.set_scope_id(scope);
        }
        Some(Err(e)) => {
            log::warn!("[session] cannot resolve the interface scope id: {}", e);
        }
        None => {
            log::warn!(
                "[session] link-local modem address without --interface; the connect will likely fail"
            );
        }
    }
    SocketAddr::V6(v6)
}
