// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast discovery of the modem.
//!
//! Peer Discovery goes to the well-known group; the modem answers unicast
//! with a Peer Offer naming its session connection points. Retries run
//! forever on a fixed cadence until a usable offer arrives.

use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::time::Duration;

use crate::config::{self, DISCOVERY_RECV_SIZE, DLEP_PORT};
use crate::protocol::build;
use crate::protocol::check::check_peer_offer_signal;
use crate::protocol::items::ConnectionPoint;
use crate::transport::Datagram;
use crate::wire::{format_address, Clock};

/// Outcome of discovery: where to open the session.
#[derive(Debug, Clone)]
pub struct DiscoveredPeer {
    pub address: SocketAddr,
    /// The modem's Peer Type text, when the offer carried one.
    pub peer_type: Option<String>,
}

/// Run discovery until a valid, accepted Peer Offer yields a session
/// address of the requested family.
///
/// `scope_id` is the configured interface's index, completed into
/// link-local IPv6 connection points.
pub fn discover<D: Datagram, C: Clock>(
    socket: &mut D,
    group: SocketAddr,
    use_ipv6: bool,
    scope_id: u32,
    clock: &C,
) -> io::Result<DiscoveredPeer> {
    let retry_ms = config::discovery_retry().as_millis() as u64;
    let probe = build::build_peer_discovery();
    let mut buf = [0u8; DISCOVERY_RECV_SIZE];

    loop {
        log::info!(
            "[discovery] sending Peer Discovery to {}",
            format_address(&group)
        );
        socket.send_to(&probe, group)?;

        // Wait out one retry window, handling whatever arrives in it
        let window_start = clock.now();
        loop {
            let waited = clock.now().millis_since(window_start);
            if waited >= retry_ms {
                break;
            }

            let timeout = Duration::from_millis(retry_ms - waited);
            let Some((received, from)) = socket.recv_with_timeout(&mut buf, timeout)? else {
                continue;
            };
            log::debug!(
                "[discovery] possible Peer Offer ({} bytes) from {}",
                received,
                format_address(&from)
            );

            let offer = match check_peer_offer_signal(&buf[..received]) {
                Ok(offer) => offer,
                Err(violation) => {
                    log::warn!(
                        "[discovery] discarding invalid Peer Offer from {}: {}",
                        format_address(&from),
                        violation
                    );
                    continue;
                }
            };

            if !offer.accepted() {
                log::info!(
                    "[discovery] modem at {} declined: {}",
                    format_address(&from),
                    offer.status.map(|s| s.to_string()).unwrap_or_default()
                );
                continue;
            }

            let Some(address) = select_connection_point(&offer.connection_points, use_ipv6, scope_id)
            else {
                log::warn!(
                    "[discovery] Peer Offer from {} has no connection point for the configured address family",
                    format_address(&from)
                );
                continue;
            };

            match offer.peer_type {
                Some(peer_type) => log::info!(
                    "[discovery] modem \"{}\" offers session at {}",
                    peer_type,
                    format_address(&address)
                ),
                None => log::info!(
                    "[discovery] modem offers session at {}",
                    format_address(&address)
                ),
            }

            return Ok(DiscoveredPeer {
                address,
                peer_type: offer.peer_type.map(str::to_owned),
            });
        }
    }
}

/// Pick the first connection point of the requested family. The port
/// defaults to the well-known DLEP port; link-local IPv6 targets get the
/// configured interface's scope id.
fn select_connection_point(
    points: &[ConnectionPoint],
    use_ipv6: bool,
    scope_id: u32,
) -> Option<SocketAddr> {
    for point in points {
        let port = point.port.unwrap_or(DLEP_PORT);
        if point.tls {
            log::warn!(
                "[discovery] connection point {} requires TLS, which this transport does not establish",
                point.addr
            );
        }
        match point.addr {
            IpAddr::V4(v4) if !use_ipv6 => {
                return Some(SocketAddr::new(IpAddr::V4(v4), port));
            }
            IpAddr::V6(v6) if use_ipv6 => {
                let scope = if is_link_local(&v6) { scope_id } else { 0 };
                return Some(SocketAddr::V6(SocketAddrV6::new(v6, port, 0, scope)));
            }
            _ => continue,
        }
    }
    None
}

/// fe80::/10, the link-local unicast block.
pub(crate) fn is_link_local(addr: &Ipv6Addr) -> bool {
    addr.segments()[0] & 0xFFC0 == 0xFE80
}
