// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP socket for the multicast discovery exchange.
//!
//! The socket binds an ephemeral local port, enables multicast loopback so
//! router and modem can share a machine during bring-up, and pins the
//! outgoing multicast interface when one can be determined. Peer Offers
//! come back unicast to the bound port, so no group membership is needed.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use super::{clamp_timeout, interface_scope_id, is_timeout, Datagram};
use crate::config;

/// Discovery-phase datagram socket. Scoped to the Discovering state; drops
/// close it.
pub struct DiscoverySocket {
    socket: UdpSocket,
    scope_id: u32,
}

impl DiscoverySocket {
    /// Open and configure the discovery socket for the chosen family.
    ///
    /// For IPv6 the scope id of `iface` is resolved here and also used as
    /// the outgoing multicast interface; without an interface the kernel
    /// picks, which only works on single-homed hosts.
    pub fn open(use_ipv6: bool, iface: Option<&str>) -> io::Result<Self> {
        if use_ipv6 {
            Self::open_v6(iface)
        } else {
            Self::open_v4(iface)
        }
    }

    fn open_v4(iface: Option<&str>) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0).into())?;

        // Loopback on, so a modem process on the same machine hears us
        socket.set_multicast_loop_v4(true)?;
        let _ = socket.set_multicast_ttl_v4(1);

        match pick_v4_interface(iface) {
            Some(addr) => {
                socket.set_multicast_if_v4(&addr)?;
                log::debug!("[discovery] multicast interface {}", addr);
            }
            None => {
                log::debug!("[discovery] no multicast interface pinned, kernel default");
            }
        }

        Ok(Self {
            socket: socket.into(),
            scope_id: 0,
        })
    }

    fn open_v6(iface: Option<&str>) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_only_v6(true)?;
        socket.bind(&SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0).into())?;

        socket.set_multicast_loop_v6(true)?;

        let scope_id = match iface {
            Some(name) => match interface_scope_id(name) {
                Ok(index) => {
                    socket.set_multicast_if_v6(index)?;
                    log::debug!("[discovery] interface {} has scope id {}", name, index);
                    index
                }
                Err(e) => {
                    log::warn!(
                        "[discovery] cannot resolve scope id for interface {}: {}",
                        name,
                        e
                    );
                    0
                }
            },
            None => {
                log::warn!(
                    "[discovery] no interface configured; IPv6 discovery needs one on multi-homed hosts"
                );
                0
            }
        };

        Ok(Self {
            socket: socket.into(),
            scope_id,
        })
    }

    /// Scope id resolved from the configured interface (0 when unknown).
    pub fn scope_id(&self) -> u32 {
        self.scope_id
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Datagram for DiscoverySocket {
    fn send_to(&mut self, frame: &[u8], target: SocketAddr) -> io::Result<()> {
        let sent = self.socket.send_to(frame, target)?;
        if sent != frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "datagram truncated on send",
            ));
        }
        Ok(())
    }

    fn recv_with_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<(usize, SocketAddr)>> {
        self.socket.set_read_timeout(Some(clamp_timeout(timeout)))?;
        match self.socket.recv_from(buf) {
            Ok((n, from)) => Ok(Some((n, from))),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// IPv4 interface address to send multicast from.
///
/// Priority: `DLEP_MULTICAST_IF` override, then the address of the named
/// interface, then the first non-loopback interface.
fn pick_v4_interface(iface: Option<&str>) -> Option<Ipv4Addr> {
    if let Some(addr) = config::multicast_if_override() {
        return Some(addr);
    }

    let netifas = match local_ip_address::list_afinet_netifas() {
        Ok(list) => list,
        Err(e) => {
            log::debug!("[discovery] failed to list interfaces: {}", e);
            return None;
        }
    };

    let mut fallback = None;
    for (name, ip) in netifas {
        let IpAddr::V4(v4) = ip else { continue };
        if v4.is_loopback() {
            continue;
        }
        if Some(name.as_str()) == iface {
            return Some(v4);
        }
        if fallback.is_none() {
            fallback = Some(v4);
        }
    }

    if iface.is_some() && fallback.is_some() {
        log::debug!("[discovery] configured interface not found, using first non-loopback");
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build;

    #[test]
    fn test_open_v4_binds_ephemeral_port() {
        let socket = match DiscoverySocket::open(false, None) {
            Ok(s) => s,
            // Sandboxed test environments may forbid UDP sockets entirely
            Err(_) => return,
        };
        let local = socket.local_addr().unwrap();
        assert!(local.is_ipv4());
        assert_ne!(local.port(), 0);
        assert_eq!(socket.scope_id(), 0);
    }

    #[test]
    fn test_recv_timeout_is_quiet() {
        let mut socket = match DiscoverySocket::open(false, None) {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut buf = [0u8; 64];
        let got = socket
            .recv_with_timeout(&mut buf, Duration::from_millis(5))
            .unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_loopback_send_recv() {
        let mut a = match DiscoverySocket::open(false, None) {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut b = match DiscoverySocket::open(false, None) {
            Ok(s) => s,
            Err(_) => return,
        };

        let frame = build::build_peer_discovery();
        let target = SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            b.local_addr().unwrap().port(),
        );
        if a.send_to(&frame, target).is_err() {
            return;
        }

        let mut buf = [0u8; 256];
        let got = b
            .recv_with_timeout(&mut buf, Duration::from_millis(500))
            .unwrap();
        let (n, _from) = got.expect("datagram should arrive on loopback");
        assert_eq!(&buf[..n], frame.as_slice());
    }
}
