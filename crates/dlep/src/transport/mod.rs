// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket wrappers behind small traits.
//!
//! The session engine never names a concrete socket type: discovery runs
//! over a [`Datagram`], the session over a [`Stream`]. The production
//! implementations live in `udp` and `tcp`; the test-suite substitutes
//! scripted ones.

pub mod tcp;
pub mod udp;

pub use tcp::SessionStream;
pub use udp::DiscoverySocket;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Datagram socket for the discovery exchange.
pub trait Datagram {
    /// Send one datagram to `target`.
    fn send_to(&mut self, frame: &[u8], target: SocketAddr) -> io::Result<()>;

    /// Wait up to `timeout` for a datagram.
    ///
    /// `Ok(None)` means the timeout passed quietly; errors are real socket
    /// failures.
    fn recv_with_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<(usize, SocketAddr)>>;
}

/// Byte stream carrying the session.
pub trait Stream {
    /// Send the whole frame.
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Wait up to `timeout` for bytes.
    ///
    /// `Ok(None)` means the timeout passed quietly, `Ok(Some(0))` an orderly
    /// close by the peer, `Ok(Some(n))` that `n` bytes landed in `buf`.
    fn recv_with_timeout(&mut self, buf: &mut [u8], timeout: Duration)
        -> io::Result<Option<usize>>;
}

/// Scope id (interface index) for an interface name.
///
/// Needed to complete link-local IPv6 addresses; on Linux the index is read
/// from sysfs, which avoids an FFI dependency for one lookup.
#[cfg(target_os = "linux")]
pub fn interface_scope_id(name: &str) -> io::Result<u32> {
    let path = format!("/sys/class/net/{}/ifindex", name);
    let content = std::fs::read_to_string(path)?;
    content.trim().parse::<u32>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unparseable ifindex for interface {}", name),
        )
    })
}

/// Scope id lookup is only wired up for Linux; elsewhere the caller falls
/// back to an unscoped address.
#[cfg(not(target_os = "linux"))]
pub fn interface_scope_id(name: &str) -> io::Result<u32> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("no scope id lookup for interface {} on this platform", name),
    ))
}

/// Sub-millisecond timeouts round up: `set_read_timeout` rejects zero.
pub(crate) fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

/// True when the error kind signals a quiet read timeout.
///
/// Linux reports `WouldBlock`, other platforms `TimedOut`; both mean "no
/// data yet", never a broken socket.
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
