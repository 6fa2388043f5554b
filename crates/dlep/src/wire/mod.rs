// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte-level primitives for the DLEP wire format.
//!
//! Everything on the wire is big-endian and unaligned. The accessors here
//! work byte-at-a-time instead of casting through integer pointers, so they
//! are safe on architectures that fault on unaligned loads.

mod cursor;
mod time;

pub use cursor::{Cursor, CursorMut, WireError, WireResult};
pub use time::{interval_elapsed, Clock, ManualClock, MonotonicClock, Timestamp};

use std::net::SocketAddr;

/// Read a big-endian u16 from the first two bytes of `p`.
///
/// Callers guarantee `p.len() >= 2`; the slice indexing enforces it.
#[inline]
pub fn read_u16(p: &[u8]) -> u16 {
    (u16::from(p[0]) << 8) | u16::from(p[1])
}

/// Read a big-endian u32 from the first four bytes of `p`.
#[inline]
pub fn read_u32(p: &[u8]) -> u32 {
    let mut v = u32::from(p[0]);
    v = (v << 8) | u32::from(p[1]);
    v = (v << 8) | u32::from(p[2]);
    v = (v << 8) | u32::from(p[3]);
    v
}

/// Read a big-endian u64 from the first eight bytes of `p`.
#[inline]
pub fn read_u64(p: &[u8]) -> u64 {
    let mut v = 0u64;
    for &b in &p[..8] {
        v = (v << 8) | u64::from(b);
    }
    v
}

/// Write `v` as big-endian into the first two bytes of `p`.
#[inline]
pub fn write_u16(v: u16, p: &mut [u8]) {
    p[0] = (v >> 8) as u8;
    p[1] = (v & 0xFF) as u8;
}

/// Write `v` as big-endian into the first four bytes of `p`.
#[inline]
pub fn write_u32(v: u32, p: &mut [u8]) {
    p[0] = (v >> 24) as u8;
    p[1] = (v >> 16) as u8;
    p[2] = (v >> 8) as u8;
    p[3] = (v & 0xFF) as u8;
}

/// Write `v` as big-endian into the first eight bytes of `p`.
#[inline]
pub fn write_u64(v: u64, p: &mut [u8]) {
    for (i, b) in p.iter_mut().take(8).enumerate() {
        *b = (v >> (56 - 8 * i)) as u8;
    }
}

/// Format a socket address as `ipv4:port` or `{ipv6}:port`.
///
/// The braced IPv6 form matches the rest of the project's log output; the
/// std `Display` impl would use brackets only when a port is present.
pub fn format_address(sa: &SocketAddr) -> String {
    match sa {
        SocketAddr::V4(v4) => format!("{}:{}", v4.ip(), v4.port()),
        SocketAddr::V6(v6) => format!("{{{}}}:{}", v6.ip(), v6.port()),
    }
}

/// Format a 6-octet MAC address as lower-case `aa:bb:cc:dd:ee:ff`.
pub fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}
