// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed data-item payloads and per-item checkers.
//!
//! Each checker enforces the item's length, value-range and flag rules and
//! returns the decoded payload. Offending payloads come back as a
//! [`Violation`] carrying `Invalid Data` and a static detail string naming
//! the first rule broken.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::check::Violation;
use super::ids::{DataItemCode, StatusCode};
use crate::wire;

/// Connection point flag bit 0: the modem requires TLS on the session.
pub const CONNECTION_POINT_FLAG_TLS: u8 = 0x01;

/// Peer Type flag bit 0: the radio link is a secured medium.
pub const PEER_TYPE_FLAG_SECURED: u8 = 0x01;

/// Address / attached-subnet flag bit 0: set = add, clear = drop.
pub const ADDRESS_FLAG_ADD: u8 = 0x01;

/// A 6-octet link-layer destination identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> &[u8; 6] {
        &self.0
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&wire::format_mac(&self.0))
    }
}

/// An address (and optional port) at which the modem accepts the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPoint {
    pub addr: IpAddr,
    /// Absent means the well-known DLEP port.
    pub port: Option<u16>,
    pub tls: bool,
}

/// Add/drop indicator on repeatable address items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressOp {
    Add,
    Drop,
}

/// Which address operations a message context permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPolicy {
    /// Announcements (Session Init Response, Destination Up): Drop is a
    /// protocol error.
    AddOnly,
    /// Mutations (Session Update, Destination Update): both are legal.
    AddOrDrop,
}

/// Decoded IPv4/IPv6 Address item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressItem {
    pub op: AddressOp,
    pub addr: IpAddr,
}

/// Decoded IPv4/IPv6 Attached Subnet item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetItem {
    pub op: AddressOp,
    pub addr: IpAddr,
    pub prefix: u8,
}

/// Decoded Peer Type item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerType<'a> {
    pub secured: bool,
    pub text: &'a str,
}

/// The link metrics a single frame may carry. Fields stay `None` when the
/// corresponding item was absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricSet {
    pub mdrr: Option<u64>,
    pub mdrt: Option<u64>,
    pub cdrr: Option<u64>,
    pub cdrt: Option<u64>,
    pub latency: Option<u64>,
    pub resources: Option<u8>,
    pub rlqr: Option<u8>,
    pub rlqt: Option<u8>,
    pub mtu: Option<u16>,
}

impl MetricSet {
    /// Overwrite the fields `update` carries, leaving the rest untouched.
    pub fn merge(&mut self, update: &MetricSet) {
        macro_rules! take {
            ($field:ident) => {
                if update.$field.is_some() {
                    self.$field = update.$field;
                }
            };
        }
        take!(mdrr);
        take!(mdrt);
        take!(cdrr);
        take!(cdrt);
        take!(latency);
        take!(resources);
        take!(rlqr);
        take!(rlqt);
        take!(mtu);
    }

    pub fn is_empty(&self) -> bool {
        *self == MetricSet::default()
    }
}

impl std::fmt::Display for MetricSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        macro_rules! field {
            ($name:literal, $field:ident) => {
                if let Some(v) = self.$field {
                    write!(f, "{}{}={}", sep, $name, v)?;
                    sep = " ";
                }
            };
        }
        field!("mdrr", mdrr);
        field!("mdrt", mdrt);
        field!("cdrr", cdrr);
        field!("cdrt", cdrt);
        field!("latency_us", latency);
        field!("resources", resources);
        field!("rlqr", rlqr);
        field!("rlqt", rlqt);
        field!("mtu", mtu);
        if sep.is_empty() {
            f.write_str("(none)")?;
        }
        Ok(())
    }
}

/// Stack-local duplicate tracker for unique items within one frame.
///
/// Data item codes fit in the low bits of a u32, so the set is a bitmask.
/// Repeatable items (`DataItemCode::is_repeatable`) must not be inserted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeenItems(u32);

impl SeenItems {
    pub fn new() -> Self {
        Self(0)
    }

    /// Record the item; returns false if it was already present.
    pub fn insert(&mut self, code: DataItemCode) -> bool {
        let bit = 1u32 << code.code();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    pub fn contains(&self, code: DataItemCode) -> bool {
        self.0 & (1u32 << code.code()) != 0
    }
}

// =======================================================================
// Per-item checkers
// =======================================================================

/// Status: 1-byte code from the known set, optionally followed by UTF-8
/// text.
pub fn parse_status(payload: &[u8]) -> Result<(StatusCode, Option<&str>), Violation> {
    if payload.is_empty() {
        return Err(Violation::invalid_data("Status item is empty"));
    }
    let code = StatusCode::from_u8(payload[0])
        .ok_or_else(|| Violation::invalid_data("Status item carries an unknown status code"))?;
    let text = if payload.len() > 1 {
        let text = std::str::from_utf8(&payload[1..])
            .map_err(|_| Violation::invalid_data("Status item text is not valid UTF-8"))?;
        Some(text)
    } else {
        None
    };
    Ok((code, text))
}

/// IPv4/IPv6 Connection Point: flags + address + optional port.
pub fn parse_connection_point(
    code: DataItemCode,
    payload: &[u8],
) -> Result<ConnectionPoint, Violation> {
    let addr_len = match code {
        DataItemCode::Ipv4ConnectionPoint => 4,
        DataItemCode::Ipv6ConnectionPoint => 16,
        _ => unreachable!("caller dispatches on the connection point codes"),
    };

    let with_port = 1 + addr_len + 2;
    let without_port = 1 + addr_len;
    if payload.len() != with_port && payload.len() != without_port {
        return Err(Violation::invalid_data(
            "Connection Point item has an incorrect length",
        ));
    }

    let flags = payload[0];
    if flags & !CONNECTION_POINT_FLAG_TLS != 0 {
        return Err(Violation::invalid_data(
            "Connection Point item sets reserved flag bits",
        ));
    }

    let addr = ip_from_slice(&payload[1..1 + addr_len]);
    let port = if payload.len() == with_port {
        Some(wire::read_u16(&payload[1 + addr_len..]))
    } else {
        None
    };

    Ok(ConnectionPoint {
        addr,
        port,
        tls: flags & CONNECTION_POINT_FLAG_TLS != 0,
    })
}

/// Peer Type: flags + UTF-8 description.
///
/// An embedded NUL is suspicious but not fatal; it is logged and kept.
pub fn parse_peer_type(payload: &[u8]) -> Result<PeerType<'_>, Violation> {
    if payload.is_empty() {
        return Err(Violation::invalid_data("Peer Type item is empty"));
    }
    let flags = payload[0];
    if flags & !PEER_TYPE_FLAG_SECURED != 0 {
        return Err(Violation::invalid_data(
            "Peer Type item sets reserved flag bits",
        ));
    }
    let text = std::str::from_utf8(&payload[1..])
        .map_err(|_| Violation::invalid_data("Peer Type item text is not valid UTF-8"))?;
    if text.contains('\0') {
        log::warn!("[check] Peer Type text contains a NUL character");
    }
    Ok(PeerType {
        secured: flags & PEER_TYPE_FLAG_SECURED != 0,
        text,
    })
}

/// Heartbeat Interval: u32 milliseconds, non-zero.
pub fn parse_heartbeat_interval(payload: &[u8]) -> Result<u32, Violation> {
    if payload.len() != 4 {
        return Err(Violation::invalid_data(
            "Heartbeat Interval item has an incorrect length",
        ));
    }
    let ms = wire::read_u32(payload);
    if ms == 0 {
        return Err(Violation::invalid_data("Heartbeat Interval is zero"));
    }
    Ok(ms)
}

/// Extensions Supported: non-empty list of u16 extension ids; 0 and 65535
/// are reserved by the registry.
pub fn parse_extensions(payload: &[u8]) -> Result<Vec<u16>, Violation> {
    if payload.is_empty() || payload.len() % 2 != 0 {
        return Err(Violation::invalid_data(
            "Extensions Supported item has an incorrect length",
        ));
    }
    let mut ids = Vec::with_capacity(payload.len() / 2);
    for pair in payload.chunks_exact(2) {
        let id = wire::read_u16(pair);
        if id == 0 || id == u16::MAX {
            return Err(Violation::invalid_data(
                "Extensions Supported item carries a reserved extension id",
            ));
        }
        ids.push(id);
    }
    Ok(ids)
}

/// MAC Address: exactly 6 octets.
pub fn parse_mac_address(payload: &[u8]) -> Result<MacAddress, Violation> {
    if payload.len() != 6 {
        return Err(Violation::invalid_data(
            "MAC Address item has an incorrect length",
        ));
    }
    let mut mac = [0u8; 6];
    mac.copy_from_slice(payload);
    Ok(MacAddress(mac))
}

/// IPv4/IPv6 Address: flags + address; Drop rejected under `AddOnly`.
pub fn parse_address(
    code: DataItemCode,
    payload: &[u8],
    policy: AddressPolicy,
) -> Result<AddressItem, Violation> {
    let addr_len = match code {
        DataItemCode::Ipv4Address => 4,
        DataItemCode::Ipv6Address => 16,
        _ => unreachable!("caller dispatches on the address codes"),
    };
    if payload.len() != 1 + addr_len {
        return Err(Violation::invalid_data(
            "Address item has an incorrect length",
        ));
    }
    let op = address_op(payload[0], policy)?;
    Ok(AddressItem {
        op,
        addr: ip_from_slice(&payload[1..]),
    })
}

/// IPv4/IPv6 Attached Subnet: flags + address + prefix length.
pub fn parse_attached_subnet(
    code: DataItemCode,
    payload: &[u8],
    policy: AddressPolicy,
) -> Result<SubnetItem, Violation> {
    let (addr_len, max_prefix) = match code {
        DataItemCode::Ipv4AttachedSubnet => (4, 32),
        DataItemCode::Ipv6AttachedSubnet => (16, 128),
        _ => unreachable!("caller dispatches on the subnet codes"),
    };
    if payload.len() != 1 + addr_len + 1 {
        return Err(Violation::invalid_data(
            "Attached Subnet item has an incorrect length",
        ));
    }
    let op = address_op(payload[0], policy)?;
    let prefix = payload[1 + addr_len];
    if prefix > max_prefix {
        return Err(Violation::invalid_data(
            "Attached Subnet item prefix length is out of range",
        ));
    }
    Ok(SubnetItem {
        op,
        addr: ip_from_slice(&payload[1..1 + addr_len]),
        prefix,
    })
}

/// Data-rate and latency items: u64, exact length 8.
pub fn parse_metric_u64(payload: &[u8]) -> Result<u64, Violation> {
    if payload.len() != 8 {
        return Err(Violation::invalid_data(
            "64-bit metric item has an incorrect length",
        ));
    }
    Ok(wire::read_u64(payload))
}

/// Resources / RLQR / RLQT: u8 percentage, at most 100.
pub fn parse_percent(payload: &[u8]) -> Result<u8, Violation> {
    if payload.len() != 1 {
        return Err(Violation::invalid_data(
            "percentage item has an incorrect length",
        ));
    }
    if payload[0] > 100 {
        return Err(Violation::invalid_data("percentage item exceeds 100"));
    }
    Ok(payload[0])
}

/// MTU: u16, exact length 2.
pub fn parse_mtu(payload: &[u8]) -> Result<u16, Violation> {
    if payload.len() != 2 {
        return Err(Violation::invalid_data("MTU item has an incorrect length"));
    }
    Ok(wire::read_u16(payload))
}

fn address_op(flags: u8, policy: AddressPolicy) -> Result<AddressOp, Violation> {
    if flags & !ADDRESS_FLAG_ADD != 0 {
        return Err(Violation::invalid_data(
            "address item sets reserved flag bits",
        ));
    }
    if flags & ADDRESS_FLAG_ADD != 0 {
        Ok(AddressOp::Add)
    } else if policy == AddressPolicy::AddOrDrop {
        Ok(AddressOp::Drop)
    } else {
        Err(Violation::invalid_data(
            "address item drops an address in an announce-only message",
        ))
    }
}

fn ip_from_slice(bytes: &[u8]) -> IpAddr {
    match bytes.len() {
        4 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(bytes);
            IpAddr::V4(Ipv4Addr::from(b))
        }
        16 => {
            let mut b = [0u8; 16];
            b.copy_from_slice(bytes);
            IpAddr::V6(Ipv6Addr::from(b))
        }
        _ => unreachable!("callers validate the address length"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_with_text() {
        let mut payload = vec![0u8];
        payload.extend_from_slice(b"all good");
        let (code, text) = parse_status(&payload).unwrap();
        assert_eq!(code, StatusCode::Success);
        assert_eq!(text, Some("all good"));
    }

    #[test]
    fn test_status_unknown_code() {
        let err = parse_status(&[42]).unwrap_err();
        assert_eq!(err.status, StatusCode::InvalidData);
    }

    #[test]
    fn test_status_bad_utf8() {
        assert!(parse_status(&[0, 0xFF, 0xFE]).is_err());
    }

    #[test]
    fn test_connection_point_v4_with_port() {
        let payload = [0x00, 10, 0, 0, 1, 0x03, 0x56];
        let cp = parse_connection_point(DataItemCode::Ipv4ConnectionPoint, &payload).unwrap();
        assert_eq!(cp.addr, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(cp.port, Some(854));
        assert!(!cp.tls);
    }

    #[test]
    fn test_connection_point_v4_without_port() {
        let payload = [0x01, 192, 168, 1, 9];
        let cp = parse_connection_point(DataItemCode::Ipv4ConnectionPoint, &payload).unwrap();
        assert_eq!(cp.port, None);
        assert!(cp.tls);
    }

    #[test]
    fn test_connection_point_bad_lengths() {
        for len in [0usize, 1, 4, 6, 8] {
            let payload = vec![0u8; len];
            assert!(
                parse_connection_point(DataItemCode::Ipv4ConnectionPoint, &payload).is_err(),
                "length {} accepted",
                len
            );
        }
        // Valid v6 lengths are 17 and 19
        assert!(parse_connection_point(DataItemCode::Ipv6ConnectionPoint, &[0u8; 17]).is_ok());
        assert!(parse_connection_point(DataItemCode::Ipv6ConnectionPoint, &[0u8; 18]).is_err());
        assert!(parse_connection_point(DataItemCode::Ipv6ConnectionPoint, &[0u8; 19]).is_ok());
    }

    #[test]
    fn test_connection_point_reserved_flags() {
        let payload = [0x80, 10, 0, 0, 1];
        assert!(parse_connection_point(DataItemCode::Ipv4ConnectionPoint, &payload).is_err());
    }

    #[test]
    fn test_peer_type() {
        let mut payload = vec![PEER_TYPE_FLAG_SECURED];
        payload.extend_from_slice(b"sat-modem");
        let pt = parse_peer_type(&payload).unwrap();
        assert!(pt.secured);
        assert_eq!(pt.text, "sat-modem");
    }

    #[test]
    fn test_peer_type_reserved_flags() {
        assert!(parse_peer_type(&[0x02, b'x']).is_err());
    }

    #[test]
    fn test_heartbeat_interval() {
        let mut payload = [0u8; 4];
        wire::write_u32(30_000, &mut payload);
        assert_eq!(parse_heartbeat_interval(&payload).unwrap(), 30_000);
        assert!(parse_heartbeat_interval(&[0, 0, 0, 0]).is_err());
        assert!(parse_heartbeat_interval(&[0, 0, 1]).is_err());
    }

    #[test]
    fn test_extensions() {
        assert_eq!(parse_extensions(&[0, 1, 0, 2]).unwrap(), vec![1, 2]);
        assert!(parse_extensions(&[]).is_err());
        assert!(parse_extensions(&[0, 1, 0]).is_err());
        assert!(parse_extensions(&[0, 0]).is_err());
        assert!(parse_extensions(&[0xFF, 0xFF]).is_err());
    }

    #[test]
    fn test_mac_address() {
        let mac = parse_mac_address(&[2, 0, 0, 0, 0, 1]).unwrap();
        assert_eq!(mac.to_string(), "02:00:00:00:00:01");
        assert!(parse_mac_address(&[0; 5]).is_err());
        assert!(parse_mac_address(&[0; 7]).is_err());
    }

    #[test]
    fn test_address_add_only_policy() {
        let add = [ADDRESS_FLAG_ADD, 10, 0, 0, 2];
        let drop = [0x00, 10, 0, 0, 2];
        assert_eq!(
            parse_address(DataItemCode::Ipv4Address, &add, AddressPolicy::AddOnly)
                .unwrap()
                .op,
            AddressOp::Add
        );
        assert!(parse_address(DataItemCode::Ipv4Address, &drop, AddressPolicy::AddOnly).is_err());
        assert_eq!(
            parse_address(DataItemCode::Ipv4Address, &drop, AddressPolicy::AddOrDrop)
                .unwrap()
                .op,
            AddressOp::Drop
        );
    }

    #[test]
    fn test_subnet_prefix_bounds() {
        let mut v4 = vec![ADDRESS_FLAG_ADD, 10, 0, 0, 0, 24];
        assert_eq!(
            parse_attached_subnet(
                DataItemCode::Ipv4AttachedSubnet,
                &v4,
                AddressPolicy::AddOrDrop
            )
            .unwrap()
            .prefix,
            24
        );
        *v4.last_mut().unwrap() = 33;
        assert!(parse_attached_subnet(
            DataItemCode::Ipv4AttachedSubnet,
            &v4,
            AddressPolicy::AddOrDrop
        )
        .is_err());

        let mut v6 = vec![ADDRESS_FLAG_ADD];
        v6.extend_from_slice(&[0u8; 16]);
        v6.push(128);
        assert!(parse_attached_subnet(
            DataItemCode::Ipv6AttachedSubnet,
            &v6,
            AddressPolicy::AddOrDrop
        )
        .is_ok());
        *v6.last_mut().unwrap() = 129;
        assert!(parse_attached_subnet(
            DataItemCode::Ipv6AttachedSubnet,
            &v6,
            AddressPolicy::AddOrDrop
        )
        .is_err());
    }

    #[test]
    fn test_percent_bounds() {
        assert_eq!(parse_percent(&[100]).unwrap(), 100);
        assert!(parse_percent(&[101]).is_err());
        assert!(parse_percent(&[1, 2]).is_err());
    }

    #[test]
    fn test_metric_u64_length() {
        let mut payload = [0u8; 8];
        wire::write_u64(1_000_000, &mut payload);
        assert_eq!(parse_metric_u64(&payload).unwrap(), 1_000_000);
        assert!(parse_metric_u64(&payload[..7]).is_err());
    }

    #[test]
    fn test_metric_set_merge() {
        let mut base = MetricSet {
            mdrr: Some(100),
            latency: Some(250),
            ..MetricSet::default()
        };
        let update = MetricSet {
            mdrr: Some(200),
            rlqr: Some(90),
            ..MetricSet::default()
        };
        base.merge(&update);
        assert_eq!(base.mdrr, Some(200));
        assert_eq!(base.latency, Some(250));
        assert_eq!(base.rlqr, Some(90));
    }

    #[test]
    fn test_seen_items() {
        let mut seen = SeenItems::new();
        assert!(seen.insert(DataItemCode::Status));
        assert!(!seen.insert(DataItemCode::Status));
        assert!(seen.insert(DataItemCode::MacAddress));
        assert!(seen.contains(DataItemCode::Status));
        assert!(!seen.contains(DataItemCode::Latency));
    }
}
