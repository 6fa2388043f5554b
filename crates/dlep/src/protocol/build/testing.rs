// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Modem-side frame builders for the test-suite.
//!
//! The router never emits these frames in production; the validator tests
//! and the scripted-session tests need a well-formed modem to talk to. The
//! raw entry points at the bottom let tests craft deliberately broken frames
//! as well.

use super::super::ids::{DataItemCode, MessageCode, SignalCode, StatusCode};
use super::{begin_message, begin_signal, finish_message, finish_signal, push_item, push_u16};
use crate::protocol::items::ADDRESS_FLAG_ADD;
use crate::wire;

/// A frame with the given message id and raw (code, payload) items.
pub fn build_message(code: MessageCode, raw_items: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut buf = begin_message(code);
    for (code, payload) in raw_items {
        push_u16(&mut buf, *code);
        push_u16(&mut buf, payload.len() as u16);
        buf.extend_from_slice(payload);
    }
    finish_message(buf)
}

/// A message with no data items at all.
pub fn build_bare_message(code: MessageCode) -> Vec<u8> {
    finish_message(begin_message(code))
}

fn status_payload(status: StatusCode) -> Vec<u8> {
    vec![status.code()]
}

fn peer_type_payload(text: &str) -> Vec<u8> {
    let mut payload = vec![0u8];
    payload.extend_from_slice(text.as_bytes());
    payload
}

fn u32_payload(v: u32) -> Vec<u8> {
    let mut b = [0u8; 4];
    wire::write_u32(v, &mut b);
    b.to_vec()
}

fn u64_payload(v: u64) -> Vec<u8> {
    let mut b = [0u8; 8];
    wire::write_u64(v, &mut b);
    b.to_vec()
}

fn v4_connection_point(addr: [u8; 4], port: Option<u16>) -> Vec<u8> {
    let mut payload = vec![0u8];
    payload.extend_from_slice(&addr);
    if let Some(port) = port {
        let mut b = [0u8; 2];
        wire::write_u16(port, &mut b);
        payload.extend_from_slice(&b);
    }
    payload
}

fn v6_connection_point(addr: [u8; 16], port: Option<u16>) -> Vec<u8> {
    let mut payload = vec![0u8];
    payload.extend_from_slice(&addr);
    if let Some(port) = port {
        let mut b = [0u8; 2];
        wire::write_u16(port, &mut b);
        payload.extend_from_slice(&b);
    }
    payload
}

fn v4_address(addr: [u8; 4], add: bool) -> Vec<u8> {
    let mut payload = vec![if add { ADDRESS_FLAG_ADD } else { 0 }];
    payload.extend_from_slice(&addr);
    payload
}

// =======================================================================
// Peer Offer
// =======================================================================

/// A valid Peer Offer with one IPv4 connection point.
pub fn build_peer_offer_v4(addr: [u8; 4], port: Option<u16>, peer_type: Option<&str>) -> Vec<u8> {
    let mut buf = begin_signal(SignalCode::PeerOffer);
    if let Some(text) = peer_type {
        push_item(&mut buf, DataItemCode::PeerType, &peer_type_payload(text));
    }
    push_item(
        &mut buf,
        DataItemCode::Ipv4ConnectionPoint,
        &v4_connection_point(addr, port),
    );
    finish_signal(buf)
}

/// A valid Peer Offer with one IPv6 connection point.
pub fn build_peer_offer_v6(addr: [u8; 16], port: Option<u16>) -> Vec<u8> {
    let mut buf = begin_signal(SignalCode::PeerOffer);
    push_item(
        &mut buf,
        DataItemCode::Ipv6ConnectionPoint,
        &v6_connection_point(addr, port),
    );
    finish_signal(buf)
}

/// A Peer Offer declining the connection with the given status.
pub fn build_peer_offer_declined(addr: [u8; 4], status: StatusCode) -> Vec<u8> {
    let mut buf = begin_signal(SignalCode::PeerOffer);
    push_item(&mut buf, DataItemCode::Status, &status_payload(status));
    push_item(
        &mut buf,
        DataItemCode::Ipv4ConnectionPoint,
        &v4_connection_point(addr, None),
    );
    finish_signal(buf)
}

/// A Peer Offer without any connection point (invalid).
pub fn build_peer_offer_empty() -> Vec<u8> {
    finish_signal(begin_signal(SignalCode::PeerOffer))
}

// =======================================================================
// Session Initialization Response
// =======================================================================

/// A complete, valid Session Initialization Response.
pub fn build_session_init_resp(status: StatusCode, heartbeat_ms: u32) -> Vec<u8> {
    build_session_init_resp_inner(status, heartbeat_ms, None)
}

/// Same as [`build_session_init_resp`] with one mandatory item left out.
pub fn build_session_init_resp_without(
    status: StatusCode,
    heartbeat_ms: u32,
    omit: DataItemCode,
) -> Vec<u8> {
    build_session_init_resp_inner(status, heartbeat_ms, Some(omit))
}

fn build_session_init_resp_inner(
    status: StatusCode,
    heartbeat_ms: u32,
    omit: Option<DataItemCode>,
) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::SessionInitResp);
    let mut item = |code: DataItemCode, payload: Vec<u8>| {
        if omit != Some(code) {
            push_item(&mut buf, code, &payload);
        }
    };
    item(DataItemCode::Status, status_payload(status));
    item(DataItemCode::PeerType, peer_type_payload("test-modem"));
    item(DataItemCode::HeartbeatInterval, u32_payload(heartbeat_ms));
    item(DataItemCode::Mdrr, u64_payload(100_000_000));
    item(DataItemCode::Mdrt, u64_payload(50_000_000));
    item(DataItemCode::Cdrr, u64_payload(10_000_000));
    item(DataItemCode::Cdrt, u64_payload(5_000_000));
    item(DataItemCode::Latency, u64_payload(2_500));
    finish_message(buf)
}

// =======================================================================
// Session Update
// =======================================================================

/// A Session Update dropping one IPv4 address.
pub fn build_session_update_with_drop(addr: [u8; 4]) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::SessionUpdate);
    push_item(&mut buf, DataItemCode::Ipv4Address, &v4_address(addr, false));
    finish_message(buf)
}

/// A Session Update adding an address and overriding two metrics.
pub fn build_session_update(addr: Option<[u8; 4]>, cdrr: Option<u64>, mtu: Option<u16>) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::SessionUpdate);
    if let Some(addr) = addr {
        push_item(&mut buf, DataItemCode::Ipv4Address, &v4_address(addr, true));
    }
    if let Some(cdrr) = cdrr {
        push_item(&mut buf, DataItemCode::Cdrr, &u64_payload(cdrr));
    }
    if let Some(mtu) = mtu {
        let mut b = [0u8; 2];
        wire::write_u16(mtu, &mut b);
        push_item(&mut buf, DataItemCode::Mtu, &b);
    }
    finish_message(buf)
}

/// A Session Update repeating the unique MDRR item (invalid).
pub fn build_session_update_duplicate_mdrr() -> Vec<u8> {
    let mut buf = begin_message(MessageCode::SessionUpdate);
    push_item(&mut buf, DataItemCode::Mdrr, &u64_payload(1));
    push_item(&mut buf, DataItemCode::Mdrr, &u64_payload(2));
    finish_message(buf)
}

// =======================================================================
// Destination lifecycle
// =======================================================================

/// A valid Destination Up with metrics and an optional IPv4 address.
pub fn build_destination_up(mac: [u8; 6], addr: Option<[u8; 4]>) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::DestinationUp);
    push_item(&mut buf, DataItemCode::MacAddress, &mac);
    if let Some(addr) = addr {
        push_item(&mut buf, DataItemCode::Ipv4Address, &v4_address(addr, true));
    }
    push_item(&mut buf, DataItemCode::Mdrr, &u64_payload(100_000_000));
    push_item(&mut buf, DataItemCode::Cdrr, &u64_payload(10_000_000));
    push_item(&mut buf, DataItemCode::Latency, &u64_payload(1_000));
    finish_message(buf)
}

/// A Destination Up with no MAC Address item (invalid).
pub fn build_destination_up_without_mac() -> Vec<u8> {
    let mut buf = begin_message(MessageCode::DestinationUp);
    push_item(&mut buf, DataItemCode::Mdrr, &u64_payload(1_000));
    finish_message(buf)
}

/// A Destination Up repeating the MAC Address item (invalid).
pub fn build_destination_up_duplicate_mac(mac: [u8; 6]) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::DestinationUp);
    push_item(&mut buf, DataItemCode::MacAddress, &mac);
    push_item(&mut buf, DataItemCode::MacAddress, &mac);
    finish_message(buf)
}

/// A Destination Up dropping an address (invalid in an announce).
pub fn build_destination_up_with_drop(mac: [u8; 6], addr: [u8; 4]) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::DestinationUp);
    push_item(&mut buf, DataItemCode::MacAddress, &mac);
    push_item(&mut buf, DataItemCode::Ipv4Address, &v4_address(addr, false));
    finish_message(buf)
}

/// A Destination Update carrying fresh data-rate metrics.
pub fn build_destination_update(mac: [u8; 6], mdrr: Option<u64>, cdrr: Option<u64>) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::DestinationUpdate);
    push_item(&mut buf, DataItemCode::MacAddress, &mac);
    if let Some(mdrr) = mdrr {
        push_item(&mut buf, DataItemCode::Mdrr, &u64_payload(mdrr));
    }
    if let Some(cdrr) = cdrr {
        push_item(&mut buf, DataItemCode::Cdrr, &u64_payload(cdrr));
    }
    finish_message(buf)
}

/// A Destination Update dropping one IPv4 address.
pub fn build_destination_update_drop(mac: [u8; 6], addr: [u8; 4]) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::DestinationUpdate);
    push_item(&mut buf, DataItemCode::MacAddress, &mac);
    push_item(&mut buf, DataItemCode::Ipv4Address, &v4_address(addr, false));
    finish_message(buf)
}

/// A valid Destination Down.
pub fn build_destination_down(mac: [u8; 6]) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::DestinationDown);
    push_item(&mut buf, DataItemCode::MacAddress, &mac);
    finish_message(buf)
}

/// A Link Characteristics Request, optionally asking for a CDRR.
pub fn build_link_char_request(mac: [u8; 6], cdrr: Option<u64>) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::LinkCharRequest);
    push_item(&mut buf, DataItemCode::MacAddress, &mac);
    if let Some(cdrr) = cdrr {
        push_item(&mut buf, DataItemCode::Cdrr, &u64_payload(cdrr));
    }
    finish_message(buf)
}

/// Append a raw item to a finished message frame and re-patch the length.
pub fn append_item(frame: &mut Vec<u8>, code: u16, payload: &[u8]) {
    push_u16(frame, code);
    push_u16(frame, payload.len() as u16);
    frame.extend_from_slice(payload);
    let declared = (frame.len() - 4) as u16;
    wire::write_u16(declared, &mut frame[2..4]);
}

/// Append a raw item to a finished signal frame and re-patch the length.
pub fn append_signal_item(frame: &mut Vec<u8>, code: u16, payload: &[u8]) {
    push_u16(frame, code);
    push_u16(frame, payload.len() as u16);
    frame.extend_from_slice(payload);
    let declared = (frame.len() - 8) as u16;
    wire::write_u16(declared, &mut frame[6..8]);
}

/// A modem-side Session Termination.
pub fn build_session_term(status: StatusCode) -> Vec<u8> {
    super::build_session_term(status)
}

/// A modem-side Session Termination Response.
pub fn build_session_term_resp() -> Vec<u8> {
    super::build_session_term_resp()
}
