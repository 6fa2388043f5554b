// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound frame construction.
//!
//! Builders write the header with a zero length, append the data items, then
//! back-patch the payload length. Buffers come back as contiguous `Vec<u8>`
//! ready for a single send.

pub mod testing;

use super::ids::{DataItemCode, MessageCode, SignalCode, StatusCode};
use super::items::MacAddress;
use super::{MESSAGE_HEADER_LEN, SIGNAL_HEADER_LEN, SIGNAL_MAGIC};
use crate::config::ROUTER_PEER_TYPE;
use crate::wire;


/// Start a discovery signal: magic + id + length placeholder.
fn begin_signal(code: SignalCode) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(SIGNAL_MAGIC);
    push_u16(&mut buf, code.code());
    push_u16(&mut buf, 0);
    buf
}

/// Start a session message: id + length placeholder.
fn begin_message(code: MessageCode) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    push_u16(&mut buf, code.code());
    push_u16(&mut buf, 0);
    buf
}

/// Append one data item: type + length + payload.
fn push_item(buf: &mut Vec<u8>, code: DataItemCode, payload: &[u8]) {
    push_u16(buf, code.code());
    push_u16(buf, payload.len() as u16);
    buf.extend_from_slice(payload);
}

/// Back-patch the signal payload length (total minus the 8-byte header).
fn finish_signal(mut buf: Vec<u8>) -> Vec<u8> {
    let payload = (buf.len() - SIGNAL_HEADER_LEN) as u16;
    wire::write_u16(payload, &mut buf[6..8]);
    buf
}

/// Back-patch the message payload length (total minus the 4-byte header).
fn finish_message(mut buf: Vec<u8>) -> Vec<u8> {
    let payload = (buf.len() - MESSAGE_HEADER_LEN) as u16;
    wire::write_u16(payload, &mut buf[2..4]);
    buf
}

fn push_u16(buf: &mut Vec<u8>, v: u16) {
    let mut b = [0u8; 2];
    wire::write_u16(v, &mut b);
    buf.extend_from_slice(&b);
}

fn peer_type_payload() -> Vec<u8> {
    let mut payload = vec![0u8]; // flags: not a secured medium
    payload.extend_from_slice(ROUTER_PEER_TYPE.as_bytes());
    payload
}

/// Peer Discovery signal: the UDP probe sent to the well-known group.
pub fn build_peer_discovery() -> Vec<u8> {
    let mut buf = begin_signal(SignalCode::PeerDiscovery);
    push_item(&mut buf, DataItemCode::PeerType, &peer_type_payload());
    finish_signal(buf)
}

/// Session Initialization: the router's opening message on the TCP session.
pub fn build_session_init(router_hb_ms: u32) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::SessionInit);
    let mut hb = [0u8; 4];
    wire::write_u32(router_hb_ms, &mut hb);
    push_item(&mut buf, DataItemCode::HeartbeatInterval, &hb);
    push_item(&mut buf, DataItemCode::PeerType, &peer_type_payload());
    finish_message(buf)
}

/// Heartbeat: a bare message, no items.
pub fn build_heartbeat() -> Vec<u8> {
    finish_message(begin_message(MessageCode::Heartbeat))
}

/// Session Termination carrying the reason code (no text).
pub fn build_session_term(status: StatusCode) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::SessionTerm);
    push_item(&mut buf, DataItemCode::Status, &[status.code()]);
    finish_message(buf)
}

/// Session Termination Response: a bare acknowledgement.
pub fn build_session_term_resp() -> Vec<u8> {
    finish_message(begin_message(MessageCode::SessionTermResp))
}

/// Session Update Response acknowledging an applied update.
pub fn build_session_update_resp(status: StatusCode) -> Vec<u8> {
    let mut buf = begin_message(MessageCode::SessionUpdateResp);
    push_item(&mut buf, DataItemCode::Status, &[status.code()]);
    finish_message(buf)
}

/// Destination Up Response for `mac`.
pub fn build_destination_up_resp(mac: &MacAddress, status: StatusCode) -> Vec<u8> {
    mac_and_status(MessageCode::DestinationUpResp, mac, status)
}

/// Destination Down Response for `mac`.
pub fn build_destination_down_resp(mac: &MacAddress, status: StatusCode) -> Vec<u8> {
    mac_and_status(MessageCode::DestinationDownResp, mac, status)
}

/// Link Characteristics Response for `mac`.
///
/// This router never initiates Link Characteristics Requests and always
/// answers the modem's with `Request Denied`.
pub fn build_link_char_resp(mac: &MacAddress, status: StatusCode) -> Vec<u8> {
    mac_and_status(MessageCode::LinkCharResponse, mac, status)
}

fn mac_and_status(code: MessageCode, mac: &MacAddress, status: StatusCode) -> Vec<u8> {
    let mut buf = begin_message(code);
    push_item(&mut buf, DataItemCode::MacAddress, mac.octets());
    push_item(&mut buf, DataItemCode::Status, &[status.code()]);
    finish_message(buf)
}
