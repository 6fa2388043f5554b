// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-message validators.
//!
//! One entry point per inbound signal/message. Each walks the framed buffer
//! exactly once, enforcing the header contract, per-item rules, uniqueness,
//! mandatory presence and the frame boundary, and returns either a view
//! borrowing from the buffer or the status code of the first violation.
//!
//! # Module Organization
//!
//! - `offer`: Peer Offer (discovery)
//! - `init`: Session Initialization Response
//! - `session`: Heartbeat, Session Termination, Session Update
//! - `destination`: Destination Up/Update/Down, Link Characteristics Request

mod destination;
mod init;
mod offer;
mod session;

pub use destination::{
    check_destination_down_message, check_destination_up_message,
    check_destination_update_message, check_link_char_request_message, DestinationDown,
    DestinationUp, DestinationUpdate, LinkCharRequest,
};
pub use init::{check_session_init_resp_message, SessionInitResp};
pub use offer::{check_peer_offer_signal, PeerOffer};
pub use session::{
    check_heartbeat_message, check_session_term_message, check_session_update_message,
    SessionTerm, SessionUpdate,
};

use super::ids::{DataItemCode, MessageCode, SignalCode, StatusCode};
use super::items::{self, MetricSet, SeenItems};
use super::{ITEM_HEADER_LEN, MESSAGE_HEADER_LEN, SIGNAL_HEADER_LEN, SIGNAL_MAGIC};
use crate::wire;

/// First protocol violation found while checking a frame.
///
/// `status` is the RFC 8175 code the session layer reports (on a response
/// for soft violations, on Session Termination for hard ones); `detail` is
/// for the log line only and never goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub status: StatusCode,
    pub detail: &'static str,
}

impl Violation {
    pub fn new(status: StatusCode, detail: &'static str) -> Self {
        Self { status, detail }
    }

    pub fn invalid_data(detail: &'static str) -> Self {
        Self::new(StatusCode::InvalidData, detail)
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}

impl std::error::Error for Violation {}

/// A raw data item yielded by the walker: registry code plus payload slice.
#[derive(Debug, Clone, Copy)]
pub struct RawItem<'a> {
    pub code: u16,
    pub payload: &'a [u8],
}

/// Strictly sequential walk over the data items of one frame.
///
/// The walker owns the boundary rules: a truncated item header or a payload
/// running past the frame end is `Invalid Data`. Iteration ending cleanly
/// means the cursor landed exactly on the frame boundary.
#[derive(Debug)]
pub struct ItemWalker<'a> {
    cursor: wire::Cursor<'a>,
    poisoned: bool,
}

impl<'a> ItemWalker<'a> {
    fn new(items: &'a [u8]) -> Self {
        Self {
            cursor: wire::Cursor::new(items),
            poisoned: false,
        }
    }

    fn fail(&mut self, detail: &'static str) -> Option<Result<RawItem<'a>, Violation>> {
        self.poisoned = true;
        Some(Err(Violation::invalid_data(detail)))
    }
}

impl<'a> Iterator for ItemWalker<'a> {
    type Item = Result<RawItem<'a>, Violation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned || self.cursor.is_eof() {
            return None;
        }
        if self.cursor.remaining() < ITEM_HEADER_LEN {
            return self.fail("trailing bytes too short for a data item header");
        }

        let code = match self.cursor.read_u16() {
            Ok(code) => code,
            Err(_) => return self.fail("data item header cut short"),
        };
        let len = match self.cursor.read_u16() {
            Ok(len) => len as usize,
            Err(_) => return self.fail("data item header cut short"),
        };
        match self.cursor.read_bytes(len) {
            Ok(payload) => Some(Ok(RawItem { code, payload })),
            Err(_) => self.fail("data item length overruns the frame"),
        }
    }
}

/// Validate a discovery signal header and hand back the item walker.
///
/// Signals carry the `DLEP` magic ahead of the id, and the declared payload
/// length must account for every received byte past the 8-byte header.
pub(crate) fn signal_items<'a>(
    buf: &'a [u8],
    expected: SignalCode,
) -> Result<ItemWalker<'a>, Violation> {
    if buf.len() < SIGNAL_HEADER_LEN {
        return Err(Violation::invalid_data("datagram too short for a signal"));
    }
    if &buf[..4] != SIGNAL_MAGIC {
        return Err(Violation::invalid_data("signal does not start with DLEP"));
    }

    let raw_id = wire::read_u16(&buf[4..]);
    match SignalCode::from_u16(raw_id) {
        Some(id) if id == expected => {}
        Some(_) => {
            return Err(Violation::new(
                StatusCode::UnexpectedMessage,
                "signal id does not match the awaited signal",
            ))
        }
        None => {
            return Err(Violation::new(
                StatusCode::UnknownMessage,
                "signal id is not in the registry",
            ))
        }
    }

    let declared = wire::read_u16(&buf[6..]) as usize;
    if declared + SIGNAL_HEADER_LEN != buf.len() {
        return Err(Violation::invalid_data(
            "signal length does not match the received byte count",
        ));
    }

    Ok(ItemWalker::new(&buf[SIGNAL_HEADER_LEN..]))
}

/// Validate a session message header and hand back the item walker.
pub(crate) fn message_items<'a>(
    buf: &'a [u8],
    expected: MessageCode,
) -> Result<ItemWalker<'a>, Violation> {
    if buf.len() < MESSAGE_HEADER_LEN {
        return Err(Violation::invalid_data("frame too short for a message"));
    }

    let raw_id = wire::read_u16(buf);
    match MessageCode::from_u16(raw_id) {
        Some(id) if id == expected => {}
        Some(_) => {
            return Err(Violation::new(
                StatusCode::UnexpectedMessage,
                "message id does not match the awaited message",
            ))
        }
        None => {
            return Err(Violation::new(
                StatusCode::UnknownMessage,
                "message id is not in the registry",
            ))
        }
    }

    let declared = wire::read_u16(&buf[2..]) as usize;
    if declared + MESSAGE_HEADER_LEN != buf.len() {
        return Err(Violation::invalid_data(
            "message length does not match the received byte count",
        ));
    }

    Ok(ItemWalker::new(&buf[MESSAGE_HEADER_LEN..]))
}

/// Record a unique item, failing on the second occurrence.
pub(crate) fn note_unique(seen: &mut SeenItems, code: DataItemCode) -> Result<(), Violation> {
    debug_assert!(!code.is_repeatable());
    if seen.insert(code) {
        Ok(())
    } else {
        Err(Violation::invalid_data("duplicate unique data item"))
    }
}

/// Shared handler for the nine metric items.
///
/// Returns true when `code` was a metric item (checked and folded into
/// `metrics`), false when the caller must dispatch it itself. Metric items
/// are unique per frame.
pub(crate) fn metric_item(
    code: DataItemCode,
    payload: &[u8],
    seen: &mut SeenItems,
    metrics: &mut MetricSet,
) -> Result<bool, Violation> {
    match code {
        DataItemCode::Mdrr => {
            note_unique(seen, code)?;
            metrics.mdrr = Some(items::parse_metric_u64(payload)?);
        }
        DataItemCode::Mdrt => {
            note_unique(seen, code)?;
            metrics.mdrt = Some(items::parse_metric_u64(payload)?);
        }
        DataItemCode::Cdrr => {
            note_unique(seen, code)?;
            metrics.cdrr = Some(items::parse_metric_u64(payload)?);
        }
        DataItemCode::Cdrt => {
            note_unique(seen, code)?;
            metrics.cdrt = Some(items::parse_metric_u64(payload)?);
        }
        DataItemCode::Latency => {
            note_unique(seen, code)?;
            metrics.latency = Some(items::parse_metric_u64(payload)?);
        }
        DataItemCode::Resources => {
            note_unique(seen, code)?;
            metrics.resources = Some(items::parse_percent(payload)?);
        }
        DataItemCode::Rlqr => {
            note_unique(seen, code)?;
            metrics.rlqr = Some(items::parse_percent(payload)?);
        }
        DataItemCode::Rlqt => {
            note_unique(seen, code)?;
            metrics.rlqt = Some(items::parse_percent(payload)?);
        }
        DataItemCode::Mtu => {
            note_unique(seen, code)?;
            metrics.mtu = Some(items::parse_mtu(payload)?);
        }
        _ => return Ok(false),
    }
    Ok(true)
}
