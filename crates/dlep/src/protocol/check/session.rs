// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Heartbeat, Session Termination and Session Update validation.

use super::super::ids::{DataItemCode, MessageCode, StatusCode};
use super::super::items::{self, AddressItem, AddressPolicy, MetricSet, SeenItems, SubnetItem};
use super::{message_items, metric_item, note_unique, Violation};

/// Validated view of a Session Termination message.
#[derive(Debug)]
pub struct SessionTerm<'a> {
    pub status: StatusCode,
    pub status_text: Option<&'a str>,
}

/// Validated view of a Session Update message.
#[derive(Debug, Default)]
pub struct SessionUpdate {
    /// Modem address changes, add and drop both legal here.
    pub addresses: Vec<AddressItem>,
    pub subnets: Vec<SubnetItem>,
    /// Session-wide metric overrides.
    pub metrics: MetricSet,
}

/// Check a Heartbeat message. It carries no data items at all.
pub fn check_heartbeat_message(buf: &[u8]) -> Result<(), Violation> {
    let mut walker = message_items(buf, MessageCode::Heartbeat)?;
    match walker.next() {
        None => Ok(()),
        Some(Err(violation)) => Err(violation),
        Some(Ok(_)) => Err(Violation::invalid_data(
            "Heartbeat message carries a data item",
        )),
    }
}

/// Check a Session Termination message. Mandatory: Status.
pub fn check_session_term_message(buf: &[u8]) -> Result<SessionTerm<'_>, Violation> {
    let walker = message_items(buf, MessageCode::SessionTerm)?;

    let mut seen = SeenItems::new();
    let mut status = None;
    let mut status_text = None;

    for item in walker {
        let item = item?;
        match DataItemCode::from_u16(item.code) {
            Some(code @ DataItemCode::Status) => {
                note_unique(&mut seen, code)?;
                let (parsed, text) = items::parse_status(item.payload)?;
                status = Some(parsed);
                status_text = text;
            }
            Some(_) | None => {
                return Err(Violation::invalid_data(
                    "unexpected data item in Session Termination",
                ));
            }
        }
    }

    let status = status
        .ok_or_else(|| Violation::invalid_data("Session Termination misses the Status item"))?;

    Ok(SessionTerm {
        status,
        status_text,
    })
}

/// Check a Session Update message.
///
/// Everything is optional; address and subnet items may both add and drop.
pub fn check_session_update_message(buf: &[u8]) -> Result<SessionUpdate, Violation> {
    let walker = message_items(buf, MessageCode::SessionUpdate)?;

    let mut seen = SeenItems::new();
    let mut view = SessionUpdate::default();

    for item in walker {
        let item = item?;
        let code = DataItemCode::from_u16(item.code).ok_or_else(|| {
            Violation::invalid_data("unknown data item in Session Update")
        })?;

        if metric_item(code, item.payload, &mut seen, &mut view.metrics)? {
            continue;
        }

        match code {
            DataItemCode::Ipv4Address | DataItemCode::Ipv6Address => {
                view.addresses.push(items::parse_address(
                    code,
                    item.payload,
                    AddressPolicy::AddOrDrop,
                )?);
            }
            DataItemCode::Ipv4AttachedSubnet | DataItemCode::Ipv6AttachedSubnet => {
                view.subnets.push(items::parse_attached_subnet(
                    code,
                    item.payload,
                    AddressPolicy::AddOrDrop,
                )?);
            }
            _ => {
                return Err(Violation::invalid_data(
                    "unexpected data item in Session Update",
                ));
            }
        }
    }

    Ok(view)
}
