// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session Initialization Response validation.

use super::super::ids::{DataItemCode, MessageCode, StatusCode};
use super::super::items::{self, AddressItem, AddressPolicy, MetricSet, SeenItems, SubnetItem};
use super::{message_items, metric_item, note_unique, Violation};

/// Validated view of a Session Initialization Response.
#[derive(Debug)]
pub struct SessionInitResp<'a> {
    pub status: StatusCode,
    pub status_text: Option<&'a str>,
    pub peer_type: &'a str,
    /// The radio is a secured medium (Peer Type flag).
    pub secured_medium: bool,
    /// Modem Heartbeat Interval in milliseconds.
    pub heartbeat_interval_ms: u32,
    /// Session-wide default metrics; the mandatory five are always present.
    pub metrics: MetricSet,
    /// Extensions the modem proposes; negotiation is not implemented, so the
    /// session layer only logs them.
    pub extensions: Vec<u16>,
    /// Modem IP addresses (announce context: Add only).
    pub addresses: Vec<AddressItem>,
    pub subnets: Vec<SubnetItem>,
}

/// Check a Session Initialization Response message.
///
/// Mandatory: Status, Peer Type, Heartbeat Interval, MDRR, MDRT, CDRR,
/// CDRT, Latency. Unknown data items are tolerated here - the modem may be
/// advertising extensions we did not ask for - and logged at info level.
pub fn check_session_init_resp_message(buf: &[u8]) -> Result<SessionInitResp<'_>, Violation> {
    let walker = message_items(buf, MessageCode::SessionInitResp)?;

    let mut seen = SeenItems::new();
    let mut status = None;
    let mut status_text = None;
    let mut peer_type = None;
    let mut secured_medium = false;
    let mut heartbeat_interval_ms = None;
    let mut metrics = MetricSet::default();
    let mut extensions = Vec::new();
    let mut addresses = Vec::new();
    let mut subnets = Vec::new();

    for item in walker {
        let item = item?;
        let code = match DataItemCode::from_u16(item.code) {
            Some(code) => code,
            None => {
                log::info!(
                    "[check] ignoring unknown data item {} ({} bytes) in Session Initialization Response",
                    item.code,
                    item.payload.len()
                );
                continue;
            }
        };

        if metric_item(code, item.payload, &mut seen, &mut metrics)? {
            continue;
        }

        match code {
            DataItemCode::Status => {
                note_unique(&mut seen, code)?;
                let (parsed, text) = items::parse_status(item.payload)?;
                status = Some(parsed);
                status_text = text;
            }
            DataItemCode::PeerType => {
                note_unique(&mut seen, code)?;
                let pt = items::parse_peer_type(item.payload)?;
                peer_type = Some(pt.text);
                secured_medium = pt.secured;
            }
            DataItemCode::HeartbeatInterval => {
                note_unique(&mut seen, code)?;
                heartbeat_interval_ms = Some(items::parse_heartbeat_interval(item.payload)?);
            }
            DataItemCode::ExtensionsSupported => {
                note_unique(&mut seen, code)?;
                extensions = items::parse_extensions(item.payload)?;
            }
            DataItemCode::Ipv4Address | DataItemCode::Ipv6Address => {
                addresses.push(items::parse_address(
                    code,
                    item.payload,
                    AddressPolicy::AddOnly,
                )?);
            }
            DataItemCode::Ipv4AttachedSubnet | DataItemCode::Ipv6AttachedSubnet => {
                subnets.push(items::parse_attached_subnet(
                    code,
                    item.payload,
                    AddressPolicy::AddOnly,
                )?);
            }
            _ => {
                return Err(Violation::invalid_data(
                    "unexpected data item in Session Initialization Response",
                ));
            }
        }
    }

    let status = status.ok_or_else(|| {
        Violation::invalid_data("Session Initialization Response misses the Status item")
    })?;
    let peer_type = peer_type.ok_or_else(|| {
        Violation::invalid_data("Session Initialization Response misses the Peer Type item")
    })?;
    let heartbeat_interval_ms = heartbeat_interval_ms.ok_or_else(|| {
        Violation::invalid_data("Session Initialization Response misses the Heartbeat Interval item")
    })?;
    for (present, detail) in [
        (
            metrics.mdrr.is_some(),
            "Session Initialization Response misses the MDRR item",
        ),
        (
            metrics.mdrt.is_some(),
            "Session Initialization Response misses the MDRT item",
        ),
        (
            metrics.cdrr.is_some(),
            "Session Initialization Response misses the CDRR item",
        ),
        (
            metrics.cdrt.is_some(),
            "Session Initialization Response misses the CDRT item",
        ),
        (
            metrics.latency.is_some(),
            "Session Initialization Response misses the Latency item",
        ),
    ] {
        if !present {
            return Err(Violation::invalid_data(detail));
        }
    }

    Ok(SessionInitResp {
        status,
        status_text,
        peer_type,
        secured_medium,
        heartbeat_interval_ms,
        metrics,
        extensions,
        addresses,
        subnets,
    })
}
