// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Destination lifecycle and Link Characteristics Request validation.
//!
//! All four messages here share the MAC Address item as their key; the
//! remaining rules differ in which address operations and metrics they
//! permit.

use super::super::ids::{DataItemCode, MessageCode};
use super::super::items::{
    self, AddressItem, AddressPolicy, MacAddress, MetricSet, SeenItems, SubnetItem,
};
use super::{message_items, metric_item, note_unique, ItemWalker, Violation};

/// Validated view of a Destination Up message.
#[derive(Debug)]
pub struct DestinationUp {
    pub mac: MacAddress,
    pub addresses: Vec<AddressItem>,
    pub subnets: Vec<SubnetItem>,
    pub metrics: MetricSet,
}

/// Validated view of a Destination Update message.
#[derive(Debug)]
pub struct DestinationUpdate {
    pub mac: MacAddress,
    pub addresses: Vec<AddressItem>,
    pub subnets: Vec<SubnetItem>,
    pub metrics: MetricSet,
}

/// Validated view of a Destination Down message.
#[derive(Debug)]
pub struct DestinationDown {
    pub mac: MacAddress,
}

/// Validated view of a Link Characteristics Request.
#[derive(Debug)]
pub struct LinkCharRequest {
    pub mac: MacAddress,
    /// The characteristics the modem asks the router to arrange. This
    /// router always denies the request, so they are logged and dropped.
    pub requested: MetricSet,
}

/// Check a Destination Up message.
///
/// Mandatory: MAC Address. Address items are announce-only (no Drop). A
/// destination without any IP item is legal but worth a warning.
pub fn check_destination_up_message(buf: &[u8]) -> Result<DestinationUp, Violation> {
    let walker = message_items(buf, MessageCode::DestinationUp)?;
    let (mac, addresses, subnets, metrics) = destination_body(walker, AddressPolicy::AddOnly)?;

    if addresses.is_empty() && subnets.is_empty() {
        log::warn!(
            "[check] Destination Up for {} carries no IP address or subnet item",
            mac
        );
    }

    Ok(DestinationUp {
        mac,
        addresses,
        subnets,
        metrics,
    })
}

/// Check a Destination Update message.
///
/// Mandatory: MAC Address. Address items may add and drop.
pub fn check_destination_update_message(buf: &[u8]) -> Result<DestinationUpdate, Violation> {
    let walker = message_items(buf, MessageCode::DestinationUpdate)?;
    let (mac, addresses, subnets, metrics) =
        destination_body(walker, AddressPolicy::AddOrDrop)?;

    Ok(DestinationUpdate {
        mac,
        addresses,
        subnets,
        metrics,
    })
}

/// Check a Destination Down message. MAC Address and nothing else.
pub fn check_destination_down_message(buf: &[u8]) -> Result<DestinationDown, Violation> {
    let walker = message_items(buf, MessageCode::DestinationDown)?;

    let mut seen = SeenItems::new();
    let mut mac = None;

    for item in walker {
        let item = item?;
        match DataItemCode::from_u16(item.code) {
            Some(code @ DataItemCode::MacAddress) => {
                note_unique(&mut seen, code)?;
                mac = Some(items::parse_mac_address(item.payload)?);
            }
            Some(_) | None => {
                return Err(Violation::invalid_data(
                    "unexpected data item in Destination Down",
                ));
            }
        }
    }

    let mac = mac
        .ok_or_else(|| Violation::invalid_data("Destination Down misses the MAC Address item"))?;
    Ok(DestinationDown { mac })
}

/// Check a Link Characteristics Request.
///
/// Mandatory: MAC Address; the requested characteristics ride along as
/// metric items.
pub fn check_link_char_request_message(buf: &[u8]) -> Result<LinkCharRequest, Violation> {
    let walker = message_items(buf, MessageCode::LinkCharRequest)?;

    let mut seen = SeenItems::new();
    let mut mac = None;
    let mut requested = MetricSet::default();

    for item in walker {
        let item = item?;
        let code = DataItemCode::from_u16(item.code).ok_or_else(|| {
            Violation::invalid_data("unknown data item in Link Characteristics Request")
        })?;

        if metric_item(code, item.payload, &mut seen, &mut requested)? {
            continue;
        }

        match code {
            DataItemCode::MacAddress => {
                note_unique(&mut seen, code)?;
                mac = Some(items::parse_mac_address(item.payload)?);
            }
            _ => {
                return Err(Violation::invalid_data(
                    "unexpected data item in Link Characteristics Request",
                ));
            }
        }
    }

    let mac = mac.ok_or_else(|| {
        Violation::invalid_data("Link Characteristics Request misses the MAC Address item")
    })?;

    Ok(LinkCharRequest { mac, requested })
}

/// Shared walk for Destination Up/Update: MAC + addresses + subnets +
/// metrics.
fn destination_body(
    walker: ItemWalker<'_>,
    policy: AddressPolicy,
) -> Result<(MacAddress, Vec<AddressItem>, Vec<SubnetItem>, MetricSet), Violation> {
    let mut seen = SeenItems::new();
    let mut mac = None;
    let mut addresses = Vec::new();
    let mut subnets = Vec::new();
    let mut metrics = MetricSet::default();

    for item in walker {
        let item = item?;
        let code = DataItemCode::from_u16(item.code)
            .ok_or_else(|| Violation::invalid_data("unknown data item in destination message"))?;

        if metric_item(code, item.payload, &mut seen, &mut metrics)? {
            continue;
        }

        match code {
            DataItemCode::MacAddress => {
                note_unique(&mut seen, code)?;
                mac = Some(items::parse_mac_address(item.payload)?);
            }
            DataItemCode::Ipv4Address | DataItemCode::Ipv6Address => {
                addresses.push(items::parse_address(code, item.payload, policy)?);
            }
            DataItemCode::Ipv4AttachedSubnet | DataItemCode::Ipv6AttachedSubnet => {
                subnets.push(items::parse_attached_subnet(code, item.payload, policy)?);
            }
            _ => {
                return Err(Violation::invalid_data(
                    "unexpected data item in destination message",
                ));
            }
        }
    }

    let mac =
        mac.ok_or_else(|| Violation::invalid_data("destination message misses the MAC Address"))?;
    Ok((mac, addresses, subnets, metrics))
}
