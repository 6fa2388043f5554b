// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Peer Offer signal validation (discovery phase).

use super::super::ids::{DataItemCode, SignalCode, StatusCode};
use super::super::items::{self, ConnectionPoint, SeenItems};
use super::{note_unique, signal_items, Violation};

/// Validated view of a Peer Offer signal.
#[derive(Debug)]
pub struct PeerOffer<'a> {
    /// Modem self-description, for the log line.
    pub peer_type: Option<&'a str>,
    /// A declining modem reports why; `None` means no Status item at all.
    pub status: Option<StatusCode>,
    /// Where the modem accepts the session TCP connection. At least one.
    pub connection_points: Vec<ConnectionPoint>,
}

impl PeerOffer<'_> {
    /// Whether the modem actually invites a connection.
    pub fn accepted(&self) -> bool {
        matches!(self.status, None | Some(StatusCode::Success))
    }
}

/// Check a Peer Offer signal.
///
/// Mandatory: at least one IPv4 or IPv6 Connection Point. Peer Type and
/// Status are optional and unique. Anything else in a discovery signal is a
/// violation.
pub fn check_peer_offer_signal(buf: &[u8]) -> Result<PeerOffer<'_>, Violation> {
    let walker = signal_items(buf, SignalCode::PeerOffer)?;

    let mut seen = SeenItems::new();
    let mut view = PeerOffer {
        peer_type: None,
        status: None,
        connection_points: Vec::new(),
    };

    for item in walker {
        let item = item?;
        match DataItemCode::from_u16(item.code) {
            Some(code @ (DataItemCode::Ipv4ConnectionPoint | DataItemCode::Ipv6ConnectionPoint)) => {
                view.connection_points
                    .push(items::parse_connection_point(code, item.payload)?);
            }
            Some(code @ DataItemCode::PeerType) => {
                note_unique(&mut seen, code)?;
                view.peer_type = Some(items::parse_peer_type(item.payload)?.text);
            }
            Some(code @ DataItemCode::Status) => {
                note_unique(&mut seen, code)?;
                let (status, _text) = items::parse_status(item.payload)?;
                view.status = Some(status);
            }
            Some(_) | None => {
                return Err(Violation::invalid_data(
                    "unexpected data item in Peer Offer signal",
                ));
            }
        }
    }

    if view.connection_points.is_empty() {
        return Err(Violation::invalid_data(
            "Peer Offer signal carries no connection point",
        ));
    }

    Ok(view)
}
