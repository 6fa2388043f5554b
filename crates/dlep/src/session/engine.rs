// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The in-session state machine.
//!
//! One engine drives one TCP session: initialization exchange, the steady
//! receive/dispatch loop, heartbeat emission, modem liveness tracking and
//! the termination drain. Single-threaded throughout; timers are implicit,
//! recomputed from `last_sent` / `last_recv` before every wait.

use std::cmp::Ordering;
use std::io;
use std::time::Duration;

use crate::config::{
    DEFAULT_HEARTBEAT_MS, INIT_RESP_INTERVALS, PEER_LOSS_INTERVALS, TERM_DRAIN_INTERVALS,
};
use crate::protocol::check::{
    check_destination_down_message, check_destination_up_message,
    check_destination_update_message, check_heartbeat_message, check_link_char_request_message,
    check_session_init_resp_message, check_session_term_message, check_session_update_message,
    DestinationDown, DestinationUp, DestinationUpdate, LinkCharRequest, SessionUpdate,
};
use crate::protocol::items::MetricSet;
use crate::protocol::{build, MessageCode, StatusCode, Violation, MESSAGE_HEADER_LEN};
use crate::session::destinations::{AddressSet, DestinationTable};
use crate::session::SessionOutcome;
use crate::transport::Stream;
use crate::wire::{self, interval_elapsed, Clock, Timestamp};

/// Grace period to finish a frame once its first bytes have arrived. A
/// modem that stalls mid-frame is treated as disconnected.
const FRAME_COMPLETION_TIMEOUT: Duration = Duration::from_secs(5);

/// What one bounded read produced.
enum ReadEvent {
    /// A whole frame, header included.
    Frame(Vec<u8>),
    /// The timeout passed with no bytes at all; a timer tick.
    TimedOut,
    /// Orderly close, or a frame cut short.
    Disconnected,
}

/// Result of finishing a partially read buffer.
enum Fill {
    Done,
    Short,
}

/// Session engine over an established stream.
///
/// `run` drives the session to completion and reports how it ended. The
/// stream is owned exclusively and released when the engine returns, on
/// every path.
pub struct Engine<'c, S: Stream, C: Clock> {
    stream: S,
    clock: &'c C,
    router_hb_ms: u64,
    /// Negotiated in the init exchange; the default applies until then.
    modem_hb_ms: u64,
    last_sent: Timestamp,
    last_recv: Timestamp,
    destinations: DestinationTable,
    session_metrics: MetricSet,
    session_reach: AddressSet,
}

impl<'c, S: Stream, C: Clock> Engine<'c, S, C> {
    pub fn new(stream: S, clock: &'c C, router_hb_ms: u32) -> Self {
        let now = clock.now();
        Self {
            stream,
            clock,
            router_hb_ms: u64::from(router_hb_ms.max(1)),
            modem_hb_ms: u64::from(DEFAULT_HEARTBEAT_MS),
            last_sent: now,
            last_recv: now,
            destinations: DestinationTable::new(),
            session_metrics: MetricSet::default(),
            session_reach: AddressSet::new(),
        }
    }

    /// Drive the session from Session Initialization to its end.
    pub fn run(mut self) -> SessionOutcome {
        if let Err(outcome) = self.initialise() {
            return outcome;
        }
        self.steady_loop()
    }

    // ===================================================================
    // Initialising
    // ===================================================================

    fn initialise(&mut self) -> Result<(), SessionOutcome> {
        let init = build::build_session_init(self.router_hb_ms as u32);
        self.send_or_fail(&init, "Session Initialization")?;
        log::info!(
            "[session] sent Session Initialization, heartbeat interval {} ms",
            self.router_hb_ms
        );

        let wait_ms = INIT_RESP_INTERVALS * self.router_hb_ms;
        let start = self.clock.now();
        loop {
            let waited = self.clock.now().millis_since(start);
            if waited >= wait_ms {
                return Err(SessionOutcome::Retryable(
                    "timed out waiting for Session Initialization Response".into(),
                ));
            }
            match self.read_frame(Duration::from_millis(wait_ms - waited)) {
                Ok(ReadEvent::TimedOut) => continue,
                Ok(ReadEvent::Disconnected) => {
                    return Err(SessionOutcome::Retryable(
                        "modem closed the session during initialization".into(),
                    ))
                }
                Ok(ReadEvent::Frame(frame)) => {
                    self.last_recv = self.clock.now();
                    return self.handle_init_resp(&frame);
                }
                Err(e) => {
                    return Err(SessionOutcome::Retryable(format!(
                        "session socket error: {}",
                        e
                    )))
                }
            }
        }
    }

    fn handle_init_resp(&mut self, frame: &[u8]) -> Result<(), SessionOutcome> {
        let resp = match check_session_init_resp_message(frame) {
            Ok(resp) => resp,
            Err(violation) => return Err(self.violation(violation)),
        };

        if resp.status != StatusCode::Success {
            log::warn!(
                "[session] modem refused the session: {}{}",
                resp.status,
                resp.status_text
                    .map(|t| format!(" ({})", t))
                    .unwrap_or_default()
            );
            return Err(SessionOutcome::Retryable(format!(
                "modem refused the session: {}",
                resp.status
            )));
        }

        self.modem_hb_ms = u64::from(resp.heartbeat_interval_ms);
        self.session_metrics = resp.metrics;
        for item in &resp.addresses {
            self.session_reach.apply_address(item);
        }
        for item in &resp.subnets {
            self.session_reach.apply_subnet(item);
        }

        if !resp.extensions.is_empty() {
            log::info!(
                "[session] modem proposes {} extension(s); none supported, continuing with the base protocol",
                resp.extensions.len()
            );
        }

        log::info!(
            "[session] in session with {} modem \"{}\", heartbeat {} ms, metrics {}",
            if resp.secured_medium {
                "secured"
            } else {
                "unsecured"
            },
            resp.peer_type,
            self.modem_hb_ms,
            self.session_metrics
        );

        Ok(())
    }

    // ===================================================================
    // InSession
    // ===================================================================

    fn steady_loop(&mut self) -> SessionOutcome {
        loop {
            let now = self.clock.now();

            // Two missed modem intervals mean the modem is gone
            if interval_elapsed(self.last_recv, now, PEER_LOSS_INTERVALS * self.modem_hb_ms)
                != Ordering::Less
            {
                log::warn!(
                    "[session] nothing from the modem for {} ms, declaring it lost",
                    now.millis_since(self.last_recv)
                );
                return self.terminate(
                    StatusCode::TimedOut,
                    SessionOutcome::Retryable("modem heartbeat timeout".into()),
                );
            }

            if interval_elapsed(self.last_sent, now, self.router_hb_ms) != Ordering::Less {
                let heartbeat = build::build_heartbeat();
                if let Err(outcome) = self.send_or_fail(&heartbeat, "Heartbeat") {
                    return outcome;
                }
                log::debug!("[session] heartbeat sent");
            }

            let timeout = self.next_wakeup(self.clock.now());
            match self.read_frame(timeout) {
                Ok(ReadEvent::TimedOut) => continue,
                Ok(ReadEvent::Disconnected) => {
                    return SessionOutcome::Retryable("modem closed the session".into())
                }
                Ok(ReadEvent::Frame(frame)) => {
                    self.last_recv = self.clock.now();
                    if let Some(outcome) = self.dispatch(&frame) {
                        return outcome;
                    }
                }
                Err(e) => {
                    return SessionOutcome::Retryable(format!("session socket error: {}", e))
                }
            }
        }
    }

    /// Sleep until the earlier of the next heartbeat send and the modem
    /// loss deadline, so neither timer can miss.
    fn next_wakeup(&self, now: Timestamp) -> Duration {
        let now_ms = now.as_millis();
        let hb_deadline = self.last_sent.as_millis() + self.router_hb_ms;
        let loss_deadline =
            self.last_recv.as_millis() + PEER_LOSS_INTERVALS * self.modem_hb_ms;
        let next = hb_deadline.min(loss_deadline);
        Duration::from_millis(next.saturating_sub(now_ms).max(1))
    }

    /// React to one whole inbound frame. `Some` ends the session.
    fn dispatch(&mut self, frame: &[u8]) -> Option<SessionOutcome> {
        let raw_id = wire::read_u16(frame);
        let Some(code) = MessageCode::from_u16(raw_id) else {
            log::warn!("[session] unknown message id {} from modem", raw_id);
            return Some(self.terminate(
                StatusCode::UnknownMessage,
                SessionOutcome::Fatal(format!("unknown message id {} from modem", raw_id)),
            ));
        };

        match code {
            MessageCode::Heartbeat => match check_heartbeat_message(frame) {
                Ok(()) => {
                    log::debug!("[session] heartbeat from modem");
                    None
                }
                Err(violation) => Some(self.violation(violation)),
            },

            MessageCode::SessionUpdate => match check_session_update_message(frame) {
                Ok(update) => self.on_session_update(update),
                Err(violation) => Some(self.violation(violation)),
            },

            MessageCode::SessionTerm => match check_session_term_message(frame) {
                Ok(term) => {
                    log::info!(
                        "[session] modem terminated the session: {}{}",
                        term.status,
                        term.status_text
                            .map(|t| format!(" ({})", t))
                            .unwrap_or_default()
                    );
                    let resp = build::build_session_term_resp();
                    if let Err(e) = self.send(&resp) {
                        log::debug!("[session] could not acknowledge the termination: {}", e);
                    }
                    Some(SessionOutcome::Graceful)
                }
                Err(violation) => Some(self.violation(violation)),
            },

            MessageCode::DestinationUp => match check_destination_up_message(frame) {
                Ok(up) => self.on_destination_up(up),
                Err(violation) => Some(self.violation(violation)),
            },

            MessageCode::DestinationUpdate => match check_destination_update_message(frame) {
                Ok(update) => self.on_destination_update(update),
                Err(violation) => Some(self.violation(violation)),
            },

            MessageCode::DestinationDown => match check_destination_down_message(frame) {
                Ok(down) => self.on_destination_down(down),
                Err(violation) => Some(self.violation(violation)),
            },

            MessageCode::LinkCharRequest => match check_link_char_request_message(frame) {
                Ok(request) => self.on_link_char_request(request),
                Err(violation) => Some(self.violation(violation)),
            },

            // The modem must not send these in an established session
            MessageCode::SessionInit
            | MessageCode::SessionInitResp
            | MessageCode::SessionUpdateResp
            | MessageCode::SessionTermResp
            | MessageCode::DestinationUpResp
            | MessageCode::DestinationAnnounce
            | MessageCode::DestinationAnnounceResp
            | MessageCode::DestinationDownResp
            | MessageCode::LinkCharResponse => {
                log::warn!("[session] unexpected {} while in session", code);
                Some(self.terminate(
                    StatusCode::UnexpectedMessage,
                    SessionOutcome::Fatal(format!("unexpected {} while in session", code)),
                ))
            }
        }
    }

    fn on_session_update(&mut self, update: SessionUpdate) -> Option<SessionOutcome> {
        self.session_metrics.merge(&update.metrics);
        self.session_reach
            .apply_all(&update.addresses, &update.subnets);
        log::info!(
            "[session] session update applied: metrics {} modem addresses {}",
            self.session_metrics,
            self.session_reach
        );
        let resp = build::build_session_update_resp(StatusCode::Success);
        if let Err(outcome) = self.send_or_fail(&resp, "Session Update Response") {
            return Some(outcome);
        }
        None
    }

    fn on_destination_up(&mut self, up: DestinationUp) -> Option<SessionOutcome> {
        if self.destinations.contains(&up.mac) {
            log::warn!("[session] Destination Up repeats known destination {}", up.mac);
            let resp = build::build_destination_up_resp(&up.mac, StatusCode::Inconsistent);
            if let Err(outcome) = self.send_or_fail(&resp, "Destination Up Response") {
                return Some(outcome);
            }
            return None;
        }

        let resp = build::build_destination_up_resp(&up.mac, StatusCode::Success);
        if let Err(outcome) = self.send_or_fail(&resp, "Destination Up Response") {
            return Some(outcome);
        }
        self.destinations
            .insert(up.mac, &up.addresses, &up.subnets, &up.metrics);
        if let Some(dest) = self.destinations.get(&up.mac) {
            log::info!(
                "[session] destination {} up, reach {} metrics {} ({} total)",
                up.mac,
                dest.reach,
                dest.metrics,
                self.destinations.len()
            );
        }
        None
    }

    fn on_destination_update(&mut self, update: DestinationUpdate) -> Option<SessionOutcome> {
        if !self
            .destinations
            .update(&update.mac, &update.addresses, &update.subnets, &update.metrics)
        {
            log::error!(
                "[session] Destination Update for unknown destination {}",
                update.mac
            );
            return Some(self.terminate(
                StatusCode::InvalidDestination,
                SessionOutcome::Fatal(format!(
                    "Destination Update for unknown destination {}",
                    update.mac
                )),
            ));
        }
        if let Some(dest) = self.destinations.get(&update.mac) {
            log::info!(
                "[session] destination {} updated, reach {} metrics {}",
                update.mac,
                dest.reach,
                dest.metrics
            );
        }
        None
    }

    fn on_destination_down(&mut self, down: DestinationDown) -> Option<SessionOutcome> {
        if !self.destinations.contains(&down.mac) {
            log::error!(
                "[session] Destination Down for unknown destination {}",
                down.mac
            );
            return Some(self.terminate(
                StatusCode::InvalidDestination,
                SessionOutcome::Fatal(format!(
                    "Destination Down for unknown destination {}",
                    down.mac
                )),
            ));
        }

        let resp = build::build_destination_down_resp(&down.mac, StatusCode::Success);
        if let Err(outcome) = self.send_or_fail(&resp, "Destination Down Response") {
            return Some(outcome);
        }
        self.destinations.remove(&down.mac);
        log::info!(
            "[session] destination {} down ({} remaining)",
            down.mac,
            self.destinations.len()
        );
        None
    }

    fn on_link_char_request(&mut self, request: LinkCharRequest) -> Option<SessionOutcome> {
        log::info!(
            "[session] denying Link Characteristics Request for {} (asked for {})",
            request.mac,
            request.requested
        );
        let resp = build::build_link_char_resp(&request.mac, StatusCode::RequestDenied);
        if let Err(outcome) = self.send_or_fail(&resp, "Link Characteristics Response") {
            return Some(outcome);
        }
        None
    }

    // ===================================================================
    // Terminating
    // ===================================================================

    /// A protocol violation from a validator; all of them are hard.
    fn violation(&mut self, violation: Violation) -> SessionOutcome {
        debug_assert!(violation.status.is_hard());
        log::error!("[session] protocol violation: {}", violation);
        self.terminate(
            violation.status,
            SessionOutcome::Fatal(format!("protocol violation: {}", violation)),
        )
    }

    /// Send Session Termination with `status`, drain until the response or
    /// a bounded wait expires, then report `outcome`.
    fn terminate(&mut self, status: StatusCode, outcome: SessionOutcome) -> SessionOutcome {
        log::info!("[session] terminating the session: {}", status);
        let term = build::build_session_term(status);
        if let Err(e) = self.send(&term) {
            log::debug!("[session] could not send Session Termination: {}", e);
            return outcome;
        }
        self.drain_term_resp();
        outcome
    }

    /// Keep reading until Session Termination Response arrives; late
    /// updates are ignored. The bound is looser than the in-session one.
    fn drain_term_resp(&mut self) {
        let bound_ms = TERM_DRAIN_INTERVALS * self.modem_hb_ms;
        let start = self.clock.now();
        loop {
            let waited = self.clock.now().millis_since(start);
            if waited >= bound_ms {
                log::debug!("[session] gave up waiting for Session Termination Response");
                return;
            }
            match self.read_frame(Duration::from_millis(bound_ms - waited)) {
                Ok(ReadEvent::Frame(frame)) => {
                    if wire::read_u16(&frame) == MessageCode::SessionTermResp.code() {
                        log::info!("[session] modem acknowledged the termination");
                        return;
                    }
                    log::debug!("[session] ignoring a late message while terminating");
                }
                Ok(ReadEvent::TimedOut) => continue,
                Ok(ReadEvent::Disconnected) | Err(_) => return,
            }
        }
    }

    // ===================================================================
    // Frame I/O
    // ===================================================================

    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.send(frame)?;
        self.last_sent = self.clock.now();
        Ok(())
    }

    fn send_or_fail(&mut self, frame: &[u8], what: &str) -> Result<(), SessionOutcome> {
        self.send(frame)
            .map_err(|e| SessionOutcome::Retryable(format!("failed to send {}: {}", what, e)))
    }

    /// Assemble one whole frame: the 4-byte header first, then the declared
    /// payload. A frame cut short is a modem disconnect.
    fn read_frame(&mut self, timeout: Duration) -> io::Result<ReadEvent> {
        let mut header = [0u8; MESSAGE_HEADER_LEN];

        // A quiet window here is just a timer tick
        let filled = match self.stream.recv_with_timeout(&mut header, timeout)? {
            None => return Ok(ReadEvent::TimedOut),
            Some(0) => return Ok(ReadEvent::Disconnected),
            Some(n) => n,
        };
        if filled < header.len() {
            if let Fill::Short = self.fill(&mut header[filled..], FRAME_COMPLETION_TIMEOUT)? {
                log::warn!("[session] frame header cut short, treating as disconnect");
                return Ok(ReadEvent::Disconnected);
            }
        }

        let declared = wire::read_u16(&header[2..]) as usize;
        let mut frame = vec![0u8; MESSAGE_HEADER_LEN + declared];
        frame[..MESSAGE_HEADER_LEN].copy_from_slice(&header);
        if declared > 0 {
            if let Fill::Short =
                self.fill(&mut frame[MESSAGE_HEADER_LEN..], FRAME_COMPLETION_TIMEOUT)?
            {
                log::warn!("[session] frame payload cut short, treating as disconnect");
                return Ok(ReadEvent::Disconnected);
            }
        }

        Ok(ReadEvent::Frame(frame))
    }

    /// Fill `buf` completely within `timeout`.
    fn fill(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Fill> {
        let total_ms = (timeout.as_millis() as u64).max(1);
        let start = self.clock.now();
        let mut filled = 0;
        while filled < buf.len() {
            let waited = self.clock.now().millis_since(start);
            if waited >= total_ms {
                return Ok(Fill::Short);
            }
            match self
                .stream
                .recv_with_timeout(&mut buf[filled..], Duration::from_millis(total_ms - waited))?
            {
                None => continue,
                Some(0) => return Ok(Fill::Short),
                Some(n) => filled += n,
            }
        }
        Ok(Fill::Done)
    }
}
