// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session engine scenarios on a scripted stream and a manual clock.
//!
//! Each test replays one modem timeline and asserts on the frames the
//! engine sent, their virtual send times, and the session outcome.

mod common;

use std::net::SocketAddr;
use std::rc::Rc;

use common::{DatagramEvent, SentFrame, SimDatagram, SimStream, StreamEvent};
use dlep::protocol::build::testing;
use dlep::protocol::{MessageCode, StatusCode};
use dlep::session::{discover, Engine, SessionOutcome};
use dlep::wire::{Clock, ManualClock};

const MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];

fn frame(at_ms: u64, bytes: Vec<u8>) -> StreamEvent {
    StreamEvent::Frame { at_ms, bytes }
}

/// Run one engine over a scripted stream; returns the outcome, every frame
/// sent, and the virtual time when the session ended.
fn run_engine(script: Vec<StreamEvent>, router_hb_ms: u32) -> (SessionOutcome, Vec<SentFrame>, u64) {
    let clock = Rc::new(ManualClock::new());
    let stream = SimStream::new(Rc::clone(&clock), script);
    let sent = stream.sent_handle();
    let outcome = Engine::new(stream, clock.as_ref(), router_hb_ms).run();
    let frames = sent.borrow().clone();
    let ended_ms = clock.now().as_millis();
    (outcome, frames, ended_ms)
}

fn ids(frames: &[SentFrame]) -> Vec<u16> {
    frames.iter().map(SentFrame::message_id).collect()
}

// =======================================================================
// Scenario 1: discovery happy path
// =======================================================================

#[test]
fn test_discovery_retries_until_offer_arrives() {
    let clock = Rc::new(ManualClock::new());
    let from: SocketAddr = "10.0.0.1:30000".parse().unwrap();
    let offer = testing::build_peer_offer_v4([10, 0, 0, 1], Some(854), Some("sat-modem"));
    let mut socket = SimDatagram::new(
        Rc::clone(&clock),
        vec![DatagramEvent {
            at_ms: 6_500,
            bytes: offer,
            from,
        }],
    );
    let sent = socket.sent_handle();

    let group: SocketAddr = "224.0.0.117:854".parse().unwrap();
    let peer = discover(&mut socket, group, false, 0, clock.as_ref()).unwrap();

    assert_eq!(peer.address, "10.0.0.1:854".parse().unwrap());
    assert_eq!(peer.peer_type.as_deref(), Some("sat-modem"));

    // One Peer Discovery probe per 3-second retry window until the offer
    let sent = sent.borrow();
    let times: Vec<u64> = sent.iter().map(|d| d.at_ms).collect();
    assert_eq!(times, vec![0, 3_000, 6_000]);
    for probe in sent.iter() {
        assert_eq!(probe.target, group);
        assert_eq!(&probe.bytes[..4], b"DLEP");
    }
}

#[test]
fn test_discovery_ignores_declined_offer() {
    let clock = Rc::new(ManualClock::new());
    let from: SocketAddr = "10.0.0.1:30000".parse().unwrap();
    let declined = testing::build_peer_offer_declined([10, 0, 0, 1], StatusCode::NotInterested);
    let accepted = testing::build_peer_offer_v4([10, 0, 0, 2], None, None);
    let mut socket = SimDatagram::new(
        Rc::clone(&clock),
        vec![
            DatagramEvent {
                at_ms: 500,
                bytes: declined,
                from,
            },
            DatagramEvent {
                at_ms: 1_000,
                bytes: accepted,
                from,
            },
        ],
    );

    let group: SocketAddr = "224.0.0.117:854".parse().unwrap();
    let peer = discover(&mut socket, group, false, 0, clock.as_ref()).unwrap();

    // The declining modem is skipped; the second offer wins, default port
    assert_eq!(peer.address, "10.0.0.2:854".parse().unwrap());
}

// =======================================================================
// Scenario 2: Session Initialization Response missing Latency
// =======================================================================

#[test]
fn test_init_resp_missing_latency_terminates_with_invalid_data() {
    let bad = testing::build_session_init_resp_without(
        StatusCode::Success,
        1_000,
        dlep::protocol::DataItemCode::Latency,
    );
    let (outcome, sent, _) = run_engine(vec![frame(100, bad)], 30_000);

    assert!(matches!(outcome, SessionOutcome::Fatal(_)));
    assert_eq!(
        ids(&sent),
        vec![
            MessageCode::SessionInit.code(),
            MessageCode::SessionTerm.code()
        ]
    );
    assert_eq!(sent[1].last_byte(), StatusCode::InvalidData.code());
}

// =======================================================================
// Scenario 3: destination lifecycle
// =======================================================================

#[test]
fn test_destination_up_update_down_lifecycle() {
    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        frame(200, testing::build_destination_up(MAC, Some([10, 0, 0, 9]))),
        frame(
            300,
            testing::build_destination_update(MAC, Some(50_000_000), Some(5_000_000)),
        ),
        frame(400, testing::build_destination_down(MAC)),
        frame(500, testing::build_session_term(StatusCode::Shutdown)),
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Graceful));
    assert_eq!(
        ids(&sent),
        vec![
            MessageCode::SessionInit.code(),
            MessageCode::DestinationUpResp.code(),
            MessageCode::DestinationDownResp.code(),
            MessageCode::SessionTermResp.code(),
        ]
    );
    // Both responses succeed and answer immediately
    assert_eq!(sent[1].last_byte(), StatusCode::Success.code());
    assert_eq!(sent[1].at_ms, 200);
    assert_eq!(sent[2].last_byte(), StatusCode::Success.code());
    assert_eq!(sent[2].at_ms, 400);
}

#[test]
fn test_duplicate_destination_up_answered_inconsistent() {
    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        frame(200, testing::build_destination_up(MAC, Some([10, 0, 0, 9]))),
        frame(300, testing::build_destination_up(MAC, Some([10, 0, 0, 9]))),
        frame(400, testing::build_session_term(StatusCode::Shutdown)),
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    // Soft error: the table keeps the first entry, the session survives
    assert!(matches!(outcome, SessionOutcome::Graceful));
    assert_eq!(
        ids(&sent),
        vec![
            MessageCode::SessionInit.code(),
            MessageCode::DestinationUpResp.code(),
            MessageCode::DestinationUpResp.code(),
            MessageCode::SessionTermResp.code(),
        ]
    );
    assert_eq!(sent[1].last_byte(), StatusCode::Success.code());
    assert_eq!(sent[2].last_byte(), StatusCode::Inconsistent.code());
}

#[test]
fn test_destination_down_unknown_mac_is_hard() {
    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        frame(200, testing::build_destination_down(MAC)),
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Fatal(_)));
    assert_eq!(sent.last().unwrap().message_id(), MessageCode::SessionTerm.code());
    assert_eq!(
        sent.last().unwrap().last_byte(),
        StatusCode::InvalidDestination.code()
    );
}

// =======================================================================
// Scenario 4: modem heartbeat timeout
// =======================================================================

#[test]
fn test_modem_heartbeat_timeout() {
    // Init negotiates a 1000 ms modem interval, then the modem goes silent
    let script = vec![frame(
        100,
        testing::build_session_init_resp(StatusCode::Success, 1_000),
    )];
    let (outcome, sent, ended_ms) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Retryable(_)));
    assert_eq!(
        ids(&sent),
        vec![
            MessageCode::SessionInit.code(),
            MessageCode::SessionTerm.code()
        ]
    );
    // Lost exactly two intervals after the last frame (100 + 2 * 1000)
    assert_eq!(sent[1].at_ms, 2_100);
    assert_eq!(sent[1].last_byte(), StatusCode::TimedOut.code());
    // Then the engine drained for 4 more intervals before closing
    assert_eq!(ended_ms, 6_100);
}

#[test]
fn test_heartbeat_cadence_one_per_interval() {
    // Router heartbeats every second; the modem ends the session at 4.5 s
    let script = vec![
        frame(0, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        frame(4_500, testing::build_session_term(StatusCode::Shutdown)),
    ];
    let (outcome, sent, _) = run_engine(script, 1_000);

    assert!(matches!(outcome, SessionOutcome::Graceful));
    let heartbeats: Vec<&SentFrame> = sent
        .iter()
        .filter(|f| f.message_id() == MessageCode::Heartbeat.code())
        .collect();
    let times: Vec<u64> = heartbeats.iter().map(|f| f.at_ms).collect();
    assert_eq!(times, vec![1_000, 2_000, 3_000, 4_000]);
}

// =======================================================================
// Scenario 5: Link Characteristics Request is denied
// =======================================================================

#[test]
fn test_link_char_request_denied_session_survives() {
    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        frame(200, testing::build_destination_up(MAC, Some([10, 0, 0, 9]))),
        frame(300, testing::build_link_char_request(MAC, Some(5_000_000))),
        frame(400, testing::build_session_term(StatusCode::Shutdown)),
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    // The denial is a response, not a termination: the session kept going
    assert!(matches!(outcome, SessionOutcome::Graceful));
    assert_eq!(
        ids(&sent),
        vec![
            MessageCode::SessionInit.code(),
            MessageCode::DestinationUpResp.code(),
            MessageCode::LinkCharResponse.code(),
            MessageCode::SessionTermResp.code(),
        ]
    );
    assert_eq!(sent[2].last_byte(), StatusCode::RequestDenied.code());
}

// =======================================================================
// Scenario 6: trailing garbage inside a declared frame
// =======================================================================

#[test]
fn test_trailing_garbage_terminates_with_invalid_data() {
    let mut bad = testing::build_destination_up(MAC, Some([10, 0, 0, 9]));
    bad.extend_from_slice(&[0xDE, 0xAD, 0xBE]);
    let declared = (bad.len() - 4) as u16;
    bad[2] = (declared >> 8) as u8;
    bad[3] = (declared & 0xFF) as u8;

    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        frame(200, bad),
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Fatal(_)));
    assert_eq!(sent.last().unwrap().message_id(), MessageCode::SessionTerm.code());
    assert_eq!(sent.last().unwrap().last_byte(), StatusCode::InvalidData.code());
}

// =======================================================================
// Session-level behaviours
// =======================================================================

#[test]
fn test_session_update_acknowledged() {
    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        frame(
            200,
            testing::build_session_update(Some([10, 0, 0, 7]), Some(1_000_000), Some(1280)),
        ),
        frame(300, testing::build_session_term(StatusCode::Shutdown)),
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Graceful));
    assert_eq!(
        ids(&sent),
        vec![
            MessageCode::SessionInit.code(),
            MessageCode::SessionUpdateResp.code(),
            MessageCode::SessionTermResp.code(),
        ]
    );
    assert_eq!(sent[1].last_byte(), StatusCode::Success.code());
}

#[test]
fn test_modem_refusal_is_retryable() {
    let script = vec![frame(
        100,
        testing::build_session_init_resp(StatusCode::NotInterested, 1_000),
    )];
    let (outcome, sent, _) = run_engine(script, 30_000);

    // A polite refusal is not a protocol violation: no termination message
    assert!(matches!(outcome, SessionOutcome::Retryable(_)));
    assert_eq!(ids(&sent), vec![MessageCode::SessionInit.code()]);
}

#[test]
fn test_unexpected_message_in_session() {
    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        frame(200, testing::build_session_init_resp(StatusCode::Success, 60_000)),
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Fatal(_)));
    assert_eq!(
        sent.last().unwrap().last_byte(),
        StatusCode::UnexpectedMessage.code()
    );
}

#[test]
fn test_unknown_message_id_in_session() {
    let mut bogus = testing::build_bare_message(MessageCode::Heartbeat);
    bogus[0] = 0x03;
    bogus[1] = 0xE7; // message id 999

    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        frame(200, bogus),
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Fatal(_)));
    assert_eq!(
        sent.last().unwrap().last_byte(),
        StatusCode::UnknownMessage.code()
    );
}

#[test]
fn test_modem_disconnect_is_retryable() {
    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 60_000)),
        StreamEvent::Close { at_ms: 200 },
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Retryable(_)));
    // No termination handshake is possible on a dead socket
    assert_eq!(ids(&sent), vec![MessageCode::SessionInit.code()]);
}

#[test]
fn test_terminating_ignores_late_updates() {
    // Silence triggers the timeout; the modem then sends a late update
    // before acknowledging the termination
    let script = vec![
        frame(100, testing::build_session_init_resp(StatusCode::Success, 1_000)),
        frame(2_500, testing::build_destination_up(MAC, None)),
        frame(3_000, testing::build_session_term_resp()),
    ];
    let (outcome, sent, ended_ms) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Retryable(_)));
    // The late Destination Up was not answered
    assert_eq!(
        ids(&sent),
        vec![
            MessageCode::SessionInit.code(),
            MessageCode::SessionTerm.code()
        ]
    );
    // And the drain ended at the response, well before the 4-interval bound
    assert_eq!(ended_ms, 3_000);
}

#[test]
fn test_heartbeats_keep_modem_alive() {
    // The modem heartbeats every second; the router must not declare it
    // lost while they keep arriving
    let script = vec![
        frame(0, testing::build_session_init_resp(StatusCode::Success, 1_000)),
        frame(900, dlep::protocol::build::build_heartbeat()),
        frame(1_800, dlep::protocol::build::build_heartbeat()),
        frame(2_700, dlep::protocol::build::build_heartbeat()),
        frame(3_000, testing::build_session_term(StatusCode::Shutdown)),
    ];
    let (outcome, sent, _) = run_engine(script, 30_000);

    assert!(matches!(outcome, SessionOutcome::Graceful));
    // No Session Termination from our side
    assert!(ids(&sent)
        .iter()
        .all(|&id| id != MessageCode::SessionTerm.code()));
}
