// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scripted transports over a manually advanced clock.
//!
//! The engine only observes time through its `Clock` and bytes through its
//! `Stream`/`Datagram`, so a script of (time, bytes) pairs plus a manual
//! clock replays any session timeline deterministically. Waiting advances
//! the clock instead of sleeping.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use dlep::transport::{Datagram, Stream};
use dlep::wire::{Clock, ManualClock};

/// One scripted event on the session stream.
pub enum StreamEvent {
    /// Bytes that become readable once the clock reaches `at_ms`.
    Frame { at_ms: u64, bytes: Vec<u8> },
    /// Orderly close once the clock reaches `at_ms`.
    Close { at_ms: u64 },
}

impl StreamEvent {
    fn at_ms(&self) -> u64 {
        match self {
            Self::Frame { at_ms, .. } | Self::Close { at_ms } => *at_ms,
        }
    }
}

/// A frame the engine sent, stamped with the virtual send time.
#[derive(Debug, Clone)]
pub struct SentFrame {
    pub at_ms: u64,
    pub bytes: Vec<u8>,
}

impl SentFrame {
    /// The u16 message id in the frame header.
    pub fn message_id(&self) -> u16 {
        (u16::from(self.bytes[0]) << 8) | u16::from(self.bytes[1])
    }

    /// The last payload byte; the status code in MAC+Status responses.
    pub fn last_byte(&self) -> u8 {
        *self.bytes.last().unwrap()
    }
}

/// Scripted session stream. Reading drains due events; waiting advances
/// the shared clock.
pub struct SimStream {
    clock: Rc<ManualClock>,
    script: VecDeque<StreamEvent>,
    pending: VecDeque<u8>,
    closed: bool,
    sent: Rc<RefCell<Vec<SentFrame>>>,
}

impl SimStream {
    pub fn new(clock: Rc<ManualClock>, script: Vec<StreamEvent>) -> Self {
        Self {
            clock,
            script: script.into(),
            pending: VecDeque::new(),
            closed: false,
            sent: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Shared handle to everything the engine sends.
    pub fn sent_handle(&self) -> Rc<RefCell<Vec<SentFrame>>> {
        Rc::clone(&self.sent)
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().as_millis()
    }

    /// Move every event due at the current clock into the byte queue.
    fn absorb_due_events(&mut self) {
        while let Some(event) = self.script.front() {
            if event.at_ms() > self.now_ms() {
                break;
            }
            match self.script.pop_front().unwrap() {
                StreamEvent::Frame { bytes, .. } => self.pending.extend(bytes),
                StreamEvent::Close { .. } => self.closed = true,
            }
        }
    }
}

impl Stream for SimStream {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let at_ms = self.now_ms();
        self.sent.borrow_mut().push(SentFrame {
            at_ms,
            bytes: frame.to_vec(),
        });
        Ok(())
    }

    fn recv_with_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<usize>> {
        self.absorb_due_events();

        if self.pending.is_empty() && !self.closed {
            // Nothing ready: advance the clock to the next event inside the
            // window, or burn the whole window
            let timeout_ms = (timeout.as_millis() as u64).max(1);
            let window_end = self.now_ms() + timeout_ms;
            match self.script.front().map(StreamEvent::at_ms) {
                Some(at_ms) if at_ms <= window_end => {
                    self.clock.advance_millis(at_ms - self.now_ms());
                    self.absorb_due_events();
                }
                _ => {
                    self.clock.advance_millis(timeout_ms);
                    return Ok(None);
                }
            }
        }

        if !self.pending.is_empty() {
            let mut copied = 0;
            while copied < buf.len() {
                match self.pending.pop_front() {
                    Some(byte) => {
                        buf[copied] = byte;
                        copied += 1;
                    }
                    None => break,
                }
            }
            return Ok(Some(copied));
        }

        if self.closed {
            return Ok(Some(0));
        }

        Ok(None)
    }
}

/// One scripted datagram arrival.
pub struct DatagramEvent {
    pub at_ms: u64,
    pub bytes: Vec<u8>,
    pub from: SocketAddr,
}

/// A probe the discovery loop sent, stamped with the virtual send time.
#[derive(Debug, Clone)]
pub struct SentDatagram {
    pub at_ms: u64,
    pub bytes: Vec<u8>,
    pub target: SocketAddr,
}

/// Scripted discovery socket.
pub struct SimDatagram {
    clock: Rc<ManualClock>,
    script: VecDeque<DatagramEvent>,
    sent: Rc<RefCell<Vec<SentDatagram>>>,
}

impl SimDatagram {
    pub fn new(clock: Rc<ManualClock>, script: Vec<DatagramEvent>) -> Self {
        Self {
            clock,
            script: script.into(),
            sent: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn sent_handle(&self) -> Rc<RefCell<Vec<SentDatagram>>> {
        Rc::clone(&self.sent)
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().as_millis()
    }
}

impl Datagram for SimDatagram {
    fn send_to(&mut self, frame: &[u8], target: SocketAddr) -> io::Result<()> {
        let at_ms = self.now_ms();
        self.sent.borrow_mut().push(SentDatagram {
            at_ms,
            bytes: frame.to_vec(),
            target,
        });
        Ok(())
    }

    fn recv_with_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<(usize, SocketAddr)>> {
        let timeout_ms = (timeout.as_millis() as u64).max(1);
        let window_end = self.now_ms() + timeout_ms;

        match self.script.front() {
            Some(event) if event.at_ms <= window_end => {
                let event = self.script.pop_front().unwrap();
                if event.at_ms > self.now_ms() {
                    self.clock.advance_millis(event.at_ms - self.now_ms());
                }
                let n = event.bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&event.bytes[..n]);
                Ok(Some((n, event.from)))
            }
            _ => {
                self.clock.advance_millis(timeout_ms);
                Ok(None)
            }
        }
    }
}
