// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP stream carrying the DLEP session.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use super::{clamp_timeout, is_timeout, Stream};

/// How long to wait for the TCP handshake to the modem.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The session's exclusive TCP connection. Dropping it closes the socket,
/// which covers every engine exit path.
pub struct SessionStream {
    stream: TcpStream,
    peer: SocketAddr,
}

impl SessionStream {
    /// Connect to the modem's session port.
    pub fn connect(peer: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&peer, CONNECT_TIMEOUT)?;
        // DLEP frames are small and latency-sensitive
        stream.set_nodelay(true).ok();
        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Stream for SessionStream {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame)
    }

    fn recv_with_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<usize>> {
        self.stream
            .set_read_timeout(Some(clamp_timeout(timeout)))?;
        match self.stream.read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e),
        }
    }
}
