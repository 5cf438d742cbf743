// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Scanner for the receiver's 6-byte SDS handshake frames
//!
//! `F0 7E <channel> <status> <packet> F7`, where status is one of
//! WAIT, CANCEL, NAK or ACK. The scanner advances one state per matching
//! byte. Bytes that don't match are dropped and the scanner stays where it
//! is rather than restarting at `F0`, so a frame can be assembled from
//! bytes spread across unrelated traffic.

use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use crate::midi::MidiPort;
use crate::protocol::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Wait,
    Cancel,
    Nak,
    Ack,
}

impl Response {
    pub fn from_status(status: u8) -> Option<Self> {
        match status {
            WAIT => Some(Response::Wait),
            CANCEL => Some(Response::Cancel),
            NAK => Some(Response::Nak),
            ACK => Some(Response::Ack),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn status(self) -> u8 {
        match self {
            Response::Wait => WAIT,
            Response::Cancel => CANCEL,
            Response::Nak => NAK,
            Response::Ack => ACK,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Response::Wait => "WAIT",
            Response::Cancel => "CANCEL",
            Response::Nak => "NAK",
            Response::Ack => "ACK",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("MIDI read failed: {0}")]
    Transport(#[from] std::io::Error),
}

// ============================================================================
// Scanner
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    SubId,
    Channel,
    Status,
    PacketNumber(Response),
    End(Response),
}

#[derive(Debug, Clone)]
pub struct ResponseScanner {
    channel: u8,
    packet_number: u8,
    state: ScanState,
}

impl ResponseScanner {
    pub fn new(channel: u8, packet_number: u8) -> Self {
        ResponseScanner {
            channel,
            packet_number,
            state: ScanState::Start,
        }
    }

    /// Feed one byte; returns the response once the closing `F7` is seen.
    pub fn push(&mut self, byte: u8) -> Option<Response> {
        self.state = match (self.state, byte) {
            (ScanState::Start, SYSEX_START) => ScanState::SubId,
            (ScanState::SubId, NON_REALTIME) => ScanState::Channel,
            (ScanState::Channel, b) if b == self.channel => ScanState::Status,
            (ScanState::Status, b) => match Response::from_status(b) {
                Some(response) => ScanState::PacketNumber(response),
                None => ScanState::Status,
            },
            (ScanState::PacketNumber(r), b) if b == self.packet_number => ScanState::End(r),
            (ScanState::End(r), EOX) => {
                self.state = ScanState::Start;
                return Some(r);
            }
            (state, _) => state,
        };
        None
    }

    /// Number of frame bytes matched so far
    #[cfg(test)]
    pub fn matched(&self) -> usize {
        match self.state {
            ScanState::Start => 0,
            ScanState::SubId => 1,
            ScanState::Channel => 2,
            ScanState::Status => 3,
            ScanState::PacketNumber(_) => 4,
            ScanState::End(_) => 5,
        }
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Wait for one response frame addressed to `channel` and `packet_number`.
///
/// The window is measured from the start of the call. It is checked after
/// every byte and also handed to the port, so links with a native read
/// timeout give up while idle; links without one only time out once some
/// byte arrives late.
pub fn decode(
    port: &mut dyn MidiPort,
    channel: u8,
    packet_number: u8,
    timeout: Duration,
) -> Result<Response, DecodeError> {
    let start = Instant::now();
    let mut scanner = ResponseScanner::new(channel, packet_number);

    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        let byte = match port.read_byte(remaining)? {
            Some(byte) => byte,
            None => return Err(DecodeError::Timeout(timeout)),
        };

        if start.elapsed() > timeout {
            return Err(DecodeError::Timeout(timeout));
        }

        if let Some(response) = scanner.push(byte) {
            return Ok(response);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
