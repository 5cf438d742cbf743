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

//! Transfer progress reporting and cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use crate::protocol::{self, DumpHeader, HeaderInfo};
use crate::response::Response;

/// Shared flag checked by the sender between handshake attempts and packets
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub handshake_attempts: u32,
    pub packets_sent: u32,
    pub bytes_sent: u64,
}

/// One packet's round trip. `response` is `None` when the receiver timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketProgress {
    pub index: u32,
    pub wire_number: u8,
    pub bytes_sent: usize,
    pub response: Option<Response>,
}

pub trait TransferObserver {
    fn header_sent(&mut self, _header: &DumpHeader) {}

    /// Called after every handshake response attempt, `None` on timeout
    fn handshake_response(&mut self, _attempt: u32, _response: Option<Response>) {}

    fn packet(&mut self, _progress: &PacketProgress) {}
}

/// Reports progress through `tracing`
pub struct LogObserver {
    total_packets: u32,
}

impl LogObserver {
    pub fn new(total_packets: u32) -> Self {
        LogObserver { total_packets }
    }
}

impl TransferObserver for LogObserver {
    fn header_sent(&mut self, header: &DumpHeader) {
        info!("Sent dump header: {}", HeaderInfo::parse(header));
        debug!("Header bytes: {}", protocol::hex(header));
    }

    fn handshake_response(&mut self, attempt: u32, response: Option<Response>) {
        match response {
            Some(Response::Ack) => info!("Received ACK for dump header"),
            Some(r) => info!("Received {} for dump header (attempt {})", r, attempt),
            None => warn!("No response to dump header (attempt {})", attempt),
        }
    }

    fn packet(&mut self, progress: &PacketProgress) {
        match progress.response {
            Some(Response::Ack) => debug!(
                "Packet {}/{} (wire {}): {} bytes, ACK",
                progress.index + 1,
                self.total_packets,
                progress.wire_number,
                progress.bytes_sent
            ),
            Some(r) => warn!("Packet {} (wire {}): received {}", progress.index, progress.wire_number, r),
            None => warn!("Packet {} (wire {}): no response", progress.index, progress.wire_number),
        }

        let done = progress.index + 1;
        if progress.response == Some(Response::Ack)
            && (done % 128 == 0 || done == self.total_packets)
        {
            info!("{}/{} packets sent", done, self.total_packets);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
