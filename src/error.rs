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

//! Error types for the sample dump sender

use std::time::Duration;
use thiserror::Error;
use crate::response::Response;

/// Problems caught before any MIDI traffic
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid number: {0:?}")]
    NotANumber(String),

    #[error("channel number {0} out of range (0-127)")]
    ChannelOutOfRange(u32),

    #[error("sample number {0} out of range (0-16383)")]
    SampleOutOfRange(u32),

    #[error("file is {size} bytes, too small to hold a 21-byte dump header")]
    FileTooSmall { size: u64 },

    #[error("file is {size} bytes, larger than the {max}-byte SDS maximum")]
    FileTooLarge { size: u64, max: u64 },
}

#[derive(Debug, Error)]
pub enum SdsError {
    /// Send or read failure on the MIDI link
    #[error("MIDI transport error (in state: {stage}): {source}")]
    Transport {
        stage: &'static str,
        source: std::io::Error,
    },

    /// Sample file open or read failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no response to packet {index} within {timeout:?}")]
    Timeout { index: u32, timeout: Duration },

    #[error("received {response} instead of ACK in response to packet {index}")]
    Rejected { index: u32, response: Response },

    #[error("dump header rejected with {0}")]
    HeaderRejected(Response),

    #[error("no ACK for dump header after {0} attempts")]
    HandshakeExhausted(u32),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("transfer cancelled")]
    Cancelled,
}
