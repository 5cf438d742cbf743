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

//! Sample dump files: one dump header followed by data packets

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::warn;
use crate::error::ValidationError;
use crate::protocol::*;

/// Largest sample the header can describe: 2^21 - 1 words of up to 4 packet bytes
pub const MAX_SAMPLE_WORDS: u64 = 0x1F_FFFF;
pub const MAX_BYTES_PER_WORD: u64 = 4;
pub const MAX_PACKETS: u64 =
    (MAX_SAMPLE_WORDS * MAX_BYTES_PER_WORD).div_ceil(PACKET_DATA_LENGTH as u64);
pub const MAX_FILE_SIZE: u64 = HEADER_LENGTH as u64 + MAX_PACKETS * PACKET_LENGTH as u64;

pub fn packet_count(file_size: u64) -> u32 {
    let payload = file_size.saturating_sub(HEADER_LENGTH as u64);
    u32::try_from(payload.div_ceil(PACKET_LENGTH as u64)).unwrap_or(u32::MAX)
}

pub fn file_size_within_limit(file_size: u64) -> bool {
    (HEADER_LENGTH as u64..=MAX_FILE_SIZE).contains(&file_size)
}

pub struct SdsFile<R> {
    reader: R,
    file_size: u64,
    packets_read: u32,
}

impl SdsFile<File> {
    pub fn open(path: &Path) -> io::Result<Self> {
        let with_path = |e: io::Error| io::Error::new(e.kind(), format!("{}: {}", path.display(), e));
        let file = File::open(path).map_err(with_path)?;
        let file_size = file.metadata().map_err(with_path)?.len();
        Ok(SdsFile::new(file, file_size))
    }
}

impl<R: Read> SdsFile<R> {
    pub fn new(reader: R, file_size: u64) -> Self {
        SdsFile {
            reader,
            file_size,
            packets_read: 0,
        }
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn packet_count(&self) -> u32 {
        packet_count(self.file_size)
    }

    pub fn check_size(&self) -> Result<(), ValidationError> {
        if file_size_within_limit(self.file_size) {
            Ok(())
        } else if self.file_size < HEADER_LENGTH as u64 {
            Err(ValidationError::FileTooSmall { size: self.file_size })
        } else {
            Err(ValidationError::FileTooLarge {
                size: self.file_size,
                max: MAX_FILE_SIZE,
            })
        }
    }

    /// Read the dump header; must come before any packet.
    pub fn header_template(&mut self) -> io::Result<DumpHeader> {
        let mut header = [0u8; HEADER_LENGTH];
        self.reader.read_exact(&mut header).map_err(|e| {
            io::Error::new(e.kind(), format!("reading dump header: {}", e))
        })?;
        if header[0] != SYSEX_START || header[3] != DUMP_HEADER {
            warn!("File does not start with an SDS dump header: {}", hex(&header[..4]));
        }
        Ok(header)
    }

    pub fn next_packet(&mut self) -> io::Result<DataPacket> {
        let mut packet = [0u8; PACKET_LENGTH];
        self.reader.read_exact(&mut packet).map_err(|e| {
            io::Error::new(e.kind(), format!("reading packet {}: {}", self.packets_read, e))
        })?;
        if packet[0] != SYSEX_START || packet[3] != DATA_PACKET {
            warn!("Packet {} is not an SDS data packet: {}", self.packets_read, hex(&packet[..4]));
        }
        self.packets_read += 1;
        Ok(packet)
    }
}
