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

//! MIDI Sample Dump Standard constants and wire helpers

use std::fmt;
use std::fmt::Write;

/// System exclusive start
pub const SYSEX_START: u8 = 0xF0;

/// Non-realtime universal sysex sub-id
pub const NON_REALTIME: u8 = 0x7E;

/// End of exclusive
pub const EOX: u8 = 0xF7;

/// Dump header message type
pub const DUMP_HEADER: u8 = 0x01;

/// Data packet message type
pub const DATA_PACKET: u8 = 0x02;

/// Wait - receiver is busy, hold off until the next response
pub const WAIT: u8 = 0x7C;

/// Cancel - receiver aborts the dump
pub const CANCEL: u8 = 0x7D;

/// NAK - receiver rejects the last message
pub const NAK: u8 = 0x7E;

/// ACK - receiver accepts the last message
pub const ACK: u8 = 0x7F;

pub const HEADER_LENGTH: usize = 21;
pub const PACKET_LENGTH: usize = 127;
pub const PACKET_DATA_LENGTH: usize = 120;
#[cfg(test)]
pub const RESPONSE_LENGTH: usize = 6;

pub const CHANNEL_OFFSET: usize = 2;
pub const SAMPLE_LSB_OFFSET: usize = 4;
pub const SAMPLE_MSB_OFFSET: usize = 5;
pub const PACKET_NUMBER_OFFSET: usize = 4;
pub const PACKET_DATA_OFFSET: usize = 5;
pub const CHECKSUM_OFFSET: usize = PACKET_DATA_OFFSET + PACKET_DATA_LENGTH;

pub const MAX_CHANNEL: u8 = 0x7F;
pub const MAX_SAMPLE: u16 = 0x3FFF;

/// Packet numbers on the wire are a 7-bit counter
pub const WIRE_PACKET_MODULUS: u32 = 0x80;

pub type DumpHeader = [u8; HEADER_LENGTH];
pub type DataPacket = [u8; PACKET_LENGTH];

// ============================================================================
// Wire Helpers
// ============================================================================

/// Copy a dump header template with the channel and sample number patched in.
pub fn patch_header(template: &DumpHeader, channel: u8, sample: u16) -> DumpHeader {
    let mut header = *template;
    header[CHANNEL_OFFSET] = channel;
    header[SAMPLE_LSB_OFFSET] = (sample & 0x7F) as u8;
    header[SAMPLE_MSB_OFFSET] = ((sample >> 7) & 0x7F) as u8;
    header
}

pub fn wire_packet_number(sequence_index: u32) -> u8 {
    (sequence_index % WIRE_PACKET_MODULUS) as u8
}

/// XOR of everything between the sysex start and the checksum byte.
pub fn packet_checksum(packet: &DataPacket) -> u8 {
    packet[1..CHECKSUM_OFFSET].iter().fold(0u8, |acc, &b| acc ^ b) & 0x7F
}

/// Rewrite the channel and packet number of an outgoing packet and fix up its checksum.
pub fn renumber_packet(packet: &mut DataPacket, channel: u8, wire_number: u8) {
    packet[CHANNEL_OFFSET] = channel;
    packet[PACKET_NUMBER_OFFSET] = wire_number;
    packet[CHECKSUM_OFFSET] = packet_checksum(packet);
}

pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", b);
    }
    out
}

fn read_u21(bytes: &[u8]) -> u32 {
    (bytes[0] as u32 & 0x7F) | ((bytes[1] as u32 & 0x7F) << 7) | ((bytes[2] as u32 & 0x7F) << 14)
}

// ============================================================================
// Dump Header Description
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopType {
    Forward,
    Alternating,
    Off,
    Unknown(u8),
}

impl From<u8> for LoopType {
    fn from(b: u8) -> Self {
        match b {
            0x00 => LoopType::Forward,
            0x01 => LoopType::Alternating,
            0x7F => LoopType::Off,
            other => LoopType::Unknown(other),
        }
    }
}

/// Fields of a dump header, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub channel: u8,
    pub sample: u16,
    pub bits_per_sample: u8,
    pub period_ns: u32,
    pub length_words: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub loop_type: LoopType,
}

impl HeaderInfo {
    pub fn parse(header: &DumpHeader) -> Self {
        HeaderInfo {
            channel: header[CHANNEL_OFFSET],
            sample: (header[SAMPLE_LSB_OFFSET] as u16 & 0x7F)
                | ((header[SAMPLE_MSB_OFFSET] as u16 & 0x7F) << 7),
            bits_per_sample: header[6],
            period_ns: read_u21(&header[7..10]),
            length_words: read_u21(&header[10..13]),
            loop_start: read_u21(&header[13..16]),
            loop_end: read_u21(&header[16..19]),
            loop_type: LoopType::from(header[19]),
        }
    }

    /// Sample rate implied by the period field, if the period is non-zero.
    pub fn sample_rate(&self) -> Option<u32> {
        if self.period_ns == 0 {
            None
        } else {
            Some(((1_000_000_000u64 + self.period_ns as u64 / 2) / self.period_ns as u64) as u32)
        }
    }
}

impl fmt::Display for HeaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel {} sample {}, {} bit, period {} ns",
            self.channel, self.sample, self.bits_per_sample, self.period_ns
        )?;
        if let Some(rate) = self.sample_rate() {
            write!(f, " (~{} Hz)", rate)?;
        }
        write!(
            f,
            ", {} words, loop {}..{} {:?}",
            self.length_words, self.loop_start, self.loop_end, self.loop_type
        )
    }
}

#[cfg(test)]
pub fn response_frame(channel: u8, status: u8, packet: u8) -> [u8; RESPONSE_LENGTH] {
    [SYSEX_START, NON_REALTIME, channel, status, packet, EOX]
}

#[cfg(test)]
pub fn test_header() -> DumpHeader {
    [
        SYSEX_START, NON_REALTIME, 0x00, DUMP_HEADER, 0x00, 0x00,
        0x10,             // 16 bit
        0x28, 0x43, 0x01, // 25000 ns
        0x64, 0x00, 0x00, // 100 words
        0x00, 0x00, 0x00,
        0x63, 0x00, 0x00,
        0x7F,
        EOX,
    ]
}

#[cfg(test)]
pub fn test_packet(seed: u8) -> DataPacket {
    let mut packet = [0u8; PACKET_LENGTH];
    packet[0] = SYSEX_START;
    packet[1] = NON_REALTIME;
    packet[3] = DATA_PACKET;
    for (i, b) in packet[PACKET_DATA_OFFSET..CHECKSUM_OFFSET].iter_mut().enumerate() {
        *b = (seed as usize + i) as u8 & 0x7F;
    }
    packet[PACKET_LENGTH - 1] = EOX;
    packet[CHECKSUM_OFFSET] = packet_checksum(&packet);
    packet
}

// ============================================================================
// Tests
// ============================================================================
