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

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;
use serialport::{SerialPort as SerialPortTrait, DataBits, Parity, StopBits};

/// MIDI DIN baud rate
pub const MIDI_BAUD: u32 = 31250;

// ============================================================================
// MidiPort Trait
// ============================================================================

/// Byte-level MIDI link used by the sample dump sender
pub trait MidiPort: Send {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read one byte, waiting at most `timeout` if the link supports it.
    /// Returns `Ok(None)` when the wait elapsed without a byte.
    fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>>;
}

// ============================================================================
// Serial MIDI Interface
// ============================================================================

/// MIDI over a UART (DIN interface or USB serial adapter)
pub struct SerialMidiPort {
    port: Box<dyn SerialPortTrait>,
}

impl SerialMidiPort {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(100))
            .open()?;

        Ok(SerialMidiPort { port })
    }
}

impl MidiPort for SerialMidiPort {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        // A zero timeout would turn the read non-blocking
        let timeout = timeout.max(Duration::from_millis(1));
        self.port.set_timeout(timeout)
            .map_err(io::Error::from)?;

        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Raw MIDI Character Device
// ============================================================================

/// Raw MIDI device node such as `/dev/snd/midiC1D0`.
///
/// Reads block until a byte arrives; the timeout passed to `read_byte` is
/// ignored, so a silent device stalls the caller.
pub struct RawMidiPort {
    device: File,
}

impl RawMidiPort {
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(RawMidiPort { device })
    }
}

impl MidiPort for RawMidiPort {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.device.write_all(bytes)?;
        self.device.flush()
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        self.device.read_exact(&mut buf)?;
        Ok(Some(buf[0]))
    }
}

// ============================================================================
// Mock MIDI Port for Testing
// ============================================================================

#[cfg(test)]
pub struct MockMidiPort {
    // Bytes to return on reads (None = timeout)
    read_buffer: Vec<Option<u8>>,
    read_pos: usize,
    // Track what was written
    write_log: Vec<u8>,
    // Expected writes for verification
    expected_writes: Vec<u8>,
}

#[cfg(test)]
impl MockMidiPort {
    pub fn new(responses: Vec<Option<u8>>, expected_writes: Vec<u8>) -> Self {
        MockMidiPort {
            read_buffer: responses,
            read_pos: 0,
            write_log: Vec::new(),
            expected_writes,
        }
    }

    /// Script a sequence of complete response frames
    pub fn with_frames(frames: &[[u8; crate::protocol::RESPONSE_LENGTH]], expected_writes: Vec<u8>) -> Self {
        let responses = frames.iter().flatten().map(|&b| Some(b)).collect();
        Self::new(responses, expected_writes)
    }
}

#[cfg(test)]
impl MidiPort for MockMidiPort {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_log.extend_from_slice(bytes);
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<Option<u8>> {
        // Out of responses = timeout
        if self.read_pos >= self.read_buffer.len() {
            return Ok(None);
        }

        let byte = self.read_buffer[self.read_pos];
        self.read_pos += 1;
        Ok(byte)
    }
}

#[cfg(test)]
impl Drop for MockMidiPort {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        assert_eq!(
            self.read_pos,
            self.read_buffer.len(),
            "MockMidiPort dropped with {} unconsumed responses (read {} of {} bytes)",
            self.read_buffer.len() - self.read_pos,
            self.read_pos,
            self.read_buffer.len()
        );

        assert_eq!(
            &self.write_log,
            &self.expected_writes,
            "MockMidiPort write log mismatch!\nExpected {} bytes:\n{:02X?}\nGot {} bytes:\n{:02X?}",
            self.expected_writes.len(),
            self.expected_writes,
            self.write_log.len(),
            self.write_log
        );
    }
}

/// Link that fails every operation
#[cfg(test)]
pub struct BrokenMidiPort {
    pub fail_sends: bool,
}

#[cfg(test)]
impl MidiPort for BrokenMidiPort {
    fn send(&mut self, _bytes: &[u8]) -> io::Result<()> {
        if self.fail_sends {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
        } else {
            Ok(())
        }
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<Option<u8>> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
    }
}
