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

// MIDI Sample Dump Standard sender
mod error;
mod midi;
mod progress;
mod protocol;
mod response;
mod sds_file;
mod sender;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use error::{SdsError, ValidationError};
use midi::{MidiPort, RawMidiPort, SerialMidiPort};
use progress::{CancelToken, LogObserver};
use sds_file::SdsFile;
use sender::{HandshakePolicy, SdsConfig};

#[derive(Parser)]
#[command(name = "send-sds")]
#[command(version)]
#[command(about = "Send a sample to a MIDI device using the Sample Dump Standard", long_about = None)]
struct Cli {
    /// MIDI device (raw MIDI node such as /dev/snd/midiC1D0, or a serial port)
    device: PathBuf,

    /// Device channel (0-127)
    #[arg(value_parser = parse_channel_num)]
    channel_num: u8,

    /// Sample number to write on the device (0-16383)
    #[arg(value_parser = parse_sample_num)]
    sample_num: u16,

    /// SDS file to send
    filename: PathBuf,

    /// How to talk to the device
    #[arg(short, long, value_enum, default_value = "raw")]
    transport: Transport,

    /// Baud rate (serial transport only)
    #[arg(short, long, default_value_t = midi::MIDI_BAUD)]
    baud: u32,

    /// Time to wait for each response from the device
    #[arg(long, default_value = "2000", value_name = "MS")]
    timeout: u64,

    /// Dump header handshake behaviour
    #[arg(long, value_enum, default_value = "strict")]
    handshake: Handshake,

    /// Rewrite channel and packet number of each data packet before sending
    #[arg(long)]
    renumber_packets: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Raw,
    Serial,
}

#[derive(Clone, Copy, ValueEnum)]
enum Handshake {
    /// Retry until ACK, whatever the device answers
    Faithful,
    /// Abort on NAK or CANCEL, back off on WAIT
    Strict,
}

fn parse_number(s: &str) -> Result<u32, ValidationError> {
    s.trim().parse::<u32>().map_err(|_| ValidationError::NotANumber(s.to_string()))
}

fn parse_channel_num(s: &str) -> Result<u8, ValidationError> {
    let n = parse_number(s)?;
    u8::try_from(n)
        .ok()
        .filter(|&c| c <= protocol::MAX_CHANNEL)
        .ok_or(ValidationError::ChannelOutOfRange(n))
}

fn parse_sample_num(s: &str) -> Result<u16, ValidationError> {
    let n = parse_number(s)?;
    u16::try_from(n)
        .ok()
        .filter(|&c| c <= protocol::MAX_SAMPLE)
        .ok_or(ValidationError::SampleOutOfRange(n))
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if interrupt(&handler_token) {
            std::process::exit(130);
        }
        warn!("Interrupted, stopping at the next packet boundary (press Ctrl-C again to quit now)");
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    if let Err(e) = run(cli, &cancel) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Cancel the transfer on the first interrupt; returns true when the
/// transfer was already cancelled and the process should exit.
fn interrupt(cancel: &CancelToken) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    cancel.cancel();
    false
}

fn open_port(cli: &Cli) -> Result<Box<dyn MidiPort>, SdsError> {
    let open_error = |e: std::io::Error| SdsError::Transport { stage: "Open", source: e };

    info!("Opening MIDI device: {}", cli.device.display());
    match cli.transport {
        Transport::Raw => {
            let port = RawMidiPort::open(&cli.device).map_err(open_error)?;
            Ok(Box::new(port))
        }
        Transport::Serial => {
            let name = cli.device.to_string_lossy();
            let port = SerialMidiPort::open(&name, cli.baud)
                .map_err(|e| open_error(e.into()))?;
            info!("Settings: {} baud, 8N1", cli.baud);
            Ok(Box::new(port))
        }
    }
}

fn run(cli: Cli, cancel: &CancelToken) -> Result<(), SdsError> {
    let mut file = SdsFile::open(&cli.filename)?;
    file.check_size()?;

    let port = open_port(&cli)?;

    let config = SdsConfig {
        timeout: Duration::from_millis(cli.timeout),
        handshake: match cli.handshake {
            Handshake::Faithful => HandshakePolicy::Faithful,
            Handshake::Strict => HandshakePolicy::Strict,
        },
        renumber_packets: cli.renumber_packets,
        ..SdsConfig::default()
    };

    info!("Sending file: {} ({} bytes)", cli.filename.display(), file.file_size());
    let mut observer = LogObserver::new(file.packet_count());
    let stats = sender::send_sample(
        port,
        &mut file,
        cli.channel_num,
        cli.sample_num,
        config,
        cancel,
        &mut observer,
    )?;

    info!(
        "Sample sent: {} packets, {} bytes, {} handshake attempts",
        stats.packets_sent, stats.bytes_sent, stats.handshake_attempts
    );
    Ok(())
}
