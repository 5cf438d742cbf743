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

use std::marker::PhantomData;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info};
use crate::error::SdsError;
use crate::midi::MidiPort;
use crate::progress::{CancelToken, PacketProgress, TransferObserver, TransferStats};
use crate::protocol::{self, DumpHeader, PACKET_LENGTH, HEADER_LENGTH};
use crate::response::{self, DecodeError, Response};
use crate::sds_file::SdsFile;

/// Upper bound for the strict handshake's WAIT backoff
pub const MAX_WAIT_BACKOFF: Duration = Duration::from_secs(1);

/// Doubled WAIT backoff, capped at `MAX_WAIT_BACKOFF`
pub fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(MAX_WAIT_BACKOFF)
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakePolicy {
    /// Keep soliciting responses until the dump header is ACKed, whatever
    /// else the receiver says in between.
    #[default]
    Faithful,
    /// NAK and CANCEL abort the dump, WAIT backs off before asking again,
    /// and the number of attempts is bounded.
    Strict,
}

#[derive(Debug, Clone)]
pub struct SdsConfig {
    /// Window for each response frame
    pub timeout: Duration,
    pub handshake: HandshakePolicy,
    /// First WAIT backoff in strict mode, doubled on each WAIT
    pub wait_backoff: Duration,
    /// Strict mode only
    pub max_handshake_attempts: u32,
    /// Overwrite channel and packet number of outgoing packets
    pub renumber_packets: bool,
}

impl Default for SdsConfig {
    fn default() -> Self {
        SdsConfig {
            timeout: Duration::from_secs(2),
            handshake: HandshakePolicy::Faithful,
            wait_backoff: Duration::from_millis(50),
            max_handshake_attempts: 100,
            renumber_packets: false,
        }
    }
}

// ============================================================================
// States
// ============================================================================

pub struct Handshake;
pub struct Transfer;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct SdsSender<State> {
    state: PhantomData<State>,
    port: Box<dyn MidiPort>,
    channel: u8,
    sample: u16,
    config: SdsConfig,
    cancel: CancelToken,
    stats: TransferStats,
}

// ============================================================================
// Helpers shared by all states
// ============================================================================

impl<S> SdsSender<S> {
    fn transition<T>(self) -> SdsSender<T> {
        SdsSender {
            state: PhantomData,
            port: self.port,
            channel: self.channel,
            sample: self.sample,
            config: self.config,
            cancel: self.cancel,
            stats: self.stats,
        }
    }

    fn transport_error(&self, e: std::io::Error) -> SdsError {
        let type_name = std::any::type_name::<S>();
        let stage = type_name.split("::").last().unwrap_or(type_name);
        SdsError::Transport { stage, source: e }
    }

    fn check_cancelled(&self) -> Result<(), SdsError> {
        if self.cancel.is_cancelled() {
            Err(SdsError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// `Ok(None)` on timeout
    fn await_response(&mut self, wire_number: u8) -> Result<Option<Response>, SdsError> {
        match response::decode(self.port.as_mut(), self.channel, wire_number, self.config.timeout) {
            Ok(response) => Ok(Some(response)),
            Err(DecodeError::Timeout(_)) => Ok(None),
            Err(DecodeError::Transport(e)) => Err(self.transport_error(e)),
        }
    }

    #[cfg(test)]
    pub fn stats(&self) -> TransferStats {
        self.stats
    }
}

// ============================================================================
// Dump Header Handshake
// ============================================================================

impl SdsSender<Handshake> {
    pub fn new(port: Box<dyn MidiPort>, channel: u8, sample: u16, config: SdsConfig) -> Self {
        SdsSender {
            state: PhantomData::<Handshake>,
            port,
            channel,
            sample,
            config,
            cancel: CancelToken::new(),
            stats: TransferStats::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send the dump header once, then keep reading responses until it is ACKed.
    pub fn perform_handshake(
        mut self,
        template: &DumpHeader,
        observer: &mut dyn TransferObserver,
    ) -> Result<SdsSender<Transfer>, SdsError> {
        self.check_cancelled()?;

        let header = protocol::patch_header(template, self.channel, self.sample);
        self.port.send(&header).map_err(|e| self.transport_error(e))?;
        self.stats.bytes_sent += HEADER_LENGTH as u64;
        observer.header_sent(&header);

        let mut backoff = self.config.wait_backoff;
        loop {
            let response = self.await_response(0)?;
            self.stats.handshake_attempts += 1;
            let attempt = self.stats.handshake_attempts;
            observer.handshake_response(attempt, response);

            if response == Some(Response::Ack) {
                return Ok(self.transition::<Transfer>());
            }

            if self.config.handshake == HandshakePolicy::Strict {
                match response {
                    Some(r @ (Response::Nak | Response::Cancel)) => {
                        return Err(SdsError::HeaderRejected(r));
                    }
                    Some(Response::Wait) => {
                        debug!("Receiver busy, backing off {:?}", backoff);
                        std::thread::sleep(backoff);
                        backoff = next_backoff(backoff);
                    }
                    _ => {}
                }

                if attempt >= self.config.max_handshake_attempts {
                    return Err(SdsError::HandshakeExhausted(attempt));
                }
            }

            self.check_cancelled()?;
        }
    }
}

// ============================================================================
// Packet Transfer
// ============================================================================

impl SdsSender<Transfer> {
    /// Send `total_packets` packets, each of which must be ACKed before the next goes out.
    pub fn send_all<R: Read>(
        mut self,
        source: &mut SdsFile<R>,
        total_packets: u32,
        observer: &mut dyn TransferObserver,
    ) -> Result<TransferStats, SdsError> {
        for index in 0..total_packets {
            self.check_cancelled()?;

            let wire_number = protocol::wire_packet_number(index);
            let mut packet = source.next_packet()?;
            if self.config.renumber_packets {
                protocol::renumber_packet(&mut packet, self.channel, wire_number);
            }

            self.port.send(&packet).map_err(|e| self.transport_error(e))?;
            debug!("Sent packet {} (wire {}): {}", index, wire_number, protocol::hex(&packet));
            self.stats.packets_sent += 1;
            self.stats.bytes_sent += PACKET_LENGTH as u64;

            let response = self.await_response(wire_number)?;
            observer.packet(&PacketProgress {
                index,
                wire_number,
                bytes_sent: PACKET_LENGTH,
                response,
            });

            match response {
                Some(Response::Ack) => {}
                Some(response) => return Err(SdsError::Rejected { index, response }),
                None => {
                    return Err(SdsError::Timeout {
                        index,
                        timeout: self.config.timeout,
                    });
                }
            }
        }

        Ok(self.stats)
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Dump a whole sample file: size check, header handshake, then every packet.
pub fn send_sample<R: Read>(
    port: Box<dyn MidiPort>,
    file: &mut SdsFile<R>,
    channel: u8,
    sample: u16,
    config: SdsConfig,
    cancel: &CancelToken,
    observer: &mut dyn TransferObserver,
) -> Result<TransferStats, SdsError> {
    file.check_size()?;
    let template = file.header_template()?;
    let total_packets = file.packet_count();
    info!("Sending {} packets to channel {} as sample {}", total_packets, channel, sample);

    let sender = SdsSender::new(port, channel, sample, config)
        .with_cancel(cancel.clone())
        .perform_handshake(&template, observer)?;
    sender.send_all(file, total_packets, observer)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use crate::error::ValidationError;
    use crate::midi::{BrokenMidiPort, MockMidiPort};
    use crate::protocol::*;
    use crate::sds_file::MAX_FILE_SIZE;

    const CHANNEL: u8 = 3;
    const SAMPLE: u16 = 300;

    #[derive(Default)]
    struct Recorder {
        headers: Vec<DumpHeader>,
        handshake: Vec<Option<Response>>,
        packets: Vec<PacketProgress>,
        cancel_after_packet: Option<(u32, CancelToken)>,
        cancel_after_attempt: Option<(u32, CancelToken)>,
    }

    impl TransferObserver for Recorder {
        fn header_sent(&mut self, header: &DumpHeader) {
            self.headers.push(*header);
        }

        fn handshake_response(&mut self, attempt: u32, response: Option<Response>) {
            self.handshake.push(response);
            if let Some((at, token)) = &self.cancel_after_attempt {
                if attempt == *at {
                    token.cancel();
                }
            }
        }

        fn packet(&mut self, progress: &PacketProgress) {
            self.packets.push(*progress);
            if let Some((index, token)) = &self.cancel_after_packet {
                if progress.index == *index {
                    token.cancel();
                }
            }
        }
    }

    fn sample_file(count: u32) -> (SdsFile<Cursor<Vec<u8>>>, Vec<DataPacket>) {
        let packets: Vec<DataPacket> = (0..count).map(|i| test_packet(i as u8)).collect();
        let mut data = test_header().to_vec();
        for packet in &packets {
            data.extend_from_slice(packet);
        }
        let size = data.len() as u64;
        (SdsFile::new(Cursor::new(data), size), packets)
    }

    fn ack(packet: u8) -> [u8; RESPONSE_LENGTH] {
        response_frame(CHANNEL, ACK, packet)
    }

    fn header_bytes() -> Vec<u8> {
        patch_header(&test_header(), CHANNEL, SAMPLE).to_vec()
    }

    fn writes(packets: &[DataPacket]) -> Vec<u8> {
        let mut expected = header_bytes();
        for packet in packets {
            expected.extend_from_slice(packet);
        }
        expected
    }

    fn strict() -> SdsConfig {
        SdsConfig {
            handshake: HandshakePolicy::Strict,
            wait_backoff: Duration::from_millis(1),
            ..SdsConfig::default()
        }
    }

    #[test]
    fn test_handshake_waits_then_ack() {
        let frames = [
            response_frame(CHANNEL, WAIT, 0),
            response_frame(CHANNEL, WAIT, 0),
            ack(0),
        ];
        let port = Box::new(MockMidiPort::with_frames(&frames, header_bytes()));
        let mut recorder = Recorder::default();

        let sender = SdsSender::new(port, CHANNEL, SAMPLE, SdsConfig::default())
            .perform_handshake(&test_header(), &mut recorder)
            .expect("handshake should succeed");

        assert_eq!(sender.stats().handshake_attempts, 3);
        assert_eq!(recorder.headers.len(), 1);
        assert_eq!(recorder.headers[0][CHANNEL_OFFSET], CHANNEL);
        assert_eq!(
            recorder.handshake,
            vec![Some(Response::Wait), Some(Response::Wait), Some(Response::Ack)]
        );
    }

    #[test]
    fn test_faithful_handshake_tolerates_everything_but_ack() {
        let mut responses: Vec<Option<u8>> = Vec::new();
        for status in [NAK, CANCEL] {
            responses.extend(response_frame(CHANNEL, status, 0).iter().map(|&b| Some(b)));
        }
        responses.push(None);
        responses.extend(ack(0).iter().map(|&b| Some(b)));

        let port = Box::new(MockMidiPort::new(responses, header_bytes()));
        let mut recorder = Recorder::default();

        let sender = SdsSender::new(port, CHANNEL, SAMPLE, SdsConfig::default())
            .perform_handshake(&test_header(), &mut recorder)
            .expect("handshake should succeed");

        assert_eq!(sender.stats().handshake_attempts, 4);
        assert_eq!(
            recorder.handshake,
            vec![Some(Response::Nak), Some(Response::Cancel), None, Some(Response::Ack)]
        );
    }

    #[test]
    fn test_strict_handshake_rejects_nak_and_cancel() {
        for (status, expected) in [(NAK, Response::Nak), (CANCEL, Response::Cancel)] {
            let frames = [response_frame(CHANNEL, WAIT, 0), response_frame(CHANNEL, status, 0)];
            let port = Box::new(MockMidiPort::with_frames(&frames, header_bytes()));
            let mut recorder = Recorder::default();

            let err = SdsSender::new(port, CHANNEL, SAMPLE, strict())
                .perform_handshake(&test_header(), &mut recorder)
                .err()
                .expect("handshake should fail");

            assert!(matches!(err, SdsError::HeaderRejected(r) if r == expected));
            assert_eq!(recorder.handshake.len(), 2);
        }
    }

    #[test]
    fn test_strict_handshake_wait_then_ack() {
        let frames = [response_frame(CHANNEL, WAIT, 0), ack(0)];
        let port = Box::new(MockMidiPort::with_frames(&frames, header_bytes()));

        let sender = SdsSender::new(port, CHANNEL, SAMPLE, strict())
            .perform_handshake(&test_header(), &mut Recorder::default())
            .expect("handshake should succeed");
        assert_eq!(sender.stats().handshake_attempts, 2);
    }

    #[test]
    fn test_next_backoff_doubles_up_to_cap() {
        let mut backoff = Duration::from_millis(50);
        let mut schedule = vec![backoff];
        for _ in 0..6 {
            backoff = next_backoff(backoff);
            schedule.push(backoff);
        }
        let millis: Vec<u128> = schedule.iter().map(|d| d.as_millis()).collect();
        assert_eq!(millis, vec![50, 100, 200, 400, 800, 1000, 1000]);

        assert_eq!(next_backoff(Duration::ZERO), Duration::ZERO);
        assert_eq!(next_backoff(Duration::MAX), MAX_WAIT_BACKOFF);
    }

    #[test]
    fn test_strict_handshake_sleeps_on_wait() {
        let frames = [
            response_frame(CHANNEL, WAIT, 0),
            response_frame(CHANNEL, WAIT, 0),
            response_frame(CHANNEL, WAIT, 0),
            ack(0),
        ];
        let port = Box::new(MockMidiPort::with_frames(&frames, header_bytes()));
        let config = SdsConfig {
            wait_backoff: Duration::from_millis(10),
            ..strict()
        };

        let started = std::time::Instant::now();
        let sender = SdsSender::new(port, CHANNEL, SAMPLE, config)
            .perform_handshake(&test_header(), &mut Recorder::default())
            .expect("handshake should succeed");

        // 10 + 20 + 40 ms
        assert!(started.elapsed() >= Duration::from_millis(70));
        assert_eq!(sender.stats().handshake_attempts, 4);
    }

    #[test]
    fn test_faithful_handshake_does_not_sleep_on_wait() {
        let frames = [response_frame(CHANNEL, WAIT, 0), ack(0)];
        let port = Box::new(MockMidiPort::with_frames(&frames, header_bytes()));
        let config = SdsConfig {
            wait_backoff: Duration::from_secs(30),
            ..SdsConfig::default()
        };

        let started = std::time::Instant::now();
        SdsSender::new(port, CHANNEL, SAMPLE, config)
            .perform_handshake(&test_header(), &mut Recorder::default())
            .expect("handshake should succeed");
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_strict_handshake_gives_up() {
        let config = SdsConfig {
            max_handshake_attempts: 3,
            ..strict()
        };
        let port = Box::new(MockMidiPort::new(vec![None, None, None], header_bytes()));

        let err = SdsSender::new(port, CHANNEL, SAMPLE, config)
            .perform_handshake(&test_header(), &mut Recorder::default())
            .err()
            .expect("handshake should fail");
        assert!(matches!(err, SdsError::HandshakeExhausted(3)));
    }

    #[test]
    fn test_handshake_read_failure_propagates() {
        let port = Box::new(BrokenMidiPort { fail_sends: false });
        let err = SdsSender::new(port, CHANNEL, SAMPLE, SdsConfig::default())
            .perform_handshake(&test_header(), &mut Recorder::default())
            .err()
            .expect("handshake should fail");

        match err {
            SdsError::Transport { stage, .. } => assert_eq!(stage, "Handshake"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_header_send_failure() {
        let port = Box::new(BrokenMidiPort { fail_sends: true });
        let mut recorder = Recorder::default();
        let err = SdsSender::new(port, CHANNEL, SAMPLE, SdsConfig::default())
            .perform_handshake(&test_header(), &mut recorder)
            .err()
            .expect("handshake should fail");

        assert!(matches!(err, SdsError::Transport { .. }));
        assert!(recorder.headers.is_empty());
    }

    #[test]
    fn test_full_transfer() {
        let (mut file, packets) = sample_file(3);
        let frames = [ack(0), ack(0), ack(1), ack(2)];
        let port = Box::new(MockMidiPort::with_frames(&frames, writes(&packets)));
        let mut recorder = Recorder::default();

        let stats = send_sample(
            port,
            &mut file,
            CHANNEL,
            SAMPLE,
            SdsConfig::default(),
            &CancelToken::new(),
            &mut recorder,
        )
        .expect("transfer should succeed");

        assert_eq!(stats.handshake_attempts, 1);
        assert_eq!(stats.packets_sent, 3);
        assert_eq!(stats.bytes_sent, (HEADER_LENGTH + 3 * PACKET_LENGTH) as u64);

        let acks = recorder.handshake.iter().filter(|r| **r == Some(Response::Ack)).count()
            + recorder.packets.iter().filter(|p| p.response == Some(Response::Ack)).count();
        assert_eq!(acks, 4);

        let indices: Vec<u32> = recorder.packets.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(recorder.packets.iter().all(|p| p.bytes_sent == PACKET_LENGTH));
    }

    #[test]
    fn test_nak_aborts_transfer() {
        let (mut file, packets) = sample_file(3);
        let frames = [ack(0), ack(0), response_frame(CHANNEL, NAK, 1)];
        let port = Box::new(MockMidiPort::with_frames(&frames, writes(&packets[..2])));
        let mut recorder = Recorder::default();

        let err = send_sample(
            port,
            &mut file,
            CHANNEL,
            SAMPLE,
            SdsConfig::default(),
            &CancelToken::new(),
            &mut recorder,
        )
        .err()
        .expect("transfer should fail");

        assert!(matches!(err, SdsError::Rejected { index: 1, response: Response::Nak }));
        assert_eq!(err.to_string(), "received NAK instead of ACK in response to packet 1");
        assert_eq!(recorder.packets.len(), 2);
    }

    #[test]
    fn test_nak_on_packet_k_sends_k_plus_one() {
        for k in 0..5u32 {
            let (mut file, packets) = sample_file(5);
            let mut frames = vec![ack(0)];
            for i in 0..k {
                frames.push(ack(i as u8));
            }
            frames.push(response_frame(CHANNEL, NAK, k as u8));
            let port = Box::new(MockMidiPort::with_frames(&frames, writes(&packets[..=k as usize])));

            let err = send_sample(
                port,
                &mut file,
                CHANNEL,
                SAMPLE,
                SdsConfig::default(),
                &CancelToken::new(),
                &mut Recorder::default(),
            )
            .err()
            .expect("transfer should fail");
            assert!(matches!(err, SdsError::Rejected { index, response: Response::Nak } if index == k));
        }
    }

    #[test]
    fn test_wait_and_cancel_abort_packets() {
        for (status, expected) in [(WAIT, Response::Wait), (CANCEL, Response::Cancel)] {
            let (mut file, packets) = sample_file(2);
            let frames = [ack(0), response_frame(CHANNEL, status, 0)];
            let port = Box::new(MockMidiPort::with_frames(&frames, writes(&packets[..1])));

            let err = send_sample(
                port,
                &mut file,
                CHANNEL,
                SAMPLE,
                SdsConfig::default(),
                &CancelToken::new(),
                &mut Recorder::default(),
            )
            .err()
            .expect("transfer should fail");
            assert!(matches!(err, SdsError::Rejected { index: 0, response } if response == expected));
        }
    }

    #[test]
    fn test_packet_timeout_aborts_transfer() {
        let (mut file, packets) = sample_file(2);
        let mut responses: Vec<Option<u8>> = ack(0).iter().map(|&b| Some(b)).collect();
        responses.push(None);
        let port = Box::new(MockMidiPort::new(responses, writes(&packets[..1])));
        let mut recorder = Recorder::default();

        let err = send_sample(
            port,
            &mut file,
            CHANNEL,
            SAMPLE,
            SdsConfig::default(),
            &CancelToken::new(),
            &mut recorder,
        )
        .err()
        .expect("transfer should fail");

        assert!(matches!(err, SdsError::Timeout { index: 0, .. }));
        assert_eq!(recorder.packets[0].response, None);
    }

    #[test]
    fn test_ack_for_wrong_packet_is_not_accepted() {
        let (mut file, packets) = sample_file(2);
        let frames = [ack(0), ack(0), ack(0)];
        let port = Box::new(MockMidiPort::with_frames(&frames, writes(&packets)));

        let err = send_sample(
            port,
            &mut file,
            CHANNEL,
            SAMPLE,
            SdsConfig::default(),
            &CancelToken::new(),
            &mut Recorder::default(),
        )
        .err()
        .expect("transfer should fail");
        assert!(matches!(err, SdsError::Timeout { index: 1, .. }));
    }

    #[test]
    fn test_wire_numbers_wrap() {
        let (mut file, packets) = sample_file(130);
        let mut frames = vec![ack(0)];
        frames.extend((0..130u32).map(|i| ack((i % 128) as u8)));
        let port = Box::new(MockMidiPort::with_frames(&frames, writes(&packets)));
        let mut recorder = Recorder::default();

        let stats = send_sample(
            port,
            &mut file,
            CHANNEL,
            SAMPLE,
            SdsConfig::default(),
            &CancelToken::new(),
            &mut recorder,
        )
        .expect("transfer should succeed");

        assert_eq!(stats.packets_sent, 130);
        assert_eq!(recorder.packets[127].wire_number, 127);
        assert_eq!(recorder.packets[128].wire_number, 0);
        assert_eq!(recorder.packets[129].wire_number, 1);
        assert_eq!(recorder.packets[129].index, 129);
    }

    #[test]
    fn test_renumbered_packets() {
        let (mut file, packets) = sample_file(2);
        let renumbered: Vec<DataPacket> = packets
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut p = *p;
                renumber_packet(&mut p, CHANNEL, i as u8);
                p
            })
            .collect();
        assert_ne!(renumbered[1], packets[1]);

        let frames = [ack(0), ack(0), ack(1)];
        let port = Box::new(MockMidiPort::with_frames(&frames, writes(&renumbered)));
        let config = SdsConfig {
            renumber_packets: true,
            ..SdsConfig::default()
        };

        send_sample(port, &mut file, CHANNEL, SAMPLE, config, &CancelToken::new(), &mut Recorder::default())
            .expect("transfer should succeed");
    }

    #[test]
    fn test_oversize_file_fails_before_io() {
        let mut file = SdsFile::new(Cursor::new(test_header().to_vec()), MAX_FILE_SIZE + 1);
        let port = Box::new(MockMidiPort::new(vec![], vec![]));

        let err = send_sample(
            port,
            &mut file,
            CHANNEL,
            SAMPLE,
            SdsConfig::default(),
            &CancelToken::new(),
            &mut Recorder::default(),
        )
        .err()
        .expect("transfer should fail");

        assert!(matches!(err, SdsError::Validation(ValidationError::FileTooLarge { .. })));
    }

    #[test]
    fn test_truncated_packet_is_io_error() {
        let mut data = test_header().to_vec();
        data.extend_from_slice(&test_packet(0)[..50]);
        let size = data.len() as u64;
        let mut file = SdsFile::new(Cursor::new(data), size);
        let port = Box::new(MockMidiPort::with_frames(&[ack(0)], header_bytes()));

        let err = send_sample(
            port,
            &mut file,
            CHANNEL,
            SAMPLE,
            SdsConfig::default(),
            &CancelToken::new(),
            &mut Recorder::default(),
        )
        .err()
        .expect("transfer should fail");
        assert!(matches!(err, SdsError::Io(_)));
    }

    #[test]
    fn test_cancel_before_start() {
        let (mut file, _) = sample_file(1);
        let port = Box::new(MockMidiPort::new(vec![], vec![]));
        let token = CancelToken::new();
        token.cancel();

        let err = send_sample(port, &mut file, CHANNEL, SAMPLE, SdsConfig::default(), &token, &mut Recorder::default())
            .err()
            .expect("transfer should fail");
        assert!(matches!(err, SdsError::Cancelled));
    }

    #[test]
    fn test_cancel_between_packets() {
        let (mut file, packets) = sample_file(3);
        let token = CancelToken::new();
        let frames = [ack(0), ack(0)];
        let port = Box::new(MockMidiPort::with_frames(&frames, writes(&packets[..1])));
        let mut recorder = Recorder {
            cancel_after_packet: Some((0, token.clone())),
            ..Recorder::default()
        };

        let err = send_sample(port, &mut file, CHANNEL, SAMPLE, SdsConfig::default(), &token, &mut recorder)
            .err()
            .expect("transfer should fail");
        assert!(matches!(err, SdsError::Cancelled));
        assert_eq!(recorder.packets.len(), 1);
    }

    #[test]
    fn test_cancel_during_handshake() {
        let (mut file, _) = sample_file(2);
        let token = CancelToken::new();
        let frames = [response_frame(CHANNEL, WAIT, 0)];
        let port = Box::new(MockMidiPort::with_frames(&frames, header_bytes()));
        let mut recorder = Recorder {
            cancel_after_attempt: Some((1, token.clone())),
            ..Recorder::default()
        };

        let err = send_sample(port, &mut file, CHANNEL, SAMPLE, SdsConfig::default(), &token, &mut recorder)
            .err()
            .expect("transfer should fail");
        assert!(matches!(err, SdsError::Cancelled));
        assert_eq!(recorder.handshake, vec![Some(Response::Wait)]);
        assert!(recorder.packets.is_empty());
    }

    #[test]
    fn test_empty_sample() {
        let (mut file, _) = sample_file(0);
        let port = Box::new(MockMidiPort::with_frames(&[ack(0)], header_bytes()));

        let stats = send_sample(
            port,
            &mut file,
            CHANNEL,
            SAMPLE,
            SdsConfig::default(),
            &CancelToken::new(),
            &mut Recorder::default(),
        )
        .expect("transfer should succeed");
        assert_eq!(stats.packets_sent, 0);
    }
}
