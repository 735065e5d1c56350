//! Link layer: byte streams, frame assembly and the request/response exchange
//!
//! The UART delivers bytes in arbitrary chunks and may drop or corrupt any of
//! them. [`FrameAssembler`] turns the raw stream into verified frames and
//! resynchronizes after garbage; [`LinkTransport`] adds the send/receive
//! exchange with a per-cycle read budget.

use async_trait::async_trait;
use gree_core::{DecodeError, GreeError, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::time::timeout_at;
use tracing::{debug, warn};

use crate::codec::{self, FrameKind, ProtocolFrame, HEADER_LEN, MAX_FRAME_LEN, SYNC_BYTE};

/// Byte-level access to the unit
///
/// Implemented by the serial driver and by the simulator, so the polling
/// driver can be exercised without hardware.
#[async_trait]
pub trait ByteStream: Send {
    /// Wait until at least one byte is available and copy what is buffered
    ///
    /// Returns the number of bytes copied. The caller bounds the wait.
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write a complete frame
    async fn write_frame(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drop bytes received but not yet read
    fn clear_input(&mut self) -> Result<()>;

    /// Device path, if the stream is backed by one
    fn port_path(&self) -> Option<&str> {
        None
    }
}

/// Persistent assembler states
///
/// Completing a frame and resynchronizing are transitions; both land back
/// in `AwaitingHeader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    AwaitingHeader,
    AccumulatingPayload,
}

/// Outcome of feeding bytes to the assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Frame(ProtocolFrame),
    Corrupt(DecodeError),
    /// A partial frame stalled and was discarded
    Timeout,
}

/// Link counters, cumulative since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub checksum_errors: u64,
    pub invalid_frames: u64,
    pub stalled_frames: u64,
    pub response_timeouts: u64,
    pub bytes_discarded: u64,
}

/// Incremental frame parser with resynchronization
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    state: LinkState,
    last_byte_at: Option<Instant>,
    frame_timeout: Duration,
    events: VecDeque<LinkEvent>,
    bytes_discarded: u64,
}

impl FrameAssembler {
    pub fn new(frame_timeout: Duration) -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_LEN * 2),
            state: LinkState::AwaitingHeader,
            last_byte_at: None,
            frame_timeout,
            events: VecDeque::new(),
            bytes_discarded: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Bytes dropped while hunting for a frame start
    pub fn bytes_discarded(&self) -> u64 {
        self.bytes_discarded
    }

    /// Feed freshly read bytes
    pub fn push(&mut self, bytes: &[u8], now: Instant) {
        self.check_stall(now);
        if bytes.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(bytes);
        self.last_byte_at = Some(now);
        self.process();
    }

    /// Discard a partial frame if no byte arrived within the frame timeout
    pub fn check_stall(&mut self, now: Instant) {
        if self.state != LinkState::AccumulatingPayload {
            return;
        }
        let stalled = self
            .last_byte_at
            .map_or(false, |last| now.saturating_duration_since(last) > self.frame_timeout);
        if stalled {
            self.discard(self.buffer.len());
            self.state = LinkState::AwaitingHeader;
            self.events.push_back(LinkEvent::Timeout);
        }
    }

    pub fn next_event(&mut self) -> Option<LinkEvent> {
        self.events.pop_front()
    }

    /// Drop everything, including undelivered events
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.events.clear();
        self.state = LinkState::AwaitingHeader;
        self.last_byte_at = None;
    }

    /// Drop undelivered events and any partial frame
    ///
    /// Returns the number of events dropped; partial bytes count as discarded.
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.events.len();
        self.events.clear();
        self.discard(self.buffer.len());
        self.state = LinkState::AwaitingHeader;
        self.last_byte_at = None;
        dropped
    }

    fn process(&mut self) {
        loop {
            match self.state {
                LinkState::AwaitingHeader => match find_sync(&self.buffer) {
                    Some(start) => {
                        self.discard(start);
                        self.state = LinkState::AccumulatingPayload;
                    }
                    None => {
                        // A trailing sync byte may be the first half of a header.
                        let keep = usize::from(self.buffer.last() == Some(&SYNC_BYTE));
                        self.discard(self.buffer.len() - keep);
                        return;
                    }
                },
                LinkState::AccumulatingPayload => {
                    if self.buffer.len() < HEADER_LEN {
                        return;
                    }
                    let expected = match codec::frame_len_for_header(&self.buffer[..HEADER_LEN]) {
                        Ok(len) => len,
                        Err(err) => {
                            self.resync(err);
                            continue;
                        }
                    };
                    if self.buffer.len() < expected {
                        return;
                    }
                    match codec::decode(&self.buffer[..expected]) {
                        Ok(frame) => {
                            self.buffer.drain(..expected);
                            self.events.push_back(LinkEvent::Frame(frame));
                            self.state = LinkState::AwaitingHeader;
                        }
                        Err(err) => self.resync(err),
                    }
                }
            }
        }
    }

    /// Skip one byte past a bad frame start and hunt for the next header
    fn resync(&mut self, err: DecodeError) {
        self.events.push_back(LinkEvent::Corrupt(err));
        self.discard(1);
        self.state = LinkState::AwaitingHeader;
    }

    fn discard(&mut self, count: usize) {
        self.buffer.drain(..count);
        self.bytes_discarded += count as u64;
    }
}

fn find_sync(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(2)
        .position(|pair| pair[0] == SYNC_BYTE && pair[1] == SYNC_BYTE)
}

/// Request/response exchange over a byte stream
pub struct LinkTransport<S: ByteStream + ?Sized> {
    stream: Box<S>,
    assembler: FrameAssembler,
    stats: LinkStats,
    debug_uart: bool,
}

impl<S: ByteStream + ?Sized> LinkTransport<S> {
    pub fn new(stream: Box<S>, frame_timeout: Duration, debug_uart: bool) -> Self {
        Self {
            stream,
            assembler: FrameAssembler::new(frame_timeout),
            stats: LinkStats::default(),
            debug_uart,
        }
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            bytes_discarded: self.assembler.bytes_discarded(),
            ..self.stats
        }
    }

    pub fn state(&self) -> LinkState {
        self.assembler.state()
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Forget any buffered input
    pub fn reset(&mut self) {
        self.assembler.reset();
    }

    /// Drop everything received before the next command goes out
    ///
    /// Covers decoded frames, a partial frame and bytes still unread on the
    /// stream. Replies that missed their cycle's budget must not be taken as
    /// the answer to the next command.
    pub fn discard_stale(&mut self) -> Result<()> {
        let dropped = self.assembler.clear_pending();
        if dropped > 0 {
            debug!("Discarded {} stale link event(s)", dropped);
        }
        self.stream.clear_input()
    }

    pub async fn send(&mut self, frame: &ProtocolFrame) -> Result<()> {
        if self.debug_uart {
            debug!("TX: {}", hex(frame.as_bytes()));
        }
        self.stream.write_frame(frame.as_bytes()).await?;
        self.stats.frames_sent += 1;
        Ok(())
    }

    /// Wait up to `budget` for a verified frame of the given kind
    ///
    /// # Errors
    ///
    /// - `Decode` with the last corruption seen if no valid frame arrived
    /// - `LinkTimeout` if nothing usable arrived at all
    /// - stream errors are passed through unchanged
    pub async fn receive(&mut self, kind: FrameKind, budget: Duration) -> Result<ProtocolFrame> {
        let deadline = tokio::time::Instant::now() + budget;
        let mut last_error: Option<DecodeError> = None;
        let mut buf = [0u8; MAX_FRAME_LEN];

        loop {
            while let Some(event) = self.assembler.next_event() {
                match event {
                    LinkEvent::Frame(frame) if frame.kind() == kind => {
                        self.stats.frames_received += 1;
                        if self.debug_uart {
                            debug!("RX: {}", hex(frame.as_bytes()));
                        }
                        return Ok(frame);
                    }
                    LinkEvent::Frame(frame) => {
                        debug!("Ignoring {:?} frame while waiting for {:?}", frame.kind(), kind);
                    }
                    LinkEvent::Corrupt(err) => {
                        match err {
                            DecodeError::ChecksumMismatch { .. } => self.stats.checksum_errors += 1,
                            _ => self.stats.invalid_frames += 1,
                        }
                        warn!("Discarding corrupt frame: {}", err);
                        last_error = Some(err);
                    }
                    LinkEvent::Timeout => {
                        self.stats.stalled_frames += 1;
                        warn!("Partial frame stalled, discarding");
                    }
                }
            }

            match timeout_at(deadline, self.stream.read_available(&mut buf)).await {
                Ok(Ok(0)) => {
                    return Err(GreeError::DeviceDisconnected(
                        "Stream returned no data".to_string(),
                    ))
                }
                Ok(Ok(n)) => self.assembler.push(&buf[..n], Instant::now()),
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    self.assembler.check_stall(Instant::now());
                    if let Some(LinkEvent::Timeout) = self.assembler.next_event() {
                        self.stats.stalled_frames += 1;
                    }
                    self.stats.response_timeouts += 1;
                    return Err(match last_error {
                        Some(err) => GreeError::Decode(err),
                        None => GreeError::LinkTimeout(format!(
                            "No {:?} frame within {} ms",
                            kind,
                            budget.as_millis()
                        )),
                    });
                }
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
