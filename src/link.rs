//! Link layer: turns the raw byte stream from the device into frames.
//!
//! A frame is everything up to a frame separator (`0x1c`). The first
//! [`RAW_HEADER_LEN`] bytes of a frame are raw control bytes; every byte
//! after that carries a parity bit in bit 7 which is checked on arrival.
//!
//! ```text
//! +--------+-------+------+------------------------+------+
//! | marker | class | code | protected payload ...  | 0x1c |
//! +--------+-------+------+------------------------+------+
//! ```
//!
//! A parity failure or an over-long frame throws the partial frame away and
//! puts the receiver into resync: bytes are dropped until the next
//! separator, after which a fresh frame can start.

use core::fmt;

use arrayvec::ArrayVec;
use log::{trace, warn};

use crate::constants::{FS, MAX_FRAME_LEN, RAW_HEADER_LEN};
use crate::utils::{has_valid_parity, Hex};

/// A complete frame as received, without its separator.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Frame {
    bytes: ArrayVec<[u8; MAX_FRAME_LEN]>,
}

impl Frame {
    /// Builds a frame from raw bytes, e.g. for replaying a capture.
    /// Returns `None` if `bytes` doesn't fit in a frame buffer.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut frame = Frame::default();
        frame.bytes.try_extend_from_slice(bytes).ok()?;
        Some(frame)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// First byte of the frame; `ERROR_MARKER` on device errors.
    pub fn marker(&self) -> Option<u8> {
        self.bytes.first().copied()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame[{}]", Hex(&self.bytes))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Hex(&self.bytes), f)
    }
}

/// Link status reported alongside frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// First byte of a new frame arrived.
    FrameStarted,
    /// A protected byte failed its parity check. `offset` is its position in
    /// the frame.
    ParityError { offset: usize, byte: u8 },
    /// The frame outgrew the receive buffer before its separator arrived.
    Overflow,
    /// The separator ending a discarded frame arrived; the next byte starts a
    /// new frame.
    Resynchronized,
}

impl LinkStatus {
    /// True for statuses that mean a frame was lost.
    pub fn is_fault(&self) -> bool {
        match self {
            LinkStatus::ParityError { .. } | LinkStatus::Overflow => true,
            LinkStatus::FrameStarted | LinkStatus::Resynchronized => false,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::FrameStarted => write!(f, "frame started"),
            LinkStatus::ParityError { offset, byte } => {
                write!(f, "parity error at offset {} (0x{:02x})", offset, byte)
            }
            LinkStatus::Overflow => write!(f, "frame overflow (max {} bytes)", MAX_FRAME_LEN),
            LinkStatus::Resynchronized => write!(f, "resynchronized"),
        }
    }
}

/// Something the receiver has to tell the session layer about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Status(LinkStatus),
    Frame(Frame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    Idle,
    Receiving,
    Resync,
}

/// Byte-at-a-time frame assembler for the F56 link.
#[derive(Debug)]
pub struct FrameCodec {
    state: RxState,
    frame: Frame,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        FrameCodec {
            state: RxState::Idle,
            frame: Frame::default(),
        }
    }

    /// Consumes one received byte. Never blocks; yields at most one event.
    pub fn feed(&mut self, byte: u8) -> Option<LinkEvent> {
        match self.state {
            RxState::Resync => {
                if byte == FS {
                    trace!("link resynchronized");
                    self.state = RxState::Idle;
                    return Some(LinkEvent::Status(LinkStatus::Resynchronized));
                }
                None
            }
            RxState::Idle => {
                if byte == FS {
                    // Empty frame, nothing to report.
                    return None;
                }
                self.frame.bytes.clear();
                self.state = RxState::Receiving;
                if let Some(fault) = self.accept(byte) {
                    return Some(fault);
                }
                Some(LinkEvent::Status(LinkStatus::FrameStarted))
            }
            RxState::Receiving => {
                if byte == FS {
                    self.state = RxState::Idle;
                    let frame = core::mem::take(&mut self.frame);
                    trace!("received frame: {}", frame);
                    return Some(LinkEvent::Frame(frame));
                }
                self.accept(byte)
            }
        }
    }

    /// Drops any partial frame and waits for the start of a new one.
    pub fn reset(&mut self) {
        self.frame.bytes.clear();
        self.state = RxState::Idle;
    }

    /// True while part of a frame has been buffered.
    pub fn in_frame(&self) -> bool {
        self.state == RxState::Receiving
    }

    /// Number of bytes buffered for the frame in progress.
    pub fn buffered_len(&self) -> usize {
        self.frame.len()
    }

    fn accept(&mut self, byte: u8) -> Option<LinkEvent> {
        let offset = self.frame.len();
        if offset >= RAW_HEADER_LEN && !has_valid_parity(byte) {
            warn!("parity error at offset {}: 0x{:02x}", offset, byte);
            return Some(self.fault(LinkStatus::ParityError { offset, byte }));
        }
        if self.frame.bytes.try_push(byte).is_err() {
            warn!("frame exceeds {} bytes, discarding", MAX_FRAME_LEN);
            return Some(self.fault(LinkStatus::Overflow));
        }
        None
    }

    fn fault(&mut self, status: LinkStatus) -> LinkEvent {
        self.frame.bytes.clear();
        self.state = RxState::Resync;
        LinkEvent::Status(status)
    }
}
