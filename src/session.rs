//! Session layer: one request in flight at a time.
//!
//! ```text
//! Idle --issue--> AwaitingResponse --matching frame--> Responded --> Idle
//!                                  --link fault / device error /
//!                                    header mismatch--> Errored   --> Idle
//! ```
//!
//! `Responded` and `Errored` are transient; the session is back in `Idle` by
//! the time [`Session::handle`] returns the outcome.

use embedded_hal::serial::Write;
use log::{debug, trace, warn};
use nb::block;

use crate::commands::Command;
use crate::constants::{ERROR_MARKER, RAW_HEADER_LEN};
use crate::error::Error;
use crate::link::{Frame, LinkEvent};
use crate::responses::Header;
use crate::utils::Hex;

/// How many times a command goes out on the wire per request.
pub trait RetryPolicy {
    fn transmissions(&self) -> usize;
}

/// Sends every command twice back to back. The F56 occasionally misses the
/// first copy; it answers once either way.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransmitTwice;

impl RetryPolicy for TransmitTwice {
    fn transmissions(&self) -> usize {
        2
    }
}

/// Sends every command once.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransmitOnce;

impl RetryPolicy for TransmitOnce {
    fn transmissions(&self) -> usize {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse,
    Responded,
    Errored,
}

/// Owns the transmit half of the link and tracks the outstanding request.
#[derive(Debug)]
pub struct Session<TX, P = TransmitTwice> {
    tx: TX,
    policy: P,
    state: SessionState,
    expected: Option<Header>,
}

impl<TX, P> Session<TX, P>
where
    TX: Write<u8>,
    P: RetryPolicy,
{
    pub fn new(tx: TX, policy: P) -> Self {
        Self {
            tx,
            policy,
            state: SessionState::Idle,
            expected: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// Gives back the transmit half.
    pub fn release(self) -> TX {
        self.tx
    }

    /// Arms the session for `command`'s reply and sends it.
    ///
    /// Fails with [`Error::Busy`] without sending anything if a request is
    /// already outstanding. A transmit failure drops the session back to
    /// idle.
    pub fn issue(&mut self, command: &Command) -> Result<(), Error<TX::Error>> {
        if self.state != SessionState::Idle {
            return Err(Error::Busy);
        }
        let bytes = command.encode()?;

        self.expected = Some(command.reply_kind().header());
        self.transition(SessionState::AwaitingResponse);

        for _ in 0..self.policy.transmissions() {
            debug!("sending: {}", Hex(&bytes));
            if let Err(e) = self.transmit(&bytes) {
                self.abort();
                return Err(Error::Transport(e));
            }
        }
        Ok(())
    }

    /// Feeds one link event through the state machine.
    ///
    /// Returns `Some` with the outcome once the outstanding request is
    /// settled, `None` otherwise. Events arriving while idle are dropped.
    pub fn handle(&mut self, event: LinkEvent) -> Option<Result<Frame, Error<TX::Error>>> {
        let expected = match (self.state, self.expected) {
            (SessionState::AwaitingResponse, Some(expected)) => expected,
            _ => {
                debug!("dropping unsolicited {:?}", event);
                return None;
            }
        };

        let outcome = match event {
            LinkEvent::Status(status) if status.is_fault() => Err(Error::Link(status)),
            LinkEvent::Status(status) => {
                trace!("link: {}", status);
                return None;
            }
            LinkEvent::Frame(frame) => classify(frame, expected),
        };

        match outcome {
            Ok(_) => self.transition(SessionState::Responded),
            Err(_) => self.transition(SessionState::Errored),
        }
        self.settle();
        Some(outcome)
    }

    /// Gives up on the outstanding request, if any.
    pub fn abort(&mut self) {
        if self.state != SessionState::Idle {
            self.transition(SessionState::Errored);
            self.settle();
        }
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), TX::Error> {
        for byte in bytes {
            block!(self.tx.write(*byte))?;
        }
        block!(self.tx.flush())
    }

    fn transition(&mut self, next: SessionState) {
        trace!("session: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn settle(&mut self) {
        self.expected = None;
        self.transition(SessionState::Idle);
    }
}

/// Sorts a reply into success, device error or desync.
fn classify<E>(frame: Frame, expected: Header) -> Result<Frame, Error<E>> {
    if frame.marker() == Some(ERROR_MARKER) {
        warn!("F56 error: {}", frame);
        return Err(Error::Device { frame });
    }
    match Header::of(frame.as_bytes()) {
        Some(found) if found == expected => Ok(frame),
        Some(found) => {
            warn!("invalid response header: expected {}, got {}", expected, found);
            Err(Error::HeaderMismatch { expected, found })
        }
        None => Err(Error::FrameTooShort {
            expected: RAW_HEADER_LEN,
            actual: frame.len(),
        }),
    }
}
