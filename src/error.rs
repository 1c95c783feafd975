//! Driver error types.

use thiserror::Error;

use crate::link::{Frame, LinkStatus};
use crate::responses::{DecodeError, Header};

/// Errors raised while building a command, before anything is sent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// A count field only holds two decimal digits.
    #[error("count {0} out of range: must be 0-99")]
    CountOutOfRange(u8),

    /// The bill table has no entry for the requested currency.
    #[error("unknown currency")]
    UnknownCurrency,

    /// The currency has no length entry for this denomination index.
    #[error("unknown denomination index {0}")]
    UnknownDenomination(usize),
}

/// Errors returned by [`F56`](crate::F56) operations.
///
/// `E` is the error type of the serial halves the driver was built with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// A request is already outstanding. Nothing was sent.
    #[error("a request is already in progress")]
    Busy,

    /// `poll` was called with no request outstanding.
    #[error("no request pending")]
    NoPendingRequest,

    /// The device answered with its error marker.
    #[error("device reported an error: {frame}")]
    Device { frame: Frame },

    /// The reply belongs to a different command; the link is out of step.
    #[error("invalid response header: expected {expected}, got {found}")]
    HeaderMismatch { expected: Header, found: Header },

    /// The link faulted while a request was outstanding.
    #[error("link fault: {0}")]
    Link(LinkStatus),

    /// Reply is too short to hold the fields being decoded.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    /// A digit-pair field did not hold two ASCII digits.
    #[error("invalid digit pair at offset {offset}: {pair:02x?}")]
    InvalidDigits { offset: usize, pair: [u8; 2] },

    #[error(transparent)]
    Command(#[from] CommandError),

    /// The serial port failed. Passed through as-is.
    #[error("transport error: {0:?}")]
    Transport(E),
}

impl<E> From<DecodeError> for Error<E> {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::TooShort { expected, actual } => Error::FrameTooShort { expected, actual },
            DecodeError::InvalidDigits { offset, pair } => Error::InvalidDigits { offset, pair },
        }
    }
}
