use core::fmt;

use thiserror::Error;

use crate::constants::*;
use crate::link::Frame;
use crate::utils::{parse_digit_pair, FromPayload};

/// The class/code pair at offsets 1 and 2 of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub class: u8,
    pub code: u8,
}

impl Header {
    pub const INITIALIZE: Header = Header {
        class: INIT_REPLY_CLASS,
        code: INIT_REPLY_CODE,
    };

    pub const COUNT: Header = Header {
        class: COUNT_REPLY_CLASS,
        code: COUNT_REPLY_CODE,
    };

    /// Reads the header out of a frame, if it's long enough to have one.
    pub fn of(frame: &[u8]) -> Option<Header> {
        match frame {
            [_, class, code, ..] => Some(Header {
                class: *class,
                code: *code,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x} {:02x}", self.class, self.code)
    }
}

/// Which reply a pending request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Initialize,
    Count,
}

impl ReplyKind {
    pub fn header(self) -> Header {
        match self {
            ReplyKind::Initialize => Header::INITIALIZE,
            ReplyKind::Count => Header::COUNT,
        }
    }
}

/// Replies returned by the F56, one per command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Bill information was accepted.
    Initialize,

    /// Count finished.
    Count(CountResult),
}

/// Notes moved by a count, per pocket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountResult {
    /// Notes dispensed from pockets 1 and 2.
    pub accepted: [u8; 2],
    /// Notes rejected from pockets 1 and 2.
    pub rejected: [u8; 2],
}

/// Digit-pair fields in a count reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountField {
    Dispensed1,
    Dispensed2,
    Rejected1,
    Rejected2,
}

/// Offset of each digit pair in a count reply. Each field is two bytes.
pub const COUNT_REPLY_FIELDS: [(CountField, usize); 4] = [
    (CountField::Dispensed1, 0x27),
    (CountField::Dispensed2, 0x29),
    (CountField::Rejected1, 0x2f),
    (CountField::Rejected2, 0x31),
];

/// Failure decoding a reply body whose header has already been checked.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("invalid digit pair at offset {offset:#04x}: {pair:02x?}")]
    InvalidDigits { offset: usize, pair: [u8; 2] },
}

impl FromPayload for CountResult {
    type Error = DecodeError;

    fn from_payload(payload: &[u8]) -> Result<CountResult, DecodeError> {
        let expected = COUNT_REPLY_FIELDS
            .iter()
            .map(|(_, offset)| offset + 2)
            .max()
            .unwrap_or(0);
        if payload.len() < expected {
            return Err(DecodeError::TooShort {
                expected,
                actual: payload.len(),
            });
        }

        let mut result = CountResult::default();
        for (field, offset) in COUNT_REPLY_FIELDS.iter() {
            let pair = [payload[*offset], payload[offset + 1]];
            let value = parse_digit_pair(pair).ok_or(DecodeError::InvalidDigits {
                offset: *offset,
                pair,
            })?;
            match field {
                CountField::Dispensed1 => result.accepted[0] = value,
                CountField::Dispensed2 => result.accepted[1] = value,
                CountField::Rejected1 => result.rejected[0] = value,
                CountField::Rejected2 => result.rejected[1] = value,
            }
        }
        Ok(result)
    }
}

impl Reply {
    /// Decodes the body of a reply. The frame's marker and header must
    /// already have been checked against `kind`.
    pub fn decode(kind: ReplyKind, frame: &Frame) -> Result<Reply, DecodeError> {
        match kind {
            ReplyKind::Initialize => Ok(Reply::Initialize),
            ReplyKind::Count => CountResult::from_payload(frame.as_bytes()).map(Reply::Count),
        }
    }
}
