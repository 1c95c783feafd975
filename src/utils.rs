use core::fmt;

use crate::error::CommandError;

/// Decodes a structured value out of a received frame.
pub trait FromPayload: Sized {
    type Error;

    fn from_payload(payload: &[u8]) -> Result<Self, Self::Error>;
}

pub trait CommandWriter {
    fn write_cmd_bytes(&mut self, bytes: &[u8]);
}

pub trait ToPayload {
    fn to_payload(&self, writer: &mut dyn CommandWriter) -> Result<(), CommandError>;
}

/// XOR-fold parity of the low 7 bits: 1 if an odd number of them are set.
pub fn parity_bit(byte: u8) -> u8 {
    let mut y = byte & 0x7f;
    y ^= y >> 1;
    y ^= y >> 2;
    y ^= y >> 4;
    y & 1
}

/// Returns the low 7 bits of `byte` with bit 7 set to their parity.
pub fn with_parity(byte: u8) -> u8 {
    (byte & 0x7f) | (parity_bit(byte) << 7)
}

/// True if bit 7 of `byte` matches the parity of its low 7 bits.
pub fn has_valid_parity(byte: u8) -> bool {
    byte >> 7 == parity_bit(byte)
}

/// Digit-pair encoding. Renders `n` as two zero-padded ASCII decimal digits,
/// each carrying its parity bit. `None` if `n` doesn't fit in two digits.
pub fn digit_pair(n: u8) -> Option<[u8; 2]> {
    if n > 99 {
        return None;
    }
    Some([with_parity(b'0' + n / 10), with_parity(b'0' + n % 10)])
}

/// Inverse of [`digit_pair`]. Parity bits are masked off before parsing;
/// checking them is the link layer's job.
pub fn parse_digit_pair(pair: [u8; 2]) -> Option<u8> {
    let tens = (pair[0] & 0x7f) as char;
    let ones = (pair[1] & 0x7f) as char;
    Some(tens.to_digit(10)? as u8 * 10 + ones.to_digit(10)? as u8)
}

/// Formats bytes as space separated hex pairs, e.g. `60 02 0d`.
#[derive(Debug, Clone, Copy)]
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
