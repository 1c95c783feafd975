//! **f56** is an embedded-hal driver for the F56 banknote validator/dispenser.
//!
//! The driver speaks the F56 serial protocol in three layers:
//!
//! - a link layer ([`FrameCodec`]) that checks per-byte parity and cuts the
//!   incoming byte stream into frames at each `0x1c` separator,
//! - a session layer ([`Session`]) that allows one request in flight, sends
//!   each command twice and sorts replies into success, device error and
//!   header mismatch,
//! - commands and replies ([`Command`], [`Reply`]) with the digit-pair encoding
//!   used by every numeric field.
//!
//! [`F56`] ties them together. The UART must be set to 9600 baud, 8 data bits,
//! even parity, 1 stop bit.
//!
//! ## Example
//!
//! To load bill information and count out some notes:
//! ```
//! # use embedded_hal::serial::{Read, Write};
//! use f56::{Currency, F56};
//! # struct TestTx;
//! # struct TestRx(usize);
//! #
//! # impl Write<u8> for TestTx {
//! #     type Error = ();
//! #     fn write(&mut self, _word: u8) -> nb::Result<(), Self::Error> {
//! #         return Ok(());
//! #     }
//! #     fn flush(&mut self) -> nb::Result<(), Self::Error> {
//! #         return Ok(());
//! #     }
//! # }
//! #
//! # // `None` marks a quiet line; each reply follows one.
//! # fn res_data() -> Vec<Option<u8>> {
//! #     let mut count = vec![0u8; 0x33];
//! #     count[..3].copy_from_slice(&[0x60, 0x03, 0x99]);
//! #     count[0x27..0x2b].copy_from_slice(&[0x30, 0x30, 0xb1, 0xb2]);
//! #     count[0x2f..0x33].copy_from_slice(&[0x30, 0x30, 0x30, 0x30]);
//! #     let mut data = vec![None, Some(0x60), Some(0x02), Some(0x34), Some(0x1c), None];
//! #     data.extend(count.into_iter().map(Some));
//! #     data.push(Some(0x1c));
//! #     data
//! # }
//! #
//! # impl Read<u8> for TestRx {
//! #     type Error = ();
//! #     fn read(&mut self) -> nb::Result<u8, Self::Error> {
//! #         let word = res_data().get(self.0).copied().flatten();
//! #         self.0 += 1;
//! #         return word.ok_or(nb::Error::WouldBlock);
//! #     }
//! # }
//! # let mut rx = TestRx(0);
//! # let mut tx = TestTx;
//!
//! const BILLS: &[Currency<'static>] = &[Currency {
//!     code: "USD",
//!     lengths: &[0x00, 0x9b, 0x9b, 0x9b],
//!     thickness: 0x0c,
//! }];
//!
//! // Obtain tx, rx from some serial port implementation
//! let mut f56 = F56::new(tx, rx);
//! f56.initialize(BILLS, "USD", 1, 1).expect("initialize");
//! match f56.count(0, 12) {
//!     Ok(result) => println!("Dispensed: {:?}, rejected: {:?}", result.accepted, result.rejected),
//!     Err(error) => panic!("Error: {}", error),
//! }
//! ```
//!
//! For a PC-based example, see `demos/pc_dispense.rs`.
#![warn(missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(not(test), no_std)]

mod bills;
mod commands;
pub mod constants;
mod driver;
mod error;
mod link;
mod responses;
mod session;
mod utils;

pub use crate::bills::{BillTable, Currency};
pub use crate::commands::{Command, CommandBytes};
pub use crate::driver::F56;
pub use crate::error::{CommandError, Error};
pub use crate::link::{Frame, FrameCodec, LinkEvent, LinkStatus};
pub use crate::responses::{
    CountField, CountResult, DecodeError, Header, Reply, ReplyKind, COUNT_REPLY_FIELDS,
};
pub use crate::session::{RetryPolicy, Session, SessionState, TransmitOnce, TransmitTwice};
pub use crate::utils::{digit_pair, has_valid_parity, parse_digit_pair, with_parity, Hex};
