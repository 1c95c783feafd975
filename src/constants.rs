//! Protocol constants for the F56 link.
//!
//! Names follow the F56 serial interface documentation where it has them.

/// Frame separator. Ends every frame in both directions.
pub const FS: u8 = 0x1c;

/// Leading opcode of every host → device command.
pub const OPCODE: u8 = 0x60;

/// First byte of a reply when the device rejects a command.
pub const ERROR_MARKER: u8 = 0xf0;

/// Number of leading raw (unprotected) bytes in a received frame: marker,
/// class and code. Every later byte carries a parity bit.
pub const RAW_HEADER_LEN: usize = 3;

/// Largest frame body (terminator excluded) the receiver will buffer.
pub const MAX_FRAME_LEN: usize = 128;

/// Largest command the encoder will produce, terminator included.
pub const MAX_COMMAND_LEN: usize = 32;

/// Number of pockets the device addresses. Fixed by the hardware.
pub const POCKETS: usize = 4;

// Initialize ("set bill information")
pub const INIT_CLASS: u8 = 0x02;
pub const INIT_CODE: u8 = 0x0d;
pub const INIT_REPLY_CLASS: u8 = 0x02;
pub const INIT_REPLY_CODE: u8 = 0x34;

/// Default option byte for initialize. Other values select regional and
/// shutter variants.
pub const INIT_OPTION_DEFAULT: u8 = 0x00;

// Count ("bill count")
pub const COUNT_CLASS: u8 = 0x03;
pub const COUNT_CODE: u8 = 0x15;
pub const COUNT_REPLY_CLASS: u8 = 0x03;
pub const COUNT_REPLY_CODE: u8 = 0x99;
pub const COUNT_OPTION_DEFAULT: u8 = 0xe4;

/// Rejected notes tolerated per pocket before the count aborts.
pub const COUNT_REJECT_LIMIT: u8 = 4;

/// Pick retries per pocket.
pub const COUNT_RETRIES: u8 = 3;

/// Host serial settings: 9600 baud, 8 data bits, even parity, 1 stop bit.
pub const BAUD_RATE: u32 = 9600;
