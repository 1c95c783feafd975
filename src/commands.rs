use arrayvec::ArrayVec;

use crate::bills::BillTable;
use crate::constants::*;
use crate::error::CommandError;
use crate::responses::ReplyKind;
use crate::utils::{digit_pair, CommandWriter, ToPayload};

/// Encoded command bytes, separator included.
pub type CommandBytes = ArrayVec<[u8; MAX_COMMAND_LEN]>;

/// Commands one can send to the F56.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Tells the device which notes sit in the top and bottom cassettes.
    Initialize {
        /// Option byte. Selects regional and shutter variants.
        option: u8,
        /// Length codes of the top and bottom cassette notes.
        lengths: [u8; 2],
        /// Note thickness code, applied to every pocket.
        thickness: u8,
    },

    /// Counts notes out of the top and bottom cassettes.
    Count {
        option: u8,
        /// Notes to dispense from pockets 1 and 2. At most 99 each.
        counts: [u8; 2],
        /// Rejects tolerated per pocket. At most 99.
        reject_limit: u8,
        /// Pick retries per pocket.
        retries: u8,
    },
}

impl Command {
    /// Builds an initialize command from the bill table.
    ///
    /// `top` and `bottom` index into the currency's denomination lengths.
    pub fn initialize<B>(
        bills: &B,
        currency: &str,
        top: usize,
        bottom: usize,
    ) -> Result<Command, CommandError>
    where
        B: BillTable + ?Sized,
    {
        let data = bills
            .currency(currency)
            .ok_or(CommandError::UnknownCurrency)?;
        let top_len = data
            .length(top)
            .ok_or(CommandError::UnknownDenomination(top))?;
        let bottom_len = data
            .length(bottom)
            .ok_or(CommandError::UnknownDenomination(bottom))?;

        Ok(Command::Initialize {
            option: INIT_OPTION_DEFAULT,
            lengths: [top_len, bottom_len],
            thickness: data.thickness,
        })
    }

    /// Builds a count command for the top and bottom cassettes.
    pub fn count(top: u8, bottom: u8) -> Result<Command, CommandError> {
        for n in [top, bottom].iter() {
            if *n > 99 {
                return Err(CommandError::CountOutOfRange(*n));
            }
        }
        Ok(Command::Count {
            option: COUNT_OPTION_DEFAULT,
            counts: [top, bottom],
            reject_limit: COUNT_REJECT_LIMIT,
            retries: COUNT_RETRIES,
        })
    }

    /// The reply this command expects.
    pub fn reply_kind(&self) -> ReplyKind {
        match self {
            Command::Initialize { .. } => ReplyKind::Initialize,
            Command::Count { .. } => ReplyKind::Count,
        }
    }

    /// Serializes the command, separator included.
    pub fn encode(&self) -> Result<CommandBytes, CommandError> {
        let mut bytes = CommandBytes::new();
        self.to_payload(&mut bytes)?;
        Ok(bytes)
    }
}

impl CommandWriter for CommandBytes {
    fn write_cmd_bytes(&mut self, bytes: &[u8]) {
        // Every command is a fixed size, well under MAX_COMMAND_LEN.
        self.try_extend_from_slice(bytes)
            .expect("command exceeds MAX_COMMAND_LEN");
    }
}

fn write_digit_pair(writer: &mut dyn CommandWriter, n: u8) -> Result<(), CommandError> {
    let pair = digit_pair(n).ok_or(CommandError::CountOutOfRange(n))?;
    writer.write_cmd_bytes(&pair);
    Ok(())
}

impl ToPayload for Command {
    fn to_payload(&self, writer: &mut dyn CommandWriter) -> Result<(), CommandError> {
        match self {
            // Required packet:
            // opcd   | 0x60 [1]
            // class  | 0x02 [1]
            // code   | 0x0d [1]
            // option | option [1]
            // length | top, bottom, 0, 0, 0, 0 [6]
            // thick  | thickness x4 [4]
            // fs     | 0x1c [1]
            Self::Initialize {
                option,
                lengths,
                thickness,
            } => {
                writer.write_cmd_bytes(&[OPCODE, INIT_CLASS, INIT_CODE, *option]);
                writer.write_cmd_bytes(lengths);
                writer.write_cmd_bytes(&[0x00; 4]);
                writer.write_cmd_bytes(&[*thickness; POCKETS]);
            }

            // Required packet:
            // opcd   | 0x60 [1]
            // class  | 0x03 [1]
            // code   | 0x15 [1]
            // option | option [1]
            // counts | D(top), D(bottom), D(0), D(0) [8]
            // reject | D(limit) x4 [8]
            // retry  | retries x4 [4]
            // fs     | 0x1c [1]
            Self::Count {
                option,
                counts,
                reject_limit,
                retries,
            } => {
                writer.write_cmd_bytes(&[OPCODE, COUNT_CLASS, COUNT_CODE, *option]);
                for n in counts.iter().chain([0, 0].iter()) {
                    write_digit_pair(writer, *n)?;
                }
                for _ in 0..POCKETS {
                    write_digit_pair(writer, *reject_limit)?;
                }
                writer.write_cmd_bytes(&[*retries; POCKETS]);
            }
        }
        writer.write_cmd_bytes(&[FS]);
        Ok(())
    }
}
