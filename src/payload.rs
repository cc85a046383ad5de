//! Payload codec
//!
//! Encodes and decodes the instruction carried inside a cross-chain call:
//! a command name plus the typed arguments of a swap request. The encoding
//! is a fixed canonical layout so that any tuple round-trips byte-exact:
//!
//! ```text
//! [command_len: u32 BE] [command: UTF-8]
//! [exchange_factory: 32] [token_in: 32] [token_out: 32]
//! [min_out: u256 BE] [fee_basis_points: u256 BE] [recipient: 32]
//! ```
//!
//! Integers are 32-byte big-endian words; values that do not fit the
//! in-memory types are rejected on decode. Decoding is strict: truncated
//! input, trailing bytes, or a non-UTF-8 command all fail, and the caller
//! treats any decode failure as fatal for the message.

use crate::types::Address;

/// Command executed by the destination executable: swap the delivered token
/// for another token and credit the recipient.
pub const CMD_SWAP_TOKENS_TO_TOKENS: &str = "swapTokensToTokens";

/// Same swap, but the output token is the destination chain's wrapped
/// native asset.
pub const CMD_SWAP_TOKENS_TO_NATIVES: &str = "swapTokensToNatives";

const WORD: usize = 32;

/// Errors raised while decoding a payload. All of them are fatal for the
/// message that carried the payload.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("payload has {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("command is not valid UTF-8")]
    CommandNotUtf8,
    #[error("field `{0}` exceeds the representable range")]
    IntegerOverflow(&'static str),
}

/// The decoded swap instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPayload {
    /// Command name, dispatched by the executable
    pub command: String,
    /// Address of the pool factory on the destination chain
    pub exchange_factory: Address,
    /// Token delivered with the message
    pub token_in: Address,
    /// Token the recipient should receive
    pub token_out: Address,
    /// Minimum acceptable swap output; below it the executable falls back
    /// to transferring the raw input token
    pub min_out: u128,
    /// Fraction of the input that trades, in basis points (the remainder
    /// accrues to the pool as its fee)
    pub fee_basis_points: u64,
    /// Final recipient of the swap output (or of the fallback transfer)
    pub recipient: Address,
}

impl SwapPayload {
    /// Encode into the canonical byte layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.command.len() + 6 * WORD);
        out.extend_from_slice(&(self.command.len() as u32).to_be_bytes());
        out.extend_from_slice(self.command.as_bytes());
        out.extend_from_slice(self.exchange_factory.as_bytes());
        out.extend_from_slice(self.token_in.as_bytes());
        out.extend_from_slice(self.token_out.as_bytes());
        out.extend_from_slice(&encode_word_u128(self.min_out));
        out.extend_from_slice(&encode_word_u128(self.fee_basis_points as u128));
        out.extend_from_slice(self.recipient.as_bytes());
        out
    }

    /// Decode from the canonical byte layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let mut cursor = Cursor::new(bytes);

        let command_len = u32::from_be_bytes(cursor.take(4)?.try_into().unwrap()) as usize;
        let command = std::str::from_utf8(cursor.take(command_len)?)
            .map_err(|_| PayloadError::CommandNotUtf8)?
            .to_string();

        let exchange_factory = Address(cursor.take_word()?);
        let token_in = Address(cursor.take_word()?);
        let token_out = Address(cursor.take_word()?);
        let min_out = decode_word_u128(cursor.take_word()?, "min_out")?;
        let fee_word = decode_word_u128(cursor.take_word()?, "fee_basis_points")?;
        let fee_basis_points = u64::try_from(fee_word)
            .map_err(|_| PayloadError::IntegerOverflow("fee_basis_points"))?;
        let recipient = Address(cursor.take_word()?);

        cursor.finish()?;

        Ok(SwapPayload {
            command,
            exchange_factory,
            token_in,
            token_out,
            min_out,
            fee_basis_points,
            recipient,
        })
    }
}

fn encode_word_u128(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn decode_word_u128(word: [u8; WORD], field: &'static str) -> Result<u128, PayloadError> {
    if word[..WORD - 16].iter().any(|b| *b != 0) {
        return Err(PayloadError::IntegerOverflow(field));
    }
    Ok(u128::from_be_bytes(word[WORD - 16..].try_into().unwrap()))
}

/// Bounds-checked sequential reader over the payload bytes.
struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PayloadError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(PayloadError::Truncated { expected: usize::MAX, actual: self.bytes.len() })?;
        if end > self.bytes.len() {
            return Err(PayloadError::Truncated { expected: end, actual: self.bytes.len() });
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn take_word(&mut self) -> Result<[u8; WORD], PayloadError> {
        Ok(self.take(WORD)?.try_into().unwrap())
    }

    fn finish(self) -> Result<(), PayloadError> {
        if self.offset < self.bytes.len() {
            return Err(PayloadError::TrailingBytes(self.bytes.len() - self.offset));
        }
        Ok(())
    }
}
