//! Core protocol types
//!
//! This module contains the types shared across the gateway, executable,
//! relay, and API layers: addresses, content-derived message ids, the
//! cross-chain message itself, and its status state machine.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ADDRESSES
// ============================================================================

/// A 32-byte account address.
///
/// Addresses are rendered as 0x-prefixed lowercase hex. Parsing accepts
/// shorter hex strings (with or without the 0x prefix) and restores the
/// stripped leading zeros, so `"0x1"` names the same address as its full
/// 64-character form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

/// Errors raised while parsing an address or message id from hex.
#[derive(Debug, thiserror::Error)]
pub enum ParseAddressError {
    #[error("hex string longer than 32 bytes: {0}")]
    TooLong(String),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Parse a 0x-hex string into 32 bytes, left-padding with zeros.
/// Odd-length hex is padded to even length first (`"0x1"` reads as `0x01`).
fn parse_32_byte_hex(s: &str) -> Result<[u8; 32], ParseAddressError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    if stripped.len() > 64 {
        return Err(ParseAddressError::TooLong(s.to_string()));
    }
    let padded = format!("{:0>64}", stripped);
    let raw = hex::decode(&padded).map_err(|_| ParseAddressError::InvalidHex(s.to_string()))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&raw);
    Ok(out)
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_32_byte_hex(s).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// MESSAGE IDS
// ============================================================================

/// Globally unique, content-derived message identifier.
///
/// Assigned exactly once by the source gateway:
/// `keccak256(len(source_chain) || source_chain || nonce)` where `nonce` is
/// the gateway's outbound sequence number. The id is the replay-protection
/// key on the destination side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub [u8; 32]);

impl MessageId {
    /// Derive the id for the `nonce`-th outbound message of `source_chain`.
    pub fn derive(source_chain: &str, nonce: u64) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update((source_chain.len() as u32).to_be_bytes());
        hasher.update(source_chain.as_bytes());
        hasher.update(nonce.to_be_bytes());
        MessageId(hasher.finalize().into())
    }
}

impl FromStr for MessageId {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_32_byte_hex(s).map(MessageId)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for MessageId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

/// A token transfer accompanying a cross-chain call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    /// Symbol of the token, resolved against each chain's token registry
    pub symbol: String,
    /// Amount in the token's base units
    pub amount: u128,
}

/// The unit of cross-chain intent: a payload addressed to an executable on
/// another chain, optionally carrying a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Content-derived unique id (see [`MessageId::derive`])
    pub id: MessageId,
    /// Name of the chain the message was created on
    pub source_chain: String,
    /// Name of the chain the message is addressed to
    pub destination_chain: String,
    /// Address that initiated the call on the source chain
    pub sender: Address,
    /// Address of the executable on the destination chain
    pub destination_address: Address,
    /// Opaque payload bytes, decoded only by the executable
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    /// Token accompanying the call, if any
    pub token: Option<TokenTransfer>,
}

/// Delivery status of a message on the destination gateway.
///
/// `Pending -> Approved -> Executed | Failed`; no transition leaves
/// `Executed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Emitted on the source chain, not yet approved on the destination
    Pending,
    /// Approved by the trusted relayer, awaiting execution
    Approved,
    /// Executed successfully; terminal
    Executed,
    /// Execution failed; terminal, custodied tokens stay at the gateway
    Failed,
}

impl MessageStatus {
    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Executed | MessageStatus::Failed)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageStatus::Pending => "Pending",
            MessageStatus::Approved => "Approved",
            MessageStatus::Executed => "Executed",
            MessageStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// A message together with its destination-side status, as persisted by the
/// gateway and returned by the status API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message: Message,
    pub status: MessageStatus,
    /// Unix timestamp of the last status transition
    pub updated_at: u64,
}

// ============================================================================
// HEX SERIALIZATION HELPERS
// ============================================================================

/// Serde adapter rendering byte vectors as 0x-prefixed hex strings.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let stripped = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(stripped).map_err(serde::de::Error::custom)
    }
}
