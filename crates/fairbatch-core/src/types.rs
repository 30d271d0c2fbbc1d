use serde::{Deserialize, Serialize};
use std::fmt;

/// Price in base units of the quoted asset. u128 leaves ample headroom for
/// the weighted-sum accumulation performed before the single final division.
pub type Price = u128;

/// Deposited order volume in base units.
pub type Volume = u128;

/// Monotonic time counter supplied by the embedding ledger. The core never
/// reads a wall clock; every deadline is a comparison against a `Tick`.
pub type Tick = u64;

/// Monotonically increasing batch identifier.
pub type BatchId = u64;

/// Registry-assigned oracle identifier.
pub type OracleId = u64;

/// Persistent oracle reputation weight, clamped to `[W_MIN, W_MAX]`.
pub type Weight = u64;

/// Signed fixed-point percentage in basis points (parts per 10,000).
pub type Bps = i64;

// ── ParticipantId ────────────────────────────────────────────────────────────

/// 32-byte participant identifier, opaque to the core (the embedding system
/// decides whether it is a key hash, an account id, or anything else).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub [u8; 32]);

impl ParticipantId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({}…)", &self.to_hex()[..8])
    }
}

// ── Side ─────────────────────────────────────────────────────────────────────

/// Which side of the pool an order sits on. Fixed at first deposit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_id_hex_round_trip() {
        let id = ParticipantId::from_bytes([7u8; 32]);
        let hex = id.to_hex();
        assert_eq!(ParticipantId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn participant_id_rejects_short_hex() {
        assert!(ParticipantId::from_hex("abcd").is_err());
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }
}
