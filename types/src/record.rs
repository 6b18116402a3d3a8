//! The queue record owned by a store.

use serde::{Deserialize, Serialize};

use crate::{BlockRef, Status, StatusBits, Timestamp, TxHash};

/// A queued transaction and its current state.
///
/// Records are only ever changed through store operations that enforce the
/// valid transitions; callers receive copies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub hash: TxHash,
    /// Allocation order; `upcoming` is served in ascending sequence.
    pub seq: u64,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub status: StatusBits,
    pub created: Timestamp,
    pub updated: Timestamp,
    /// Number of `send_start` calls so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub block: Option<BlockRef>,
    #[serde(default)]
    pub tx_index: Option<u32>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub nonce: Option<u64>,
}

impl TxRecord {
    /// A fresh `Pending` record.
    pub fn new(hash: TxHash, seq: u64, payload: Vec<u8>, now: Timestamp) -> Self {
        Self {
            hash,
            seq,
            payload,
            status: StatusBits::EMPTY,
            created: now,
            updated: now,
            attempts: 0,
            block: None,
            tx_index: None,
            sender: None,
            nonce: None,
        }
    }

    pub fn state(&self) -> Option<Status> {
        self.status.status()
    }

    /// Wire form handed to a dispatcher: `0x`-prefixed lowercase hex.
    pub fn to_wire(&self) -> String {
        format!("0x{}", hex::encode(&self.payload))
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_is_prefixed_hex() {
        let r = TxRecord::new(TxHash::of(b"\x01\xab"), 0, vec![0x01, 0xab], Timestamp::new(5));
        assert_eq!(r.to_wire(), "0x01ab");
        assert_eq!(r.state(), Some(Status::Pending));
    }

    #[test]
    fn json_payload_is_hex_string() {
        let r = TxRecord::new(TxHash::of(b"abc"), 7, b"abc".to_vec(), Timestamp::new(1));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["payload"], "616263");
        let back: TxRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
