//! JSON mirror of the binary wire path.
//!
//! Same contract (encode a value, decode it back) as `ObjectPack`, backed
//! by `serde_json` instead of the hand-rolled binary format. Not wired
//! into the MPI transport: `distgraph-mpi`'s `send`/`recv`/`all_to_all`
//! are generic over `PackSerialize` only, so every message on the wire
//! uses the binary path. This module is a standalone textual codec a
//! caller can reach for directly (e.g. logging or replaying a captured
//! payload for debugging) without going through MPI at all.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PackResult;

/// Encodes `value` as a JSON byte string.
pub fn to_json_bytes<T: Serialize>(value: &T) -> PackResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes a JSON byte string produced by `to_json_bytes`.
pub fn from_json_bytes<T: DeserializeOwned>(bytes: &[u8]) -> PackResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn json_path_round_trips() {
        let value = Sample {
            a: 5,
            b: "hi".into(),
        };
        let bytes = to_json_bytes(&value).unwrap();
        let back: Sample = from_json_bytes(&bytes).unwrap();
        assert_eq!(value, back);
    }
}
