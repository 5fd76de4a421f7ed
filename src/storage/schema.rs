use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Version written into every document envelope.
pub const CURRENT_VERSION: u32 = 1;

#[derive(Serialize)]
struct Envelope<'a, T> {
    version: u32,
    records: &'a [T],
}

pub fn encode<T: Serialize>(key: &str, records: &[T]) -> StoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(&Envelope {
        version: CURRENT_VERSION,
        records,
    })
    .map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })
}

/// Reads either a versioned envelope or the unversioned bare array.
///
/// Any other shape, including an envelope without a `records` array, is a
/// parse error.
pub fn decode<T: DeserializeOwned>(key: &str, raw: &[u8]) -> StoreResult<Vec<T>> {
    let parse_err = |source| StoreError::Parse {
        key: key.to_string(),
        source,
    };
    let value: Value = serde_json::from_slice(raw).map_err(parse_err)?;
    let records = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => {
            let found = map.get("version").and_then(Value::as_u64).unwrap_or(0);
            if found > u64::from(CURRENT_VERSION) {
                return Err(StoreError::UnsupportedVersion {
                    key: key.to_string(),
                    found,
                    supported: CURRENT_VERSION,
                });
            }
            match map.remove("records") {
                Some(records @ Value::Array(_)) => records,
                Some(_) => {
                    return Err(parse_err(serde_json::Error::custom(
                        "`records` is not an array",
                    )))
                }
                None => {
                    return Err(parse_err(serde_json::Error::custom(
                        "missing `records` in document envelope",
                    )))
                }
            }
        }
        _ => {
            return Err(parse_err(serde_json::Error::custom(
                "document is neither an envelope nor an array",
            )))
        }
    };
    serde_json::from_value(records).map_err(parse_err)
}
