//! Canonical CBOR encoding for signed and hashed structures.
//!
//! Implements the subset of RFC 8949 Core Deterministic Encoding that Seal
//! needs:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are u64 seconds)
//!
//! Anything that is signed (proof messages) or hashed into an identifier
//! (content ids) goes through this module so that every implementation
//! produces identical bytes.

use ciborium::value::{Integer, Value};

use crate::error::CoreError;

/// Encode a CBOR value to canonical bytes.
pub fn canonical_encode(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::EncodingError(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

/// Build a map entry with an integer key.
pub fn entry(key: u64, value: Value) -> (Value, Value) {
    (Value::Integer(key.into()), value)
}

/// A decoded integer-keyed CBOR map with typed accessors.
///
/// Decoding is strict: [`CanonicalMap::decode`] re-encodes the parsed value
/// and rejects input that is not already in canonical form, so two distinct
/// byte strings can never decode to the same signed structure.
#[derive(Debug)]
pub struct CanonicalMap {
    entries: Vec<(Value, Value)>,
}

impl CanonicalMap {
    /// Parse canonical bytes into a map.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: Value =
            ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;

        let reencoded = canonical_encode(&value)?;
        if reencoded != bytes {
            return Err(CoreError::DecodingError("input is not canonical".into()));
        }

        match value {
            Value::Map(entries) => Ok(Self { entries }),
            _ => Err(CoreError::DecodingError("expected map".into())),
        }
    }

    fn get(&self, key: u64) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
    }

    /// Number of entries in the map.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read an unsigned integer field.
    pub fn uint(&self, key: u64, name: &str) -> Result<u64, CoreError> {
        match self.get(key) {
            Some(Value::Integer(i)) => u64::try_from(i128::from(*i))
                .map_err(|_| CoreError::DecodingError(format!("{} out of range", name))),
            _ => Err(CoreError::DecodingError(format!("missing {}", name))),
        }
    }

    /// Read a byte-string field.
    pub fn bytes(&self, key: u64, name: &str) -> Result<&[u8], CoreError> {
        match self.get(key) {
            Some(Value::Bytes(b)) => Ok(b),
            _ => Err(CoreError::DecodingError(format!("missing {}", name))),
        }
    }

    /// Read a fixed-size byte-string field.
    pub fn fixed<const N: usize>(&self, key: u64, name: &str) -> Result<[u8; N], CoreError> {
        self.bytes(key, name)?
            .try_into()
            .map_err(|_| CoreError::DecodingError(format!("invalid {} length", name)))
    }

    /// Read a text field.
    pub fn text(&self, key: u64, name: &str) -> Result<&str, CoreError> {
        match self.get(key) {
            Some(Value::Text(s)) => Ok(s),
            _ => Err(CoreError::DecodingError(format!("missing {}", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_integers_single_byte() {
        let bytes = canonical_encode(&Value::Integer(5u64.into())).unwrap();
        assert_eq!(bytes, vec![0x05]);

        let bytes = canonical_encode(&Value::Integer(24u64.into())).unwrap();
        assert_eq!(bytes, vec![0x18, 24]);
    }

    #[test]
    fn test_map_keys_sorted() {
        let unsorted = Value::Map(vec![
            entry(3, Value::Integer(1u64.into())),
            entry(1, Value::Integer(2u64.into())),
        ]);
        let sorted = Value::Map(vec![
            entry(1, Value::Integer(2u64.into())),
            entry(3, Value::Integer(1u64.into())),
        ]);
        assert_eq!(
            canonical_encode(&unsorted).unwrap(),
            canonical_encode(&sorted).unwrap()
        );
    }

    #[test]
    fn test_floats_rejected() {
        assert!(canonical_encode(&Value::Float(1.5)).is_err());
    }

    #[test]
    fn test_decode_accessors() {
        let value = Value::Map(vec![
            entry(0, Value::Integer(7u64.into())),
            entry(1, Value::Bytes(vec![0xaa; 4])),
            entry(2, Value::Text("seal".into())),
        ]);
        let bytes = canonical_encode(&value).unwrap();
        let map = CanonicalMap::decode(&bytes).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.uint(0, "version").unwrap(), 7);
        assert_eq!(map.fixed::<4>(1, "blob").unwrap(), [0xaa; 4]);
        assert_eq!(map.text(2, "label").unwrap(), "seal");
        assert!(map.uint(9, "missing").is_err());
        assert!(map.fixed::<8>(1, "blob").is_err());
    }

    #[test]
    fn test_decode_rejects_non_canonical() {
        // Map {1: 2, 0: 1} with keys out of order.
        let bytes = vec![0xa2, 0x01, 0x02, 0x00, 0x01];
        assert!(CanonicalMap::decode(&bytes).is_err());

        // Integer 5 encoded with a one-byte argument.
        let bytes = vec![0xa1, 0x00, 0x18, 0x05];
        assert!(CanonicalMap::decode(&bytes).is_err());
    }
}
