//! Filename encoding
//!
//! Channel names only allow lowercase ASCII letters, digits, `-` and `_`.
//! Logical filenames are mapped into that charset by keeping `[a-z0-9-]`
//! as-is and escaping every other byte as `_` plus two hex digits.

use crate::error::{ChanstoreError, Result};
use crate::transport::Container;
use std::collections::BTreeMap;
use tracing::debug;

/// Longest channel name the platform accepts
pub const MAX_NAME_LEN: usize = 100;

const ESCAPE: u8 = b'_';

fn is_plain(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'
}

/// Encode a logical filename into a container name
pub fn encode_filename(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(ChanstoreError::InvalidFilename("empty filename".to_string()));
    }

    let mut encoded = String::with_capacity(name.len());
    for &b in name.as_bytes() {
        if is_plain(b) {
            encoded.push(b as char);
        } else {
            encoded.push(ESCAPE as char);
            encoded.push_str(&hex::encode([b]));
        }
    }

    if encoded.len() > MAX_NAME_LEN {
        return Err(ChanstoreError::FilenameTooLong {
            len: encoded.len(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(encoded)
}

/// Decode a container name back into the logical filename
pub fn decode_filename(encoded: &str) -> Result<String> {
    let invalid = || ChanstoreError::InvalidFilename(encoded.to_string());

    if encoded.is_empty() {
        return Err(invalid());
    }

    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == ESCAPE {
            let pair = bytes.get(i + 1..i + 3).ok_or_else(invalid)?;
            // uppercase hex would give two spellings of one name
            if pair.iter().any(|c| c.is_ascii_uppercase()) {
                return Err(invalid());
            }
            let escaped = hex::decode(pair).map_err(|_| invalid())?;
            if is_plain(escaped[0]) {
                return Err(invalid());
            }
            decoded.push(escaped[0]);
            i += 3;
        } else if is_plain(b) {
            decoded.push(b);
            i += 1;
        } else {
            return Err(invalid());
        }
    }

    String::from_utf8(decoded).map_err(|_| invalid())
}

/// Map logical filenames to their containers
///
/// Containers whose names do not decode belong to something else sharing
/// the group and are skipped.
pub fn file_map(containers: Vec<Container>) -> BTreeMap<String, Container> {
    let mut map = BTreeMap::new();
    for container in containers {
        match decode_filename(&container.name) {
            Ok(name) => {
                map.insert(name, container);
            }
            Err(_) => {
                debug!(container = %container.name, "Skipping undecodable container");
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_plain_name() {
        assert_eq!(encode_filename("notes-2024").unwrap(), "notes-2024");
    }

    #[test]
    fn test_encode_escapes() {
        assert_eq!(encode_filename("test.txt").unwrap(), "test_2etxt");
        assert_eq!(encode_filename("A_b").unwrap(), "_41_5fb");
        assert_eq!(decode_filename("test_2etxt").unwrap(), "test.txt");
        assert_eq!(decode_filename("_41_5fb").unwrap(), "A_b");
    }

    #[test]
    fn test_encode_rejects_empty_and_long() {
        assert!(matches!(
            encode_filename(""),
            Err(ChanstoreError::InvalidFilename(_))
        ));
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            encode_filename(&long),
            Err(ChanstoreError::FilenameTooLong { len: 101, max: 100 })
        ));
        // 34 dots encode to 102 characters
        assert!(encode_filename(&".".repeat(34)).is_err());
        assert!(encode_filename(&".".repeat(33)).is_ok());
    }

    #[test]
    fn test_decode_rejects_foreign_names() {
        for name in ["", "_2", "_zz", "_2E", "_61", "a b", "_ff"] {
            assert!(decode_filename(name).is_err(), "{name:?} should be rejected");
        }
        // plain channel names decode to themselves
        assert_eq!(decode_filename("general").unwrap(), "general");
    }

    #[test]
    fn test_file_map_skips_undecodable() {
        let containers = vec![
            Container {
                id: "1".to_string(),
                name: "a_2ebin".to_string(),
                topic: Some("10".to_string()),
            },
            Container {
                id: "2".to_string(),
                name: "_zz".to_string(),
                topic: None,
            },
        ];
        let map = file_map(containers);
        assert_eq!(map.len(), 1);
        assert_eq!(map["a.bin"].id, "1");
    }

    proptest! {
        #[test]
        fn encoded_names_use_channel_charset(name in "\\PC{1,30}") {
            if let Ok(encoded) = encode_filename(&name) {
                prop_assert!(encoded.bytes().all(|b| is_plain(b) || b == ESCAPE));
                prop_assert_eq!(decode_filename(&encoded).unwrap(), name);
            }
        }
    }
}
