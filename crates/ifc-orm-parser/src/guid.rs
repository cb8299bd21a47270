// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC GlobalId: a UUID packed into 22 characters of a custom base64 alphabet

use ifc_orm_model::{Error, Result};
use uuid::Uuid;

const ALPHABET: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_$";

/// Length of a compressed GlobalId
pub const GLOBAL_ID_LEN: usize = 22;

/// Fresh random GlobalId
pub fn new_global_id() -> String {
    compress(Uuid::new_v4())
}

/// Pack a UUID: the first character holds the top 2 bits, the rest 6 bits each
pub fn compress(uuid: Uuid) -> String {
    let value = uuid.as_u128();
    let mut out = String::with_capacity(GLOBAL_ID_LEN);
    out.push(ALPHABET[(value >> 126) as usize] as char);
    for i in 0..21 {
        let shift = 120 - 6 * i;
        out.push(ALPHABET[((value >> shift) & 0x3F) as usize] as char);
    }
    out
}

/// Unpack a GlobalId back into its UUID
pub fn expand(global_id: &str) -> Result<Uuid> {
    let bytes = global_id.as_bytes();
    if bytes.len() != GLOBAL_ID_LEN {
        return Err(Error::invalid_value(
            "GlobalId",
            global_id,
            format!("expected {} characters", GLOBAL_ID_LEN),
        ));
    }
    let mut value: u128 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let digit = ALPHABET
            .iter()
            .position(|&c| c == b)
            .ok_or_else(|| Error::invalid_value("GlobalId", global_id, "invalid character"))?;
        if i == 0 && digit > 3 {
            return Err(Error::invalid_value("GlobalId", global_id, "value out of range"));
        }
        value = (value << 6) | digit as u128;
    }
    Ok(Uuid::from_u128(value))
}

/// Whether `global_id` is a well-formed compressed GlobalId
pub fn is_valid(global_id: &str) -> bool {
    expand(global_id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(compress(Uuid::nil()), "0000000000000000000000");
        assert_eq!(compress(Uuid::from_u128(u128::MAX)), "3$$$$$$$$$$$$$$$$$$$$$");
        assert_eq!(compress(Uuid::from_u128(65)), "0000000000000000000011");
    }

    #[test]
    fn test_new_ids_are_unique_and_valid() {
        let a = new_global_id();
        let b = new_global_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), GLOBAL_ID_LEN);
        assert_eq!(compress(expand(&a).unwrap()), a);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!is_valid("short"));
        assert!(!is_valid("4$$$$$$$$$$$$$$$$$$$$$"));
        assert!(!is_valid("000000000000000000000!"));
    }
}
