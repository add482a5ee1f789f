//! Hashlock codec
//!
//! Secrets and their SHA-256 hashlocks are 256-bit values. The Aztec-style
//! chain represents them as two 128-bit field-sized halves, the EVM chain as
//! a single `bytes32`. This module converts between the two representations
//! and normalizes swap identifiers to the fixed-width form used as registry
//! keys.

use anyhow::{anyhow, Result};
use ethereum_types::{H256, U128, U256};
use sha2::{Digest, Sha256};

/// Splits a 256-bit value into big-endian (high, low) 128-bit halves.
pub fn split_secret(secret: H256) -> (U128, U128) {
    let bytes = secret.as_bytes();
    (
        U128::from_big_endian(&bytes[..16]),
        U128::from_big_endian(&bytes[16..]),
    )
}

/// Inverse of [`split_secret`].
pub fn join_secret(high: U128, low: U128) -> H256 {
    let mut out = [0u8; 32];
    high.to_big_endian(&mut out[..16]);
    low.to_big_endian(&mut out[16..]);
    H256::from_slice(&out)
}

/// Reassembles a hashlock from its two halves.
///
/// Pure concatenation - the SHA-256 was already computed client-side, so no
/// re-hashing happens here.
pub fn hashlock_bytes32(high: U128, low: U128) -> H256 {
    join_secret(high, low)
}

/// SHA-256 of a 32-byte preimage, as a 32-byte value.
///
/// Used to verify a revealed secret against the stored hashlock before
/// spending gas on a redeem.
pub fn sha256_bytes32(preimage: H256) -> H256 {
    H256::from_slice(&Sha256::digest(preimage.as_bytes()))
}

/// Normalizes a swap identifier to its fixed-width 256-bit form.
///
/// Accepts a decimal string (the form some clients send over `notify-lock`)
/// or a hex string with or without `0x` prefix.
pub fn normalize_swap_id(raw: &str) -> Result<H256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty swap id"));
    }

    let value = if let Some(hex_part) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        U256::from_str_radix(hex_part, 16)
            .map_err(|e| anyhow!("invalid hex swap id '{}': {}", raw, e))?
    } else if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        U256::from_dec_str(trimmed)
            .map_err(|e| anyhow!("invalid decimal swap id '{}': {}", raw, e))?
    } else {
        U256::from_str_radix(trimmed, 16)
            .map_err(|e| anyhow!("invalid swap id '{}': {}", raw, e))?
    };

    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    Ok(H256::from_slice(&bytes))
}

/// Renders a 256-bit value as the fixed-width `0x`-prefixed lowercase hex
/// form used in API responses and log lines.
pub fn to_fixed_hex(value: &H256) -> String {
    format!("0x{}", hex::encode(value.as_bytes()))
}

/// Renders a 128-bit half in `0x`-prefixed fixed-width hex.
pub fn half_to_hex(half: U128) -> String {
    let mut bytes = [0u8; 16];
    half.to_big_endian(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_join_round_trip() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let secret = H256::from_slice(&bytes);
        let (high, low) = split_secret(secret);
        assert_eq!(join_secret(high, low), secret);
    }

    #[test]
    fn test_hashlock_concatenation_matches_sha256() {
        let secret = H256::repeat_byte(0x42);
        let hashlock = sha256_bytes32(secret);
        let (high, low) = split_secret(hashlock);
        assert_eq!(hashlock_bytes32(high, low), hashlock);
    }

    #[test]
    fn test_normalize_swap_id_decimal() {
        let id = normalize_swap_id("255").unwrap();
        assert_eq!(
            to_fixed_hex(&id),
            "0x00000000000000000000000000000000000000000000000000000000000000ff"
        );
    }

    #[test]
    fn test_normalize_swap_id_hex_forms() {
        let prefixed = normalize_swap_id("0xff").unwrap();
        let bare = normalize_swap_id("ff").unwrap();
        let decimal = normalize_swap_id("255").unwrap();
        assert_eq!(prefixed, bare);
        assert_eq!(prefixed, decimal);
    }

    #[test]
    fn test_normalize_swap_id_rejects_garbage() {
        assert!(normalize_swap_id("").is_err());
        assert!(normalize_swap_id("0xzz").is_err());
        assert!(normalize_swap_id("not a number").is_err());
    }

    #[test]
    fn test_half_to_hex_fixed_width() {
        assert_eq!(
            half_to_hex(U128::from(1u64)),
            "0x00000000000000000000000000000001"
        );
    }
}
