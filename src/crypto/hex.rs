// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Hex Codec
//!
//! Thin wrappers around the `hex` crate that enforce the wire conventions:
//! lowercase output, optional `0x` prefix on input, and typed errors for
//! odd-length or non-hex strings.

use super::error::CryptoError;

/// Encode bytes as a lowercase hex string (no `0x` prefix).
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string, tolerating an optional `0x` prefix.
///
/// # Errors
///
/// Returns `CryptoError::InvalidInput` for odd-length or non-hex input.
pub fn hex_to_bytes(field: &'static str, s: &str) -> Result<Vec<u8>, CryptoError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);

    if stripped.len() % 2 != 0 {
        return Err(CryptoError::invalid_input(
            field,
            format!("odd-length hex string ({} chars)", stripped.len()),
        ));
    }

    hex::decode(stripped)
        .map_err(|e| CryptoError::invalid_input(field, format!("not valid hex: {}", e)))
}

/// Decode a hex string into a fixed-size array, validating the byte length.
pub fn hex_to_array<const N: usize>(field: &'static str, s: &str) -> Result<[u8; N], CryptoError> {
    let bytes = hex_to_bytes(field, s)?;
    if bytes.len() != N {
        return Err(CryptoError::invalid_input(
            field,
            format!("expected {} bytes, got {}", N, bytes.len()),
        ));
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
