// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Ethereum Address Derivation
//!
//! Derives the 20-byte Ethereum address from a secp256k1 public key:
//! decompress, drop the 0x04 tag, keccak256 the remaining 64 bytes, and
//! keep the low 20 bytes. Addresses are rendered with the EIP-55
//! mixed-case checksum so they can be compared against wallet and
//! contract allowlist entries verbatim.

use ethers::types::Address;
use ethers::utils::to_checksum;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

use super::error::CryptoError;
use super::transcript::keccak256;

/// Derive the EIP-55 checksummed address for a public key.
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    let uncompressed = public_key.to_encoded_point(false);
    let hash = keccak256(&uncompressed.as_bytes()[1..]);

    let address = Address::from_slice(&hash[12..]);
    to_checksum(&address, None)
}

/// Derive the address from a compressed (or uncompressed) SEC1 encoding.
pub fn sec1_to_address(field: &'static str, sec1: &[u8]) -> Result<String, CryptoError> {
    let public_key = super::ecdh::parse_public_key(field, sec1)?;
    Ok(public_key_to_address(&public_key))
}
