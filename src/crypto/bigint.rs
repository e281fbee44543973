// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Big-Integer JSON Encoding
//!
//! On-chain quantities (job ids, prices in wei) can exceed what a JSON
//! number holds without precision loss, so the wire format carries them
//! as decimal strings with a trailing `n` sentinel, e.g. `"123n"`.
//! Serialization always emits the sentinel form; deserialization also
//! accepts bare decimal strings and plain JSON integers for
//! compatibility with counterparts that never upgraded.
//!
//! Use with `#[serde(with = "bigint_str")]` on `U256` fields.

pub use ethers::types::U256;

/// serde codec for `U256` <-> `"…n"` sentinel strings.
pub mod bigint_str {
    use ethers::types::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}n", value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(U256::from(n)),
            Repr::Text(s) => {
                let digits = s.strip_suffix('n').unwrap_or(&s);
                U256::from_dec_str(digits).map_err(|e| {
                    de::Error::custom(format!("not a decimal big-integer '{}': {}", s, e))
                })
            }
        }
    }
}
