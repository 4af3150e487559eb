//! Shared `serde` helpers for byte-valued fields, base64url-encoded
//! (no padding) per canonical.rs's encoding choice for Q1.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::Error as DeError, Deserialize, Deserializer, Serializer};

/// `#[serde(with = "crate::encoding::fixed_bytes")]` for `[u8; N]` fields.
pub mod fixed_bytes {
    use super::*;

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let raw = URL_SAFE_NO_PAD
            .decode(text.as_bytes())
            .map_err(DeError::custom)?;
        <[u8; N]>::try_from(raw.as_slice())
            .map_err(|_| DeError::custom(format!("expected {N} bytes, got a different length")))
    }
}

/// `#[serde(with = "crate::encoding::bytes")]` for `Vec<u8>` fields.
pub mod bytes {
    use super::*;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(text.as_bytes())
            .map_err(DeError::custom)
    }
}

/// `#[serde(with = "crate::encoding::option_fixed_bytes")]` for
/// `Option<[u8; N]>` fields.
pub mod option_fixed_bytes {
    use super::*;

    pub fn serialize<S, const N: usize>(
        bytes: &Option<[u8; N]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&URL_SAFE_NO_PAD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, const N: usize>(
        deserializer: D,
    ) -> Result<Option<[u8; N]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        match text {
            None => Ok(None),
            Some(text) => {
                let raw = URL_SAFE_NO_PAD
                    .decode(text.as_bytes())
                    .map_err(DeError::custom)?;
                let arr = <[u8; N]>::try_from(raw.as_slice()).map_err(|_| {
                    DeError::custom(format!("expected {N} bytes, got a different length"))
                })?;
                Ok(Some(arr))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Fixed {
        #[serde(with = "super::fixed_bytes")]
        value: [u8; 4],
    }

    #[derive(Serialize, Deserialize)]
    struct Variable {
        #[serde(with = "super::bytes")]
        value: Vec<u8>,
    }

    #[test]
    fn fixed_bytes_roundtrip() {
        let original = Fixed { value: [1, 2, 3, 4] };
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Fixed = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.value, [1, 2, 3, 4]);
    }

    #[test]
    fn variable_bytes_roundtrip() {
        let original = Variable { value: vec![5, 6, 7] };
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Variable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.value, vec![5, 6, 7]);
    }
}
