//! # Hex Helpers
//!
//! Platform descriptions write register offsets and byte values either as
//! JSON integers or as `"0x.."` strings. These helpers accept both and always
//! serialize back to the `"0x.."` form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u64),
    Text(String),
}

impl HexOrInt {
    fn into_u8(self) -> Result<u8, String> {
        match self {
            HexOrInt::Int(value) => {
                u8::try_from(value).map_err(|_| format!("value {} does not fit in a byte", value))
            }
            HexOrInt::Text(text) => parse_hex_u8(&text),
        }
    }
}

/// Parse a byte written as hex, with or without a `0x` prefix.
pub fn parse_hex_u8(text: &str) -> Result<u8, String> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > 2 {
        return Err(format!("invalid hex byte: {:?}", text));
    }

    u8::from_str_radix(digits, 16).map_err(|_| format!("invalid hex byte: {:?}", text))
}

/// Format a byte the way i2c-tools print it (`0x4a`).
pub fn format_hex_u8(value: u8) -> String {
    format!("0x{:02x}", value)
}

/// `#[serde(with = "hex_u8")]` for a single byte.
pub mod hex_u8 {
    use super::*;

    /// Write the byte as `0x..` text.
    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        format_hex_u8(*value).serialize(serializer)
    }

    /// Accept an integer or `0x..` text.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        HexOrInt::deserialize(deserializer)?
            .into_u8()
            .map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "hex_u8_seq")]` for a byte sequence.
pub mod hex_u8_seq {
    use super::*;

    /// Write each byte as `0x..` text.
    pub fn serialize<S: Serializer>(values: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let text: Vec<String> = values.iter().map(|v| format_hex_u8(*v)).collect();
        text.serialize(serializer)
    }

    /// Accept a list mixing integers and `0x..` text.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Vec::<HexOrInt>::deserialize(deserializer)?
            .into_iter()
            .map(|v| v.into_u8().map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Probe {
        #[serde(with = "hex_u8")]
        start: u8,
        #[serde(with = "hex_u8_seq")]
        bytes: Vec<u8>,
    }

    #[test]
    fn test_parse_hex_prefixed_and_bare() {
        assert_eq!(parse_hex_u8("0x4a"), Ok(0x4a));
        assert_eq!(parse_hex_u8("0X4A"), Ok(0x4a));
        assert_eq!(parse_hex_u8("ff"), Ok(0xff));
        assert!(parse_hex_u8("0x").is_err());
        assert!(parse_hex_u8("0x100").is_err());
        assert!(parse_hex_u8("zz").is_err());
    }

    #[test]
    fn test_deserialize_mixed_forms() {
        let probe: Probe =
            serde_json::from_str(r#"{"start": "0x10", "bytes": [18, "0x34", "56"]}"#).unwrap();
        assert_eq!(probe.start, 0x10);
        assert_eq!(probe.bytes, vec![0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_serialize_as_hex_text() {
        let probe = Probe {
            start: 0x0a,
            bytes: vec![0xff, 0x00],
        };
        let json = serde_json::to_string(&probe).unwrap();
        assert_eq!(json, r#"{"start":"0x0a","bytes":["0xff","0x00"]}"#);
    }

    #[test]
    fn test_out_of_range_integer_rejected() {
        let result: Result<Probe, _> = serde_json::from_str(r#"{"start": 256, "bytes": []}"#);
        assert!(result.is_err());
    }
}
