use alloy::hex;

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Lowercase `0x` form of a hash or address given in any case, with or without prefix.
pub fn normalize_hex(value: &str) -> String {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
    format!("0x{}", digits.to_ascii_lowercase())
}
