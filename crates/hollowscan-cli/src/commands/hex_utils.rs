//! Hex address parsing and formatting utilities.

use anyhow::Result;

/// Parse a hex address string (with or without 0x prefix).
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_hex_address("0x1000").unwrap(), 0x1000);
/// assert_eq!(parse_hex_address("7FF6A000").unwrap(), 0x7FF6A000);
/// ```
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| anyhow::anyhow!("Invalid hex address '{}': {}", s, e))
}

/// Parse 32-bit protection flags written in hex.
pub fn parse_hex_protection(s: &str) -> Result<u32> {
    let value = parse_hex_address(s)?;
    u32::try_from(value)
        .map_err(|_| anyhow::anyhow!("Protection flags out of range: 0x{:X}", value))
}

/// Format an address as a hex string with 0x prefix.
pub fn format_hex_address(addr: u64) -> String {
    format!("0x{:X}", addr)
}
