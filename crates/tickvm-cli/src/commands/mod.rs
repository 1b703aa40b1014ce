pub mod config;
pub mod disasm;
pub mod eval;
pub mod save;

use anyhow::{bail, Result};

/// Decodes a hex string, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        bail!("hex input has an odd number of digits");
    }
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for (i, pair) in digits.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(pair)?;
        match u8::from_str_radix(pair, 16) {
            Ok(b) => bytes.push(b),
            Err(_) => bail!("invalid hex digits '{}' at byte {}", pair, i),
        }
    }
    Ok(bytes)
}
