//! Utility functions and helpers

pub mod time;

/// Convert bytes to a hexadecimal string
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Render a byte slice as a classic 16-bytes-per-line hex dump.
///
/// Used when reporting payloads that could not be classified.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(line, chunk)| format!("{:04x}: {}", line * 16, bytes_to_hex(chunk)))
        .collect::<Vec<_>>()
        .join("\n")
}
