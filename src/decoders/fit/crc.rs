// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! CRC-16 used by FIT headers and file trailers.

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// Fold one byte into a running CRC (low nibble first).
pub fn update(crc: u16, byte: u8) -> u16 {
    let tmp = CRC_TABLE[(crc & 0xF) as usize];
    let crc = ((crc >> 4) & 0x0FFF) ^ tmp ^ CRC_TABLE[(byte & 0xF) as usize];
    let tmp = CRC_TABLE[(crc & 0xF) as usize];
    ((crc >> 4) & 0x0FFF) ^ tmp ^ CRC_TABLE[((byte >> 4) & 0xF) as usize]
}

/// CRC of a whole buffer.
pub fn compute(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0, |crc, &b| update(crc, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(compute(b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_appending_crc_yields_zero() {
        let mut data = b"workout".to_vec();
        let crc = compute(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(compute(&data), 0);
    }
}
