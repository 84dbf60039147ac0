//! Checksums used to validate sensor payloads around the queue hand-off.
//!
//! - `crc7`: CRC-7/MMC, guards short command and telemetry chunks.
//! - `crc16`: CRC-16/CCITT-FALSE, guards register blocks.
//! - `crc32`: CRC-32/ISO-HDLC, guards decoded frame payloads.
//!
//! Bitwise implementations; payloads are small enough that tables do not pay off.

const CRC7_POLY: u8 = 0x09;
const CRC16_POLY: u16 = 0x1021;
const CRC32_POLY_REFLECTED: u32 = 0xEDB8_8320;

/// CRC-7/MMC. Result is right-aligned in the low 7 bits.
pub fn crc7(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        for bit in (0..8).rev() {
            let input = (byte >> bit) & 1;
            let top = (crc >> 6) & 1;
            crc = (crc << 1) & 0x7F;
            if input ^ top == 1 {
                crc ^= CRC7_POLY;
            }
        }
    }
    crc
}

/// CRC-16/CCITT-FALSE (init 0xFFFF, no reflection, no final xor).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC16_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// CRC-32 as used by Ethernet and zlib.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLY_REFLECTED
            } else {
                crc >> 1
            };
        }
    }
    !crc
}
