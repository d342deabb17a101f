//! Checksums used on the radio link and in pump memory pages.

const CRC8_POLY: u8 = 0x9b;
const CRC16_POLY: u16 = 0x1021;
const CRC16_INIT: u16 = 0xffff;

const fn crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC16_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC8_TABLE: [u8; 256] = crc8_table();
static CRC16_TABLE: [u16; 256] = crc16_table();

/// CRC-8 (poly 0x9B, init 0) carried at the end of every radio frame.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

/// CRC-16/CCITT (poly 0x1021, init 0xFFFF) protecting history pages.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(CRC16_INIT, |crc, &byte| {
        (crc << 8) ^ CRC16_TABLE[((crc >> 8) as u8 ^ byte) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_known_frame() {
        let frame = hex::decode(
            "a259705504a24117043a0e080b003d3d00015b030105d817790a0f00000300008b1702000e080b0000",
        )
        .unwrap();
        assert_eq!(crc8(&frame), 0x71);
    }

    #[test]
    fn test_crc8_device_link() {
        let frame = hex::decode("a23505350a93ce8aa000").unwrap();
        assert_eq!(crc8(&frame), 0xba);
    }

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn test_crc16_check_value() {
        // Standard CRC-16/CCITT-FALSE check value.
        assert_eq!(crc16(b"123456789"), 0x29b1);
    }
}
