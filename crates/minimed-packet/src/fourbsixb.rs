//! 4b6b line coding.
//!
//! Every nibble is expanded to a 6-bit symbol with three set bits, so any
//! single bit error on air lands outside the symbol table.

use crate::{EncodingFault, FrameError, FrameResult};

/// 6-bit symbol for each nibble value.
pub const SYMBOL_TABLE: [u8; 16] = [
    0x15, 0x31, 0x32, 0x23, 0x34, 0x25, 0x26, 0x16, 0x1a, 0x19, 0x2a, 0x0b, 0x2c, 0x0d, 0x0e,
    0x1c,
];

const INVALID: u8 = 0xff;

const fn reverse_table() -> [u8; 64] {
    let mut table = [INVALID; 64];
    let mut nibble = 0;
    while nibble < SYMBOL_TABLE.len() {
        table[SYMBOL_TABLE[nibble] as usize] = nibble as u8;
        nibble += 1;
    }
    table
}

static NIBBLE_FOR_SYMBOL: [u8; 64] = reverse_table();

/// Expand bytes into 4b6b symbols.
///
/// Two input bytes become three output bytes; an odd trailing byte is
/// padded with four zero bits.
pub fn encode_4b6b(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 3 / 2 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &byte in data {
        let hi = SYMBOL_TABLE[(byte >> 4) as usize] as u32;
        let lo = SYMBOL_TABLE[(byte & 0x0f) as usize] as u32;
        acc = (acc << 12) | (hi << 6) | lo;
        bits += 12;
        while bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
        acc &= (1 << bits) - 1;
    }

    if bits > 0 {
        out.push((acc << (8 - bits)) as u8);
    }
    out
}

/// Reduce a 4b6b stream back to bytes.
///
/// Decoding stops at the first `0x00` byte, which never occurs inside a
/// valid symbol stream and is used by the bridge as padding.
pub fn decode_4b6b(data: &[u8]) -> FrameResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2 / 3);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &byte in data.iter().take_while(|&&b| b != 0) {
        acc = (acc << 8) | byte as u32;
        bits += 8;
        if bits >= 12 {
            bits -= 12;
            let hi = lookup((acc >> (bits + 6)) as u8 & 0x3f, out.len() * 2)?;
            let lo = lookup((acc >> bits) as u8 & 0x3f, out.len() * 2 + 1)?;
            out.push((hi << 4) | lo);
            acc &= (1 << bits) - 1;
        }
    }

    if bits >= 6 {
        return Err(FrameError::MalformedEncoding(EncodingFault::OddNibbleCount));
    }
    if acc != 0 {
        return Err(FrameError::MalformedEncoding(EncodingFault::NonZeroPadding));
    }
    Ok(out)
}

fn lookup(symbol: u8, index: usize) -> FrameResult<u8> {
    match NIBBLE_FOR_SYMBOL[symbol as usize] {
        INVALID => Err(FrameError::MalformedEncoding(EncodingFault::InvalidSymbol {
            index,
            symbol,
        })),
        nibble => Ok(nibble),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODED: &str = "ab2959595965574ab2d31c565748ea54e55a54b5558cd8cd55557194b56357156535ac5659956a55c55555556355555568bc5657255554e55a54b5555555b1";
    const DECODED: &str = "a259705504a24117043a0e080b003d3d00015b030105d817790a0f00000300008b1702000e080b000071";

    #[test]
    fn test_decode_known_frame() {
        let encoded = hex::decode(ENCODED).unwrap();
        let decoded = decode_4b6b(&encoded).expect("should decode");
        assert_eq!(hex::encode(decoded), DECODED);
    }

    #[test]
    fn test_encode_known_frame() {
        let decoded = hex::decode(DECODED).unwrap();
        assert_eq!(hex::encode(encode_4b6b(&decoded)), ENCODED);
    }

    #[test]
    fn test_decode_rejects_invalid_symbols() {
        let err = decode_4b6b(&[0x01, 0x02, 0x03, 0x04, 0x05]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MalformedEncoding(EncodingFault::InvalidSymbol { index: 0, .. })
        ));
    }

    #[test]
    fn test_odd_byte_is_padded() {
        // 0xa7 -> 0x2a 0x16 -> 101010 010110 -> 10101001 0110(0000)
        let encoded = encode_4b6b(&[0xa7]);
        assert_eq!(encoded, vec![0xa9, 0x60]);
        assert_eq!(decode_4b6b(&encoded).unwrap(), vec![0xa7]);
    }

    #[test]
    fn test_decode_stops_at_zero_byte() {
        let mut encoded = encode_4b6b(&[0xa7, 0x12]);
        encoded.extend_from_slice(&[0x00, 0xff, 0xff]);
        assert_eq!(decode_4b6b(&encoded).unwrap(), vec![0xa7, 0x12]);
    }

    #[test]
    fn test_decode_rejects_dangling_symbol() {
        // One whole byte plus a lone 6-bit symbol.
        let mut encoded = encode_4b6b(&[0xa7, 0x12]);
        encoded.push(0x54);
        let err = decode_4b6b(&encoded).unwrap_err();
        assert_eq!(
            err,
            FrameError::MalformedEncoding(EncodingFault::OddNibbleCount)
        );
    }

    #[test]
    fn test_decode_rejects_dirty_padding() {
        let mut encoded = encode_4b6b(&[0xa7]);
        encoded[1] |= 0x01;
        let err = decode_4b6b(&encoded).unwrap_err();
        assert_eq!(
            err,
            FrameError::MalformedEncoding(EncodingFault::NonZeroPadding)
        );
    }

    #[test]
    fn test_every_symbol_has_weight_three() {
        for symbol in SYMBOL_TABLE {
            assert_eq!(symbol.count_ones(), 3);
        }
    }
}
