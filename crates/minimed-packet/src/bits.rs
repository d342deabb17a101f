//! Named bit-field access over message bytes.
//!
//! Fields are `(offset, length)` pairs in bits, relative to a per-message
//! base offset, read most-significant-bit first across byte boundaries.
//! Static maps are checked while compiling: a field that does not fit its
//! message fails the build.

use crate::DecodeError;

/// One named field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name.
    pub name: &'static str,
    /// Bit offset from the map's base offset.
    pub offset: usize,
    /// Width in bits (1..=32).
    pub length: usize,
}

impl Field {
    /// Declare a field.
    pub const fn new(name: &'static str, offset: usize, length: usize) -> Self {
        Field {
            name,
            offset,
            length,
        }
    }
}

/// A validated set of fields for one message layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap<'a> {
    base_offset: usize,
    byte_len: usize,
    fields: &'a [Field],
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

#[derive(Clone, Copy)]
enum MapFault {
    Width,
    Overflow,
    Duplicate,
}

const fn check(base_offset: usize, byte_len: usize, fields: &[Field]) -> Option<MapFault> {
    let mut i = 0;
    while i < fields.len() {
        let field = fields[i];
        if field.length == 0 || field.length > 32 {
            return Some(MapFault::Width);
        }
        if base_offset + field.offset + field.length > byte_len * 8 {
            return Some(MapFault::Overflow);
        }
        let mut j = 0;
        while j < i {
            if str_eq(fields[j].name, field.name) {
                return Some(MapFault::Duplicate);
            }
            j += 1;
        }
        i += 1;
    }
    None
}

impl FieldMap<'static> {
    /// Build a map in const context; an invalid map is a compile error.
    pub const fn new(base_offset: usize, byte_len: usize, fields: &'static [Field]) -> Self {
        match check(base_offset, byte_len, fields) {
            Some(MapFault::Width) => panic!("field width must be 1..=32 bits"),
            Some(MapFault::Overflow) => panic!("field extends past the end of the message"),
            Some(MapFault::Duplicate) => panic!("duplicate field name"),
            None => {}
        }
        FieldMap {
            base_offset,
            byte_len,
            fields,
        }
    }
}

impl<'a> FieldMap<'a> {
    /// Build a map at runtime.
    pub fn try_new(
        base_offset: usize,
        byte_len: usize,
        fields: &'a [Field],
    ) -> Result<Self, DecodeError> {
        for field in fields {
            if field.length == 0 || field.length > 32 {
                return Err(DecodeError::invalid_map(format!(
                    "{}: width {} not in 1..=32",
                    field.name, field.length
                )));
            }
            if base_offset + field.offset + field.length > byte_len * 8 {
                return Err(DecodeError::invalid_map(format!(
                    "{}: bits {}..{} past {}-byte message",
                    field.name,
                    base_offset + field.offset,
                    base_offset + field.offset + field.length,
                    byte_len
                )));
            }
        }
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(DecodeError::invalid_map(format!(
                    "duplicate field {}",
                    field.name
                )));
            }
        }
        Ok(FieldMap {
            base_offset,
            byte_len,
            fields,
        })
    }

    /// Bit offset that field offsets are relative to.
    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    /// Minimum message length in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Declared fields in order.
    pub fn fields(&self) -> &'a [Field] {
        self.fields
    }

    /// Find a field by name.
    pub fn field(&self, name: &str) -> Result<&'a Field, DecodeError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| DecodeError::unknown_field(name))
    }

    /// Read a field from `data`.
    ///
    /// `data` must be at least [`byte_len`](Self::byte_len) bytes long.
    pub fn get(&self, data: &[u8], name: &str) -> Result<u32, DecodeError> {
        let field = self.field(name)?;
        self.ensure_len(data)?;
        Ok(read_bits(data, self.base_offset + field.offset, field.length))
    }

    /// Write a field into `data`.
    pub fn set(&self, data: &mut [u8], name: &str, value: u32) -> Result<(), DecodeError> {
        let field = self.field(name)?;
        self.ensure_len(data)?;
        if field.length < 32 && value >> field.length != 0 {
            return Err(DecodeError::ValueOutOfRange {
                field: field.name.to_string(),
                value,
                width: field.length,
            });
        }
        write_bits(data, self.base_offset + field.offset, field.length, value);
        Ok(())
    }

    fn ensure_len(&self, data: &[u8]) -> Result<(), DecodeError> {
        if data.len() < self.byte_len {
            return Err(DecodeError::Truncated {
                expected: self.byte_len,
                actual: data.len(),
            });
        }
        Ok(())
    }
}

/// Read `length` bits starting at absolute bit `offset`, MSB first.
pub fn read_bits(data: &[u8], offset: usize, length: usize) -> u32 {
    (offset..offset + length).fold(0u32, |acc, bit| {
        let set = (data[bit / 8] >> (7 - bit % 8)) & 1;
        (acc << 1) | set as u32
    })
}

/// Write the low `length` bits of `value` at absolute bit `offset`, MSB first.
pub fn write_bits(data: &mut [u8], offset: usize, length: usize, value: u32) {
    for i in 0..length {
        let bit = offset + i;
        let mask = 0x80 >> (bit % 8);
        if (value >> (length - 1 - i)) & 1 == 1 {
            data[bit / 8] |= mask;
        } else {
            data[bit / 8] &= !mask;
        }
    }
}

/// A message body interpreted through a [`FieldMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMessage {
    map: &'static FieldMap<'static>,
    data: Vec<u8>,
}

impl FieldMessage {
    /// Wrap `data` (header included) with its layout.
    pub fn new(map: &'static FieldMap<'static>, data: Vec<u8>) -> Result<Self, DecodeError> {
        map.ensure_len(&data)?;
        Ok(FieldMessage { map, data })
    }

    /// A zeroed message of the layout's length.
    pub fn zeroed(map: &'static FieldMap<'static>) -> Self {
        FieldMessage {
            map,
            data: vec![0; map.byte_len],
        }
    }

    /// Layout of this message.
    pub fn map(&self) -> &'static FieldMap<'static> {
        self.map
    }

    /// Raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw bytes, e.g. to stamp the header.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read a named field.
    pub fn get_bits(&self, name: &str) -> Result<u32, DecodeError> {
        self.map.get(&self.data, name)
    }

    /// Write a named field.
    pub fn set_bits(&mut self, name: &str, value: u32) -> Result<(), DecodeError> {
        self.map.set(&mut self.data, name, value)
    }

    /// Read a single bit by absolute index.
    pub fn get_bit(&self, index: usize) -> Result<bool, DecodeError> {
        if index >= self.data.len() * 8 {
            return Err(DecodeError::BitOutOfRange {
                index,
                len: self.data.len(),
            });
        }
        Ok(read_bits(&self.data, index, 1) == 1)
    }

    /// Every field as `(name, value)`.
    pub fn values(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        self.map
            .fields()
            .iter()
            .map(|f| (f.name, read_bits(&self.data, self.map.base_offset + f.offset, f.length)))
    }

    // Fields declared by a static map always fit, so reads cannot fail
    // once the message was constructed.
    pub(crate) fn value(&self, name: &'static str) -> u32 {
        self.get_bits(name).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    const FIELDS: [Field; 4] = [
        Field::new("flag", 0, 1),
        Field::new("code", 1, 7),
        Field::new("straddle", 12, 9),
        Field::new("wide", 24, 32),
    ];
    static MAP: FieldMap<'static> = FieldMap::new(8, 8, &FIELDS);

    #[test]
    fn test_read_bits_across_bytes() {
        let data = [0b1010_1100, 0b0101_0011];
        assert_eq!(read_bits(&data, 0, 4), 0b1010);
        assert_eq!(read_bits(&data, 4, 8), 0b1100_0101);
        assert_eq!(read_bits(&data, 15, 1), 1);
    }

    #[test]
    fn test_set_then_get_every_field() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut msg = FieldMessage::zeroed(&MAP);
        for _ in 0..200 {
            for field in MAP.fields() {
                let value = if field.length == 32 {
                    rng.gen::<u32>()
                } else {
                    rng.gen_range(0..(1u32 << field.length))
                };
                msg.set_bits(field.name, value).expect("should set");
                assert_eq!(msg.get_bits(field.name).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_set_then_get_message_maps() {
        use crate::messages::{
            ALERT_CLEARED_MAP, ALERT_MAP, BATTERY_MAP, LINK_MAP, METER_MAP, PUMP_STATUS_MAP,
        };

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let maps: [&'static FieldMap<'static>; 6] = [
            &ALERT_MAP,
            &ALERT_CLEARED_MAP,
            &PUMP_STATUS_MAP,
            &LINK_MAP,
            &BATTERY_MAP,
            &METER_MAP,
        ];
        for map in maps {
            let mut msg = FieldMessage::zeroed(map);
            for field in map.fields() {
                let max = if field.length == 32 {
                    u32::MAX
                } else {
                    (1u32 << field.length) - 1
                };
                for value in [0, max, rng.gen_range(0..=max)] {
                    msg.set_bits(field.name, value).expect("should set");
                    assert_eq!(
                        msg.get_bits(field.name).expect("should get"),
                        value,
                        "field {}",
                        field.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_set_leaves_neighbours_alone() {
        let mut msg = FieldMessage::zeroed(&MAP);
        msg.set_bits("code", 0x7f).unwrap();
        msg.set_bits("straddle", 0x1ff).unwrap();
        msg.set_bits("flag", 0).unwrap();
        assert_eq!(msg.get_bits("code").unwrap(), 0x7f);
        assert_eq!(msg.get_bits("straddle").unwrap(), 0x1ff);
        assert_eq!(msg.bytes()[0], 0, "base offset region untouched");
    }

    #[test]
    fn test_unknown_field_and_range() {
        let mut msg = FieldMessage::zeroed(&MAP);
        assert_eq!(
            msg.get_bits("missing"),
            Err(DecodeError::UnknownField("missing".to_string()))
        );
        assert!(matches!(
            msg.set_bits("code", 0x80),
            Err(DecodeError::ValueOutOfRange { width: 7, .. })
        ));
        assert!(matches!(
            msg.get_bit(64),
            Err(DecodeError::BitOutOfRange { index: 64, len: 8 })
        ));
    }

    #[test]
    fn test_get_bit() {
        let mut msg = FieldMessage::zeroed(&MAP);
        msg.set_bits("flag", 1).unwrap();
        assert!(msg.get_bit(8).unwrap());
        assert!(!msg.get_bit(9).unwrap());
    }

    #[test]
    fn test_try_new_rejects_bad_maps() {
        let too_long = [Field::new("x", 60, 8)];
        assert!(FieldMap::try_new(0, 8, &too_long).is_err());

        let zero = [Field::new("x", 0, 0)];
        assert!(FieldMap::try_new(0, 8, &zero).is_err());

        let dup = [Field::new("x", 0, 4), Field::new("x", 4, 4)];
        assert!(FieldMap::try_new(0, 8, &dup).is_err());

        let ok = [Field::new("x", 0, 8)];
        assert!(FieldMap::try_new(56, 8, &ok).is_ok());
    }

    #[test]
    fn test_short_data_rejected() {
        assert!(matches!(
            FieldMessage::new(&MAP, vec![0; 4]),
            Err(DecodeError::Truncated {
                expected: 8,
                actual: 4
            })
        ));
    }
}
