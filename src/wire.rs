//! Field tags and wire types.
//!
//! Each field of a message starts with a tag, a varint containing the field
//! number in the upper bits and the wire type in the low 3 bits. The wire
//! type determines how the bytes of the value are laid out, independent of
//! the schema type of the field.

use std::fmt::{Display, Formatter};

use crate::cursor::ByteCursor;
use crate::errors::{DecodeError, ErrorKind};
use crate::varint::encode_varint;

/// Number of low bits of a tag used for the wire type.
const WIRE_TYPE_BITS: u32 = 3;

const WIRE_TYPE_MASK: u64 = (1 << WIRE_TYPE_BITS) - 1;

/// Largest field number that can be represented in a 32-bit tag.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Layout of a field value in the encoded message.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Integer value encoded as a varint.
    Varint = 0,

    /// 8 bytes, little-endian.
    Fixed64 = 1,

    /// A varint length followed by that many bytes.
    LengthDelimited = 2,

    /// 4 bytes, little-endian.
    Fixed32 = 5,
}

impl WireType {
    /// Convert the low 3 bits of a tag into a wire type.
    pub fn from_bits(bits: u8) -> Option<WireType> {
        match bits {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }

    /// Return the size of values of this type, if they have a fixed size.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Fixed32 => Some(4),
            Self::Fixed64 => Some(8),
            Self::Varint | Self::LengthDelimited => None,
        }
    }
}

impl Display for WireType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::LengthDelimited => "length-delimited",
            Self::Fixed32 => "fixed32",
        };
        write!(f, "{}", name)
    }
}

/// Field number and wire type read from the start of a field.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tag {
    pub number: u32,
    pub wire_type: WireType,
}

impl Tag {
    pub fn new(number: u32, wire_type: WireType) -> Self {
        Self { number, wire_type }
    }

    /// Return the value of this tag before varint encoding.
    pub fn to_u64(self) -> u64 {
        ((self.number as u64) << WIRE_TYPE_BITS) | self.wire_type as u64
    }
}

/// Read a field tag from `cursor`.
///
/// Fails if the wire type is not one of the four supported types or the
/// field number is zero or too large.
pub fn read_tag(cursor: &mut ByteCursor) -> Result<Tag, DecodeError> {
    let start = cursor.offset();
    let tag = cursor.read_varint()?;

    let bits = (tag & WIRE_TYPE_MASK) as u8;
    let number = tag >> WIRE_TYPE_BITS;

    let wire_type = WireType::from_bits(bits)
        .ok_or_else(|| DecodeError::new(ErrorKind::InvalidWireType(bits), start))?;
    if number == 0 || number > MAX_FIELD_NUMBER as u64 {
        return Err(DecodeError::new(ErrorKind::InvalidFieldNumber(number), start));
    }

    Ok(Tag {
        number: number as u32,
        wire_type,
    })
}

/// Append the encoded form of a tag to `out`.
pub fn encode_tag(number: u32, wire_type: WireType, out: &mut Vec<u8>) {
    encode_varint(Tag::new(number, wire_type).to_u64(), out);
}

/// Undecoded value of a field.
///
/// Length-delimited values borrow from the input buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RawValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

impl RawValue<'_> {
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Varint(_) => WireType::Varint,
            Self::Fixed64(_) => WireType::Fixed64,
            Self::Bytes(_) => WireType::LengthDelimited,
            Self::Fixed32(_) => WireType::Fixed32,
        }
    }
}

/// Read the value of a field with the given wire type.
pub fn read_value<'a>(
    cursor: &mut ByteCursor<'a>,
    wire_type: WireType,
) -> Result<RawValue<'a>, DecodeError> {
    match wire_type {
        WireType::Varint => cursor.read_varint().map(RawValue::Varint),
        WireType::Fixed64 => cursor.read_fixed64().map(RawValue::Fixed64),
        WireType::LengthDelimited => cursor.read_length_delimited().map(RawValue::Bytes),
        WireType::Fixed32 => cursor.read_fixed32().map(RawValue::Fixed32),
    }
}

#[cfg(test)]
mod tests {
    use tagwire_testing::{TestCases, WireBuilder};

    use super::{encode_tag, read_tag, read_value, RawValue, Tag, WireType, MAX_FIELD_NUMBER};
    use crate::cursor::ByteCursor;
    use crate::errors::ErrorKind;

    #[test]
    fn test_read_tag() {
        #[derive(Debug)]
        struct Case {
            number: u32,
            wire_type: WireType,
        }

        let cases = [
            Case {
                number: 1,
                wire_type: WireType::Varint,
            },
            Case {
                number: 2,
                wire_type: WireType::LengthDelimited,
            },
            Case {
                number: 15,
                wire_type: WireType::Fixed32,
            },
            Case {
                number: 16,
                wire_type: WireType::Fixed64,
            },
            Case {
                number: MAX_FIELD_NUMBER,
                wire_type: WireType::Varint,
            },
        ];

        cases.test_each(|&Case { number, wire_type }| {
            let mut buf = Vec::new();
            encode_tag(number, wire_type, &mut buf);
            let mut cursor = ByteCursor::new(&buf);
            let tag = read_tag(&mut cursor).unwrap();
            assert_eq!(tag, Tag::new(number, wire_type));
            assert!(cursor.is_empty());
        })
    }

    #[test]
    fn test_read_tag_simple() {
        let buf = [0x08, 0x96, 0x01];
        let mut cursor = ByteCursor::new(&buf);
        let tag = read_tag(&mut cursor).unwrap();
        assert_eq!(tag, Tag::new(1, WireType::Varint));
        assert_eq!(cursor.offset(), 1);
    }

    #[test]
    fn test_invalid_wire_type() {
        for bits in [3u64, 4, 6, 7] {
            let buf = WireBuilder::new().raw_varint((1 << 3) | bits).finish();
            let err = read_tag(&mut ByteCursor::new(&buf)).err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::InvalidWireType(bits as u8));
            assert_eq!(err.offset(), 0);
        }
    }

    #[test]
    fn test_invalid_field_number() {
        let buf = WireBuilder::new().raw_varint(0x00).finish();
        let err = read_tag(&mut ByteCursor::new(&buf)).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::InvalidFieldNumber(0));

        let too_large = (MAX_FIELD_NUMBER as u64) + 1;
        let buf = WireBuilder::new().raw_varint(too_large << 3).finish();
        let err = read_tag(&mut ByteCursor::new(&buf)).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::InvalidFieldNumber(too_large));
    }

    #[test]
    fn test_read_value() {
        let buf = WireBuilder::new()
            .varint(1, 300)
            .fixed64(2, 0x0102_0304_0506_0708)
            .bytes(3, b"hi")
            .fixed32(4, 0xdead_beef)
            .finish();

        let mut cursor = ByteCursor::new(&buf);
        let mut values = Vec::new();
        while !cursor.is_empty() {
            let tag = read_tag(&mut cursor).unwrap();
            values.push((tag.number, read_value(&mut cursor, tag.wire_type).unwrap()));
        }

        assert_eq!(
            values,
            [
                (1, RawValue::Varint(300)),
                (2, RawValue::Fixed64(0x0102_0304_0506_0708)),
                (3, RawValue::Bytes(b"hi")),
                (4, RawValue::Fixed32(0xdead_beef)),
            ]
        );
    }

    #[test]
    fn test_read_value_truncated() {
        let cases = [
            (WireType::Varint, vec![0x80]),
            (WireType::Fixed64, vec![1, 2, 3, 4, 5, 6, 7]),
            (WireType::Fixed32, vec![1, 2, 3]),
            (WireType::LengthDelimited, vec![0x05, b'a', b'b']),
            (WireType::LengthDelimited, vec![]),
        ];
        for (wire_type, buf) in cases {
            let mut cursor = ByteCursor::new(&buf);
            let err = read_value(&mut cursor, wire_type).err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::TruncatedInput, "{:?}", wire_type);
        }
    }
}
