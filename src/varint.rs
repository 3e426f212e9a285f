//! Encode and decode varints.
//!
//! Variable length integers (_varints_) store an unsigned integer in groups
//! of 7 bits, least significant group first. The high bit of each byte is a
//! continuation flag which is set on every byte except the last. Tags,
//! lengths and most integer fields are varints.
//!
//! Signed `sint32` and `sint64` values are mapped to unsigned values with
//! [ZigZag](zigzag_encode_64) encoding before being stored as varints, so
//! that values of small magnitude have short encodings.

/// Maximum number of bytes for an encoded varint.
///
/// A decoded varint is a u64 value. Each byte contains 7 value bits and one
/// continuation bit. Hence we need 9 "full" bytes plus one bit from the 10th byte.
pub const MAX_VARINT_LEN: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VarintError {
    /// The buffer ended before the final byte of the varint.
    Truncated,
    /// The varint is longer than [`MAX_VARINT_LEN`] bytes, or its value
    /// exceeds 64 bits.
    Overflow,
}

/// Decode a varint from the start of `buf`.
///
/// Returns the value and the number of bytes it occupied.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    // Fast path for single-byte values, which covers most tags and lengths.
    match buf.first() {
        Some(&byte) if byte <= 0x7f => return Ok((byte as u64, 1)),
        None => return Err(VarintError::Truncated),
        _ => {}
    }

    let mut value = 0;
    for (index, byte) in buf.iter().copied().take(MAX_VARINT_LEN).enumerate() {
        // High bit is continuation bit. Low 7 bits are the payload.
        value |= ((byte & 0x7f) as u64) << (index * 7);
        if byte <= 0x7f {
            // Only one value bit from the last byte may be used.
            if index + 1 == MAX_VARINT_LEN && byte > 0x01 {
                return Err(VarintError::Overflow);
            }
            return Ok((value, index + 1));
        }
    }

    if buf.len() >= MAX_VARINT_LEN {
        Err(VarintError::Overflow)
    } else {
        Err(VarintError::Truncated)
    }
}

/// Append the varint encoding of `val` to `out`.
pub fn encode_varint(mut val: u64, out: &mut Vec<u8>) {
    while val > 0x7f {
        out.push((val as u8 & 0x7f) | 0x80);
        val >>= 7;
    }
    out.push(val as u8);
}

/// Return the number of bytes [`encode_varint`] will use for `val`.
pub fn varint_len(val: u64) -> usize {
    let bits = 64 - (val | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Map a signed 32-bit value to an unsigned value using ZigZag encoding.
pub fn zigzag_encode_32(val: i32) -> u32 {
    ((val << 1) ^ (val >> 31)) as u32
}

/// Inverse of [`zigzag_encode_32`].
pub fn zigzag_decode_32(val: u32) -> i32 {
    ((val >> 1) as i32) ^ -((val & 1) as i32)
}

/// Map a signed 64-bit value to an unsigned value using ZigZag encoding.
///
/// 0, -1, 1, -2, 2 ... map to 0, 1, 2, 3, 4 ...
pub fn zigzag_encode_64(val: i64) -> u64 {
    ((val << 1) ^ (val >> 63)) as u64
}

/// Inverse of [`zigzag_encode_64`].
pub fn zigzag_decode_64(val: u64) -> i64 {
    ((val >> 1) as i64) ^ -((val & 1) as i64)
}

#[cfg(test)]
mod tests {
    use tagwire_testing::TestCases;

    use super::{
        decode_varint, encode_varint, varint_len, zigzag_decode_32, zigzag_decode_64,
        zigzag_encode_32, zigzag_encode_64, VarintError,
    };

    fn encode(val: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_varint(val, &mut buf);
        buf
    }

    #[test]
    fn test_decode_varint() {
        let mut values: Vec<u64> = (0..1024).collect();
        values.extend([u32::MAX as u64, 1 << 63, u64::MAX]);
        for val in values {
            let buf = encode(val);
            assert_eq!(buf.len(), varint_len(val));
            let (decoded, len) = decode_varint(&buf).unwrap();
            assert_eq!(decoded, val);
            assert_eq!(len, buf.len());
        }
    }

    #[test]
    fn test_decode_varint_examples() {
        #[derive(Debug)]
        struct Case {
            buf: &'static [u8],
            expected: Result<(u64, usize), VarintError>,
        }

        let cases = [
            // Examples from https://protobuf.dev/programming-guides/encoding/#varints.
            Case {
                buf: &[0x01],
                expected: Ok((1, 1)),
            },
            Case {
                buf: &[0x96, 0x01],
                expected: Ok((150, 2)),
            },
            Case {
                buf: &[0xac, 0x02, 0xff],
                expected: Ok((300, 2)),
            },
            // Non-minimal encoding of zero is accepted.
            Case {
                buf: &[0x80, 0x00],
                expected: Ok((0, 2)),
            },
            Case {
                buf: &[],
                expected: Err(VarintError::Truncated),
            },
            Case {
                buf: &[0x96],
                expected: Err(VarintError::Truncated),
            },
            Case {
                buf: &[0xff; 9],
                expected: Err(VarintError::Truncated),
            },
            Case {
                buf: &[0xff; 10],
                expected: Err(VarintError::Overflow),
            },
            Case {
                buf: &[0xff; 11],
                expected: Err(VarintError::Overflow),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(decode_varint(case.buf), case.expected);
        })
    }

    #[test]
    fn test_decode_varint_overflow() {
        let mut buf = encode(u64::MAX);
        assert_eq!(buf.len(), 10);
        buf[9] += 1;
        assert_eq!(decode_varint(&buf), Err(VarintError::Overflow));

        // 11+ continuation bytes fail regardless of content.
        for len in 11..16 {
            let mut buf = vec![0x80; len];
            buf.push(0x00);
            assert_eq!(decode_varint(&buf), Err(VarintError::Overflow));
        }
    }

    #[test]
    fn test_zigzag() {
        #[derive(Debug)]
        struct Case {
            signed: i64,
            unsigned: u64,
        }

        let cases = [
            Case {
                signed: 0,
                unsigned: 0,
            },
            Case {
                signed: -1,
                unsigned: 1,
            },
            Case {
                signed: 1,
                unsigned: 2,
            },
            Case {
                signed: -2,
                unsigned: 3,
            },
            Case {
                signed: i32::MAX as i64,
                unsigned: 0xffff_fffe,
            },
            Case {
                signed: i32::MIN as i64,
                unsigned: 0xffff_ffff,
            },
        ];

        cases.test_each(|&Case { signed, unsigned }| {
            assert_eq!(zigzag_encode_64(signed), unsigned);
            assert_eq!(zigzag_decode_64(unsigned), signed);
            assert_eq!(zigzag_encode_32(signed as i32), unsigned as u32);
            assert_eq!(zigzag_decode_32(unsigned as u32), signed as i32);
        });

        assert_eq!(zigzag_decode_64(zigzag_encode_64(i64::MIN)), i64::MIN);
        assert_eq!(zigzag_decode_64(zigzag_encode_64(i64::MAX)), i64::MAX);
    }
}
