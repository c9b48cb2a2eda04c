//! Variable-length word-length prefix used by the RouterOS API wire format.
//!
//! The prefix encodes an unsigned length in 1 to 5 bytes, using a unary
//! prefix in the high bits of the first byte to pick the encoding width. See
//! <https://wiki.mikrotik.com/wiki/Manual:API#Protocol>.

/// Error returned when a length prefix cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LengthError {
    /// The first byte of the prefix does not match any of the five valid
    /// unary-prefix patterns.
    #[error("invalid length prefix")]
    InvalidPrefix,
}

/// Result of decoding a length prefix: how many bytes of the input were the
/// prefix itself, and the decoded length in bytes of the word payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedLength {
    /// Number of bytes the prefix occupied (1..=5).
    pub prefix_len: usize,
    /// Decoded payload length.
    pub value: u32,
}

/// Attempts to decode a length prefix from the start of `data`.
///
/// Returns `Ok(None)` if `data` is too short to contain the full prefix
/// (the caller should buffer what it has and retry once more bytes arrive).
/// This never mutates or consumes anything; the check happens before any
/// state is advanced, unlike a backtracking decode.
pub fn decode_length(data: &[u8]) -> Result<Option<DecodedLength>, LengthError> {
    let Some(&b0) = data.first() else {
        return Ok(None);
    };

    let needed = prefix_size_for_first_byte(b0)?;
    if data.len() < needed {
        return Ok(None);
    }

    let value = match needed {
        1 => (b0 & 0x7F) as u32,
        2 => (((b0 & 0x3F) as u32) << 8) | data[1] as u32,
        3 => (((b0 & 0x1F) as u32) << 16) | ((data[1] as u32) << 8) | data[2] as u32,
        4 => {
            (((b0 & 0x0F) as u32) << 24)
                | ((data[1] as u32) << 16)
                | ((data[2] as u32) << 8)
                | data[3] as u32
        }
        5 => u32::from_be_bytes([data[1], data[2], data[3], data[4]]),
        _ => unreachable!("prefix_size_for_first_byte only returns 1..=5"),
    };

    Ok(Some(DecodedLength {
        prefix_len: needed,
        value,
    }))
}

fn prefix_size_for_first_byte(b0: u8) -> Result<usize, LengthError> {
    if b0 & 0x80 == 0x00 {
        Ok(1)
    } else if b0 & 0xC0 == 0x80 {
        Ok(2)
    } else if b0 & 0xE0 == 0xC0 {
        Ok(3)
    } else if b0 & 0xF0 == 0xE0 {
        Ok(4)
    } else if b0 == 0xF0 {
        Ok(5)
    } else {
        Err(LengthError::InvalidPrefix)
    }
}

/// Encodes `len` into the shortest valid prefix form and appends it to `out`.
pub fn encode_length(len: u32, out: &mut Vec<u8>) {
    match len {
        0x00..=0x7F => out.push(len as u8),
        0x80..=0x3FFF => {
            let l = len | 0x8000;
            out.push(((l >> 8) & 0xFF) as u8);
            out.push((l & 0xFF) as u8);
        }
        0x4000..=0x1F_FFFF => {
            let l = len | 0xC0_0000;
            out.push(((l >> 16) & 0xFF) as u8);
            out.push(((l >> 8) & 0xFF) as u8);
            out.push((l & 0xFF) as u8);
        }
        0x20_0000..=0x0FFF_FFFF => {
            let l = len | 0xE000_0000;
            out.push(((l >> 24) & 0xFF) as u8);
            out.push(((l >> 16) & 0xFF) as u8);
            out.push(((l >> 8) & 0xFF) as u8);
            out.push((l & 0xFF) as u8);
        }
        _ => {
            out.push(0xF0);
            out.extend_from_slice(&len.to_be_bytes());
        }
    }
}

/// Number of bytes `encode_length` would emit for `len`. Used to size
/// buffers up front.
pub fn prefix_size(len: u32) -> usize {
    match len {
        0x00..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_byte_roundtrip() {
        let mut buf = Vec::new();
        encode_length(0x2C, &mut buf);
        assert_eq!(buf, vec![0x2C]);
        let decoded = decode_length(&buf).unwrap().unwrap();
        assert_eq!(decoded, DecodedLength { prefix_len: 1, value: 0x2C });
    }

    #[test]
    fn two_byte_roundtrip() {
        // 300 => 0x81 0x2C per the protocol spec example.
        let mut buf = Vec::new();
        encode_length(300, &mut buf);
        assert_eq!(buf, vec![0x81, 0x2C]);
        let decoded = decode_length(&buf).unwrap().unwrap();
        assert_eq!(decoded, DecodedLength { prefix_len: 2, value: 300 });
    }

    #[test]
    fn three_four_five_byte_roundtrip() {
        for len in [0x4000u32, 0x20_0000, 0x1000_0000, u32::MAX] {
            let mut buf = Vec::new();
            encode_length(len, &mut buf);
            assert_eq!(buf.len(), prefix_size(len));
            let decoded = decode_length(&buf).unwrap().unwrap();
            assert_eq!(decoded.value, len);
            assert_eq!(decoded.prefix_len, buf.len());
        }
    }

    #[test]
    fn insufficient_data_does_not_error() {
        // A 2-byte prefix with only the first byte present.
        assert_eq!(decode_length(&[0x81]).unwrap(), None);
        assert_eq!(decode_length(&[]).unwrap(), None);
        // 5-byte prefix, only 3 bytes available.
        assert_eq!(decode_length(&[0xF0, 0x00, 0x00]).unwrap(), None);
    }

    #[test]
    fn invalid_prefix_byte() {
        // 0xF8.. is not a valid unary prefix (only 0xF0 exactly selects the
        // 5-byte form).
        assert_eq!(decode_length(&[0xF8]), Err(LengthError::InvalidPrefix));
    }

    proptest::proptest! {
        #[test]
        fn prop_length_roundtrip(len in 0u32..=u32::MAX) {
            let mut buf = Vec::new();
            encode_length(len, &mut buf);
            let decoded = decode_length(&buf).unwrap().unwrap();
            proptest::prop_assert_eq!(decoded.value, len);
            proptest::prop_assert_eq!(decoded.prefix_len, prefix_size(len));
            proptest::prop_assert_eq!(decoded.prefix_len, buf.len());
        }
    }
}
