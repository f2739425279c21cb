use std::fmt;

/// A forward-only cursor over a byte slice, used for the ULEB128-encoded
/// streams inside a DEX data section (string length prefixes and
/// `class_data_item` entries).
///
/// Running off the end of the slice is not an error: reads past the end
/// yield zero and the cursor stays put, so a truncated stream degrades into
/// "no more entries" instead of a panic.
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Decodes one unsigned LEB128 value.
    ///
    /// DEX caps ULEB128 at five bytes; continuation bits beyond that are
    /// consumed but their payload no longer fits a `u32` and is dropped.
    pub(crate) fn uleb128(&mut self) -> u32 {
        let mut result: u64 = 0;
        let mut shift = 0u32;
        while let Some(&byte) = self.bytes.get(self.pos) {
            self.pos += 1;
            if shift < 63 {
                result |= u64::from(byte & 0x7f) << shift;
            }
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        result as u32
    }

    /// The bytes that have not been consumed yet.
    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    /// Whether the cursor has consumed the whole slice.
    pub(crate) const fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("pos", &self.pos)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn encode(mut value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    #[test]
    fn single_byte_values() {
        for value in [0u32, 1, 0x7f] {
            let bytes = encode(value);
            assert_eq!(bytes.len(), 1);
            assert_eq!(Cursor::new(&bytes).uleb128(), value);
        }
    }

    #[test]
    fn multi_byte_values() {
        assert_eq!(Cursor::new(&[0x80, 0x01]).uleb128(), 0x80);
        assert_eq!(Cursor::new(&[0xff, 0xff, 0xff, 0xff, 0x0f]).uleb128(), u32::MAX);
    }

    #[test]
    fn sequence_and_remainder() {
        let mut bytes = encode(300);
        bytes.extend(encode(7));
        bytes.push(0xaa);
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.uleb128(), 300);
        assert_eq!(cursor.uleb128(), 7);
        assert_eq!(cursor.remaining(), &[0xaa]);
    }

    #[test]
    fn truncated_stream_yields_zero() {
        let mut cursor = Cursor::new(&[]);
        assert_eq!(cursor.uleb128(), 0);
        // A dangling continuation bit ends the value at the buffer edge.
        let mut cursor = Cursor::new(&[0x80]);
        assert_eq!(cursor.uleb128(), 0);
        assert!(cursor.remaining().is_empty());
    }

    proptest! {
        #[test]
        fn round_trip(value in any::<u32>()) {
            let bytes = encode(value);
            let mut cursor = Cursor::new(&bytes);
            prop_assert_eq!(cursor.uleb128(), value);
            prop_assert!(cursor.remaining().is_empty());
        }
    }
}
