//! Length-prefixed advertisement structures (Bluetooth Core Specification Supplement, Part A)
//!
//! An advertisement or scan response is a sequence of `[length][type][payload]` records where `length` counts the
//! type byte and the payload. Real devices pad their payloads with zeroes or emit a trailing record that claims more
//! bytes than were received, so the reader stops quietly at the first zero length or at a record that would run past
//! the end of the buffer.

/// One advertising data structure, borrowed from the record it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TlvEntry<'a> {
    /// The AD type code
    pub ad_type: u8,
    /// The payload following the type code
    pub payload: &'a [u8],
}

/// Iterates over the [`TlvEntry`] values of one advertisement record.
#[derive(Debug, Clone)]
pub struct TlvReader<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
    truncated: bool,
}

impl<'a> TlvReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        TlvReader {
            data,
            pos: 0,
            done: false,
            truncated: false,
        }
    }

    /// Returns `true` once the reader has met a record whose length runs past the end of the buffer.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Number of bytes consumed by the well-formed records read so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = TlvEntry<'a>;

    fn next(&mut self) -> Option<TlvEntry<'a>> {
        if self.done {
            return None;
        }
        let len = match self.data.get(self.pos) {
            Some(&len) if len != 0 => usize::from(len),
            _ => {
                self.done = true;
                return None;
            }
        };

        let start = self.pos + 1;
        let end = start + len;
        if end > self.data.len() {
            self.truncated = true;
            self.done = true;
            return None;
        }

        self.pos = end;
        Some(TlvEntry {
            ad_type: self.data[start],
            payload: &self.data[start + 1..end],
        })
    }
}

/// Reads the byte at `offset`.
pub fn read_u8(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

/// Reads a little-endian `u16` at `offset`.
pub fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    fixed::<2>(data, offset).map(u16::from_le_bytes)
}

/// Reads a little-endian `u32` at `offset`.
pub fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    fixed::<4>(data, offset).map(u32::from_le_bytes)
}

/// Reads a little-endian `u64` at `offset`.
pub fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    fixed::<8>(data, offset).map(u64::from_le_bytes)
}

/// Reads a big-endian unsigned integer of `width` bytes (1 to 8) at `offset`.
pub fn read_uint_be(data: &[u8], offset: usize, width: usize) -> Option<u64> {
    if width == 0 || width > 8 {
        return None;
    }
    let bytes = data.get(offset..offset.checked_add(width)?)?;
    Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn fixed<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    data.get(offset..offset.checked_add(N)?)?.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_every_record() {
        let data = [0x02, 0x01, 0x06, 0x03, 0x03, 0xd8, 0xfe, 0x01, 0x0a];
        let entries: Vec<_> = TlvReader::new(&data).collect();
        assert_eq!(
            entries,
            vec![
                TlvEntry {
                    ad_type: 0x01,
                    payload: &[0x06]
                },
                TlvEntry {
                    ad_type: 0x03,
                    payload: &[0xd8, 0xfe]
                },
                TlvEntry {
                    ad_type: 0x0a,
                    payload: &[]
                },
            ]
        );
    }

    #[test]
    fn stops_at_zero_length_padding() {
        let data = [0x02, 0x01, 0x06, 0x00, 0x00, 0x05, 0xff];
        let mut reader = TlvReader::new(&data);
        assert_eq!(reader.next().map(|e| e.ad_type), Some(0x01));
        assert_eq!(reader.next(), None);
        assert!(!reader.is_truncated());
    }

    #[test]
    fn truncated_trailing_record_ends_iteration() {
        let data = [0x02, 0x01, 0x06, 0x09, 0x09, b'a', b'b'];
        let mut reader = TlvReader::new(&data);
        assert_eq!(reader.next().map(|e| e.payload), Some(&[0x06][..]));
        assert_eq!(reader.next(), None);
        assert_eq!(reader.next(), None);
        assert!(reader.is_truncated());
        assert_eq!(reader.consumed(), 3);
    }

    #[test]
    fn integer_readers() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        assert_eq!(read_u8(&data, 8), Some(0x09));
        assert_eq!(read_u8(&data, 9), None);
        assert_eq!(read_u16_le(&data, 0), Some(0x0201));
        assert_eq!(read_u32_le(&data, 1), Some(0x05040302));
        assert_eq!(read_u64_le(&data, 1), Some(0x0908070605040302));
        assert_eq!(read_u64_le(&data, 2), None);
        assert_eq!(read_uint_be(&data, 0, 3), Some(0x010203));
        assert_eq!(read_uint_be(&data, 7, 3), None);
        assert_eq!(read_uint_be(&data, 0, 9), None);
    }
}
