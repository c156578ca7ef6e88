//! Bounds-checked little-endian reads over a fixed byte buffer.

use crate::error::{Result, WpilogError};
use byteorder::{ByteOrder, LittleEndian};

/// A read offset into a fixed-size buffer that advances by field width.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Moves the read offset back to a previously observed position.
    pub fn set_position(&mut self, offset: usize) {
        self.offset = offset.min(self.data.len());
    }

    /// Bytes left between the offset and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the next `len` bytes and advances past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(WpilogError::InvalidFormat(format!(
                "need {} bytes at offset {}, only {} available",
                len,
                self.offset,
                self.remaining()
            )));
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.read_bytes(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    /// Reads a 4-byte length prefix followed by that many bytes of UTF-8 text.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, matching how string
    /// payloads are treated elsewhere in the log.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance_by_width() {
        let data = [0x01, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_u8().unwrap(), 1);
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_u16().unwrap(), 2);
        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.read_u32().unwrap(), 3);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_read_past_end_fails_without_advancing() {
        let data = [0x01, 0x02];
        let mut cursor = ByteCursor::new(&data);
        cursor.read_u8().unwrap();

        assert!(matches!(
            cursor.read_u32(),
            Err(WpilogError::InvalidFormat(_))
        ));
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_read_length_prefixed_string() {
        let mut data = vec![0x05, 0x00, 0x00, 0x00];
        data.extend_from_slice(b"hello");
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_string().unwrap(), "hello");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_signed_and_float_reads() {
        let mut data = Vec::new();
        data.extend_from_slice(&(-2i16).to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-42i64).to_le_bytes());
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_i16().unwrap(), -2);
        assert_eq!(cursor.read_f32().unwrap(), 1.5);
        assert_eq!(cursor.read_i64().unwrap(), -42);
    }
}
