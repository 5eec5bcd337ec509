//! Growable little-endian byte sink with offset tracking.
//!
//! Length-prefixed formats need to write a size field before the
//! sized body is known. The pattern here is: remember `get_offset()`,
//! append a placeholder, write the body, then `replace_with_*` the
//! placeholder once the real value is known.

pub struct ByteWriter {
    pub data: Vec<u8>,
    offset: usize,
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteWriter {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            offset: 0,
        }
    }

    fn offset(&mut self, offset: usize) {
        self.offset += offset;
    }

    pub fn get_offset(&self) -> usize {
        self.offset
    }

    pub fn append_u8(&mut self, i: u8) {
        self.data.extend(i.to_le_bytes());
        self.offset(1);
    }

    pub fn append_i8(&mut self, i: i8) {
        self.data.extend(i.to_le_bytes());
        self.offset(1);
    }

    pub fn append_u16(&mut self, i: u16) {
        self.data.extend(i.to_le_bytes());
        self.offset(2);
    }

    pub fn append_i16(&mut self, i: i16) {
        self.data.extend(i.to_le_bytes());
        self.offset(2);
    }

    pub fn append_u32(&mut self, i: u32) {
        self.data.extend(i.to_le_bytes());
        self.offset(4);
    }

    pub fn append_i32(&mut self, i: i32) {
        self.data.extend(i.to_le_bytes());
        self.offset(4);
    }

    pub fn append_u64(&mut self, i: u64) {
        self.data.extend(i.to_le_bytes());
        self.offset(8);
    }

    pub fn append_f32(&mut self, i: f32) {
        self.data.extend(i.to_le_bytes());
        self.offset(4);
    }

    pub fn append_f64(&mut self, i: f64) {
        self.data.extend(i.to_le_bytes());
        self.offset(8);
    }

    pub fn append_u8_slice(&mut self, i: &[u8]) {
        self.data.extend_from_slice(i);
        self.offset(i.len());
    }

    /// Reserved and padding runs.
    pub fn append_zeros(&mut self, count: usize) {
        self.data.extend(std::iter::repeat(0u8).take(count));
        self.offset(count);
    }

    pub fn replace(&mut self, start: usize, length: usize, slice: &[u8]) {
        self.data[start..(length + start)].copy_from_slice(&slice[..length]);
    }

    pub fn replace_with_u16(&mut self, start: usize, val: u16) {
        let bytes = val.to_le_bytes();
        self.replace(start, 2, &bytes);
    }

    pub fn replace_with_u32(&mut self, start: usize, val: u32) {
        let bytes = val.to_le_bytes();
        self.replace(start, 4, &bytes);
    }

    pub fn replace_with_i32(&mut self, start: usize, val: i32) {
        let bytes = val.to_le_bytes();
        self.replace(start, 4, &bytes);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn append_then_patch() {
        let mut writer = ByteWriter::new();

        let size_offset = writer.get_offset();
        writer.append_u32(0);
        writer.append_u16(0xF1FA);
        writer.append_u8_slice(&[1, 2, 3]);

        writer.replace_with_u32(size_offset, writer.get_offset() as u32);

        assert_eq!(writer.data, vec![9, 0, 0, 0, 0xFA, 0xF1, 1, 2, 3]);
        assert_eq!(writer.get_offset(), 9);
    }

    #[test]
    fn zeros_and_wide_types() {
        let mut writer = ByteWriter::new();

        writer.append_u64(0x0102030405060708);
        writer.append_zeros(3);
        writer.append_i16(-1);

        assert_eq!(
            writer.data,
            vec![8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 0, 0xFF, 0xFF]
        );
    }

    #[test]
    fn patch_u16_in_place() {
        let mut writer = ByteWriter::new();

        writer.append_u16(0xFFFF);
        writer.append_u16(0xAAAA);
        writer.replace_with_u16(0, 0xA5E0);

        assert_eq!(writer.data, vec![0xE0, 0xA5, 0xAA, 0xAA]);
    }
}
