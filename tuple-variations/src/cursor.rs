//! A cursor for reading a sequence of values from [`FontData`].

use font_types::{FixedSize, Scalar};
use read_fonts::{FontData, ReadError};

/// Reads scalars one after another from the front of some data.
///
/// Reads past the end of the data fail without moving the cursor.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    pos: usize,
    data: FontData<'a>,
}

impl<'a> Cursor<'a> {
    /// Return a cursor positioned at the start of `data`.
    pub fn new(data: FontData<'a>) -> Self {
        Cursor { pos: 0, data }
    }

    /// Skip `n_bytes`, failing if that would move past the end of the data.
    pub fn advance_by(&mut self, n_bytes: usize) -> Result<(), ReadError> {
        let new_pos = self
            .pos
            .checked_add(n_bytes)
            .filter(|pos| *pos <= self.data.len())
            .ok_or(ReadError::OutOfBounds)?;
        self.pos = new_pos;
        Ok(())
    }

    pub fn read<T: Scalar>(&mut self) -> Result<T, ReadError> {
        let value = self.data.read_at(self.pos)?;
        self.pos += T::RAW_BYTE_LEN;
        Ok(value)
    }

    /// Read `len` bytes as a new [`FontData`], advancing past them.
    pub fn read_data(&mut self, len: usize) -> Result<FontData<'a>, ReadError> {
        let end = self.pos.checked_add(len).ok_or(ReadError::OutOfBounds)?;
        let data = self
            .data
            .slice(self.pos..end)
            .ok_or(ReadError::OutOfBounds)?;
        self.pos = end;
        Ok(data)
    }

    /// The current byte position, relative to the start of the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The number of bytes left to read.
    pub fn remaining_bytes(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// The unread portion of the data.
    pub fn remaining(&self) -> FontData<'a> {
        self.data.split_off(self.pos).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_does_not_move_on_failure() {
        let data = FontData::new(&[0xff, 0x01, 0x02]);
        let mut cursor = Cursor::new(data);
        assert_eq!(cursor.read::<u8>().unwrap(), 0xff);
        assert!(matches!(cursor.read::<u32>(), Err(ReadError::OutOfBounds)));
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read::<i16>().unwrap(), 0x0102);
        assert_eq!(cursor.remaining_bytes(), 0);
        assert!(cursor.advance_by(1).is_err());
        assert!(cursor.advance_by(0).is_ok());
    }

    #[test]
    fn read_data_slices() {
        let data = FontData::new(&[1, 2, 3, 4, 5]);
        let mut cursor = Cursor::new(data);
        cursor.advance_by(1).unwrap();
        let sub = cursor.read_data(3).unwrap();
        assert_eq!(sub.as_bytes(), &[2, 3, 4]);
        assert_eq!(cursor.remaining().as_bytes(), &[5]);
        assert!(matches!(cursor.read_data(2), Err(ReadError::OutOfBounds)));
    }

    #[test]
    fn reads_font_types_scalars() {
        let data = FontData::new(&[0x40, 0x00, 0x01, 0x02, 0x03]);
        let mut cursor = Cursor::new(data);
        assert_eq!(
            cursor.read::<font_types::F2Dot14>().unwrap(),
            font_types::F2Dot14::from_f32(1.0)
        );
        assert_eq!(cursor.read::<font_types::Uint24>().unwrap().to_u32(), 0x010203);
    }
}
