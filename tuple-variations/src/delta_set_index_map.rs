//! Delta set index maps
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/otvarcommonformats#associating-target-items-to-variation-data>

use font_types::Uint24;
use read_fonts::{FontData, ReadError};

use crate::cursor::Cursor;
use crate::serialize::{SerializeErrorFlags, Serializer};

/// Outer and inner indices for reading from an item variation store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DeltaSetIndex {
    /// Outer delta set index.
    pub outer: u16,
    /// Inner delta set index.
    pub inner: u16,
}

/// The packed `entryFormat` field of a delta set index map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryFormat(u8);

impl EntryFormat {
    /// Mask for the low 4 bits, which give the count of bits minus one that
    /// are used in each entry for the inner-level index.
    pub const INNER_INDEX_BIT_COUNT_MASK: u8 = 0x0F;
    /// Mask for bits that indicate the size in bytes minus one of each
    /// entry.
    pub const MAP_ENTRY_SIZE_MASK: u8 = 0x30;

    /// Pack an entry width in bytes and an inner bit count.
    ///
    /// Returns `None` if the width is not in `1..=4` or the bit count not in
    /// `1..=16`.
    pub fn new(width: u8, inner_bit_count: u8) -> Option<Self> {
        if !(1..=4).contains(&width) || !(1..=16).contains(&inner_bit_count) {
            return None;
        }
        Some(Self(((width - 1) << 4) | (inner_bit_count - 1)))
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn entry_size(self) -> u8 {
        ((self.0 & Self::MAP_ENTRY_SIZE_MASK) >> 4) + 1
    }

    pub fn bit_count(self) -> u8 {
        (self.0 & Self::INNER_INDEX_BIT_COUNT_MASK) + 1
    }
}

/// A parsed delta set index map, format 0 or 1.
#[derive(Clone, Copy, Debug)]
pub struct DeltaSetIndexMap<'a> {
    format: u8,
    entry_format: EntryFormat,
    map_count: u32,
    map_data: FontData<'a>,
}

impl<'a> DeltaSetIndexMap<'a> {
    /// Parse a map, checking that every entry is in bounds.
    pub fn read(data: FontData<'a>) -> Result<Self, ReadError> {
        let mut cursor = Cursor::new(data);
        let format: u8 = cursor.read()?;
        let entry_format = EntryFormat::from_bits(cursor.read()?);
        let map_count = match format {
            0 => cursor.read::<u16>()? as u32,
            1 => cursor.read::<u32>()?,
            other => return Err(ReadError::InvalidFormat(other.into())),
        };
        let map_len = (map_count as usize)
            .checked_mul(entry_format.entry_size() as usize)
            .ok_or(ReadError::OutOfBounds)?;
        let map_data = cursor.read_data(map_len)?;
        Ok(Self {
            format,
            entry_format,
            map_count,
            map_data,
        })
    }

    pub fn format(&self) -> u8 {
        self.format
    }

    pub fn entry_format(&self) -> EntryFormat {
        self.entry_format
    }

    pub fn map_count(&self) -> u32 {
        self.map_count
    }

    pub fn width(&self) -> u8 {
        self.entry_format.entry_size()
    }

    pub fn inner_bit_count(&self) -> u8 {
        self.entry_format.bit_count()
    }

    /// Returns the delta set index for the specified value.
    ///
    /// Values past the end of the map use the last entry. An empty map
    /// passes the value through, split at bit 16.
    pub fn get(&self, index: u32) -> Result<DeltaSetIndex, ReadError> {
        let mapped = self.map(index)?;
        Ok(DeltaSetIndex {
            outer: (mapped >> 16) as u16,
            inner: (mapped & 0xFFFF) as u16,
        })
    }

    /// Map a value to a packed `outer << 16 | inner` index.
    pub fn map(&self, index: u32) -> Result<u32, ReadError> {
        if self.map_count == 0 {
            return Ok(index);
        }
        let index = index.min(self.map_count - 1);
        let entry_size = self.entry_format.entry_size();
        let offset = index as usize * entry_size as usize;
        let entry = match entry_size {
            1 => self.map_data.read_at::<u8>(offset)? as u32,
            2 => self.map_data.read_at::<u16>(offset)? as u32,
            3 => self.map_data.read_at::<Uint24>(offset)?.to_u32(),
            4 => self.map_data.read_at::<u32>(offset)?,
            _ => {
                return Err(ReadError::MalformedData(
                    "invalid entry size in DeltaSetIndexMap",
                ))
            }
        };
        let bit_count = self.entry_format.bit_count();
        let outer = entry >> bit_count;
        let inner = entry & ((1 << bit_count) - 1);
        Ok((outer << 16) | inner)
    }
}

/// Map `index` through `map`, or pass it through unchanged when there is no
/// map.
pub fn map_or_identity(map: Option<&DeltaSetIndexMap>, index: u32) -> Result<u32, ReadError> {
    match map {
        Some(map) => map.map(index),
        None => Ok(index),
    }
}

/// The layout chosen for writing a delta set index map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaSetIndexMapPlan<'a> {
    output_map: &'a [u32],
    width: u8,
    inner_bit_count: u8,
}

impl<'a> DeltaSetIndexMapPlan<'a> {
    /// Choose the smallest entries that can hold every `outer << 16 | inner`
    /// value in `output_map`.
    pub fn new(output_map: &'a [u32]) -> Self {
        let bit_storage = |v: u32| (32 - v.leading_zeros()) as u8;
        let (mut outer_bit_count, mut inner_bit_count) = (0, 1);
        for v in output_map {
            outer_bit_count = outer_bit_count.max(bit_storage(v >> 16));
            inner_bit_count = inner_bit_count.max(bit_storage(v & 0xFFFF));
        }
        let width = (outer_bit_count + inner_bit_count).div_ceil(8).max(1);
        Self {
            output_map,
            width,
            inner_bit_count,
        }
    }

    /// Use an explicit entry layout.
    pub fn with_layout(output_map: &'a [u32], width: u8, inner_bit_count: u8) -> Self {
        Self {
            output_map,
            width,
            inner_bit_count,
        }
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn inner_bit_count(&self) -> u8 {
        self.inner_bit_count
    }

    pub fn output_map(&self) -> &'a [u32] {
        self.output_map
    }

    /// Write the map, as format 0 if the entry count fits in 16 bits and
    /// format 1 otherwise.
    pub fn serialize(&self, s: &mut Serializer) -> Result<(), SerializeErrorFlags> {
        let map_count = self.output_map.len();
        let Some(entry_format) = EntryFormat::new(self.width, self.inner_bit_count) else {
            return Err(s.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OTHER));
        };
        let Ok(map_count_u32) = u32::try_from(map_count) else {
            return Err(s.set_err(SerializeErrorFlags::SERIALIZE_ERROR_INT_OVERFLOW));
        };

        if map_count_u32 <= 0xFFFF {
            s.embed(0_u8)?;
            s.embed(entry_format.bits())?;
            s.embed(map_count_u32 as u16)?;
        } else {
            s.embed(1_u8)?;
            s.embed(entry_format.bits())?;
            s.embed(map_count_u32)?;
        }

        let width = self.width as usize;
        for v in self.output_map {
            let outer = v >> 16;
            let inner = v & 0xFFFF;
            let u = (outer << self.inner_bit_count) | inner;
            s.embed_bytes(&u.to_be_bytes()[4 - width..])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn entry_format_fields() {
        let format = EntryFormat::from_bits(0x2B);
        assert_eq!(format.entry_size(), 3);
        assert_eq!(format.bit_count(), 12);
        assert_eq!(EntryFormat::new(3, 12), Some(format));
        assert_eq!(EntryFormat::new(0, 12), None);
        assert_eq!(EntryFormat::new(5, 12), None);
        assert_eq!(EntryFormat::new(2, 17), None);
    }

    #[test]
    fn read_format_0() {
        // width 1, 4 inner bits: outer 1 inner 2, outer 0 inner 15
        let data = [0x00, 0x03, 0x00, 0x02, 0x12, 0x0F];
        let map = DeltaSetIndexMap::read(FontData::new(&data)).unwrap();
        assert_eq!(map.format(), 0);
        assert_eq!(map.map_count(), 2);
        assert_eq!(map.width(), 1);
        assert_eq!(map.inner_bit_count(), 4);
        assert_eq!(map.map(0).unwrap(), 0x0001_0002);
        assert_eq!(map.map(1).unwrap(), 0x0000_000F);
        // past the end uses the last entry
        assert_eq!(map.map(100).unwrap(), 0x0000_000F);
        assert_eq!(map.get(0).unwrap(), DeltaSetIndex { outer: 1, inner: 2 });
    }

    #[test]
    fn read_format_1() {
        let data = [0x01, 0x1F, 0x00, 0x00, 0x00, 0x01, 0x00, 0x05];
        let map = DeltaSetIndexMap::read(FontData::new(&data)).unwrap();
        assert_eq!(map.format(), 1);
        assert_eq!(map.inner_bit_count(), 16);
        assert_eq!(map.get(7).unwrap(), DeltaSetIndex { outer: 0, inner: 5 });
    }

    #[test]
    fn empty_map_is_identity() {
        let data = [0x00, 0x00, 0x00, 0x00];
        let map = DeltaSetIndexMap::read(FontData::new(&data)).unwrap();
        assert_eq!(map.map(0x0003_0004).unwrap(), 0x0003_0004);
        assert_eq!(map.get(0x0003_0004).unwrap(), DeltaSetIndex { outer: 3, inner: 4 });
        assert_eq!(map_or_identity(None, 42).unwrap(), 42);
        assert_eq!(map_or_identity(Some(&map), 42).unwrap(), 42);
    }

    #[test]
    fn read_errors() {
        assert!(matches!(
            DeltaSetIndexMap::read(FontData::new(&[0x02, 0x00, 0x00, 0x00])),
            Err(ReadError::InvalidFormat(2))
        ));
    }

    #[rstest]
    #[case::short_header(&[0x00, 0x00, 0x00])]
    #[case::short_data(&[0x00, 0x10, 0x00, 0x02, 0x00, 0x01, 0x00])]
    fn truncated_maps(#[case] data: &[u8]) {
        assert!(matches!(
            DeltaSetIndexMap::read(FontData::new(data)),
            Err(ReadError::OutOfBounds)
        ));
    }

    #[test]
    fn plan_picks_minimal_layout() {
        let output = [0x0000_0001, 0x0000_0003];
        let plan = DeltaSetIndexMapPlan::new(&output);
        assert_eq!((plan.width(), plan.inner_bit_count()), (1, 2));

        let output = [0x0002_00FF];
        let plan = DeltaSetIndexMapPlan::new(&output);
        assert_eq!((plan.width(), plan.inner_bit_count()), (2, 8));

        let plan = DeltaSetIndexMapPlan::new(&[]);
        assert_eq!((plan.width(), plan.inner_bit_count()), (1, 1));
    }

    #[test]
    fn serialize_then_read() {
        let output = [0x0000_0000, 0x0001_0002, 0x0003_01FF, 0x0000_0007];
        let plan = DeltaSetIndexMapPlan::new(&output);
        let mut s = Serializer::new(1024);
        plan.serialize(&mut s).unwrap();
        let bytes = s.copy_bytes().unwrap();

        // 9 inner bits and 2 outer bits fit in two bytes
        assert_eq!(&bytes[..4], &[0x00, 0x18, 0x00, 0x04]);
        let map = DeltaSetIndexMap::read(FontData::new(&bytes)).unwrap();
        for (i, expected) in output.iter().enumerate() {
            assert_eq!(map.map(i as u32).unwrap(), *expected);
        }
    }

    #[test]
    fn serialize_large_map_uses_format_1() {
        let output = vec![1_u32; 0x10000];
        let plan = DeltaSetIndexMapPlan::new(&output);
        let mut s = Serializer::new(usize::MAX);
        plan.serialize(&mut s).unwrap();
        let bytes = s.copy_bytes().unwrap();
        assert_eq!(&bytes[..6], &[0x01, 0x00, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(bytes.len(), 6 + 0x10000);
        let map = DeltaSetIndexMap::read(FontData::new(&bytes)).unwrap();
        assert_eq!(map.map(0xFFFF).unwrap(), 1);
    }

    #[test]
    fn serialize_rejects_bad_layout() {
        let output = [1];
        let mut s = Serializer::new(64);
        assert_eq!(
            DeltaSetIndexMapPlan::with_layout(&output, 5, 4).serialize(&mut s),
            Err(SerializeErrorFlags::SERIALIZE_ERROR_OTHER)
        );
        let mut s = Serializer::new(64);
        assert_eq!(
            DeltaSetIndexMapPlan::with_layout(&output, 2, 0).serialize(&mut s),
            Err(SerializeErrorFlags::SERIALIZE_ERROR_OTHER)
        );
    }
}
