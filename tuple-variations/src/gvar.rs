//! The [gvar (Glyph Variations)](https://learn.microsoft.com/en-us/typography/opentype/spec/gvar)
//! table, and instancing the variation data of a single glyph.

use read_fonts::{FontData, ReadError};

use crate::axes::AxisIndexMap;
use crate::cursor::Cursor;
use crate::parsing_util::AxisLimits;
use crate::tuple_header::{SharedTuples, TableKind};
use crate::tuple_variations::{instantiate_store, PinnedDeltas};
use crate::Error;

const GVAR_HEADER_LEN: usize = 20;
const LONG_OFFSETS: u16 = 0x0001;

/// The header of a `gvar` table, with access to each glyph's data.
#[derive(Clone, Debug)]
pub struct Gvar<'a> {
    data: FontData<'a>,
    axis_count: u16,
    shared_tuples: SharedTuples<'a>,
    glyph_count: u16,
    long_offsets: bool,
    offsets: FontData<'a>,
    glyph_data_offset: usize,
}

impl<'a> Gvar<'a> {
    pub fn read(data: FontData<'a>) -> Result<Self, ReadError> {
        let mut cursor = Cursor::new(data);
        let major: u16 = cursor.read()?;
        let _minor: u16 = cursor.read()?;
        if major != 1 {
            return Err(ReadError::InvalidFormat(major.into()));
        }
        let axis_count: u16 = cursor.read()?;
        let shared_tuple_count: u16 = cursor.read()?;
        let shared_tuples_offset: u32 = cursor.read()?;
        let glyph_count: u16 = cursor.read()?;
        let flags: u16 = cursor.read()?;
        let glyph_data_offset: u32 = cursor.read()?;
        debug_assert_eq!(cursor.position(), GVAR_HEADER_LEN);

        let long_offsets = flags & LONG_OFFSETS != 0;
        let offset_size = if long_offsets { 4 } else { 2 };
        let offsets = cursor.read_data((glyph_count as usize + 1) * offset_size)?;

        let shared_tuples_len = shared_tuple_count as usize * axis_count as usize * 2;
        let shared_start = shared_tuples_offset as usize;
        let shared_data = data
            .slice(shared_start..shared_start + shared_tuples_len)
            .ok_or(ReadError::OutOfBounds)?;

        Ok(Self {
            data,
            axis_count,
            shared_tuples: SharedTuples::new(shared_data, axis_count),
            glyph_count,
            long_offsets,
            offsets,
            glyph_data_offset: glyph_data_offset as usize,
        })
    }

    pub fn axis_count(&self) -> u16 {
        self.axis_count
    }

    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    pub fn shared_tuples(&self) -> &SharedTuples<'a> {
        &self.shared_tuples
    }

    fn glyph_offset(&self, idx: usize) -> Result<usize, ReadError> {
        if self.long_offsets {
            self.offsets.read_at::<u32>(idx * 4).map(|off| off as usize)
        } else {
            self.offsets.read_at::<u16>(idx * 2).map(|off| off as usize * 2)
        }
    }

    /// The variation data for `gid`, or `None` if the glyph does not vary.
    pub fn glyph_variation_data(&self, gid: u16) -> Result<Option<FontData<'a>>, ReadError> {
        if gid >= self.glyph_count {
            return Err(ReadError::OutOfBounds);
        }
        let start = self.glyph_offset(gid as usize)?;
        let end = self.glyph_offset(gid as usize + 1)?;
        if end <= start {
            return Ok(None);
        }
        self.data
            .slice(self.glyph_data_offset + start..self.glyph_data_offset + end)
            .map(Some)
            .ok_or(ReadError::OutOfBounds)
    }
}

/// The result of instancing one glyph's variation data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstancedGlyphVariations {
    /// The new variation data, or `None` if the glyph no longer varies.
    pub data: Option<Vec<u8>>,
    /// Deltas to apply to the glyph's points at the new default location.
    pub deltas: PinnedDeltas,
}

/// Instance the variation data of a single glyph.
///
/// `point_count` includes the four phantom points. Shared tuples are
/// resolved from `shared_tuples`; the new data always embeds its peaks.
pub fn instantiate_glyph_variations(
    data: &[u8],
    shared_tuples: &SharedTuples,
    axes: &AxisIndexMap,
    point_count: usize,
    limits: &AxisLimits,
) -> Result<InstancedGlyphVariations, Error> {
    if data.is_empty() {
        return Ok(InstancedGlyphVariations::default());
    }
    let (data, deltas) = instantiate_store(
        data,
        TableKind::Gvar,
        axes,
        shared_tuples,
        point_count,
        limits,
    )?;
    Ok(InstancedGlyphVariations { data, deltas })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tent::AxisLimit;
    use font_types::Tag;
    use pretty_assertions::assert_eq;

    const WGHT: Tag = Tag::new(b"wght");

    // two glyphs over one axis; glyph 0 uses shared tuple 0 (wght=1) and
    // glyph 1 has no variations
    #[rustfmt::skip]
    static GVAR: &[u8] = &[
        0x00, 0x01, 0x00, 0x00, // version
        0x00, 0x01, 0x00, 0x01, // one axis, one shared tuple
        0x00, 0x00, 0x00, 0x1A, // shared tuples at 26
        0x00, 0x02, 0x00, 0x00, // two glyphs, short offsets
        0x00, 0x00, 0x00, 0x1C, // glyph data at 28
        0x00, 0x00, 0x00, 0x07, 0x00, 0x07, // offsets / 2
        0x40, 0x00, // shared tuple 0
        // glyph 0
        0x00, 0x01, 0x00, 0x08,
        0x00, 0x05, 0x20, 0x00, // private points, shared tuple 0
        0x00, 0x01, 0x05, 0x06, 0x81,
        0x00, // padding
    ];

    fn glyph_zero() -> (Gvar<'static>, FontData<'static>) {
        let gvar = Gvar::read(FontData::new(GVAR)).unwrap();
        let data = gvar.glyph_variation_data(0).unwrap().unwrap();
        (gvar, data)
    }

    fn limit(tag: Tag, limit: AxisLimit) -> AxisLimits {
        let mut limits = AxisLimits::new();
        limits.push(tag, limit).unwrap();
        limits
    }

    #[test]
    fn read_table() {
        let gvar = Gvar::read(FontData::new(GVAR)).unwrap();
        assert_eq!(gvar.axis_count(), 1);
        assert_eq!(gvar.glyph_count(), 2);
        assert_eq!(gvar.shared_tuples().len(), 1);
        assert_eq!(gvar.glyph_variation_data(0).unwrap().unwrap().len(), 14);
        assert!(gvar.glyph_variation_data(1).unwrap().is_none());
        assert!(matches!(
            gvar.glyph_variation_data(2),
            Err(ReadError::OutOfBounds)
        ));
    }

    #[test]
    fn read_errors() {
        let mut bad_version = GVAR.to_vec();
        bad_version[1] = 0;
        assert!(matches!(
            Gvar::read(FontData::new(&bad_version)),
            Err(ReadError::InvalidFormat(0))
        ));
        assert!(matches!(
            Gvar::read(FontData::new(&GVAR[..24])),
            Err(ReadError::OutOfBounds)
        ));
    }

    #[test]
    fn pin_glyph() {
        let (gvar, data) = glyph_zero();
        let axes = AxisIndexMap::new([WGHT]);
        let instanced = instantiate_glyph_variations(
            data.as_bytes(),
            gvar.shared_tuples(),
            &axes,
            2,
            &limit(WGHT, AxisLimit::pinned(1.0)),
        )
        .unwrap();
        assert_eq!(instanced.data, None);
        assert_eq!(instanced.deltas.x(), &[5.0, 6.0]);
        assert_eq!(instanced.deltas.y(), Some([0.0, 0.0].as_slice()));
    }

    #[test]
    fn clip_glyph_embeds_peak() {
        let (gvar, data) = glyph_zero();
        let axes = AxisIndexMap::new([WGHT]);
        let instanced = instantiate_glyph_variations(
            data.as_bytes(),
            gvar.shared_tuples(),
            &axes,
            2,
            &limit(WGHT, AxisLimit::new(-1.0, 0.0, 0.5)),
        )
        .unwrap();
        assert!(instanced.deltas.is_zero());
        #[rustfmt::skip]
        let expected = vec![
            0x00, 0x01, 0x00, 0x0A,
            0x00, 0x05, 0xA0, 0x00, 0x40, 0x00,
            0x00, 0x01, 0x03, 0x03, 0x81,
        ];
        assert_eq!(instanced.data, Some(expected));
    }

    #[test]
    fn empty_glyph_data() {
        let axes = AxisIndexMap::new([WGHT]);
        let instanced = instantiate_glyph_variations(
            &[],
            &SharedTuples::empty(),
            &axes,
            4,
            &limit(WGHT, AxisLimit::pinned(1.0)),
        )
        .unwrap();
        assert_eq!(instanced, InstancedGlyphVariations::default());
    }
}
