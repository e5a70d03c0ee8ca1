//! Tuple variation store headers, and a cursor over them.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/otvarcommonformats#tuple-variation-store>

use font_types::{F2Dot14, FixedSize, Scalar};
use read_fonts::{FontData, ReadError};

use crate::axes::AxisIndexMap;
use crate::cursor::Cursor;
use crate::packed::PackedPointNumbers;
use crate::tent::{Region, Tent};

/// The kind of table a tuple variation store lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// CVT variations: one delta per CVT entry, preceded by a version.
    Cvar,
    /// Glyph variations: an x and a y delta per outline point.
    Gvar,
}

impl TableKind {
    /// Size of the fields that precede the store header in the table.
    pub fn store_header_offset(self) -> usize {
        match self {
            TableKind::Cvar => 4,
            TableKind::Gvar => 0,
        }
    }

    pub fn has_y_deltas(self) -> bool {
        self == TableKind::Gvar
    }
}

/// The `tupleIndex` field of a tuple variation header: flags in the high
/// four bits, a shared tuple index in the low twelve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TupleIndex(u16);

impl TupleIndex {
    /// The header includes an embedded peak tuple record, immediately after
    /// the tupleIndex field. If set, the low 12 bits are ignored.
    pub const EMBEDDED_PEAK_TUPLE: u16 = 0x8000;
    /// The header includes intermediate start and end tuple records,
    /// immediately after the peak tuple record (if present).
    pub const INTERMEDIATE_REGION: u16 = 0x4000;
    /// The serialized data for this tuple starts with its own packed point
    /// numbers; otherwise the store's shared point numbers are used.
    pub const PRIVATE_POINT_NUMBERS: u16 = 0x2000;
    /// Mask for the low 12 bits to give the shared tuple records index.
    pub const TUPLE_INDEX_MASK: u16 = 0x0FFF;

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Self {
        TupleIndex(bits)
    }

    pub fn embedded_peak_tuple(self) -> bool {
        (self.0 & Self::EMBEDDED_PEAK_TUPLE) != 0
    }

    pub fn intermediate_region(self) -> bool {
        (self.0 & Self::INTERMEDIATE_REGION) != 0
    }

    pub fn private_point_numbers(self) -> bool {
        (self.0 & Self::PRIVATE_POINT_NUMBERS) != 0
    }

    /// The index into the shared tuples, when there is no embedded peak.
    pub fn tuple_records_index(self) -> Option<u16> {
        (!self.embedded_peak_tuple()).then_some(self.0 & Self::TUPLE_INDEX_MASK)
    }
}

impl Scalar for TupleIndex {
    type Raw = <u16 as Scalar>::Raw;

    fn to_raw(self) -> Self::Raw {
        self.0.to_raw()
    }

    fn from_raw(raw: Self::Raw) -> Self {
        Self(u16::from_raw(raw))
    }
}

/// The `tupleVariationCount` field of the store header.
///
/// The high 4 bits are flags, and the low 12 bits are the number of tuple
/// variation headers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TupleVariationCount(u16);

impl TupleVariationCount {
    /// Some or all tuples reference a set of point numbers stored at the
    /// start of the serialized data.
    pub const SHARED_POINT_NUMBERS: u16 = 0x8000;
    /// Mask for the low 12 bits to give the tuple count.
    pub const COUNT_MASK: u16 = 0x0FFF;

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn shared_point_numbers(self) -> bool {
        (self.0 & Self::SHARED_POINT_NUMBERS) != 0
    }

    pub fn count(self) -> u16 {
        self.0 & Self::COUNT_MASK
    }
}

impl Scalar for TupleVariationCount {
    type Raw = <u16 as Scalar>::Raw;

    fn to_raw(self) -> Self::Raw {
        self.0.to_raw()
    }

    fn from_raw(raw: Self::Raw) -> Self {
        Self(u16::from_raw(raw))
    }
}

/// A coordinate per axis, as stored in a header or the shared tuples.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tuple<'a> {
    values: FontData<'a>,
}

impl<'a> Tuple<'a> {
    pub fn len(&self) -> usize {
        self.values.len() / F2Dot14::RAW_BYTE_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<F2Dot14> {
        self.values.read_at(idx * F2Dot14::RAW_BYTE_LEN).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = F2Dot14> + 'a {
        let values = self.values;
        (0..self.len()).filter_map(move |idx| values.read_at(idx * F2Dot14::RAW_BYTE_LEN).ok())
    }
}

/// The `sharedTuples` array of `gvar`: peak tuples referenced by index.
#[derive(Clone, Copy, Debug, Default)]
pub struct SharedTuples<'a> {
    data: FontData<'a>,
    axis_count: u16,
}

impl<'a> SharedTuples<'a> {
    pub fn new(data: FontData<'a>, axis_count: u16) -> Self {
        Self { data, axis_count }
    }

    /// No shared tuples, as for `cvar`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        match self.axis_count {
            0 => 0,
            n => self.data.len() / (n as usize * F2Dot14::RAW_BYTE_LEN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: u16) -> Result<Tuple<'a>, ReadError> {
        let tuple_len = self.axis_count as usize * F2Dot14::RAW_BYTE_LEN;
        let start = index as usize * tuple_len;
        self.data
            .slice(start..start + tuple_len)
            .filter(|_| (index as usize) < self.len())
            .map(|values| Tuple { values })
            .ok_or(ReadError::MalformedData("shared tuple index out of range"))
    }
}

/// A tuple variation header, validated to be fully in bounds.
#[derive(Clone, Copy, Debug)]
pub struct TupleVariationHeader<'a> {
    data: FontData<'a>,
    axis_count: u16,
}

impl<'a> TupleVariationHeader<'a> {
    const FIXED_LEN: usize = u16::RAW_BYTE_LEN + TupleIndex::RAW_BYTE_LEN;

    pub fn read(data: FontData<'a>, axis_count: u16) -> Result<Self, ReadError> {
        let index: TupleIndex = data.read_at(u16::RAW_BYTE_LEN)?;
        let byte_len = Self::byte_len_for(index, axis_count);
        let data = data.slice(..byte_len).ok_or(ReadError::OutOfBounds)?;
        Ok(Self { data, axis_count })
    }

    fn byte_len_for(index: TupleIndex, axis_count: u16) -> usize {
        let tuple_byte_len = F2Dot14::RAW_BYTE_LEN * axis_count as usize;
        let n_tuples = index.embedded_peak_tuple() as usize + 2 * index.intermediate_region() as usize;
        Self::FIXED_LEN + n_tuples * tuple_byte_len
    }

    /// The length of this header, in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// The size in bytes of the serialized data for this tuple.
    pub fn variation_data_size(&self) -> u16 {
        self.data.read_at(0).unwrap_or_default()
    }

    pub fn tuple_index(&self) -> TupleIndex {
        self.data.read_at(u16::RAW_BYTE_LEN).unwrap_or_default()
    }

    fn tuple_at(&self, n: usize) -> Tuple<'a> {
        let len = F2Dot14::RAW_BYTE_LEN * self.axis_count as usize;
        let start = Self::FIXED_LEN + n * len;
        Tuple {
            values: self.data.slice(start..start + len).unwrap_or_default(),
        }
    }

    pub fn peak_tuple(&self) -> Option<Tuple<'a>> {
        self.tuple_index()
            .embedded_peak_tuple()
            .then(|| self.tuple_at(0))
    }

    pub fn intermediate_start_tuple(&self) -> Option<Tuple<'a>> {
        let index = self.tuple_index();
        index
            .intermediate_region()
            .then(|| self.tuple_at(index.embedded_peak_tuple() as usize))
    }

    pub fn intermediate_end_tuple(&self) -> Option<Tuple<'a>> {
        let index = self.tuple_index();
        index
            .intermediate_region()
            .then(|| self.tuple_at(index.embedded_peak_tuple() as usize + 1))
    }

    fn resolve_peak(&self, shared_tuples: &SharedTuples<'a>) -> Result<Tuple<'a>, ReadError> {
        match self.tuple_index().tuple_records_index() {
            Some(idx) => shared_tuples.get(idx),
            None => Ok(self.tuple_at(0)),
        }
    }

    /// The tent of every axis with a non-zero peak, with its axis index.
    fn tents(&self, shared_tuples: &SharedTuples<'a>) -> Result<Vec<(usize, Tent)>, ReadError> {
        let peak = self.resolve_peak(shared_tuples)?;
        let intermediate = self
            .intermediate_start_tuple()
            .zip(self.intermediate_end_tuple());

        Ok(peak
            .iter()
            .enumerate()
            .map(|(idx, peak)| (idx, peak.to_f32()))
            .filter(|(_, peak)| *peak != 0.0)
            .map(|(idx, peak)| {
                let tent = match intermediate {
                    Some((start, end)) => Tent::new(
                        start.get(idx).unwrap_or_default().to_f32(),
                        peak,
                        end.get(idx).unwrap_or_default().to_f32(),
                    ),
                    None => Tent::implicit(peak),
                };
                (idx, tent)
            })
            .collect())
    }

    /// The tents of this header, keyed by axis tag.
    ///
    /// Axes with a zero peak do not constrain the tuple and are left out.
    pub fn region(
        &self,
        axes: &AxisIndexMap,
        shared_tuples: &SharedTuples<'a>,
    ) -> Result<Region, ReadError> {
        let region = self
            .tents(shared_tuples)?
            .into_iter()
            .map(|(idx, tent)| {
                axes.tag(idx)
                    .map(|tag| (tag, tent))
                    .ok_or(ReadError::MalformedData("tuple has more axes than the font"))
            })
            .collect::<Result<Region, _>>()?;
        if region.is_empty() {
            return Err(ReadError::MalformedData("tuple has no non-zero peak"));
        }
        Ok(region)
    }

    /// Compute the scalar for this tuple at normalized `coords`, given in
    /// axis order.
    pub fn calculate_scalar(
        &self,
        coords: &[F2Dot14],
        shared_tuples: &SharedTuples<'a>,
    ) -> Result<f32, ReadError> {
        let mut scalar = 1.0;
        for (idx, tent) in self.tents(shared_tuples)? {
            let coord = coords.get(idx).copied().unwrap_or_default().to_f32();
            let factor = tent.scalar_at(coord);
            if factor == 0.0 {
                return Ok(0.0);
            }
            scalar *= factor;
        }
        Ok(scalar)
    }
}

/// One tuple: its header and its serialized point and delta data.
#[derive(Clone, Copy, Debug)]
pub struct TupleVariation<'a> {
    pub header: TupleVariationHeader<'a>,
    pub data: FontData<'a>,
}

/// A parsed tuple variation store header.
#[derive(Clone, Debug)]
pub struct TupleVariationData<'a> {
    axis_count: u16,
    tuple_count: TupleVariationCount,
    header_data: FontData<'a>,
    shared_point_numbers: Option<PackedPointNumbers>,
    serialized_data: FontData<'a>,
}

impl<'a> TupleVariationData<'a> {
    /// Read the store at the start of `table`.
    ///
    /// For `cvar`, `table` is the whole table including its version; for
    /// `gvar` it is one glyph's variation data. The data offset in the store
    /// header is relative to the start of `table`.
    pub fn read(table: FontData<'a>, kind: TableKind, axis_count: u16) -> Result<Self, ReadError> {
        let mut cursor = Cursor::new(table);
        if kind == TableKind::Cvar {
            let major: u16 = cursor.read()?;
            let _minor: u16 = cursor.read()?;
            if major != 1 {
                return Err(ReadError::InvalidFormat(major as i64));
            }
        }
        let tuple_count: TupleVariationCount = cursor.read()?;
        let data_offset: u16 = cursor.read()?;
        let header_data = cursor.remaining();

        let mut serialized = Cursor::new(
            table
                .split_off(data_offset as usize)
                .ok_or(ReadError::OutOfBounds)?,
        );
        let shared_point_numbers = if tuple_count.shared_point_numbers() {
            Some(PackedPointNumbers::read(&mut serialized)?)
        } else {
            None
        };

        Ok(Self {
            axis_count,
            tuple_count,
            header_data,
            shared_point_numbers,
            serialized_data: serialized.remaining(),
        })
    }

    pub fn axis_count(&self) -> u16 {
        self.axis_count
    }

    pub fn tuple_count(&self) -> usize {
        self.tuple_count.count() as usize
    }

    pub fn shared_point_numbers(&self) -> Option<&PackedPointNumbers> {
        self.shared_point_numbers.as_ref()
    }

    pub fn iter(&self) -> TupleVariationIter<'a> {
        TupleVariationIter {
            headers: Cursor::new(self.header_data),
            serialized: Cursor::new(self.serialized_data),
            axis_count: self.axis_count,
            remaining: self.tuple_count(),
        }
    }
}

/// Walks the headers of a store alongside the serialized data of each tuple.
///
/// Stops after the first error.
#[derive(Clone, Debug)]
pub struct TupleVariationIter<'a> {
    headers: Cursor<'a>,
    serialized: Cursor<'a>,
    axis_count: u16,
    remaining: usize,
}

impl<'a> TupleVariationIter<'a> {
    fn next_variation(&mut self) -> Result<TupleVariation<'a>, ReadError> {
        let header = TupleVariationHeader::read(self.headers.remaining(), self.axis_count)?;
        self.headers.advance_by(header.byte_len())?;
        let data = self
            .serialized
            .read_data(header.variation_data_size() as usize)?;
        Ok(TupleVariation { header, data })
    }
}

impl<'a> Iterator for TupleVariationIter<'a> {
    type Item = Result<TupleVariation<'a>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let next = self.next_variation();
        self.remaining = if next.is_ok() { self.remaining - 1 } else { 0 };
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use font_types::Tag;

    const WGHT: Tag = Tag::new(b"wght");
    const WDTH: Tag = Tag::new(b"wdth");

    #[rustfmt::skip]
    static TWO_AXIS_HEADERS: &[u8] = &[
        // data size 4, embedded peak + intermediate + private points
        0x00, 0x04, 0xE0, 0x00,
        // peak (1.0, 0.0)
        0x40, 0x00, 0x00, 0x00,
        // start (0.5, 0.0), end (1.0, 0.0)
        0x20, 0x00, 0x00, 0x00,
        0x40, 0x00, 0x00, 0x00,
        // data size 2, shared tuple 1
        0x00, 0x02, 0x00, 0x01,
    ];

    #[rustfmt::skip]
    static SHARED: &[u8] = &[
        0x40, 0x00, 0x40, 0x00,
        0x00, 0x00, 0xC0, 0x00,
    ];

    #[test]
    fn header_fields() {
        let data = FontData::new(TWO_AXIS_HEADERS);
        let header = TupleVariationHeader::read(data, 2).unwrap();
        assert_eq!(header.byte_len(), 16);
        assert_eq!(header.variation_data_size(), 4);
        assert!(header.tuple_index().private_point_numbers());
        let peak = header.peak_tuple().unwrap();
        assert_eq!(peak.iter().collect::<Vec<_>>(), [F2Dot14::from_f32(1.0), F2Dot14::from_f32(0.0)]);
        assert_eq!(
            header.intermediate_start_tuple().unwrap().get(0),
            Some(F2Dot14::from_f32(0.5))
        );
        assert_eq!(header.intermediate_end_tuple().unwrap().get(1), Some(F2Dot14::from_f32(0.0)));
    }

    #[test]
    fn truncated_header() {
        let data = FontData::new(&TWO_AXIS_HEADERS[..10]);
        assert!(matches!(
            TupleVariationHeader::read(data, 2),
            Err(ReadError::OutOfBounds)
        ));
    }

    #[test]
    fn region_skips_zero_peaks() {
        let axes = AxisIndexMap::new([WGHT, WDTH]);
        let shared = SharedTuples::new(FontData::new(SHARED), 2);
        let header = TupleVariationHeader::read(FontData::new(TWO_AXIS_HEADERS), 2).unwrap();
        let region = header.region(&axes, &shared).unwrap();
        assert_eq!(region.len(), 1);
        assert_eq!(region.get(&WGHT), Some(&Tent::new(0.5, 1.0, 1.0)));

        let second = FontData::new(&TWO_AXIS_HEADERS[16..]);
        let header = TupleVariationHeader::read(second, 2).unwrap();
        assert_eq!(header.byte_len(), 4);
        let region = header.region(&axes, &shared).unwrap();
        assert_eq!(region.get(&WDTH), Some(&Tent::implicit(-1.0)));
        assert_eq!(region.get(&WGHT), None);
    }

    #[test]
    fn region_errors() {
        let axes = AxisIndexMap::new([WGHT, WDTH]);
        // shared tuple 1 does not exist
        let header = TupleVariationHeader::read(FontData::new(&TWO_AXIS_HEADERS[16..]), 2).unwrap();
        assert!(matches!(
            header.region(&axes, &SharedTuples::empty()),
            Err(ReadError::MalformedData(_))
        ));
        // all-zero peak
        let zeros = [0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00];
        let header = TupleVariationHeader::read(FontData::new(&zeros), 2).unwrap();
        assert!(matches!(
            header.region(&axes, &SharedTuples::empty()),
            Err(ReadError::MalformedData(_))
        ));
        // second axis has no tag
        let header = TupleVariationHeader::read(FontData::new(&TWO_AXIS_HEADERS[16..]), 2).unwrap();
        let shared = SharedTuples::new(FontData::new(SHARED), 2);
        assert!(matches!(
            header.region(&AxisIndexMap::new([WGHT]), &shared),
            Err(ReadError::MalformedData(_))
        ));
    }

    #[test]
    fn header_scalar() {
        let shared = SharedTuples::empty();
        let header = TupleVariationHeader::read(FontData::new(TWO_AXIS_HEADERS), 2).unwrap();
        let at = |wght: f32| {
            header
                .calculate_scalar(&[F2Dot14::from_f32(wght), F2Dot14::from_f32(0.0)], &shared)
                .unwrap()
        };
        assert_eq!(at(0.0), 0.0);
        assert_eq!(at(0.5), 0.0);
        assert_eq!(at(0.75), 0.5);
        assert_eq!(at(1.0), 1.0);
    }

    #[test]
    fn iterate_store() {
        #[rustfmt::skip]
        let table = [
            // 2 tuples, shared points, data at 16
            0x80, 0x02, 0x00, 0x10,
            0x00, 0x02, 0xA0, 0x00, 0x40, 0x00,
            0x00, 0x03, 0x80, 0x00, 0xC0, 0x00,
            // shared points: 1 point, #2
            0x01, 0x00, 0x02,
            // first tuple data
            0xAA, 0xBB,
            // second tuple data
            0x01, 0x02, 0x03,
        ];
        let store = TupleVariationData::read(FontData::new(&table), TableKind::Gvar, 1).unwrap();
        assert_eq!(store.tuple_count(), 2);
        assert_eq!(
            store.shared_point_numbers(),
            Some(&PackedPointNumbers::Some(vec![2]))
        );
        let tuples = store.iter().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].data.as_bytes(), &[0xAA, 0xBB]);
        assert!(tuples[0].header.tuple_index().private_point_numbers());
        assert_eq!(tuples[1].data.as_bytes(), &[0x01, 0x02, 0x03]);
        assert!(!tuples[1].header.tuple_index().private_point_numbers());
    }

    #[test]
    fn iterate_stops_on_short_data() {
        let table = [
            0x00, 0x01, 0x00, 0x0A, //
            0x00, 0x09, 0x80, 0x00, 0x40, 0x00, //
            0x01, 0x02,
        ];
        let store = TupleVariationData::read(FontData::new(&table), TableKind::Gvar, 1).unwrap();
        let mut iter = store.iter();
        assert!(matches!(iter.next(), Some(Err(ReadError::OutOfBounds))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn cvar_version_is_checked() {
        let table = [0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08];
        assert!(matches!(
            TupleVariationData::read(FontData::new(&table), TableKind::Cvar, 1),
            Err(ReadError::InvalidFormat(2))
        ));
    }
}
