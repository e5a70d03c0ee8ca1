//! Decoding, instancing and re-encoding a whole set of tuples.

use fnv::FnvHashMap;
use font_types::Tag;
use read_fonts::{FontData, ReadError};

use crate::axes::AxisIndexMap;
use crate::cursor::Cursor;
use crate::packed::{PackedDeltas, PackedPointNumbers};
use crate::parsing_util::AxisLimits;
use crate::serialize::{SerializeErrorFlags, Serializer};
use crate::tent::{AxisDistances, AxisLimit, Region};
use crate::tuple_delta::TupleDelta;
use crate::tuple_header::{
    SharedTuples, TableKind, TupleVariation, TupleVariationCount, TupleVariationData,
};
use crate::Error;

static ALL_POINTS: PackedPointNumbers = PackedPointNumbers::All;

// gvar glyph data offsets are 32 bits at most
const MAX_STORE_SIZE: usize = u32::MAX as usize;

/// The decoded tuples of one `cvar` table or one glyph's `gvar` data.
#[derive(Clone, Debug)]
pub struct TupleVariations {
    kind: TableKind,
    point_count: usize,
    tuple_vars: Vec<TupleDelta>,
    next_point_set_id: u32,
}

/// Deltas that apply at the default location of the instanced font.
///
/// These come from tuples whose region became empty while instancing, and
/// must be folded into the default outline or CVT values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PinnedDeltas {
    x: Vec<f32>,
    y: Option<Vec<f32>>,
}

impl PinnedDeltas {
    fn new(point_count: usize, has_y: bool) -> Self {
        Self {
            x: vec![0.0; point_count],
            y: has_y.then(|| vec![0.0; point_count]),
        }
    }

    fn add(&mut self, tuple: &TupleDelta) {
        let add_selected = |out: &mut [f32], deltas: &[f32]| {
            for ((out, delta), _) in out
                .iter_mut()
                .zip(deltas)
                .zip(tuple.indices())
                .filter(|(_, selected)| **selected)
            {
                *out += delta;
            }
        };
        add_selected(&mut self.x, tuple.deltas_x());
        if let (Some(out), Some(deltas)) = (self.y.as_mut(), tuple.deltas_y()) {
            add_selected(out, deltas);
        }
    }

    pub fn x(&self) -> &[f32] {
        &self.x
    }

    pub fn y(&self) -> Option<&[f32]> {
        self.y.as_deref()
    }

    /// `true` if nothing moves at the default location.
    pub fn is_zero(&self) -> bool {
        self.x
            .iter()
            .chain(self.y.iter().flatten())
            .all(|delta| *delta == 0.0)
    }

    /// The x deltas rounded to whole font units.
    pub fn rounded_x(&self) -> Vec<i32> {
        self.x.iter().map(|delta| delta.round() as i32).collect()
    }

    /// The y deltas rounded to whole font units.
    pub fn rounded_y(&self) -> Option<Vec<i32>> {
        self.y
            .as_ref()
            .map(|y| y.iter().map(|delta| delta.round() as i32).collect())
    }
}

impl TupleVariations {
    pub fn new(kind: TableKind, point_count: usize) -> Self {
        Self {
            kind,
            point_count,
            tuple_vars: Vec::new(),
            next_point_set_id: 0,
        }
    }

    fn next_point_set_id(&mut self) -> u32 {
        let id = self.next_point_set_id;
        self.next_point_set_id += 1;
        id
    }

    /// Decode every tuple of a store into dense per-slot deltas.
    ///
    /// `point_count` is the number of CVT entries or outline points
    /// (including phantom points); point numbers at or past it are ignored.
    pub fn decompile(
        data: &TupleVariationData,
        kind: TableKind,
        point_count: usize,
        axes: &AxisIndexMap,
        shared_tuples: &SharedTuples,
    ) -> Result<Self, ReadError> {
        let mut this = Self::new(kind, point_count);
        let shared_points_id = this.next_point_set_id();
        let shared_points = data.shared_point_numbers().unwrap_or(&ALL_POINTS);
        let mut ignored_points = 0;

        for (i, variation) in data.iter().enumerate() {
            let TupleVariation { header, data } = variation?;
            let region = header.region(axes, shared_tuples)?;
            let mut cursor = Cursor::new(data);

            let private_points;
            let (points, point_set_id) = if header.tuple_index().private_point_numbers() {
                private_points = PackedPointNumbers::read(&mut cursor)?;
                (&private_points, this.next_point_set_id())
            } else {
                (shared_points, shared_points_id)
            };

            let count = points.count(point_count);
            let x = PackedDeltas::read(&mut cursor, count)?;
            let y = kind
                .has_y_deltas()
                .then(|| PackedDeltas::read(&mut cursor, count))
                .transpose()?;

            let mut indices = vec![false; point_count];
            let mut deltas_x = vec![0.0; point_count];
            let mut deltas_y = y.as_ref().map(|_| vec![0.0; point_count]);
            for (j, point) in points.iter(point_count).enumerate() {
                if point >= point_count {
                    ignored_points += 1;
                    continue;
                }
                indices[point] = true;
                deltas_x[point] = x.deltas()[j] as f32;
                if let (Some(out), Some(y)) = (deltas_y.as_mut(), y.as_ref()) {
                    out[point] = y.deltas()[j] as f32;
                }
            }

            log::trace!("tuple {i}: {} axes, {count} deltas", region.len());
            this.tuple_vars.push(TupleDelta::new(
                region,
                indices,
                deltas_x,
                deltas_y,
                point_set_id,
            ));
        }

        if ignored_points > 0 {
            log::warn!(
                "Ignored {ignored_points} point numbers past the point count of {point_count}"
            );
        }
        Ok(this)
    }

    /// Add a tuple with a fresh point set.
    ///
    /// The selection and deltas are truncated, or padded with unselected
    /// slots, to the point count of the set.
    pub fn push(
        &mut self,
        region: Region,
        mut indices: Vec<bool>,
        mut deltas_x: Vec<f32>,
        mut deltas_y: Option<Vec<f32>>,
    ) {
        indices.resize(self.point_count, false);
        deltas_x.resize(self.point_count, 0.0);
        if let Some(deltas_y) = deltas_y.as_mut() {
            deltas_y.resize(self.point_count, 0.0);
        }
        let id = self.next_point_set_id();
        self.tuple_vars
            .push(TupleDelta::new(region, indices, deltas_x, deltas_y, id));
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn len(&self) -> usize {
        self.tuple_vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuple_vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TupleDelta> {
        self.tuple_vars.iter()
    }

    /// Restrict every tuple to `limits`, then merge tuples that now share a
    /// region.
    ///
    /// Returns the deltas of tuples that ended up applying everywhere, which
    /// belong in the new default.
    pub fn instantiate(&mut self, limits: &AxisLimits) -> PinnedDeltas {
        let before = self.tuple_vars.len();
        for (tag, limit, distances) in limits.iter() {
            self.change_axis_limit(tag, limit, distances);
        }
        let pinned = self.merge_tuple_variations();
        log::debug!(
            "Instanced {before} tuples into {} over {} axis limits",
            self.tuple_vars.len(),
            limits.len()
        );
        pinned
    }

    /// Apply a single axis limit to every tuple.
    pub fn change_axis_limit(&mut self, tag: Tag, limit: AxisLimit, distances: AxisDistances) {
        let tuple_vars = std::mem::take(&mut self.tuple_vars);
        self.tuple_vars = tuple_vars
            .into_iter()
            .flat_map(|tuple| tuple.change_axis_limit(tag, limit, distances))
            .collect();
    }

    /// Fold tuples with equal regions together, in order of first
    /// appearance. Tuples with an empty region are removed and summed into
    /// the returned deltas.
    pub fn merge_tuple_variations(&mut self) -> PinnedDeltas {
        let mut pinned = PinnedDeltas::new(self.point_count, self.kind.has_y_deltas());
        let mut pinned_count = 0;
        let mut merged: Vec<TupleDelta> = Vec::with_capacity(self.tuple_vars.len());
        let mut by_region: FnvHashMap<Region, usize> = FnvHashMap::default();

        for tuple in std::mem::take(&mut self.tuple_vars) {
            if tuple.region().is_empty() {
                pinned.add(&tuple);
                pinned_count += 1;
                continue;
            }
            match by_region.get(tuple.region()) {
                Some(&idx) => {
                    if merged[idx].combine(&tuple) {
                        let id = self.next_point_set_id();
                        merged[idx].set_point_set_id(id);
                    }
                }
                None => {
                    by_region.insert(tuple.region().clone(), merged.len());
                    merged.push(tuple);
                }
            }
        }

        if pinned_count > 0 {
            log::debug!("{pinned_count} tuples apply at the default location");
        }
        self.tuple_vars = merged;
        pinned
    }

    /// Encode every tuple against the axes in `axes`.
    ///
    /// Tuples without any selected slot are dropped, since an empty point
    /// list would encode as "all points".
    pub fn compile(
        &self,
        axes: &AxisIndexMap,
    ) -> Result<CompiledTupleVariations, SerializeErrorFlags> {
        let mut point_data: FnvHashMap<u32, Vec<u8>> = FnvHashMap::default();
        let mut point_set_refs: FnvHashMap<u32, usize> = FnvHashMap::default();
        let mut tuples = Vec::with_capacity(self.tuple_vars.len());

        for tuple in self.tuple_vars.iter().filter(|tuple| tuple.has_selected()) {
            let id = tuple.point_set_id();
            *point_set_refs.entry(id).or_default() += 1;
            if !point_data.contains_key(&id) {
                point_data.insert(id, tuple.compile_points()?);
            }

            let points_len = point_data.get(&id).map(Vec::len).unwrap_or_default();
            let deltas = tuple.compile_deltas()?;
            let header = tuple.compile_header(axes, points_len + deltas.len())?;
            log::trace!(
                "compiled tuple: {} header, {points_len} point, {} delta bytes",
                header.len(),
                deltas.len()
            );
            tuples.push(CompiledTuple {
                header,
                point_set_id: id,
                deltas,
            });
        }

        let dropped = self.tuple_vars.len() - tuples.len();
        if dropped > 0 {
            log::debug!("Dropped {dropped} tuples without deltas");
        }

        let compiled = CompiledTupleVariations {
            kind: self.kind,
            tuples,
            point_data,
            point_set_refs,
        };
        if let Some((_, saved)) = compiled.find_shared_points() {
            log::debug!("Sharing point numbers would save {saved} bytes");
        }
        Ok(compiled)
    }
}

#[derive(Clone, Debug)]
struct CompiledTuple {
    header: Vec<u8>,
    point_set_id: u32,
    deltas: Vec<u8>,
}

/// Encoded tuples, ready to be written as a tuple variation store.
#[derive(Clone, Debug)]
pub struct CompiledTupleVariations {
    kind: TableKind,
    tuples: Vec<CompiledTuple>,
    point_data: FnvHashMap<u32, Vec<u8>>,
    point_set_refs: FnvHashMap<u32, usize>,
}

impl CompiledTupleVariations {
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// The encoded point set that would save the most bytes if it were
    /// stored once as the shared point numbers, and how many bytes it saves.
    pub fn find_shared_points(&self) -> Option<(&[u8], usize)> {
        self.point_set_refs
            .iter()
            .filter_map(|(id, refs)| {
                let data = self.point_data.get(id)?;
                Some((data.as_slice(), data.len() * (refs - 1)))
            })
            .filter(|(_, saved)| *saved > 0)
            // ties go to the lexicographically smaller encoding
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
    }

    /// Write the store header, the tuple headers, and the serialized data.
    pub fn serialize(&self, s: &mut Serializer) -> Result<(), SerializeErrorFlags> {
        let count = self.tuples.len();
        if count > TupleVariationCount::COUNT_MASK as usize {
            return Err(s.set_err(SerializeErrorFlags::SERIALIZE_ERROR_INT_OVERFLOW));
        }
        s.embed(TupleVariationCount::from_bits(count as u16))?;

        let headers_len: usize = self.tuples.iter().map(|tuple| tuple.header.len()).sum();
        let data_offset = self.kind.store_header_offset() + 4 + headers_len;
        let offset_pos = s.embed(0_u16)?;
        s.check_assign_u16(
            offset_pos,
            data_offset,
            SerializeErrorFlags::SERIALIZE_ERROR_OFFSET_OVERFLOW,
        )?;

        for tuple in &self.tuples {
            s.embed_bytes(&tuple.header)?;
        }
        for tuple in &self.tuples {
            let Some(points) = self.point_data.get(&tuple.point_set_id) else {
                return Err(s.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OTHER));
            };
            s.embed_bytes(points)?;
            s.embed_bytes(&tuple.deltas)?;
        }
        Ok(())
    }
}

/// Decode, instance and re-encode one store.
///
/// Returns the new store, or `None` if no tuple survived, along with the
/// deltas that now apply at the default location.
pub(crate) fn instantiate_store(
    table: &[u8],
    kind: TableKind,
    axes: &AxisIndexMap,
    shared_tuples: &SharedTuples,
    point_count: usize,
    limits: &AxisLimits,
) -> Result<(Option<Vec<u8>>, PinnedDeltas), Error> {
    let axis_count =
        u16::try_from(axes.len()).map_err(|_| ReadError::MalformedData("too many axes"))?;
    let data = TupleVariationData::read(FontData::new(table), kind, axis_count)?;
    let mut variations =
        TupleVariations::decompile(&data, kind, point_count, axes, shared_tuples)?;
    let pinned = variations.instantiate(limits);

    let retained = axes.retain_axes(|tag| limits.is_pinned(tag));
    let compiled = variations.compile(&retained)?;
    if compiled.is_empty() {
        return Ok((None, pinned));
    }

    let mut s = Serializer::new(MAX_STORE_SIZE);
    if kind == TableKind::Cvar {
        s.embed(1_u16)?;
        s.embed(0_u16)?;
    }
    compiled.serialize(&mut s)?;
    Ok((Some(s.copy_bytes()?), pinned))
}
