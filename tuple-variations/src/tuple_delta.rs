//! A single tuple: a region of the design space and the deltas that apply
//! there.

use font_types::{F2Dot14, Tag};

use crate::axes::AxisIndexMap;
use crate::packed::{PackedDeltas, PackedPointNumbers};
use crate::serialize::{SerializeErrorFlags, Serializer};
use crate::solver::rebase_tent;
use crate::tent::{AxisDistances, AxisLimit, Region, Tent};
use crate::tuple_header::TupleIndex;

/// A decoded tuple with dense, per-slot deltas.
///
/// `indices[i]` says whether slot `i` (a point or CVT entry) has a delta in
/// this tuple. The delta vectors always have the same length as `indices`,
/// and unselected slots hold zero.
///
/// Tuples with the same `point_set_id` are known to have identical
/// `indices`, which lets compilation share their encoded point numbers.
#[derive(Clone, Debug, PartialEq)]
pub struct TupleDelta {
    region: Region,
    indices: Vec<bool>,
    deltas_x: Vec<f32>,
    deltas_y: Option<Vec<f32>>,
    point_set_id: u32,
}

impl TupleDelta {
    pub fn new(
        region: Region,
        indices: Vec<bool>,
        deltas_x: Vec<f32>,
        deltas_y: Option<Vec<f32>>,
        point_set_id: u32,
    ) -> Self {
        debug_assert_eq!(indices.len(), deltas_x.len());
        if let Some(deltas_y) = &deltas_y {
            debug_assert_eq!(indices.len(), deltas_y.len());
        }
        Self {
            region,
            indices,
            deltas_x,
            deltas_y,
            point_set_id,
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn indices(&self) -> &[bool] {
        &self.indices
    }

    pub fn deltas_x(&self) -> &[f32] {
        &self.deltas_x
    }

    pub fn deltas_y(&self) -> Option<&[f32]> {
        self.deltas_y.as_deref()
    }

    pub fn point_set_id(&self) -> u32 {
        self.point_set_id
    }

    pub(crate) fn set_point_set_id(&mut self, id: u32) {
        self.point_set_id = id;
    }

    /// `true` if at least one slot has a delta.
    pub fn has_selected(&self) -> bool {
        self.indices.iter().any(|selected| *selected)
    }

    /// Fold `other` into this tuple.
    ///
    /// Slots selected in both are summed. A slot selected only in `other`
    /// takes `other`'s delta and becomes selected here. Returns `true` if the
    /// selection changed.
    pub fn combine(&mut self, other: &TupleDelta) -> bool {
        debug_assert_eq!(self.indices.len(), other.indices.len());
        let mut selection_changed = false;
        let len = self.indices.len().min(other.indices.len());
        for i in (0..len).filter(|i| other.indices[*i]) {
            let adopt = !self.indices[i];
            if adopt {
                self.indices[i] = true;
                self.deltas_x[i] = other.deltas_x[i];
                selection_changed = true;
            } else {
                self.deltas_x[i] += other.deltas_x[i];
            }
            if let (Some(ys), Some(other_ys)) = (self.deltas_y.as_mut(), other.deltas_y.as_ref()) {
                if adopt {
                    ys[i] = other_ys[i];
                } else {
                    ys[i] += other_ys[i];
                }
            }
        }
        selection_changed
    }

    /// Multiply every selected delta by `factor`.
    pub fn scale(&mut self, factor: f32) {
        if factor == 1.0 {
            return;
        }
        let scale_all = |deltas: &mut [f32], indices: &[bool]| {
            for (delta, _) in deltas.iter_mut().zip(indices).filter(|(_, sel)| **sel) {
                *delta *= factor;
            }
        };
        scale_all(&mut self.deltas_x, &self.indices);
        if let Some(deltas_y) = self.deltas_y.as_mut() {
            scale_all(deltas_y, &self.indices);
        }
    }

    /// Re-express this tuple for `axis_tag` restricted to `limit`.
    ///
    /// Returns the tuples that together reproduce this one inside the new
    /// limit; this is empty if the tuple has no effect there. A tuple that
    /// does not vary along the axis is returned unchanged. A degenerate tent
    /// always has a scalar of 1, so it is kept as is for a clipped axis and
    /// dropped from the region when the axis is pinned.
    pub fn change_axis_limit(
        self,
        axis_tag: Tag,
        limit: AxisLimit,
        distances: AxisDistances,
    ) -> Vec<TupleDelta> {
        let Some(tent) = self.region.get(&axis_tag).copied() else {
            return vec![self];
        };
        if tent.is_degenerate() || tent.peak == 0.0 {
            let mut tuple = self;
            if limit.is_pinned() {
                tuple.region.remove(&axis_tag);
            }
            return vec![tuple];
        }

        let rebased = rebase_tent(tent, limit, distances);
        log::trace!(
            "{axis_tag} tent {tent:?} rebased to {} tent(s) for {limit:?}",
            rebased.len()
        );
        rebased
            .into_iter()
            .map(|(scalar, new_tent)| {
                let mut tuple = self.clone();
                if new_tent == Tent::default() {
                    tuple.region.remove(&axis_tag);
                } else {
                    tuple.region.insert(axis_tag, new_tent);
                }
                tuple.scale(scalar);
                tuple
            })
            .collect()
    }

    /// The scalar for this tuple at `coords`, given in the order of `axes`.
    pub fn calculate_scalar(&self, axes: &AxisIndexMap, coords: &[f32]) -> f32 {
        self.region.calculate_scalar(axes, coords)
    }

    /// Encode this tuple's point numbers.
    pub fn compile_points(&self) -> Result<Vec<u8>, SerializeErrorFlags> {
        let mut s = Serializer::new(usize::MAX);
        PackedPointNumbers::from_selection(&self.indices)?.write_into(&mut s)?;
        s.copy_bytes()
    }

    /// Round and encode the selected deltas, x then y.
    pub fn compile_deltas(&self) -> Result<Vec<u8>, SerializeErrorFlags> {
        let round_selected = |deltas: &[f32]| {
            PackedDeltas::new(
                deltas
                    .iter()
                    .zip(&self.indices)
                    .filter(|(_, selected)| **selected)
                    .map(|(delta, _)| delta.round() as i16)
                    .collect(),
            )
        };

        let mut s = Serializer::new(usize::MAX);
        round_selected(&self.deltas_x).write_into(&mut s)?;
        if let Some(deltas_y) = &self.deltas_y {
            round_selected(deltas_y).write_into(&mut s)?;
        }
        s.copy_bytes()
    }

    /// Encode the header for this tuple.
    ///
    /// The peak is written for every axis in `axes`, in order, and the
    /// intermediate region only when some tent is not implied by its peak.
    /// `data_size` is the length of the tuple's point and delta data.
    pub fn compile_header(
        &self,
        axes: &AxisIndexMap,
        data_size: usize,
    ) -> Result<Vec<u8>, SerializeErrorFlags> {
        let data_size = u16::try_from(data_size)
            .map_err(|_| SerializeErrorFlags::SERIALIZE_ERROR_INT_OVERFLOW)?;
        if self.region.iter().any(|(tag, _)| axes.index(*tag).is_none()) {
            return Err(SerializeErrorFlags::SERIALIZE_ERROR_OTHER);
        }

        let tents = axes
            .tags()
            .map(|tag| self.region.get(tag).copied().unwrap_or_default())
            .collect::<Vec<_>>();
        let has_intermediate = tents.iter().any(|tent| !tent.is_implicit());

        let mut flags = TupleIndex::EMBEDDED_PEAK_TUPLE | TupleIndex::PRIVATE_POINT_NUMBERS;
        if has_intermediate {
            flags |= TupleIndex::INTERMEDIATE_REGION;
        }

        let mut s = Serializer::new(usize::MAX);
        s.embed(data_size)?;
        s.embed(TupleIndex::from_bits(flags))?;
        for tent in &tents {
            s.embed(F2Dot14::from_f32(tent.peak))?;
        }
        if has_intermediate {
            for tent in &tents {
                s.embed(F2Dot14::from_f32(tent.start))?;
            }
            for tent in &tents {
                s.embed(F2Dot14::from_f32(tent.end))?;
            }
        }
        s.copy_bytes()
    }
}
