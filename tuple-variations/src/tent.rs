//! Per-axis regions of influence and the scalars derived from them.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use font_types::{F2Dot14, Tag};

use crate::axes::AxisIndexMap;

/// The region of one axis over which a tuple's deltas apply.
///
/// The deltas apply in full at `peak` and fade out linearly towards `start`
/// and `end`. Comparisons are made on the F2Dot14 values the tent would be
/// stored as, so tents that serialize identically compare equal.
#[derive(Default, Clone, Copy, Debug)]
pub struct Tent {
    pub start: f32,
    pub peak: f32,
    pub end: f32,
}

impl Tent {
    pub fn new(start: f32, peak: f32, end: f32) -> Self {
        Self { start, peak, end }
    }

    /// The tent implied by a peak with no explicit intermediate region.
    pub fn implicit(peak: f32) -> Self {
        Self::new(peak.min(0.0), peak, peak.max(0.0))
    }

    /// Whether this tent can be stored without an intermediate region.
    pub fn is_implicit(&self) -> bool {
        *self == Self::implicit(self.peak)
    }

    /// A tent whose region is inverted, or that straddles zero.
    ///
    /// Such tents do not restrict the scalar at all.
    pub fn is_degenerate(&self) -> bool {
        self.start > self.peak
            || self.peak > self.end
            || (self.start < 0.0 && self.end > 0.0 && self.peak != 0.0)
    }

    pub(crate) fn reverse_negate(&self) -> Self {
        Self::new(-self.end, -self.peak, -self.start)
    }

    /// The contribution of this axis to a tuple's scalar at `coord`.
    pub fn scalar_at(&self, coord: f32) -> f32 {
        let Tent { start, peak, end } = *self;
        if peak == 0.0 || coord == peak || self.is_degenerate() {
            return 1.0;
        }
        if coord < start || coord > end {
            return 0.0;
        }

        if coord < peak {
            if peak != start {
                return (coord - start) / (peak - start);
            }
        } else if peak != end {
            return (end - coord) / (end - peak);
        }
        1.0
    }

    fn quantized(&self) -> [F2Dot14; 3] {
        [
            F2Dot14::from_f32(self.start),
            F2Dot14::from_f32(self.peak),
            F2Dot14::from_f32(self.end),
        ]
    }
}

impl PartialEq for Tent {
    fn eq(&self, other: &Self) -> bool {
        self.quantized() == other.quantized()
    }
}

impl Eq for Tent {}

impl Hash for Tent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in self.quantized() {
            value.to_bits().hash(state);
        }
    }
}

/// The restricted range of an axis, in normalized coordinates.
///
/// Pinning an axis is expressed as a limit whose three values are equal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisLimit {
    pub minimum: f32,
    pub default: f32,
    pub maximum: f32,
}

impl AxisLimit {
    pub fn new(minimum: f32, default: f32, maximum: f32) -> Self {
        Self {
            minimum,
            default,
            maximum,
        }
    }

    pub fn pinned(value: f32) -> Self {
        Self::new(value, value, value)
    }

    pub fn is_pinned(&self) -> bool {
        self.minimum == self.default && self.default == self.maximum
    }

    /// Check that `-1 <= minimum <= default <= maximum <= 1`.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.minimum.is_finite() && self.default.is_finite() && self.maximum.is_finite()) {
            return Err("limits must be finite numbers");
        }
        if self.minimum < -1.0 || self.maximum > 1.0 {
            return Err("limits must be within [-1, 1]");
        }
        if self.minimum > self.default || self.default > self.maximum {
            return Err("expected minimum <= default <= maximum");
        }
        Ok(())
    }

    pub(crate) fn reverse_negate(&self) -> Self {
        Self::new(-self.maximum, -self.default, -self.minimum)
    }
}

/// Distances from an axis default to its minimum and maximum, in user units.
///
/// Used to renormalize rebased tents when the new default is not zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisDistances {
    pub negative: f32,
    pub positive: f32,
}

impl AxisDistances {
    pub fn new(negative: f32, positive: f32) -> Self {
        Self { negative, positive }
    }

    pub(crate) fn swapped(&self) -> Self {
        Self::new(self.positive, self.negative)
    }
}

impl Default for AxisDistances {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// The tents of a tuple, keyed by axis tag.
///
/// Entries are kept sorted by tag, so two regions with the same tents hash
/// the same regardless of the order they were built in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Region(BTreeMap<Tag, Tent>);

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: Tag, tent: Tent) -> Option<Tent> {
        self.0.insert(tag, tent)
    }

    pub fn get(&self, tag: &Tag) -> Option<&Tent> {
        self.0.get(tag)
    }

    pub fn remove(&mut self, tag: &Tag) -> Option<Tent> {
        self.0.remove(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &Tent)> {
        self.0.iter()
    }

    /// Compute the scalar for this region at a location.
    ///
    /// `coords` are normalized coordinates in the order of `axes`; axes
    /// without a coordinate are at their default.
    pub fn calculate_scalar(&self, axes: &AxisIndexMap, coords: &[f32]) -> f32 {
        let mut scalar = 1.0;
        for (tag, tent) in self.iter() {
            let coord = axes
                .index(*tag)
                .and_then(|idx| coords.get(idx))
                .copied()
                .unwrap_or_default();
            let factor = tent.scalar_at(coord);
            if factor == 0.0 {
                return 0.0;
            }
            scalar *= factor;
        }
        scalar
    }
}

impl FromIterator<(Tag, Tent)> for Region {
    fn from_iter<T: IntoIterator<Item = (Tag, Tent)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
