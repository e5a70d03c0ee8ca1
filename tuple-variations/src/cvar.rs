//! Instancing the [cvar](https://learn.microsoft.com/en-us/typography/opentype/spec/cvar) table
use crate::axes::AxisIndexMap;
use crate::parsing_util::AxisLimits;
use crate::tuple_header::{SharedTuples, TableKind};
use crate::tuple_variations::instantiate_store;
use crate::Error;

/// The result of instancing a `cvar` table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstancedCvar {
    /// The new table, or `None` if nothing varies any more.
    pub table: Option<Vec<u8>>,
    /// Adjustments to add to each `cvt ` entry at the new default location.
    pub cvt_deltas: Vec<i16>,
}

impl InstancedCvar {
    /// Add the pinned deltas to the FWORD values of a `cvt ` table.
    ///
    /// Entries without a delta are copied unchanged; a trailing odd byte is
    /// dropped.
    pub fn apply_to_cvt(&self, cvt: &[u8]) -> Vec<u8> {
        let deltas = self.cvt_deltas.iter().copied().chain(std::iter::repeat(0));
        cvt.chunks_exact(2)
            .zip(deltas)
            .flat_map(|(raw, delta)| {
                let value = i16::from_be_bytes([raw[0], raw[1]]);
                value.wrapping_add(delta).to_be_bytes()
            })
            .collect()
    }
}

/// Instance a whole `cvar` table.
///
/// `axes` are the font's axes in `fvar` order and `cvt_count` the number of
/// entries in its `cvt ` table. Axes that `limits` pins are removed from the
/// new table, and the deltas that apply at the pinned location are returned
/// rounded to whole units.
pub fn instantiate_cvar(
    cvar: &[u8],
    axes: &AxisIndexMap,
    cvt_count: usize,
    limits: &AxisLimits,
) -> Result<InstancedCvar, Error> {
    log::trace!("Instancing cvar with {cvt_count} CVT entries");
    let (table, pinned) = instantiate_store(
        cvar,
        TableKind::Cvar,
        axes,
        &SharedTuples::empty(),
        cvt_count,
        limits,
    )?;
    if table.is_none() {
        log::trace!("Dropping cvar table after full instantiation");
    }
    let cvt_deltas = pinned
        .x()
        .iter()
        .map(|delta| delta.round() as i16)
        .collect();
    Ok(InstancedCvar { table, cvt_deltas })
}
