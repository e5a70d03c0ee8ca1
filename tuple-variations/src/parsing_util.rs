//! instancer input parsing util functions
use std::collections::BTreeMap;

use font_types::Tag;

use crate::axes::AxisIndexMap;
use crate::tent::{AxisDistances, AxisLimit};
use crate::Error;

/// Axis settings as written by the user, before they are resolved against
/// the axes of a font.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InstancingSpec {
    pub pin_all_axes_to_default: bool,
    pub axes: BTreeMap<Tag, AxisSpec>,
}

/// The setting for one axis. Missing range values are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisSpec {
    PinToDefault,
    Range { min: f32, def: f32, max: f32 },
}

impl InstancingSpec {
    /// Resolve this spec against the axes of a font.
    ///
    /// Limits are produced in axis order. Axes the font does not have are
    /// ignored; axes the spec does not mention are left alone unless `*=drop`
    /// was given.
    pub fn to_axis_limits(&self, axes: &AxisIndexMap) -> Result<AxisLimits, Error> {
        for tag in self.axes.keys().filter(|tag| axes.index(**tag).is_none()) {
            log::warn!("Ignoring limits for axis '{tag}' which is not in the font");
        }

        let mut limits = AxisLimits::new();
        for tag in axes.tags().copied() {
            let limit = match self.axes.get(&tag) {
                Some(AxisSpec::PinToDefault) => AxisLimit::pinned(0.0),
                Some(AxisSpec::Range { min, def, max }) => resolve_range(*min, *def, *max),
                None if self.pin_all_axes_to_default => AxisLimit::pinned(0.0),
                None => continue,
            };
            limits.push(tag, limit)?;
        }
        Ok(limits)
    }
}

// fill in missing values from the current normalized range of [-1, 0, 1]
fn resolve_range(min: f32, def: f32, max: f32) -> AxisLimit {
    let min = if min.is_nan() { -1.0 } else { min };
    let max = if max.is_nan() { 1.0 } else { max };
    let def = if def.is_nan() {
        0.0_f32.max(min).min(max)
    } else {
        def
    };
    AxisLimit::new(min, def, max)
}

/// Validated axis limits, applied in the order they were added.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AxisLimits {
    limits: Vec<(Tag, AxisLimit, AxisDistances)>,
}

impl AxisLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limit for `tag`, replacing any earlier one.
    pub fn push(&mut self, tag: Tag, limit: AxisLimit) -> Result<(), Error> {
        limit
            .validate()
            .map_err(|reason| Error::InvalidAxisLimit { tag, reason })?;
        match self.limits.iter_mut().find(|(t, ..)| *t == tag) {
            Some(entry) => entry.1 = limit,
            None => self.limits.push((tag, limit, AxisDistances::default())),
        }
        Ok(())
    }

    /// Attach the user-space distances for `tag`, used to renormalize tents
    /// when its default moves.
    pub fn with_distances(mut self, tag: Tag, distances: AxisDistances) -> Self {
        if let Some(entry) = self.limits.iter_mut().find(|(t, ..)| *t == tag) {
            entry.2 = distances;
        }
        self
    }

    pub fn get(&self, tag: Tag) -> Option<AxisLimit> {
        self.limits
            .iter()
            .find(|(t, ..)| *t == tag)
            .map(|(_, limit, _)| *limit)
    }

    /// `true` if `tag` is pinned to a single value.
    pub fn is_pinned(&self, tag: Tag) -> bool {
        self.get(tag).is_some_and(|limit| limit.is_pinned())
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tag, AxisLimit, AxisDistances)> + '_ {
        self.limits.iter().copied()
    }
}

/// Parse a HarfBuzz-style instancing spec string, returning the parsed axis settings.
///
/// Values are normalized coordinates: `wght=0.5` pins, `wdth=-1:0:0.5` sets
/// a range with a default, `wght=:0.2` keeps the current minimum, and
/// `opsz=drop` or `*=drop` pins to the default.
pub fn parse_instancing_spec(input_str: &str) -> Result<InstancingSpec, Error> {
    let mut spec = InstancingSpec::default();
    if input_str.trim().is_empty() {
        return Ok(spec);
    }

    for part in input_str
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|raw| !raw.is_empty())
    {
        let (raw_axis, raw_value) = part
            .split_once('=')
            .ok_or_else(|| Error::InvalidInstancingSpec(part.to_owned()))?;

        if raw_axis == "*" {
            if raw_value != "drop" {
                return Err(Error::InvalidInstancingSpec(part.to_owned()));
            }
            spec.pin_all_axes_to_default = true;
            continue;
        }

        let axis_tag = parse_axis_tag(raw_axis)?;
        if raw_value == "drop" {
            spec.axes.insert(axis_tag, AxisSpec::PinToDefault);
            continue;
        }

        let (min, def, max) = parse_axis_range(raw_value)?;
        spec.axes.insert(axis_tag, AxisSpec::Range { min, def, max });
    }

    Ok(spec)
}

/// Parse an axis tag, padding short tags with spaces.
pub fn parse_axis_tag(raw: &str) -> Result<Tag, Error> {
    let bytes = raw.as_bytes();
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(Error::InvalidTag(raw.to_owned()));
    }

    let mut padded = [b' '; 4];
    padded[..bytes.len()].copy_from_slice(bytes);
    Tag::new_checked(&padded).map_err(|_| Error::InvalidTag(raw.to_owned()))
}

/// Parse a comma or whitespace separated list of axis tags.
pub fn parse_axis_tags(input_str: &str) -> Result<Vec<Tag>, Error> {
    input_str
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|raw| !raw.is_empty())
        .map(parse_axis_tag)
        .collect()
}

fn parse_axis_range(raw: &str) -> Result<(f32, f32, f32), Error> {
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [value] => {
            let value = parse_axis_value(value)?;
            Ok((value, value, value))
        }
        [min, max] => Ok((
            parse_axis_value_or_nan(min)?,
            f32::NAN,
            parse_axis_value_or_nan(max)?,
        )),
        [min, def, max] => Ok((
            parse_axis_value_or_nan(min)?,
            parse_axis_value_or_nan(def)?,
            parse_axis_value_or_nan(max)?,
        )),
        _ => Err(Error::InvalidInstancingSpec(raw.to_owned())),
    }
}

fn parse_axis_value(raw: &str) -> Result<f32, Error> {
    raw.parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| Error::InvalidInstancingSpec(raw.to_owned()))
}

fn parse_axis_value_or_nan(raw: &str) -> Result<f32, Error> {
    if raw.is_empty() {
        return Ok(f32::NAN);
    }

    parse_axis_value(raw)
}
