//! Run-length encodings of point numbers and deltas.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/otvarcommonformats#packed-point-numbers>
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/otvarcommonformats#packed-deltas>

use read_fonts::ReadError;

use crate::cursor::Cursor;
use crate::serialize::{SerializeErrorFlags, Serializer};

/// Flag indicating that a point run (or the point count) uses 16-bit values.
const POINTS_ARE_WORDS: u8 = 0x80;
/// Mask for the run count in a point run control byte.
const POINT_RUN_COUNT_MASK: u8 = 0x7F;
const MAX_POINTS_PER_RUN: usize = 128;
/// The largest point count that fits in the 15-bit count field.
const MAX_POINT_COUNT: usize = 0x7FFF;

/// Flag indicating that this run contains no data,
/// and that the deltas for this run are all zero.
const DELTAS_ARE_ZERO: u8 = 0x80;
/// Flag indicating the data type for delta values in the run.
const DELTAS_ARE_WORDS: u8 = 0x40;
/// Mask for the low 6 bits to provide the number of delta values in the run, minus one.
const DELTA_RUN_COUNT_MASK: u8 = 0x3F;
const MAX_DELTAS_PER_RUN: usize = 64;

/// A set of point numbers, as stored before a tuple's deltas.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub enum PackedPointNumbers {
    /// Contains deltas for all point numbers
    #[default]
    All,
    /// Contains deltas only for these specific point numbers, in ascending order
    Some(Vec<u16>),
}

impl PackedPointNumbers {
    /// Decode a point number list, leaving the cursor just past it.
    pub fn read(cursor: &mut Cursor) -> Result<Self, ReadError> {
        let count = read_point_count(cursor)?;
        if count == 0 {
            return Ok(PackedPointNumbers::All);
        }

        let mut points = Vec::with_capacity(count);
        let mut current = 0u16;
        while points.len() < count {
            let control: u8 = cursor.read()?;
            let are_words = control & POINTS_ARE_WORDS != 0;
            let run_count = (control & POINT_RUN_COUNT_MASK) as usize + 1;
            if points.len() + run_count > count {
                return Err(ReadError::MalformedData("point run overruns point count"));
            }
            for _ in 0..run_count {
                let delta = if are_words {
                    cursor.read::<u16>()?
                } else {
                    cursor.read::<u8>()? as u16
                };
                current = current
                    .checked_add(delta)
                    .ok_or(ReadError::MalformedData("point number overflow"))?;
                points.push(current);
            }
        }
        Ok(PackedPointNumbers::Some(points))
    }

    /// Build the point set for a selection vector.
    ///
    /// A fully selected vector (including an empty one) is encoded as
    /// [`PackedPointNumbers::All`].
    pub fn from_selection(selected: &[bool]) -> Result<Self, SerializeErrorFlags> {
        if selected.iter().all(|is_selected| *is_selected) {
            return Ok(PackedPointNumbers::All);
        }
        selected
            .iter()
            .enumerate()
            .filter(|(_, is_selected)| **is_selected)
            .map(|(idx, _)| {
                u16::try_from(idx).map_err(|_| SerializeErrorFlags::SERIALIZE_ERROR_INT_OVERFLOW)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(PackedPointNumbers::Some)
    }

    /// The number of deltas that follow these point numbers, for data with
    /// `point_count` points.
    pub fn count(&self, point_count: usize) -> usize {
        match self {
            PackedPointNumbers::All => point_count,
            PackedPointNumbers::Some(pts) => pts.len(),
        }
    }

    /// Iterate the point numbers, expanding `All` to `0..point_count`.
    pub fn iter(&self, point_count: usize) -> impl Iterator<Item = usize> + '_ {
        let (all, some) = match self {
            PackedPointNumbers::All => (Some(0..point_count), None),
            PackedPointNumbers::Some(pts) => (None, Some(pts.iter().map(|pt| *pt as usize))),
        };
        all.into_iter().flatten().chain(some.into_iter().flatten())
    }

    /// Compute the number of bytes required to encode these points
    pub fn compute_size(&self) -> Result<usize, SerializeErrorFlags> {
        let gaps = match self {
            PackedPointNumbers::All => return Ok(1),
            PackedPointNumbers::Some(pts) => point_gaps(pts)?,
        };
        let count_len = if gaps.len() < 0x80 { 1 } else { 2 };
        Ok(count_len
            + iter_point_runs(&gaps)
                .map(|run| run.compute_size())
                .sum::<usize>())
    }

    pub fn write_into(&self, s: &mut Serializer) -> Result<(), SerializeErrorFlags> {
        let gaps = match self {
            PackedPointNumbers::All => {
                s.embed(0u8)?;
                return Ok(());
            }
            PackedPointNumbers::Some(pts) => point_gaps(pts).map_err(|err| s.set_err(err))?,
        };

        match gaps.len() {
            len @ 0..=0x7F => s.embed(len as u8)?,
            len @ 0x80..=MAX_POINT_COUNT => s.embed(len as u16 | 0x8000)?,
            _ => return Err(s.set_err(SerializeErrorFlags::SERIALIZE_ERROR_INT_OVERFLOW)),
        };
        for run in iter_point_runs(&gaps) {
            run.write_into(s)?;
        }
        Ok(())
    }
}

fn read_point_count(cursor: &mut Cursor) -> Result<usize, ReadError> {
    let first: u8 = cursor.read()?;
    if first & POINTS_ARE_WORDS == 0 {
        return Ok(first as usize);
    }
    let second: u8 = cursor.read()?;
    Ok((((first & POINT_RUN_COUNT_MASK) as usize) << 8) | second as usize)
}

/// The differences between consecutive points, starting from zero.
fn point_gaps(points: &[u16]) -> Result<Vec<u16>, SerializeErrorFlags> {
    let mut prev = 0u16;
    points
        .iter()
        .map(|point| -> Result<u16, SerializeErrorFlags> {
            let gap = point
                .checked_sub(prev)
                .ok_or(SerializeErrorFlags::SERIALIZE_ERROR_OTHER)?;
            prev = *point;
            Ok(gap)
        })
        .collect()
}

// split runs off the front of the gaps; the first gap in each run decides
// whether the run is made of bytes or words.
fn iter_point_runs(gaps: &[u16]) -> impl Iterator<Item = PackedPointRun<'_>> {
    const U8_MAX: u16 = u8::MAX as u16;

    let mut gaps = gaps;
    std::iter::from_fn(move || {
        let are_words = *gaps.first()? > U8_MAX;
        let run_len = gaps
            .iter()
            .take(MAX_POINTS_PER_RUN)
            .take_while(|gap| (**gap > U8_MAX) == are_words)
            .count();
        let (head, tail) = gaps.split_at(run_len);
        gaps = tail;
        Some(PackedPointRun {
            are_words,
            gaps: head,
        })
    })
}

#[derive(Debug, PartialEq, Eq)]
struct PackedPointRun<'a> {
    are_words: bool,
    gaps: &'a [u16],
}

impl PackedPointRun<'_> {
    fn compute_size(&self) -> usize {
        let per_point_len = if self.are_words { 2 } else { 1 };
        1 + self.gaps.len() * per_point_len
    }

    fn write_into(&self, s: &mut Serializer) -> Result<(), SerializeErrorFlags> {
        debug_assert!(!self.gaps.is_empty() && self.gaps.len() <= MAX_POINTS_PER_RUN);
        let mut control = (self.gaps.len() - 1) as u8;
        if self.are_words {
            control |= POINTS_ARE_WORDS;
        }
        s.embed(control)?;
        for gap in self.gaps {
            if self.are_words {
                s.embed(*gap)?;
            } else {
                s.embed(*gap as u8)?;
            }
        }
        Ok(())
    }
}

/// A sequence of deltas, in their packed form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedDeltas {
    deltas: Vec<i16>,
}

impl PackedDeltas {
    /// Construct a `PackedDeltas` from a vector of raw delta values.
    pub fn new(deltas: Vec<i16>) -> Self {
        Self { deltas }
    }

    /// Decode exactly `count` deltas, leaving the cursor just past them.
    pub fn read(cursor: &mut Cursor, count: usize) -> Result<Self, ReadError> {
        let mut deltas = Vec::with_capacity(count);
        while deltas.len() < count {
            let control: u8 = cursor.read()?;
            let run_count = (control & DELTA_RUN_COUNT_MASK) as usize + 1;
            if deltas.len() + run_count > count {
                return Err(ReadError::MalformedData("delta run overruns delta count"));
            }
            if control & DELTAS_ARE_ZERO != 0 {
                deltas.resize(deltas.len() + run_count, 0);
            } else if control & DELTAS_ARE_WORDS != 0 {
                for _ in 0..run_count {
                    deltas.push(cursor.read::<i16>()?);
                }
            } else {
                for _ in 0..run_count {
                    deltas.push(cursor.read::<i8>()? as i16);
                }
            }
        }
        Ok(Self { deltas })
    }

    pub fn deltas(&self) -> &[i16] {
        &self.deltas
    }

    pub fn into_inner(self) -> Vec<i16> {
        self.deltas
    }

    /// Compute the number of bytes required to encode these deltas
    pub fn compute_size(&self) -> usize {
        self.iter_runs().map(|run| run.compute_size()).sum()
    }

    pub fn write_into(&self, s: &mut Serializer) -> Result<(), SerializeErrorFlags> {
        for run in self.iter_runs() {
            run.write_into(s)?;
        }
        Ok(())
    }

    fn iter_runs(&self) -> impl Iterator<Item = PackedDeltaRun<'_>> {
        let mut deltas = self.deltas.as_slice();
        // the part of the current run that didn't fit in the last chunk
        let mut pending: Option<PackedDeltaRun> = None;

        std::iter::from_fn(move || {
            let run = match pending.take() {
                Some(run) => run,
                None => {
                    let (run, rest) = next_delta_run(deltas)?;
                    deltas = rest;
                    run
                }
            };
            let (head, tail) = run.split_at_max_len();
            pending = tail;
            Some(head)
        })
    }
}

fn in_i8_range(val: i16) -> bool {
    const MIN: i16 = i8::MIN as i16;
    const MAX: i16 = i8::MAX as i16;
    (MIN..=MAX).contains(&val)
}

/// Split the next run off the front of `deltas`, ignoring the run length limit.
fn next_delta_run(deltas: &[i16]) -> Option<(PackedDeltaRun<'_>, &[i16])> {
    let first = *deltas.first()?;

    if first == 0 {
        let len = deltas.iter().take_while(|v| **v == 0).count();
        return Some((PackedDeltaRun::Zeros(len), &deltas[len..]));
    }

    let mut len = 1;
    if in_i8_range(first) {
        // a single zero is cheaper inline, but two in a row start a zero run
        while let Some(cur) = deltas.get(len).copied() {
            let two_zeros = cur == 0 && deltas.get(len + 1) == Some(&0);
            if !in_i8_range(cur) || two_zeros {
                break;
            }
            len += 1;
        }
        let (head, tail) = deltas.split_at(len);
        Some((PackedDeltaRun::OneByte(head), tail))
    } else {
        // one byte-sized value between words is cheaper inline, but two in a
        // row are worth switching for
        while let Some(cur) = deltas.get(len).copied() {
            let next_is_small = deltas.get(len + 1).copied().is_some_and(in_i8_range);
            if cur == 0 || (in_i8_range(cur) && next_is_small) {
                break;
            }
            len += 1;
        }
        let (head, tail) = deltas.split_at(len);
        Some((PackedDeltaRun::TwoBytes(head), tail))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PackedDeltaRun<'a> {
    Zeros(usize),
    OneByte(&'a [i16]),
    TwoBytes(&'a [i16]),
}

impl<'a> PackedDeltaRun<'a> {
    fn len(&self) -> usize {
        match self {
            PackedDeltaRun::Zeros(count) => *count,
            PackedDeltaRun::OneByte(deltas) | PackedDeltaRun::TwoBytes(deltas) => deltas.len(),
        }
    }

    /// Split into a run that fits in one control byte, and whatever is left.
    fn split_at_max_len(self) -> (Self, Option<Self>) {
        if self.len() <= MAX_DELTAS_PER_RUN {
            return (self, None);
        }
        match self {
            PackedDeltaRun::Zeros(count) => (
                PackedDeltaRun::Zeros(MAX_DELTAS_PER_RUN),
                Some(PackedDeltaRun::Zeros(count - MAX_DELTAS_PER_RUN)),
            ),
            PackedDeltaRun::OneByte(deltas) => {
                let (head, tail) = deltas.split_at(MAX_DELTAS_PER_RUN);
                (PackedDeltaRun::OneByte(head), Some(PackedDeltaRun::OneByte(tail)))
            }
            PackedDeltaRun::TwoBytes(deltas) => {
                let (head, tail) = deltas.split_at(MAX_DELTAS_PER_RUN);
                (PackedDeltaRun::TwoBytes(head), Some(PackedDeltaRun::TwoBytes(tail)))
            }
        }
    }

    fn compute_flag(&self) -> u8 {
        let count = (self.len() - 1) as u8;
        match self {
            PackedDeltaRun::Zeros(_) => count | DELTAS_ARE_ZERO,
            PackedDeltaRun::OneByte(_) => count,
            PackedDeltaRun::TwoBytes(_) => count | DELTAS_ARE_WORDS,
        }
    }

    fn compute_size(&self) -> usize {
        match self {
            PackedDeltaRun::Zeros(_) => 1,
            PackedDeltaRun::OneByte(vals) => vals.len() + 1,
            PackedDeltaRun::TwoBytes(vals) => vals.len() * 2 + 1,
        }
    }

    fn write_into(&self, s: &mut Serializer) -> Result<(), SerializeErrorFlags> {
        debug_assert!(self.len() > 0 && self.len() <= MAX_DELTAS_PER_RUN);
        s.embed(self.compute_flag())?;
        match self {
            PackedDeltaRun::Zeros(_) => (),
            PackedDeltaRun::OneByte(deltas) => {
                for delta in deltas.iter() {
                    s.embed(*delta as i8)?;
                }
            }
            PackedDeltaRun::TwoBytes(deltas) => {
                for delta in deltas.iter() {
                    s.embed(*delta)?;
                }
            }
        }
        Ok(())
    }
}
