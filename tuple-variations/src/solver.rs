//! Re-expressing a tent under new axis limits.
//!
//! Follows the solver used by fonttools' `instancer.solver` and HarfBuzz's
//! `hb-subset-instancer-solver`.

use crate::tent::{AxisDistances, AxisLimit, Tent};

/// A multiplier for a tuple's deltas, and the tent those deltas now apply to.
///
/// A zero tent stands for deltas that apply everywhere (the "gain").
pub type RebasedTent = (f32, Tent);

const EPSILON: f32 = 1.0 / (1 << 14) as f32;

/// Renormalize a normalized value `v` to the range of an axis,
/// considering the prenormalized distances as well as the new axis limits.
pub fn renormalize_value(
    v: f32,
    limit: AxisLimit,
    distances: AxisDistances,
    extrapolate: bool,
) -> f32 {
    let AxisLimit {
        minimum: lower,
        default: def,
        maximum: upper,
    } = limit;
    debug_assert!(lower <= def && def <= upper);

    let v = if extrapolate {
        v
    } else {
        v.clamp(lower, upper)
    };

    if v == def {
        return 0.0;
    }

    if def < 0.0 {
        return -renormalize_value(
            -v,
            limit.reverse_negate(),
            distances.swapped(),
            extrapolate,
        );
    }

    // def >= 0 and v != def
    if v > def {
        return (v - def) / (upper - def);
    }

    // v < def
    if lower >= 0.0 {
        return (v - def) / (def - lower);
    }

    // lower < 0 and v < def
    let total_distance = distances.negative * (-lower) + distances.positive * def;
    let v_distance = if v >= 0.0 {
        (def - v) * distances.positive
    } else {
        (-v) * distances.negative + distances.positive * def
    };

    -v_distance / total_distance
}

fn solve(tent: Tent, limit: AxisLimit) -> Vec<RebasedTent> {
    // Mirror the problem such that limit.default <= peak
    if limit.default > tent.peak {
        return solve(tent.reverse_negate(), limit.reverse_negate())
            .into_iter()
            .map(|(scalar, tent)| (scalar, tent.reverse_negate()))
            .collect();
    }

    let AxisLimit {
        default: axis_def,
        maximum: axis_max,
        ..
    } = limit;

    // The whole tent falls outside the new limit
    if axis_max <= tent.start && axis_max < tent.peak {
        return Vec::new();
    }

    // The new maximum cuts through the tent before its peak: solve for the
    // part that remains, scaled by the tent's value at the cut.
    if axis_max < tent.peak {
        let mult = tent.scalar_at(axis_max);
        return solve(Tent::new(tent.start, axis_max, axis_max), limit)
            .into_iter()
            .map(|(scalar, tent)| (scalar * mult, tent))
            .collect();
    }

    // start <= axis_def <= peak <= axis_max
    let gain = tent.scalar_at(axis_def);
    let mut out = vec![(gain, Tent::default())];
    push_positive_side(&mut out, tent, limit, gain);
    push_negative_side(&mut out, tent, limit, gain);
    out
}

fn push_positive_side(out: &mut Vec<RebasedTent>, tent: Tent, limit: AxisLimit, gain: f32) {
    let Tent {
        start: lower,
        peak,
        end: mut upper,
    } = tent;
    let AxisLimit {
        default: axis_def,
        maximum: axis_max,
        ..
    } = limit;
    let out_gain = tent.scalar_at(axis_max);

    if gain >= out_gain {
        // The tent drops back to the gain level somewhere past the peak
        let crossing = peak + (1.0 - gain) * (upper - peak);
        out.push((1.0 - gain, Tent::new(lower.max(axis_def), peak, crossing)));

        if upper >= axis_max {
            out.push((out_gain - gain, Tent::new(crossing, axis_max, axis_max)));
        } else {
            // A tent's peak cannot fall on axis default. Nudge it.
            if upper == axis_def {
                upper += EPSILON;
            }
            // downslope
            out.push((-gain, Tent::new(crossing, upper, axis_max)));
            // and flat to the end
            out.push((-gain, Tent::new(upper, axis_max, axis_max)));
        }
    } else {
        // Chop into two tents. Stretching the upper side into a single tent
        // would need peaks past 1.0, which OTS rejects.
        out.push((1.0 - gain, Tent::new(axis_def.max(lower), peak, axis_max)));
        // no dirac deltas
        if peak < axis_max {
            out.push((out_gain - gain, Tent::new(peak, axis_max, axis_max)));
        }
    }
}

fn push_negative_side(out: &mut Vec<RebasedTent>, tent: Tent, limit: AxisLimit, gain: f32) {
    let AxisLimit {
        minimum: axis_min,
        default: axis_def,
        ..
    } = limit;
    let mut lower = tent.start;

    if lower <= axis_min {
        let scalar = tent.scalar_at(axis_min);
        out.push((scalar - gain, Tent::new(axis_min, axis_min, axis_def)));
    } else {
        // A tent's peak cannot fall on axis default. Nudge it.
        if lower == axis_def {
            lower -= EPSILON;
        }
        // downslope
        out.push((-gain, Tent::new(axis_min, lower, axis_def)));
        // and flat to the end
        out.push((-gain, Tent::new(axis_min, axis_min, lower)));
    }
}

/// Express `tent` in the coordinate system of an axis restricted to `limit`.
///
/// Returns `(scalar, tent)` pairs: the deltas of the original tuple,
/// multiplied by `scalar` and applied over the new `tent`, reproduce the
/// original variation everywhere inside the limit. A zero tent in the output
/// means the scaled deltas apply at every location. Outputs with a zero
/// scalar are dropped, so a tent wholly outside the limit yields nothing.
///
/// `tent` must have a non-zero peak and `limit` must be a valid axis limit.
pub fn rebase_tent(tent: Tent, limit: AxisLimit, distances: AxisDistances) -> Vec<RebasedTent> {
    debug_assert!(-1.0 <= limit.minimum && limit.minimum <= limit.default);
    debug_assert!(limit.default <= limit.maximum && limit.maximum <= 1.0);
    debug_assert!(-2.0 <= tent.start && tent.start <= tent.peak);
    debug_assert!(tent.peak <= tent.end && tent.end <= 2.0);
    debug_assert!(tent.peak != 0.0, "tent peak was zero");

    solve(tent, limit)
        .into_iter()
        .filter(|(scalar, _)| *scalar != 0.0)
        .map(|(scalar, solved)| {
            if solved == Tent::default() {
                return (scalar, solved);
            }
            let renormalized = Tent::new(
                renormalize_value(solved.start, limit, distances, false),
                renormalize_value(solved.peak, limit, distances, false),
                renormalize_value(solved.end, limit, distances, false),
            );
            (scalar, renormalized)
        })
        .collect()
}
