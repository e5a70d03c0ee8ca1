//! Decoding, instancing and encoding of OpenType tuple variation data.
//!
//! The `cvar` table and each glyph's entry in `gvar` store their variations
//! as a [tuple variation store]: a list of tuples, each a region of the
//! design space with a set of point (or CVT) deltas. This crate decodes such
//! stores into [`TupleVariations`], restricts them to new [`AxisLimits`]
//! (pinning or clipping axes), and encodes the result back into the binary
//! format.
//!
//! [tuple variation store]: https://learn.microsoft.com/en-us/typography/opentype/spec/otvarcommonformats#tuple-variation-store

pub mod axes;
pub mod cursor;
pub mod cvar;
pub mod delta_set_index_map;
mod error;
pub mod gvar;
pub mod packed;
pub mod parsing_util;
pub mod serialize;
pub mod solver;
pub mod tent;
pub mod tuple_delta;
pub mod tuple_header;
pub mod tuple_variations;

pub use axes::AxisIndexMap;
pub use cvar::{instantiate_cvar, InstancedCvar};
pub use error::Error;
pub use gvar::{instantiate_glyph_variations, Gvar, InstancedGlyphVariations};
pub use parsing_util::{parse_axis_tags, parse_instancing_spec, AxisLimits, InstancingSpec};
pub use read_fonts::{FontData, ReadError};
pub use serialize::{SerializeErrorFlags, Serializer};
pub use tent::{AxisDistances, AxisLimit, Region, Tent};
pub use tuple_delta::TupleDelta;
pub use tuple_header::{SharedTuples, TableKind, TupleVariationData};
pub use tuple_variations::{CompiledTupleVariations, PinnedDeltas, TupleVariations};
