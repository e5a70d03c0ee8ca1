//! End-to-end instancing of tuple variation stores.

use font_types::Tag;
use pretty_assertions::assert_eq;
use tuple_variations::{
    cursor::Cursor,
    delta_set_index_map::{map_or_identity, DeltaSetIndexMap},
    instantiate_cvar, instantiate_glyph_variations,
    packed::{PackedDeltas, PackedPointNumbers},
    parse_instancing_spec, AxisIndexMap, AxisLimit, AxisLimits, FontData, Gvar, Region, Serializer,
    SharedTuples, TableKind, Tent, TupleVariationData, TupleVariations,
};

const WGHT: Tag = Tag::new(b"wght");
const WDTH: Tag = Tag::new(b"wdth");

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// two tuples over (wght, wdth) and three CVT entries:
// wght=1 moves entries 0 and 1, (wght=1, wdth=1) moves entries 1 and 2
#[rustfmt::skip]
static CVAR: &[u8] = &[
    0x00, 0x01, 0x00, 0x00,
    0x00, 0x02, 0x00, 0x18,
    0x00, 0x07, 0xA0, 0x00, 0x40, 0x00, 0x00, 0x00,
    0x00, 0x07, 0xA0, 0x00, 0x40, 0x00, 0x40, 0x00,
    0x02, 0x01, 0x00, 0x01, 0x01, 0x0A, 0x14,
    0x02, 0x01, 0x01, 0x01, 0x01, 0x05, 0x07,
];

fn limits(spec: &str, axes: &AxisIndexMap) -> AxisLimits {
    parse_instancing_spec(spec)
        .unwrap()
        .to_axis_limits(axes)
        .unwrap()
}

#[test]
fn pinning_an_axis_merges_tuples() {
    init_logging();
    let axes = AxisIndexMap::new([WGHT, WDTH]);
    let instanced = instantiate_cvar(CVAR, &axes, 3, &limits("wdth=1", &axes)).unwrap();

    #[rustfmt::skip]
    let expected: Vec<u8> = vec![
        0x00, 0x01, 0x00, 0x00,
        0x00, 0x01, 0x00, 0x0E,
        0x00, 0x05, 0xA0, 0x00, 0x40, 0x00,
        // all points; 10, 20 + 5, and the adopted 7
        0x00, 0x02, 0x0A, 0x19, 0x07,
    ];
    assert_eq!(instanced.table, Some(expected));
    assert_eq!(instanced.cvt_deltas, vec![0, 0, 0]);
}

#[test]
fn merged_tuple_count_decreases() {
    init_logging();
    let axes = AxisIndexMap::new([WGHT, WDTH]);
    let data = TupleVariationData::read(FontData::new(CVAR), TableKind::Cvar, 2).unwrap();
    let mut vars =
        TupleVariations::decompile(&data, TableKind::Cvar, 3, &axes, &SharedTuples::empty())
            .unwrap();
    assert_eq!(vars.len(), 2);
    let pinned = vars.instantiate(&limits("wdth=1", &axes));
    assert_eq!(vars.len(), 1);
    assert!(pinned.is_zero());

    let merged = vars.iter().next().unwrap();
    let expected_region: Region = [(WGHT, Tent::implicit(1.0))].into_iter().collect();
    assert_eq!(merged.region(), &expected_region);
    assert_eq!(merged.deltas_x(), &[10.0, 25.0, 7.0]);
}

#[test]
fn range_outside_tent_removes_tuple() {
    init_logging();
    let axes = AxisIndexMap::new([WGHT, WDTH]);
    let mut limits = AxisLimits::new();
    limits
        .push(WGHT, AxisLimit::new(-1.0, -0.5, -0.2))
        .unwrap();
    let instanced = instantiate_cvar(CVAR, &axes, 3, &limits).unwrap();
    assert_eq!(instanced.table, None);
    assert_eq!(instanced.cvt_deltas, vec![0, 0, 0]);
}

#[test]
fn pin_everything_to_a_corner() {
    init_logging();
    let axes = AxisIndexMap::new([WGHT, WDTH]);
    let instanced = instantiate_cvar(CVAR, &axes, 3, &limits("wght=1 wdth=1", &axes)).unwrap();
    assert_eq!(instanced.table, None);
    assert_eq!(instanced.cvt_deltas, vec![10, 25, 7]);

    let cvt = [0x00, 0x10, 0x00, 0x20, 0xFF, 0xFF];
    assert_eq!(
        instanced.apply_to_cvt(&cvt),
        vec![0x00, 0x1A, 0x00, 0x39, 0x00, 0x06]
    );
}

#[test]
fn drop_all_axes_keeps_nothing() {
    init_logging();
    let axes = AxisIndexMap::new([WGHT, WDTH]);
    let instanced = instantiate_cvar(CVAR, &axes, 3, &limits("*=drop", &axes)).unwrap();
    assert_eq!(instanced.table, None);
    assert_eq!(instanced.cvt_deltas, vec![0, 0, 0]);
}

#[test]
fn gvar_glyph_round_trip() {
    init_logging();
    // one axis, no shared tuples, a single glyph whose data has an
    // intermediate region (0.25, 0.5, 1.0) over four points
    #[rustfmt::skip]
    let gvar: &[u8] = &[
        0x00, 0x01, 0x00, 0x00,
        0x00, 0x01, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x1C, // shared tuples at 28 (none)
        0x00, 0x01, 0x00, 0x01, // one glyph, long offsets
        0x00, 0x00, 0x00, 0x1C, // glyph data at 28
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x15,
        // glyph 0
        0x00, 0x01, 0x00, 0x0E,
        0x00, 0x07, 0xE0, 0x00, 0x20, 0x00, 0x10, 0x00, 0x40, 0x00,
        0x00, 0x03, 0x01, 0x02, 0x03, 0x04, 0x83,
    ];
    let table = Gvar::read(FontData::new(gvar)).unwrap();
    let data = table.glyph_variation_data(0).unwrap().unwrap();
    let axes = AxisIndexMap::new([WGHT]);

    // nothing restricted: the data is reproduced
    let instanced = instantiate_glyph_variations(
        data.as_bytes(),
        table.shared_tuples(),
        &axes,
        4,
        &AxisLimits::new(),
    )
    .unwrap();
    assert!(instanced.deltas.is_zero());
    assert_eq!(instanced.data.as_deref(), Some(&gvar[28..]));

    // pinned at the peak the deltas apply in full
    let instanced = instantiate_glyph_variations(
        data.as_bytes(),
        table.shared_tuples(),
        &axes,
        4,
        &limits("wght=0.5", &axes),
    )
    .unwrap();
    assert_eq!(instanced.data, None);
    assert_eq!(instanced.deltas.x(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(instanced.deltas.y(), Some([0.0; 4].as_slice()));

    // pinned below the start there is nothing left
    let instanced = instantiate_glyph_variations(
        data.as_bytes(),
        table.shared_tuples(),
        &axes,
        4,
        &limits("wght=0.2", &axes),
    )
    .unwrap();
    assert_eq!(instanced.data, None);
    assert!(instanced.deltas.is_zero());
}

#[test]
fn full_selection_encodes_as_all_points() {
    let points = PackedPointNumbers::from_selection(&[true, true, true]).unwrap();
    let mut s = Serializer::new(16);
    points.write_into(&mut s).unwrap();
    let bytes = s.copy_bytes().unwrap();
    assert_eq!(bytes, vec![0x00]);

    let decoded = PackedPointNumbers::read(&mut Cursor::new(FontData::new(&bytes))).unwrap();
    assert_eq!(decoded.iter(3).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[test]
fn repeated_zeros_start_a_new_run() {
    let deltas = PackedDeltas::new(vec![0, 0, 10, 10, -200, -200]);
    let mut s = Serializer::new(64);
    deltas.write_into(&mut s).unwrap();
    let bytes = s.copy_bytes().unwrap();
    assert_eq!(
        bytes,
        vec![0x81, 0x01, 0x0A, 0x0A, 0x41, 0xFF, 0x38, 0xFF, 0x38]
    );

    let decoded = PackedDeltas::read(&mut Cursor::new(FontData::new(&bytes)), 6).unwrap();
    assert_eq!(decoded.deltas(), &[0, 0, 10, 10, -200, -200]);
}

#[test]
fn scalar_at_peak_and_outside() {
    let axes = AxisIndexMap::new([WGHT, WDTH]);
    let region: Region = [(WGHT, Tent::new(0.0, 0.5, 1.0)), (WDTH, Tent::implicit(-1.0))]
        .into_iter()
        .collect();
    assert_eq!(region.calculate_scalar(&axes, &[0.5, -1.0]), 1.0);
    assert_eq!(region.calculate_scalar(&axes, &[1.2, -1.0]), 0.0);
    assert_eq!(region.calculate_scalar(&axes, &[0.5, 0.5]), 0.0);
    assert_eq!(region.calculate_scalar(&axes, &[0.25, -0.5]), 0.25);
}

#[test]
fn empty_index_map_is_identity() {
    let data = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
    let map = DeltaSetIndexMap::read(FontData::new(&data)).unwrap();
    for v in [0, 1, 0xFFFF, 0x0001_0000, u32::MAX] {
        assert_eq!(map.map(v).unwrap(), v);
        assert_eq!(map_or_identity(None, v).unwrap(), v);
    }
}
