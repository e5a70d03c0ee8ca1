//! binary instancing tool
//!
//! Takes a `cvar` table, or a `gvar` table and a glyph id, and writes the
//! variation data that remains after restricting the font's axes.
//!

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tuple_variations::{
    instantiate_cvar, instantiate_glyph_variations, parse_axis_tags,
    parse_instancing_spec, AxisIndexMap, Error, FontData, Gvar, ReadError,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Table {
    Cvar,
    Gvar,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The input table file.
    #[arg(short, long)]
    path: PathBuf,

    /// Which table the input is
    #[arg(short, long, value_enum)]
    table: Table,

    /// The font's axis tags, in fvar order
    #[arg(short, long)]
    axes: String,

    /// Axis limits in normalized coordinates, e.g. "wght=0.5 wdth=-1:0:0.5"
    #[arg(short, long)]
    variations: String,

    /// Number of CVT entries, or of glyph points including phantom points
    #[arg(long)]
    point_count: Option<usize>,

    /// The glyph to instance, for gvar
    #[arg(short, long, default_value_t = 0)]
    glyph_id: u16,

    /// A cvt table to apply the pinned deltas to
    #[arg(long)]
    cvt: Option<PathBuf>,

    /// Where to write the adjusted cvt table
    #[arg(long, requires = "cvt")]
    cvt_output_file: Option<PathBuf>,

    /// The output table or glyph variation data file
    #[arg(short, long)]
    output_file: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let axes = AxisIndexMap::new(parse_axis_tags(&args.axes)?);
    let limits = parse_instancing_spec(&args.variations)?.to_axis_limits(&axes)?;
    let input = std::fs::read(&args.path)?;

    let output = match args.table {
        Table::Cvar => {
            let cvt = args.cvt.as_ref().map(std::fs::read).transpose()?;
            let cvt_count = args
                .point_count
                .or_else(|| cvt.as_ref().map(|cvt| cvt.len() / 2))
                .ok_or_else(|| {
                    Error::InvalidInstancingSpec("--point-count or --cvt is required".into())
                })?;

            let instanced = instantiate_cvar(&input, &axes, cvt_count, &limits)?;
            if let (Some(cvt), Some(path)) = (&cvt, &args.cvt_output_file) {
                std::fs::write(path, instanced.apply_to_cvt(cvt))?;
            }
            println!("cvt deltas: {:?}", instanced.cvt_deltas);
            instanced.table
        }
        Table::Gvar => {
            let point_count = args.point_count.ok_or_else(|| {
                Error::InvalidInstancingSpec("--point-count is required for gvar".into())
            })?;
            let gvar = Gvar::read(FontData::new(&input))?;
            if gvar.axis_count() as usize != axes.len() {
                return Err(ReadError::MalformedData("gvar axis count does not match --axes").into());
            }
            let data = gvar.glyph_variation_data(args.glyph_id)?;
            let instanced = instantiate_glyph_variations(
                data.map(|data| data.as_bytes()).unwrap_or_default(),
                gvar.shared_tuples(),
                &axes,
                point_count,
                &limits,
            )?;
            println!("x deltas: {:?}", instanced.deltas.rounded_x());
            if let Some(y) = instanced.deltas.rounded_y() {
                println!("y deltas: {y:?}");
            }
            instanced.data
        }
    };

    match output {
        Some(bytes) => std::fs::write(&args.output_file, bytes)?,
        None => println!("no variations remain, {} not written", args.output_file.display()),
    }
    Ok(())
}
