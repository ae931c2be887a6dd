use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use env_logger::Env;

use landscape_builder::airport::{load_airports, Airport};
use landscape_builder::classification::ClassificationTable;
use landscape_builder::config::BuildConfig;
use landscape_builder::pipeline::{BuildOptions, LandscapeBuilder};
use landscape_builder::progress::{LogSink, ProgressSink};
use landscape_builder::terrain::{CoordinateTransform, TerrainFlattener};
use landscape_builder::tile::{atlas_expression, TileCoord};
use landscape_builder::{BuildResult, BuilderError};

#[derive(Parser, Debug)]
#[command(name = "landscape_builder")]
#[command(about = "Build textures, forest and thermal maps for a landscape from classified tiles")]
struct Args {
    /// Landscape name
    #[arg(short = 'l', long)]
    landscape_name: Option<String>,

    /// Output directory for intermediate and final files
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Directory with the XXYY classification tiles
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Compress texture patches to DDS
    #[arg(short = 'd', long)]
    gen_dds: bool,

    /// Generate forest files
    #[arg(short = 'f', long)]
    gen_forest: bool,

    /// Generate the thermal map
    #[arg(short = 't', long)]
    gen_thermal: bool,

    /// Run every optional stage
    #[arg(short = 'A', long)]
    gen_all: bool,

    /// Write final outputs into the installed landscape directory
    #[arg(short = 'c', long)]
    output_to_landscape: bool,

    /// Only build this tile (e.g. 0203)
    #[arg(short = 's', long)]
    single_tile: Option<TileCoord>,

    /// Print the QGIS atlas expression for a landscape of WIDTH,HEIGHT tiles and exit
    #[arg(short = 'Q', long, value_name = "WIDTH,HEIGHT", value_parser = parse_extent)]
    qgis_string: Option<(usize, usize)>,

    /// Settings file (default: user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Classification table (default: user config directory)
    #[arg(long)]
    textures: Option<PathBuf>,

    /// Write the .apt file and flatten runways from this airports JSON instead of building tiles
    #[arg(long)]
    airports: Option<PathBuf>,

    /// Directory containing installed landscapes
    #[arg(long)]
    landscape_dir: Option<PathBuf>,

    /// Only flatten runway outlines
    #[arg(long)]
    no_interior: bool,

    /// Print runway outlines for plotting before flattening
    #[arg(long)]
    plot_runways: bool,
}

fn parse_extent(s: &str) -> Result<(usize, usize), String> {
    let (w, h) = s
        .split_once(',')
        .ok_or_else(|| format!("expected WIDTH,HEIGHT, got '{s}'"))?;
    let parse = |v: &str| v.trim().parse::<usize>().map_err(|e| format!("'{v}': {e}"));
    Ok((parse(w)?, parse(h)?))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Some((width, height)) = args.qgis_string {
        println!("{}", atlas_expression(width, height));
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> BuildResult<()> {
    let settings_path = args
        .config
        .clone()
        .or_else(BuildConfig::default_settings_path)
        .ok_or_else(|| BuilderError::Config("no settings directory available, pass --config".to_string()))?;
    let mut config = BuildConfig::load_or_create(&settings_path)?;
    log::debug!("Settings from {}", settings_path.display());

    if let Some(name) = args.landscape_name.clone() {
        config.landscape_name = Some(name);
    }
    if let Some(output) = args.output.clone() {
        config.output_dir = output;
    }
    if let Some(input) = args.input.clone() {
        config.input_dir = input;
    }
    if let Some(root) = args.landscape_dir.clone() {
        config.landscapes_root = Some(root);
    }

    let textures_path = args
        .textures
        .clone()
        .or_else(BuildConfig::default_textures_path)
        .ok_or_else(|| BuilderError::Config("no settings directory available, pass --textures".to_string()))?;
    let mut table = ClassificationTable::load_or_create(&textures_path)?;

    let sink: Arc<dyn ProgressSink> = Arc::new(LogSink);
    let loaded = table.load_textures(&config.texture_dir, sink.as_ref());
    log::info!("{} land covers, {loaded} textures loaded", table.len());

    let options = BuildOptions {
        gen_dds: args.gen_dds || args.gen_all,
        gen_forest: args.gen_forest || args.gen_all,
        gen_thermal: args.gen_thermal || args.gen_all,
        output_to_landscape: args.output_to_landscape,
        single_tile: args.single_tile,
        fill_interior: !args.no_interior,
    };
    let builder = LandscapeBuilder::new(config, table, sink)?;

    if let Some(path) = &args.airports {
        let airports = load_airports(path)?;
        let config = builder.config();
        let transform = config.coordinate_transform();
        if args.plot_runways {
            plot_runways(&airports, &transform, config, options.fill_interior);
        }

        let results = builder.build_airports(&airports, &transform, &options)?;
        let failed = results.iter().filter(|r| r.result.is_err()).count();
        log::info!("Flattened {} of {} runways", results.len() - failed, results.len());
        return Ok(());
    }

    let summary = builder.build(&options)?;
    log::info!(
        "Built {} tiles in {:.1}s with {} warnings",
        summary.tiles.len(),
        summary.elapsed_seconds,
        summary.warnings.len()
    );
    Ok(())
}

fn plot_runways(airports: &[Airport], transform: &dyn CoordinateTransform, config: &BuildConfig, fill_interior: bool) {
    for footprint in airports.iter().filter_map(Airport::footprint) {
        match TerrainFlattener::new(&footprint, transform, config.height_grid, fill_interior) {
            Ok(flattener) => {
                println!("# {}", footprint.name);
                for line in flattener.plot_lines() {
                    println!("{line}");
                }
            }
            Err(e) => log::warn!("Cannot plot {}: {e}", footprint.name),
        }
    }
}
