//! Print a runway's rounded outline and flattened points for plotting.
//! Each block is a list of `-x,y` lines; blocks are separated by a blank line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use landscape_builder::airport::load_airports;
use landscape_builder::config::HeightGridLayout;
use landscape_builder::terrain::{CommandTransform, TerrainFlattener};

#[derive(Parser, Debug)]
#[command(name = "plot_runway")]
#[command(about = "Print runway flattening geometry as -x,y point lists")]
struct Args {
    /// Airports JSON file
    airports: PathBuf,

    /// Landscape passed to the coordinate converter
    #[arg(short = 'l', long)]
    landscape: String,

    /// Only plot airports whose name contains this text
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Coordinate converter program
    #[arg(long, default_value = "CoCoCo.exe")]
    converter: String,

    /// Directory to run the converter in
    #[arg(long)]
    converter_dir: Option<PathBuf>,

    /// Only trace the outline
    #[arg(long)]
    no_interior: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let airports = match load_airports(&args.airports) {
        Ok(airports) => airports,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", args.airports.display());
            return ExitCode::FAILURE;
        }
    };

    let mut transform = CommandTransform::new(args.converter, args.landscape);
    if let Some(dir) = args.converter_dir {
        transform = transform.with_working_dir(dir);
    }
    let selected = airports
        .iter()
        .filter(|a| args.name.as_ref().map_or(true, |n| a.name.contains(n.as_str())))
        .filter_map(|a| a.footprint());

    let mut plotted = 0;
    for footprint in selected {
        match TerrainFlattener::new(&footprint, &transform, HeightGridLayout::default(), !args.no_interior) {
            Ok(flattener) => {
                println!("# {}", footprint.name);
                for block in flattener.plot_lines() {
                    println!("{block}");
                }
                plotted += 1;
            }
            Err(e) => eprintln!("{}: {e}", footprint.name),
        }
    }

    if plotted == 0 {
        eprintln!("No runways plotted");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
