use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use geofencer::{EngineOptions, FenceEngine, ImportOptions, QueryOptions};

#[derive(Parser)]
#[command(name = "geofencectl")]
#[command(author = "geofencer")]
#[command(version = "0.1.0")]
#[command(about = "Inspect and query a geofence store.", long_about = None)]
struct Cli {
    /// Path to the geofence store directory.
    #[arg(short, long)]
    store: PathBuf,

    /// Open the store read-only.
    #[arg(long, default_value_t = false)]
    read_only: bool,

    /// Verbose per-operation logging.
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a GeoJSON feature collection.
    Import(ImportArgs),
    /// Point-in-polygon query.
    Stab(StabArgs),
    /// Rectangle window query.
    Rect(RectArgs),
    /// Radius query around a point.
    Radius(RadiusArgs),
    /// Look up a polygon by its ID.
    Show { id: u64 },
}

#[derive(Args)]
struct ImportArgs {
    /// Path to a GeoJSON file.
    path: PathBuf,

    /// Only copy these property keys into each fence's metadata.
    #[arg(long)]
    field: Vec<String>,

    /// Treat the file as a single bare Feature rather than a FeatureCollection.
    #[arg(long, default_value_t = false)]
    single_feature: bool,
}

#[derive(Args)]
struct StabArgs {
    lat: f64,
    lng: f64,

    /// Return every enclosing fence instead of only the innermost.
    #[arg(long, default_value_t = false)]
    all: bool,
}

#[derive(Args)]
struct RectArgs {
    ur_lat: f64,
    ur_lng: f64,
    bl_lat: f64,
    bl_lng: f64,
}

#[derive(Args)]
struct RadiusArgs {
    lat: f64,
    lng: f64,
    radius_meters: f64,
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let options = EngineOptions {
        read_only: cli.read_only,
        debug: cli.debug,
        ..Default::default()
    };
    let engine = match FenceEngine::open(&cli.store, options) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("failed to open store: {err}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Import(args) => run_import(&engine, &args),
        Commands::Stab(args) => run_stab(&engine, &args),
        Commands::Rect(args) => run_rect(&engine, &args),
        Commands::Radius(args) => run_radius(&engine, &args),
        Commands::Show { id } => run_show(&engine, id),
    }
}

fn run_import(engine: &FenceEngine, args: &ImportArgs) {
    let text = match fs::read_to_string(&args.path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("failed to read {}: {err}", args.path.display());
            std::process::exit(1);
        }
    };

    let opts = ImportOptions {
        import_fields: args.field.clone(),
        single_feature: args.single_feature,
        ..Default::default()
    };

    match geofencer::import_geojson(engine, &text, &opts).map(|r| r.stored.len()) {
        Ok(count) => println!("imported {count} fences"),
        Err(err) => {
            eprintln!("import failed: {err}");
            std::process::exit(1);
        }
    }
}

fn run_stab(engine: &FenceEngine, args: &StabArgs) {
    let opts = QueryOptions { multiple_fences: args.all };
    let hits = engine.stubbing_query(args.lat, args.lng, opts);
    if hits.is_empty() {
        println!("no match");
        return;
    }
    for fence in hits {
        println!("{} {:?}", fence.id, fence.data);
    }
}

fn run_rect(engine: &FenceEngine, args: &RectArgs) {
    match engine.rect_query(args.ur_lat, args.ur_lng, args.bl_lat, args.bl_lng) {
        Ok(hits) => {
            for fence in hits {
                println!("{} {:?}", fence.id, fence.data);
            }
        }
        Err(err) => {
            eprintln!("rect query failed: {err}");
            std::process::exit(1);
        }
    }
}

fn run_radius(engine: &FenceEngine, args: &RadiusArgs) {
    for fence in engine.radius_query(args.lat, args.lng, args.radius_meters) {
        println!("{} {:?}", fence.id, fence.data);
    }
}

fn run_show(engine: &FenceEngine, id: u64) {
    match engine.fence_by_id(id) {
        Some(fence) => println!("{} {:?}", fence.id, fence.data),
        None => println!("no such fence"),
    }
}
