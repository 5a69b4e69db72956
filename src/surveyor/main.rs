use anyhow::Context;
use clap::Parser;
use futures::future::join_all;
use parcel_editor::capture::point_list::{self, PointListCapture};
use parcel_editor::geodesy::{self, TraverseLeg};
use parcel_editor::geometry_service::http::HttpGeometryService;
use parcel_editor::map_surface::MapSurface;
use parcel_editor::pin;
use parcel_editor::registry::{LiveParcelRegistry, ParcelRegistry};
use parcel_editor::{EditorConfig, TableRef, Vertex};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RON file with the editor settings. Environment overrides still apply.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Lay out a chain of courses from a start point
    Traverse {
        /// Start point as lat,lng
        #[arg(long, value_parser = parse_start)]
        start: Vertex,
        /// One course as distance_m,bearing_deg; repeat for more
        #[arg(long = "leg", value_parser = parse_leg, required = true)]
        legs: Vec<TraverseLeg>,
        /// Print as CSV with a Latitude,Longitude header
        #[arg(long)]
        csv: bool,
    },
    /// Validate point files before importing them
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Suggest the next free PINs in a parcel's block
    Suggest {
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        table: String,
        #[arg(long)]
        pin: String,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two comma separated numbers, got {:?}", s))?;
    let a = a.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let b = b.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok((a, b))
}

fn parse_start(s: &str) -> Result<Vertex, String> {
    parse_pair(s).map(|(lat, lon)| Vertex::from_lat_lon(lat, lon))
}

fn parse_leg(s: &str) -> Result<TraverseLeg, String> {
    let (distance, bearing) = parse_pair(s)?;
    let leg = TraverseLeg::new(distance, bearing);
    if !leg.is_finite() {
        return Err("distance and bearing must be finite".to_string());
    }
    Ok(leg)
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EditorConfig> {
    let config = match path {
        Some(path) => EditorConfig::from_ron_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EditorConfig::default(),
    };
    Ok(config.with_env_overrides())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    match args.cmd {
        Command::Traverse { start, legs, csv } => {
            let chain = geodesy::traverse(start, &legs);
            if csv {
                print!("{}", point_list::export_csv(&chain)?);
            } else {
                println!("{}", point_list::export_text(&chain));
            }
        }
        Command::Check { files } => {
            let checks = files.iter().map(|path| async move {
                let mut capture = PointListCapture::new();
                (path, capture.import_file(path).await)
            });

            let mut failed = 0;
            for (path, result) in join_all(checks).await {
                match result {
                    Ok(count) => println!("{}: {} points", path.display(), count),
                    Err(e) => {
                        failed += 1;
                        println!("{}: {}", path.display(), e);
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{} of {} files are not importable", failed, files.len());
            }
        }
        Command::Suggest {
            dataset,
            table,
            pin: base,
            count,
        } => {
            let config = load_config(args.config.as_ref())?;
            let service = HttpGeometryService::from_config(&config)?;
            let registry = LiveParcelRegistry::new(service, MapSurface::detached());

            let table = TableRef::new(dataset, table);
            registry.reload(&table).await?;
            tracing::info!("{} parcels loaded from {}", registry.len(), table);

            let existing = registry.identifiers();
            let suggestions =
                pin::suggest_sequence(&base, existing.iter().map(String::as_str), count)
                    .with_context(|| format!("{} is not a {}-part PIN", base, pin::PIN_SEGMENTS))?;
            for suggestion in suggestions {
                println!("{}", suggestion);
            }
        }
    }

    Ok(())
}
