use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use riskroute::refresh::{refresh_today, ModelError};
use riskroute::risk::RiskError;

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("{0}: {1}")]
    RiskTable(PathBuf, #[source] RiskError),

    #[error("{0}: {1}")]
    Model(PathBuf, #[source] ModelError),
}

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a risk-annotated route between two addresses
    Route(RouteArgs),

    /// Re-predict the risk levels of today's rows of the risk table
    Refresh(RefreshArgs),
}

#[derive(Args)]
struct RouteArgs {
    /// Start address
    start: String,

    /// End address
    end: String,

    /// The path to the OSM file (XML, optionally gzip or bzip2 compressed)
    #[arg(long, env = "RISKROUTE_OSM", required_unless_present = "overpass_bbox")]
    osm: Option<PathBuf>,

    /// Download roads within "min_lon,min_lat,max_lon,max_lat" from an Overpass API instance
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true, conflicts_with = "osm")]
    overpass_bbox: Option<[f64; 4]>,

    #[arg(
        long,
        env = "RISKROUTE_OVERPASS_URL",
        default_value = riskroute::OverpassSource::DEFAULT_URL
    )]
    overpass_url: String,

    /// Name of the region covered by the road network
    #[arg(long, default_value = "Breda, Netherlands")]
    region: String,

    /// The path to the risk table CSV file
    #[arg(long, env = "RISKROUTE_RISK_TABLE", default_value = "model_data.csv")]
    risk_table: PathBuf,

    /// Refresh today's predictions with this model before planning the route
    #[arg(long, env = "RISKROUTE_MODEL")]
    model: Option<PathBuf>,

    #[arg(
        long,
        env = "RISKROUTE_NOMINATIM_URL",
        default_value = "https://nominatim.openstreetmap.org"
    )]
    nominatim_url: String,

    /// Timeout of external requests, in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Initial zoom level of the map
    #[arg(long, default_value_t = riskroute::DEFAULT_ZOOM)]
    zoom: u8,

    /// Write the route map as a standalone HTML page
    #[arg(long)]
    map_html: Option<PathBuf>,

    /// Write the route map as GeoJSON
    #[arg(long)]
    geojson: Option<PathBuf>,
}

#[derive(Args)]
struct RefreshArgs {
    /// The path to the risk table CSV file
    #[arg(long, env = "RISKROUTE_RISK_TABLE", default_value = "model_data.csv")]
    risk_table: PathBuf,

    /// The path to the JSON risk model
    #[arg(long, env = "RISKROUTE_MODEL")]
    model: PathBuf,

    /// Where to write the refreshed table, the input table by default
    #[arg(long)]
    output: Option<PathBuf>,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Route(args) => plan_route(args),
        Command::Refresh(args) => refresh_table(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = colog::default_builder();
    builder.filter(None, level);
    builder.parse_default_env();
    builder.init();
}

fn plan_route(args: RouteArgs) -> Result<(), Box<dyn Error>> {
    let timeout = Duration::from_secs(args.timeout);

    let geocoder = riskroute::NominatimGeocoder::new(riskroute::NominatimConfig {
        base_url: args.nominatim_url,
        timeout_secs: args.timeout,
        ..Default::default()
    })?;

    let source: Box<dyn riskroute::GraphSource> = match (args.osm, args.overpass_bbox) {
        (_, Some(bbox)) => Box::new(riskroute::OverpassSource::new(
            args.overpass_url,
            bbox,
            timeout,
        )?),
        (Some(path), None) => Box::new(riskroute::OsmFileSource::new(
            path,
            riskroute::osm::FileFormat::Unknown,
        )),
        (None, None) => return Err("either --osm or --overpass-bbox is required".into()),
    };

    let network = riskroute::NetworkProvider::new(
        riskroute::Region::new(args.region),
        source,
        Duration::from_secs(3600),
    );
    let risk = riskroute::RiskStore::new(load_risk_table(&args.risk_table)?);

    // A failed refresh only means stale risk levels, the route is still worth showing
    if let Some(model_path) = &args.model {
        let model = load_model(model_path)
            .map_err(|e| log::error!("{}", e))
            .ok();
        let model = model.as_ref().map(|m| m as &dyn riskroute::RiskModel);
        match refresh_today(&risk, model) {
            Ok(summary) => log::info!(
                "Updated {} predictions for {}",
                summary.updated_rows,
                summary.date
            ),
            Err(e) => log::error!("Failed to refresh predictions: {}", e),
        }
    }

    let planner = riskroute::RoutePlanner::new(
        Box::new(riskroute::CachingGeocoder::new(geocoder)),
        network,
        risk,
        riskroute::PlannerConfig::default(),
    );
    let route = planner.plan_route(&args.start, &args.end)?;

    for line in route.summary_lines() {
        println!("{}", line);
    }

    let map = riskroute::render_route(&route, args.zoom);
    if let Some(path) = &args.map_html {
        std::fs::write(path, map.to_html())?;
        log::info!("Map written to {}", path.display());
    }
    if let Some(path) = &args.geojson {
        std::fs::write(path, serde_json::to_string_pretty(&map.to_geojson())?)?;
        log::info!("GeoJSON written to {}", path.display());
    }

    Ok(())
}

fn refresh_table(args: RefreshArgs) -> Result<(), Box<dyn Error>> {
    let store = riskroute::RiskStore::new(load_risk_table(&args.risk_table)?);
    let model = load_model(&args.model)?;
    let summary = refresh_today(&store, Some(&model))?;
    println!(
        "Updated {} predictions for {}",
        summary.updated_rows, summary.date
    );

    let output = args.output.as_ref().unwrap_or(&args.risk_table);
    store
        .snapshot()
        .write_to_path(output)
        .map_err(|e| LoadError::RiskTable(output.clone(), e))?;
    Ok(())
}

fn load_risk_table<P: AsRef<Path>>(path: P) -> Result<riskroute::RiskTable, LoadError> {
    riskroute::RiskTable::from_path(path.as_ref())
        .map_err(|e| LoadError::RiskTable(PathBuf::from(path.as_ref()), e))
}

fn load_model<P: AsRef<Path>>(path: P) -> Result<riskroute::LogisticModel, LoadError> {
    riskroute::LogisticModel::from_path(path.as_ref())
        .map_err(|e| LoadError::Model(PathBuf::from(path.as_ref()), e))
}

fn parse_bbox(s: &str) -> Result<[f64; 4], String> {
    let values = s
        .split(',')
        .map(|x| {
            x.trim()
                .parse::<f64>()
                .map_err(|e| format!("{:?}: {}", x, e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| {
            format!("expected 4 comma-separated numbers, got {}", v.len())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn refresh_is_always_for_today() {
        let args = ["riskroute", "refresh", "--model", "model.json"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(cli.command, Command::Refresh(_)));

        let backfill = Cli::try_parse_from([
            "riskroute",
            "refresh",
            "--model",
            "model.json",
            "--date",
            "2020-01-01",
        ]);
        assert!(backfill.is_err());
    }

    #[test]
    fn route_bbox() {
        let cli = Cli::try_parse_from([
            "riskroute",
            "route",
            "Grote Markt",
            "Havermarkt",
            "--overpass-bbox",
            "-0.5,51.55,4.85,51.62",
        ])
        .unwrap();
        let Command::Route(args) = cli.command else {
            panic!("expected the route command");
        };
        assert_eq!(args.overpass_bbox, Some([-0.5, 51.55, 4.85, 51.62]));
        assert!(parse_bbox("1,2,3").is_err());
    }
}
