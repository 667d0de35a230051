use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::{debug, warn};
use tracing_subscriber::EnvFilter;
use tzmap::{
  AnnotationEngine,
  config::Config,
  engine::{
    Theme,
    terminator::{DEFAULT_STEP, night_style, terminator_polygon},
    view_state,
  },
  map::{coordinates::WGS84Coordinate, geometry_collection::Geometry, surface::LayerStore},
  parser::{CoordinateParser, GeoJsonParser},
  preferences::{FileStore, KeyValueStore, MemoryStore},
  remote::{self, Remote},
  timezone::{BoundaryDirectory, TimePanel, TimezoneResolver, TzfResolver},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Prints the current time of every timezone at a point, e.g. "40.7128, -74.0060".
  At {
    #[arg(allow_hyphen_values = true)]
    coordinates: String,
  },
  /// Prints the night side of the earth as a GeoJSON feature.
  Terminator {
    /// Point in time in RFC 3339. Defaults to now.
    #[arg(long)]
    at: Option<DateTime<Utc>>,
    /// Longitude step of the boundary in degrees.
    #[arg(long, default_value_t = DEFAULT_STEP)]
    step: f64,
  },
  /// Prints the query string of a shared map.
  Share {
    /// A marker position, may be repeated.
    #[arg(short, long, allow_hyphen_values = true)]
    marker: Vec<String>,
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    lng: Option<f64>,
    #[arg(long)]
    zoom: Option<u8>,
    #[arg(long)]
    show_index: bool,
  },
  /// Prints the state encoded in a query string as JSON.
  Decode {
    #[arg(allow_hyphen_values = true)]
    query: String,
  },
  /// Runs the engine behind an HTTP api.
  Serve {
    /// Defaults to the configured port.
    #[arg(short, long)]
    port: Option<u16>,
    /// Query string to restore markers and view from.
    #[arg(short, long)]
    query: Option<String>,
  },
}

fn parse_position(parser: &CoordinateParser, text: &str) -> Result<WGS84Coordinate> {
  parser
    .parse(text)
    .with_context(|| format!("Cannot read coordinates from '{text}'"))
}

fn print_time_panel(text: &str) -> Result<()> {
  let position = parse_position(&CoordinateParser::new(), text)?;
  let resolver = TzfResolver::default();
  let zones = resolver.resolve_timezones(position.lon, position.lat);
  if zones.is_empty() {
    bail!("No timezone found for {}, {}", position.lat, position.lon);
  }
  debug!("{} covered by {zones:?}", text.trim());

  let panel = TimePanel::new(position.rounded(), &zones);
  let position = panel.position();
  println!("{:.4}, {:.4}", position.lat, position.lon);
  for row in panel.rows(Utc::now()) {
    println!("{}  {}", row.time, row.name);
  }
  Ok(())
}

fn print_terminator(at: Option<DateTime<Utc>>, step: f64) -> Result<()> {
  let time = at.unwrap_or_else(Utc::now);
  let ring = terminator_polygon(time, step);
  if ring.is_empty() {
    warn!("The sun is over the equator at {time}, there is no night polygon.");
  }
  let feature = GeoJsonParser::to_feature(
    "terminator",
    &Geometry::polygon(ring),
    &night_style(Theme::default()),
  );
  println!("{}", serde_json::to_string_pretty(&feature)?);
  Ok(())
}

fn print_share(
  markers: &[String],
  lat: Option<f64>,
  lng: Option<f64>,
  zoom: Option<u8>,
  show_index: bool,
) -> Result<()> {
  let parser = CoordinateParser::new();
  let markers = markers
    .iter()
    .map(|m| parse_position(&parser, m).map(|p| p.rounded()))
    .collect::<Result<Vec<_>>>()?;
  let center = lat.zip(lng).map(|(lat, lng)| WGS84Coordinate::new(lat, lng));
  println!("{}", view_state::encode(&markers, center, zoom, show_index));
  Ok(())
}

async fn serve(port: Option<u16>, query: Option<String>) -> Result<()> {
  tracing_subscriber::fmt()
    .with_target(false)
    .with_env_filter(EnvFilter::from_default_env())
    .compact()
    .init();

  let config = Config::new();
  let port = port.unwrap_or(config.port());
  let store: Arc<dyn KeyValueStore> = match config.preferences_path() {
    Some(path) => Arc::new(FileStore::open(path)),
    None => Arc::new(MemoryStore::new()),
  };
  let detail = config.boundary_dir.clone().map(BoundaryDirectory::new);
  let index = config.index_dir.clone().map(BoundaryDirectory::new);

  let layers = Arc::new(LayerStore::new());
  let (engine, mut events) = AnnotationEngine::new(layers.clone(), store, config);
  let engine = Arc::new(engine);

  tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      tracing::debug!("{event:?}");
    }
  });

  // The boundary finder takes a moment to build.
  let resolver = tokio::task::spawn_blocking(move || TzfResolver::new(detail, index)).await?;
  engine.attach_resolver(Arc::new(resolver));

  if let Some(query) = query {
    let restored = engine.restore(&query).await;
    tracing::info!("Restored {} markers.", restored.len());
  }

  remote::serve(Remote { engine, layers }, port).await
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  if !matches!(args.command, Command::Serve { .. }) {
    env_logger::init();
  }

  match args.command {
    Command::At { coordinates } => print_time_panel(&coordinates),
    Command::Terminator { at, step } => print_terminator(at, step),
    Command::Share {
      marker,
      lat,
      lng,
      zoom,
      show_index,
    } => print_share(&marker, lat, lng, zoom, show_index),
    Command::Decode { query } => {
      let state = view_state::decode(&query);
      println!("{}", serde_json::to_string_pretty(&state)?);
      Ok(())
    }
    Command::Serve { port, query } => serve(port, query).await,
  }
}
