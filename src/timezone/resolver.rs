use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use tzf_rs::DefaultFinder;

use crate::{
  engine::{AnnotationError, GeometryKind},
  map::geometry_collection::Geometry,
  parser::GeoJsonParser,
};

/// Answers which timezones cover a point and what their boundaries look like.
#[async_trait]
pub trait TimezoneResolver: Send + Sync {
  /// All timezone identifiers covering the point, most specific first.
  fn resolve_timezones(&self, lng: f64, lat: f64) -> Vec<String>;

  /// Precise boundary of `timezone`, `None` if there is none.
  async fn detail_geometry(&self, timezone: &str) -> Result<Option<Geometry>>;

  /// Coarse index geometry of `timezone`, `None` if there is none.
  async fn index_geometry(&self, timezone: &str) -> Result<Option<Geometry>>;

  /// Revision of the boundary data.
  fn data_version(&self) -> String;

  async fn geometry(&self, timezone: &str, kind: GeometryKind) -> Result<Option<Geometry>> {
    match kind {
      GeometryKind::Detail => self.detail_geometry(timezone).await,
      GeometryKind::Index => self.index_geometry(timezone).await,
    }
  }
}

/// A directory holding one `GeoJSON` file per timezone.
///
/// Files are named after the zone with `/` replaced by `-`, e.g. `America-New_York.geojson`.
#[derive(Debug, Clone)]
pub struct BoundaryDirectory {
  path: PathBuf,
}

impl BoundaryDirectory {
  #[must_use]
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  #[must_use]
  pub fn path(&self) -> &Path {
    &self.path
  }

  #[must_use]
  pub fn file_for(&self, timezone: &str) -> PathBuf {
    self
      .path
      .join(format!("{}.geojson", timezone.replace('/', "-")))
  }

  /// Reads the geometry of `timezone`. A missing file is not an error.
  pub async fn load(&self, timezone: &str) -> Result<Option<Geometry>> {
    let file = self.file_for(timezone);
    if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
      debug!("No boundary file {}", file.display());
      return Ok(None);
    }
    let data = tokio::fs::read_to_string(&file)
      .await
      .with_context(|| format!("reading {}", file.display()))?;
    let geometry = GeoJsonParser::parse_str(&data)
      .with_context(|| format!("parsing {}", file.display()))?;
    Ok(Some(geometry.with_label(timezone.to_string())))
  }
}

/// Resolver backed by the `tzf-rs` finder and optional boundary directories.
pub struct TzfResolver {
  finder: DefaultFinder,
  detail: Option<BoundaryDirectory>,
  index: Option<BoundaryDirectory>,
}

impl Default for TzfResolver {
  fn default() -> Self {
    Self::new(None, None)
  }
}

impl TzfResolver {
  #[must_use]
  pub fn new(detail: Option<BoundaryDirectory>, index: Option<BoundaryDirectory>) -> Self {
    Self {
      finder: DefaultFinder::new(),
      detail,
      index,
    }
  }

  async fn load(
    directory: Option<&BoundaryDirectory>,
    timezone: &str,
    kind: GeometryKind,
  ) -> Result<Option<Geometry>> {
    let Some(directory) = directory else {
      return Ok(None);
    };
    directory.load(timezone).await.map_err(|e| {
      AnnotationError::GeometryFetchFailed {
        timezone: timezone.to_string(),
        kind,
        reason: format!("{e:#}"),
      }
      .into()
    })
  }
}

#[async_trait]
impl TimezoneResolver for TzfResolver {
  fn resolve_timezones(&self, lng: f64, lat: f64) -> Vec<String> {
    self
      .finder
      .get_tz_names(lng, lat)
      .into_iter()
      .filter(|tz| !tz.is_empty())
      .map(String::from)
      .collect()
  }

  async fn detail_geometry(&self, timezone: &str) -> Result<Option<Geometry>> {
    Self::load(self.detail.as_ref(), timezone, GeometryKind::Detail).await
  }

  async fn index_geometry(&self, timezone: &str) -> Result<Option<Geometry>> {
    Self::load(self.index.as_ref(), timezone, GeometryKind::Index).await
  }

  fn data_version(&self) -> String {
    self.finder.data_version().to_string()
  }
}
