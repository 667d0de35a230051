use std::{net::SocketAddr, sync::Arc};

use axum::{
  Json, Router,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::{self, TraceLayer};

use crate::{
  engine::{
    AnnotationEngine, AnnotationError, EngineStatus, MarkerId, MarkerInfo, ThemeMode,
    terminator::{DEFAULT_STEP, SolarPosition, night_style, terminator_polygon},
  },
  map::{
    coordinates::WGS84Coordinate,
    geometry_collection::Geometry,
    surface::LayerStore,
  },
  parser::{CoordinateParser, GeoJsonParser},
  timezone::TimeRow,
};

/// Shared state of all handlers.
#[derive(Clone)]
pub struct Remote {
  pub engine: Arc<AnnotationEngine>,
  pub layers: Arc<LayerStore>,
}

/// An error answered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError(pub StatusCode, pub String);

impl From<AnnotationError> for ApiError {
  fn from(err: AnnotationError) -> Self {
    let status = match &err {
      AnnotationError::InvalidCoordinate { .. } => StatusCode::BAD_REQUEST,
      AnnotationError::NoTimezoneFound { .. } | AnnotationError::UnknownMarker(_) => {
        StatusCode::NOT_FOUND
      }
      AnnotationError::ResolverUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      AnnotationError::GeometryFetchFailed { .. } | AnnotationError::MalformedViewState(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    Self(status, err.to_string())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.0, Json(json!({"error": self.1}))).into_response()
  }
}

/// A marker given as a position or as free text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MarkerRequest {
  Position(WGS84Coordinate),
  Text { text: String },
}

#[derive(Debug, Serialize)]
pub struct PanelResponse {
  pub id: MarkerId,
  pub rows: Vec<TimeRow>,
  pub html: String,
}

#[derive(Debug, Deserialize)]
pub struct TerminatorQuery {
  pub at: Option<DateTime<Utc>>,
  pub step: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ThemeRequest {
  pub theme: String,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
  pub enabled: bool,
}

async fn healthcheck() {}

async fn status(State(remote): State<Remote>) -> Json<EngineStatus> {
  Json(remote.engine.status())
}

async fn list_markers(State(remote): State<Remote>) -> Json<Vec<MarkerInfo>> {
  Json(remote.engine.markers())
}

async fn add_marker(
  State(remote): State<Remote>,
  Json(request): Json<MarkerRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
  let position = match request {
    MarkerRequest::Position(position) => position,
    MarkerRequest::Text { text } => CoordinateParser::new().parse(&text).ok_or_else(|| {
      ApiError(
        StatusCode::BAD_REQUEST,
        format!("Cannot read coordinates from '{text}'"),
      )
    })?,
  };
  let id = remote.engine.add_marker(position.lat, position.lon).await?;
  let marker = remote.engine.markers().into_iter().find(|m| m.id == id);
  Ok((StatusCode::CREATED, Json(json!(marker))))
}

async fn clear_markers(State(remote): State<Remote>) -> StatusCode {
  remote.engine.clear_all();
  StatusCode::NO_CONTENT
}

async fn remove_last(State(remote): State<Remote>) -> Result<Json<MarkerInfo>, ApiError> {
  remote
    .engine
    .remove_last()
    .map(Json)
    .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "No markers placed".to_string()))
}

async fn remove_marker(
  State(remote): State<Remote>,
  Path(id): Path<u64>,
) -> Result<Json<MarkerInfo>, ApiError> {
  Ok(Json(remote.engine.remove_marker(MarkerId(id))?))
}

async fn marker_panel(
  State(remote): State<Remote>,
  Path(id): Path<u64>,
) -> Result<Json<PanelResponse>, ApiError> {
  let id = MarkerId(id);
  let panel = remote
    .engine
    .time_panel(id)
    .ok_or(AnnotationError::UnknownMarker(id))?;
  let now = Utc::now();
  Ok(Json(PanelResponse {
    id,
    rows: panel.rows(now),
    html: panel.html(now),
  }))
}

async fn layers(State(remote): State<Remote>) -> Json<Value> {
  let features = remote
    .layers
    .layers()
    .iter()
    .map(|l| GeoJsonParser::to_feature(&l.id.to_string(), &l.geometry, &l.style))
    .collect();
  Json(GeoJsonParser::to_feature_collection(features))
}

async fn terminator(
  State(remote): State<Remote>,
  Query(query): Query<TerminatorQuery>,
) -> Json<Value> {
  let time = query.at.unwrap_or_else(Utc::now);
  let sun = SolarPosition::at(time);
  let ring = terminator_polygon(time, query.step.unwrap_or(DEFAULT_STEP));
  let mut feature = GeoJsonParser::to_feature(
    "terminator",
    &Geometry::polygon(ring),
    &night_style(remote.engine.layers().theme()),
  );
  feature["properties"]["time"] = json!(time.to_rfc3339());
  feature["properties"]["subsolar"] = json!(sun.subsolar);
  feature["properties"]["declination"] = json!(sun.declination);
  Json(feature)
}

async fn share(State(remote): State<Remote>) -> String {
  remote.engine.shareable_url()
}

async fn set_theme(
  State(remote): State<Remote>,
  Json(request): Json<ThemeRequest>,
) -> Result<Json<EngineStatus>, ApiError> {
  let mode: ThemeMode = request
    .theme
    .parse()
    .map_err(|e| ApiError(StatusCode::BAD_REQUEST, e))?;
  remote.engine.set_theme(mode);
  Ok(Json(remote.engine.status()))
}

async fn set_index_layers(
  State(remote): State<Remote>,
  Json(request): Json<ToggleRequest>,
) -> Json<EngineStatus> {
  remote.engine.set_index_layers(request.enabled);
  Json(remote.engine.status())
}

async fn set_sun_illumination(
  State(remote): State<Remote>,
  Json(request): Json<ToggleRequest>,
) -> Json<EngineStatus> {
  remote.engine.set_sun_illumination(request.enabled);
  Json(remote.engine.status())
}

/// All routes with request tracing.
pub fn router(remote: Remote) -> Router {
  Router::new()
    .route("/healthcheck", get(healthcheck))
    .route("/status", get(status))
    .route(
      "/markers",
      get(list_markers).post(add_marker).delete(clear_markers),
    )
    .route("/markers/last", delete(remove_last))
    .route("/markers/{id}", delete(remove_marker))
    .route("/markers/{id}/panel", get(marker_panel))
    .route("/layers", get(layers))
    .route("/terminator", get(terminator))
    .route("/share", get(share))
    .route("/theme", post(set_theme))
    .route("/index-layers", post(set_index_layers))
    .route("/sun-illumination", post(set_sun_illumination))
    .with_state(remote)
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(trace::DefaultOnResponse::new().level(tracing::Level::INFO)),
    )
}

async fn shutdown_signal() {
  let ctrl_c = async {
    let _ = tokio::signal::ctrl_c()
      .await
      .inspect_err(|e| tracing::error!("Failed to install Ctrl+C handler: {e}"));
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        tracing::error!("Failed to install signal handler: {e}");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
      () = ctrl_c => {},
      () = terminate => {},
  }
  tracing::info!("Shutting down.");
}

/// Serves the map backend on localhost until interrupted.
pub async fn serve(remote: Remote, port: u16) -> anyhow::Result<()> {
  let addr = SocketAddr::from(([127, 0, 0, 1], port));
  let listener = tokio::net::TcpListener::bind(addr).await?;
  tracing::info!("Listening on {addr}");
  axum::serve(listener, router(remote))
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::Config,
    map::surface::LayerId,
    preferences::MemoryStore,
    timezone::TimezoneResolver,
  };
  use async_trait::async_trait;

  struct FixedResolver;

  #[async_trait]
  impl TimezoneResolver for FixedResolver {
    fn resolve_timezones(&self, lng: f64, _lat: f64) -> Vec<String> {
      if lng < 0.0 {
        vec!["America/New_York".to_string()]
      } else {
        vec![]
      }
    }

    async fn detail_geometry(&self, _timezone: &str) -> anyhow::Result<Option<Geometry>> {
      Ok(Some(Geometry::point(WGS84Coordinate::new(40.0, -74.0))))
    }

    async fn index_geometry(&self, _timezone: &str) -> anyhow::Result<Option<Geometry>> {
      Ok(None)
    }

    fn data_version(&self) -> String {
      "2025b".to_string()
    }
  }

  fn remote(with_resolver: bool) -> Remote {
    let layers = Arc::new(LayerStore::new());
    let (engine, _events) = AnnotationEngine::new(
      layers.clone(),
      Arc::new(MemoryStore::with_values([("showSunIllumination", "false")])),
      Config::default(),
    );
    if with_resolver {
      engine.attach_resolver(Arc::new(FixedResolver));
    }
    Remote {
      engine: Arc::new(engine),
      layers,
    }
  }

  fn position(lat: f64, lng: f64) -> Json<MarkerRequest> {
    Json(MarkerRequest::Position(WGS84Coordinate::new(lat, lng)))
  }

  #[tokio::test]
  async fn errors_map_to_status_codes() {
    let err = add_marker(State(remote(false)), position(40.0, -74.0))
      .await
      .unwrap_err();
    assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);

    let remote = remote(true);
    let err = add_marker(State(remote.clone()), position(95.0, -74.0))
      .await
      .unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
    let err = add_marker(State(remote.clone()), position(40.0, 74.0))
      .await
      .unwrap_err();
    assert_eq!(err.0, StatusCode::NOT_FOUND);
    let err = remove_marker(State(remote), Path(99)).await.unwrap_err();
    assert_eq!(err.0, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn marker_roundtrip() {
    let remote = remote(true);
    let request = Json(MarkerRequest::Text {
      text: "40.7128, -74.0060".to_string(),
    });
    let (status, Json(body)) = add_marker(State(remote.clone()), request).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);

    let Json(panel) = marker_panel(State(remote.clone()), Path(1)).await.unwrap();
    assert_eq!(panel.rows.len(), 2);

    let Json(collection) = layers(State(remote.clone())).await;
    let ids: Vec<_> = collection["features"]
      .as_array()
      .unwrap()
      .iter()
      .map(|f| f["properties"]["id"].clone())
      .collect();
    assert!(ids.contains(&json!(LayerId::Detail("America/New_York".to_string()).to_string())));

    let Json(removed) = remove_last(State(remote.clone())).await.unwrap();
    assert_eq!(removed.id, MarkerId(1));
    assert!(remote.layers.layers().is_empty());
    assert!(remove_last(State(remote)).await.is_err());
  }

  #[tokio::test]
  async fn theme_and_status() {
    let remote = remote(true);
    let Json(status) = set_theme(
      State(remote.clone()),
      Json(ThemeRequest {
        theme: "high-contrast".to_string(),
      }),
    )
    .await
    .unwrap();
    assert_eq!(status.theme, crate::engine::Theme::HighContrast);
    assert_eq!(status.data_version.as_deref(), Some("2025b"));

    let err = set_theme(
      State(remote),
      Json(ThemeRequest {
        theme: "sepia".to_string(),
      }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn terminator_feature() {
    let query = TerminatorQuery {
      at: Some("2024-06-21T12:00:00Z".parse().unwrap()),
      step: Some(1.0),
    };
    let Json(feature) = terminator(State(remote(false)), Query(query)).await;
    let ring = feature["geometry"]["coordinates"][0].as_array().unwrap();
    assert_eq!(ring.len(), 725);
    assert_eq!(ring.first(), ring.last());
  }
}
