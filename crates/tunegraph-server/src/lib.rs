use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tunegraph_core::{Recommendation, Recommender, Snapshot, TunegraphError};

pub const TRACK_URL_PREFIX: &str = "https://open.spotify.com/track/";
const TRACK_URL_LEN: usize = 53;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub listen: SocketAddr,
    /// Used by `/music` and when `/v1/recommendations` gets no `count`.
    pub default_count: usize,
    pub max_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
            default_count: 10,
            max_count: 100,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Unset variables fall back to the defaults; malformed ones are errors.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            data_dir: var("TUNEGRAPH_DATA")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            listen: parse_var(&var, "TUNEGRAPH_LISTEN", defaults.listen)?,
            default_count: parse_var(
                &var,
                "TUNEGRAPH_DEFAULT_COUNT",
                defaults.default_count,
            )?,
            max_count: parse_var(&var, "TUNEGRAPH_MAX_COUNT", defaults.max_count)?,
        })
    }
}

fn parse_var<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    not_found: AtomicU64,
    internal_errors: AtomicU64,
}

#[derive(Clone)]
pub struct AppState {
    recommender: Arc<Recommender>,
    default_count: usize,
    max_count: usize,
    counters: Arc<Counters>,
}

impl AppState {
    pub fn new(recommender: Arc<Recommender>, config: &ServerConfig) -> Self {
        Self {
            recommender,
            default_count: config.default_count,
            max_count: config.max_count.max(config.default_count),
            counters: Arc::new(Counters::default()),
        }
    }

    fn recommend(
        &self,
        track_id: &str,
        count: usize,
    ) -> Result<Vec<Recommendation>, TunegraphError> {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let out = self.recommender.get_recommendations(track_id, count);
        match &out {
            Err(e) if e.is_not_found() => {
                self.counters.not_found.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.counters.internal_errors.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {}
        }
        out
    }
}

/// Returns the track id (last `/` segment) of a well-formed track URL.
///
/// Length is counted in characters. The id may be empty, in which case the
/// lookup simply misses.
pub fn track_id_from_url(url: &str) -> Option<&str> {
    if url.chars().count() != TRACK_URL_LEN || !url.starts_with(TRACK_URL_PREFIX) {
        return None;
    }
    url.rsplit('/').next()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/music", get(music))
        .route("/v1/recommendations/:track_id", get(recommendations))
        .with_state(state)
}

pub async fn serve() -> anyhow::Result<()> {
    serve_with(ServerConfig::from_env()?).await
}

pub async fn serve_with(config: ServerConfig) -> anyhow::Result<()> {
    // the CLI may already have installed a subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let recommender = Arc::new(Snapshot::load(&config.data_dir)?);
    let app = build_router(AppState::new(recommender, &config));

    let listener = TcpListener::bind(config.listen).await?;
    tracing::info!(addr = %config.listen, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: T,
}

#[derive(Deserialize)]
struct MusicQuery {
    url: Option<String>,
}

#[derive(Deserialize)]
struct CountQuery {
    count: Option<usize>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MusicBody {
    Tracks(Vec<(String, String, f64)>),
    Message(&'static str),
}

#[derive(Serialize)]
struct MusicResponse {
    recommendations: MusicBody,
}

#[derive(Serialize)]
struct RecommendationOutput {
    name: String,
    track_id: String,
    index: u32,
    score: f64,
}

async fn health() -> &'static str {
    "ok"
}

/// Legacy endpoint: always 200, failures reported as a message string.
async fn music(
    State(state): State<AppState>,
    Query(q): Query<MusicQuery>,
) -> Json<MusicResponse> {
    let message = |m: &'static str| {
        Json(MusicResponse {
            recommendations: MusicBody::Message(m),
        })
    };
    let Some(url) = q.url else {
        return message("track not in database");
    };
    let Some(track_id) = track_id_from_url(&url) else {
        return message("invalid url");
    };
    match state.recommend(track_id, state.default_count) {
        Ok(recs) => Json(MusicResponse {
            recommendations: MusicBody::Tracks(
                recs.into_iter()
                    .map(|r| (r.display_name, r.external_id, r.weight))
                    .collect(),
            ),
        }),
        Err(e) => {
            if !e.is_not_found() {
                tracing::error!(track = %track_id, "recommendation failed: {e}");
            }
            message("track not in database")
        }
    }
}

async fn recommendations(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    Query(q): Query<CountQuery>,
) -> Result<Json<ApiResponse<Vec<RecommendationOutput>>>, ApiError> {
    let count = q.count.unwrap_or(state.default_count).min(state.max_count);
    let recs = state.recommend(&track_id, count).map_err(ApiError::from)?;
    let data = recs
        .into_iter()
        .map(|r| RecommendationOutput {
            name: r.display_name,
            track_id: r.external_id,
            index: r.index,
            score: r.weight,
        })
        .collect();
    Ok(Json(ApiResponse { ok: true, data }))
}

async fn metrics(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let c = &state.counters;
    let body = format!(
        "tunegraph_tracks {}\ntunegraph_edges {}\ntunegraph_requests_total {}\ntunegraph_not_found_total {}\ntunegraph_internal_errors_total {}\n",
        state.recommender.catalog().len(),
        state.recommender.graph().edge_count(),
        c.requests.load(Ordering::Relaxed),
        c.not_found.load(Ordering::Relaxed),
        c.internal_errors.load(Ordering::Relaxed),
    );
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        body,
    )
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<TunegraphError> for ApiError {
    fn from(value: TunegraphError) -> Self {
        match value {
            TunegraphError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        match self {
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{what} not found")).into_response()
            }
            ApiError::Internal(err) => {
                tracing::error!("api_error" = %err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
