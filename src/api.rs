//! HTTP surface: thin adapters around the fetch pipeline, the genre
//! classifier, and the blend engine. The two reader pipelines for a blend run
//! concurrently; the engine itself is invoked once both are complete.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::blend::{self, Book, HotReloadBlendConfig, ReaderProfile, ScoreComponents};
use crate::classify::{build_classifier, DynGenreClassifier};
use crate::fetch::providers::GoodreadsRssProvider;
use crate::fetch::types::{Shelf, ShelfProvider};
use crate::genres::{GenreProfile, MAX_SHARED_GENRES};

/// Env var holding the expected `X-API-Key` value; unset disables the gate.
pub const ENV_API_KEY: &str = "BOOKBLEND_API_KEY";

#[derive(Clone)]
pub struct AppState {
    pub shelves: Arc<dyn ShelfProvider>,
    pub classifier: DynGenreClassifier,
    pub blend_config: Arc<HotReloadBlendConfig>,
}

impl AppState {
    /// Production wiring: Goodreads feed, classifier per `config/ai.json`,
    /// hot-reloaded blend weights.
    pub fn from_env() -> Self {
        Self::with_parts(
            Arc::new(GoodreadsRssProvider::from_env()),
            build_classifier(),
        )
    }

    /// Explicit wiring for tests and alternative providers.
    pub fn with_parts(shelves: Arc<dyn ShelfProvider>, classifier: DynGenreClassifier) -> Self {
        Self {
            shelves,
            classifier,
            blend_config: Arc::new(HotReloadBlendConfig::new(None)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/books", get(books))
        .route("/blend", get(blend_pair))
        .route_layer(middleware::from_fn(require_api_key))
        .route("/health", get(|| async { "OK" }))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// When $BOOKBLEND_API_KEY is set, data endpoints require a matching
/// `X-API-Key` header. Health and metrics stay open.
async fn require_api_key(req: Request, next: Next) -> Response {
    let expected = std::env::var(ENV_API_KEY).ok().filter(|k| !k.is_empty());
    let Some(expected) = expected else {
        return next.run(req).await;
    };
    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|h| h.to_str().ok());
    if provided == Some(expected.as_str()) {
        next.run(req).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid API key" })),
        )
            .into_response()
    }
}

/// Upstream failures (feed unreachable, reader not found) map to 502; the
/// engine itself has no failure mode.
struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = ?self.0, "upstream failure");
        (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

#[derive(Deserialize)]
struct BooksQuery {
    user_id: String,
    #[serde(default)]
    shelf: Option<String>,
}

#[derive(Deserialize)]
struct BlendQuery {
    user_id1: String,
    user_id2: String,
    #[serde(default)]
    shelf: Option<String>,
}

#[derive(Serialize)]
struct GenreBreakdown {
    user1: Vec<&'static str>,
    user2: Vec<&'static str>,
    shared: Vec<&'static str>,
}

#[derive(Serialize)]
struct BlendResponse {
    score: f32,
    score_raw: f32,
    components: ScoreComponents,
    genres: GenreBreakdown,
}

fn parse_shelf(raw: &Option<String>) -> Shelf {
    raw.as_deref()
        .unwrap_or("all")
        .parse()
        .unwrap_or(Shelf::All)
}

/// Display order for book lists: in-progress first, then queued, then read.
fn shelf_rank(book: &Book) -> usize {
    ["currently-reading", "to-read", "read"]
        .iter()
        .position(|s| book.shelves.contains(*s))
        .unwrap_or(3)
}

/// Fetch + normalize one reader's shelf.
async fn fetch_profile(
    state: &AppState,
    reader_id: &str,
    shelf: &Shelf,
) -> anyhow::Result<ReaderProfile> {
    let records = state.shelves.fetch_shelf(reader_id, shelf).await?;
    let profile = ReaderProfile::from_records(records);
    if profile.dropped_records > 0 {
        counter!("fetch_dropped_total").increment(profile.dropped_records as u64);
        tracing::warn!(
            reader_id,
            dropped = profile.dropped_records,
            "dropped records without a book id"
        );
    }
    Ok(profile)
}

/// Fetch + normalize + classify one reader.
async fn reader_pipeline(
    state: &AppState,
    reader_id: &str,
    shelf: &Shelf,
) -> anyhow::Result<(ReaderProfile, GenreProfile)> {
    let profile = fetch_profile(state, reader_id, shelf).await?;
    let read_lines: Vec<String> = profile
        .read_books()
        .map(|b| format!("{} by {}", b.title, b.author_name))
        .collect();
    let genres = match state.classifier.classify(reader_id, &read_lines).await {
        Some(classified) => GenreProfile::from_labels(classified.labels),
        None => GenreProfile::default(),
    };
    Ok((profile, genres))
}

async fn books(
    State(state): State<AppState>,
    Query(q): Query<BooksQuery>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let shelf = parse_shelf(&q.shelf);
    let profile = fetch_profile(&state, &q.user_id, &shelf).await?;
    let mut books: Vec<Book> = profile.books.into_values().collect();
    books.sort_by_key(shelf_rank);
    Ok(Json(books))
}

async fn blend_pair(
    State(state): State<AppState>,
    Query(q): Query<BlendQuery>,
) -> Result<Json<BlendResponse>, ApiError> {
    let shelf = parse_shelf(&q.shelf);

    // Both fetch+classify pipelines run concurrently; the engine runs once
    // both sides are in.
    let ((profile_a, genres_a), (profile_b, genres_b)) = tokio::try_join!(
        reader_pipeline(&state, &q.user_id1, &shelf),
        reader_pipeline(&state, &q.user_id2, &shelf),
    )?;

    let config = state.blend_config.current();
    let result = blend::compute_blend_with(&profile_a, &profile_b, &genres_a, &genres_b, &config);
    counter!("blend_requests_total").increment(1);

    let mut shared = genres_a.shared_with(&genres_b);
    shared.truncate(MAX_SHARED_GENRES);

    Ok(Json(BlendResponse {
        score: result.score,
        score_raw: result.score_raw,
        components: result.components,
        genres: GenreBreakdown {
            user1: genres_a.labels().to_vec(),
            user2: genres_b.labels().to_vec(),
            shared,
        },
    }))
}
