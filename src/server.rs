//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/categories` | Category registry listing |
//! | `GET`  | `/context?client_id=` | List a client's entries |
//! | `POST` | `/context` | Create an entry |
//! | `GET`  | `/context/{id}` | Fetch one entry |
//! | `PATCH` | `/context/{id}` | Edit an entry |
//! | `POST` | `/context/{id}/supersede` | Retire an entry in favor of another |
//! | `GET`  | `/context/active?client_id=&date=` | Context active on a date |
//! | `POST` | `/context/explain` | Entries explaining a period-over-period change |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "title must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the dashboard can call
//! the API from the browser.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use context_relevance_core::models::{
    ContextEntry, DateInterval, EntryError, EntryPatch, NewContextEntry,
};
use context_relevance_core::registry::{CategoryDescriptor, CategoryRegistry};
use context_relevance_core::store::{ContextStore, StoreError};

use crate::config::Config;
use crate::entries::{create_entry, edit_entry, supersede_entry};
use crate::report::{self, ActiveContext, ComparisonReport};
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ContextStore>,
    registry: Arc<CategoryRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn ContextStore>, registry: CategoryRegistry) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
        }
    }
}

/// Build the router over `state`. Exposed separately from [`run_server`]
/// so tests can drive it without binding a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/categories", get(handle_categories))
        .route("/context", get(handle_list).post(handle_create))
        .route("/context/active", get(handle_active))
        .route("/context/explain", post(handle_explain))
        .route("/context/{id}", get(handle_get).patch(handle_edit))
        .route("/context/{id}/supersede", post(handle_supersede))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let registry = config.registry()?;
    let store = SqliteStore::open(config).await?;
    let app = router(AppState::new(Arc::new(store), registry));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Classify store and validation failures; anything else is a 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(store_err) = err.downcast_ref::<StoreError>() {
            return match store_err {
                StoreError::NotFound(_) => not_found(store_err.to_string()),
                _ => bad_request(store_err.to_string()),
            };
        }
        if let Some(entry_err) = err.downcast_ref::<EntryError>() {
            return bad_request(entry_err.to_string());
        }
        tracing::error!(error = %format!("{:#}", err), "request failed");
        internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn require_client(client_id: &str) -> Result<(), AppError> {
    if client_id.trim().is_empty() {
        return Err(bad_request("client_id must not be empty"));
    }
    Ok(())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /categories ============

#[derive(Serialize)]
struct CategoryInfo {
    key: String,
    #[serde(flatten)]
    descriptor: CategoryDescriptor,
}

#[derive(Serialize)]
struct CategoryListResponse {
    categories: Vec<CategoryInfo>,
}

async fn handle_categories(State(state): State<AppState>) -> Json<CategoryListResponse> {
    let categories = state
        .registry
        .categories()
        .into_iter()
        .map(|(key, descriptor)| CategoryInfo {
            key: key.to_string(),
            descriptor: descriptor.clone(),
        })
        .collect();
    Json(CategoryListResponse { categories })
}

// ============ /context ============

#[derive(Deserialize)]
struct ListQuery {
    client_id: String,
    #[serde(default)]
    include_superseded: bool,
}

#[derive(Serialize)]
struct EntryListResponse {
    entries: Vec<ContextEntry>,
}

async fn handle_list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<EntryListResponse>, AppError> {
    let Query(query) = query?;
    require_client(&query.client_id)?;

    let entries = state
        .store
        .list_for_client(&query.client_id)
        .await?
        .into_iter()
        .filter(|e| query.include_superseded || !e.is_superseded())
        .collect();
    Ok(Json(EntryListResponse { entries }))
}

async fn handle_create(
    State(state): State<AppState>,
    body: Result<Json<NewContextEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<ContextEntry>), AppError> {
    let Json(new) = body?;
    let entry = create_entry(state.store.as_ref(), &state.registry, new).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContextEntry>, AppError> {
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("context entry not found: {}", id)))
}

async fn handle_edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<EntryPatch>, JsonRejection>,
) -> Result<Json<ContextEntry>, AppError> {
    let Json(patch) = body?;
    let entry = edit_entry(state.store.as_ref(), &state.registry, &id, patch).await?;
    Ok(Json(entry))
}

#[derive(Deserialize)]
struct SupersedeRequest {
    by: String,
}

async fn handle_supersede(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SupersedeRequest>, JsonRejection>,
) -> Result<Json<ContextEntry>, AppError> {
    let Json(request) = body?;
    let entry = supersede_entry(state.store.as_ref(), &id, &request.by).await?;
    Ok(Json(entry))
}

// ============ GET /context/active ============

#[derive(Deserialize)]
struct ActiveQuery {
    client_id: String,
    /// Defaults to today (UTC).
    date: Option<NaiveDate>,
}

async fn handle_active(
    State(state): State<AppState>,
    query: Result<Query<ActiveQuery>, QueryRejection>,
) -> Result<Json<ActiveContext>, AppError> {
    let Query(query) = query?;
    require_client(&query.client_id)?;

    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let report =
        report::active_context(state.store.as_ref(), &state.registry, &query.client_id, date)
            .await?;
    Ok(Json(report))
}

// ============ POST /context/explain ============

#[derive(Deserialize)]
struct ExplainRequest {
    client_id: String,
    current: DateInterval,
    comparison: DateInterval,
}

async fn handle_explain(
    State(state): State<AppState>,
    body: Result<Json<ExplainRequest>, JsonRejection>,
) -> Result<Json<ComparisonReport>, AppError> {
    let Json(request) = body?;
    require_client(&request.client_id)?;

    let report = report::explain_comparison(
        state.store.as_ref(),
        &state.registry,
        &request.client_id,
        request.current,
        request.comparison,
    )
    .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use context_relevance_core::store::memory::InMemoryStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(
            Arc::new(InMemoryStore::new()),
            CategoryRegistry::builtin(),
        ))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(app: &Router, body: Value) -> Value {
        let (status, entry) = send(app, Method::POST, "/context", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", entry);
        entry
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_categories_listing() {
        let (status, body) = send(&app(), Method::GET, "/categories", None).await;
        assert_eq!(status, StatusCode::OK);
        let categories = body["categories"].as_array().unwrap();
        assert_eq!(categories.len(), 15);
        let promotion = categories
            .iter()
            .find(|c| c["key"] == "promotion")
            .unwrap();
        assert_eq!(promotion["kind"], "bounded");
        assert_eq!(promotion["buffer_days"], 14);
        assert_eq!(promotion["default_significant"], "major");
    }

    #[tokio::test]
    async fn test_create_get_and_list() {
        let app = app();
        let entry = create(
            &app,
            json!({
                "client_id": "acme",
                "category": "product_launch",
                "title": "Spring launch",
                "event_date": "2024-03-01"
            }),
        )
        .await;
        let id = entry["id"].as_str().unwrap();

        let (status, fetched) = send(&app, Method::GET, &format!("/context/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Spring launch");

        let (status, listed) = send(&app, Method::GET, "/context?client_id=acme", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_validation_error() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/context",
            Some(json!({
                "client_id": "acme",
                "category": "promotion",
                "title": "Bad sale",
                "start_date": "2024-06-10",
                "end_date": "2024-06-01"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/context",
            Some(json!({ "client_id": "acme" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (status, body) = send(&app(), Method::GET, "/context/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_edit_and_supersede() {
        let app = app();
        let old = create(
            &app,
            json!({
                "client_id": "acme",
                "category": "standing_condition",
                "title": "Shipping delays",
                "start_date": "2024-01-01"
            }),
        )
        .await;
        let new = create(
            &app,
            json!({
                "client_id": "acme",
                "category": "standing_condition",
                "title": "Shipping recovered",
                "start_date": "2024-07-01"
            }),
        )
        .await;
        let old_id = old["id"].as_str().unwrap();
        let new_id = new["id"].as_str().unwrap();

        let (status, edited) = send(
            &app,
            Method::PATCH,
            &format!("/context/{}", old_id),
            Some(json!({ "magnitude": "moderate" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["magnitude"], "moderate");

        let (status, retired) = send(
            &app,
            Method::POST,
            &format!("/context/{}/supersede", old_id),
            Some(json!({ "by": new_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(retired["superseded_by"], new_id);

        let (_, listed) = send(&app, Method::GET, "/context?client_id=acme", None).await;
        assert_eq!(listed["entries"].as_array().unwrap().len(), 1);
        let (_, all) = send(
            &app,
            Method::GET,
            "/context?client_id=acme&include_superseded=true",
            None,
        )
        .await;
        assert_eq!(all["entries"].as_array().unwrap().len(), 2);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/context/{}/supersede", old_id),
            Some(json!({ "by": old_id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_active_context() {
        let app = app();
        create(
            &app,
            json!({
                "client_id": "acme",
                "category": "promotion",
                "title": "Summer sale",
                "start_date": "2024-06-01",
                "end_date": "2024-06-10",
                "magnitude": "major"
            }),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::GET,
            "/context/active?client_id=acme&date=2024-06-24",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["entries"][0]["comparison_significant"], true);

        let (_, after) = send(
            &app,
            Method::GET,
            "/context/active?client_id=acme&date=2024-06-25",
            None,
        )
        .await;
        assert!(after["entries"].as_array().unwrap().is_empty());

        let (status, _) = send(
            &app,
            Method::GET,
            "/context/active?client_id=acme&date=not-a-date",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_explain() {
        let app = app();
        create(
            &app,
            json!({
                "client_id": "acme",
                "category": "organic_pr_win",
                "title": "Press feature",
                "event_date": "2024-08-03"
            }),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/context/explain",
            Some(json!({
                "client_id": "acme",
                "current": { "start": "2024-08-01", "end": "2024-08-31" },
                "comparison": { "start": "2023-08-01", "end": "2023-08-31" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["explanations"][0]["entry"]["title"], "Press feature");
        assert_eq!(body["explanations"][0]["overlaps_current"], true);

        let (status, _) = send(
            &app,
            Method::POST,
            "/context/explain",
            Some(json!({
                "client_id": "acme",
                "current": { "start": "2024-08-31", "end": "2024-08-01" },
                "comparison": { "start": "2023-08-01", "end": "2023-08-31" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
