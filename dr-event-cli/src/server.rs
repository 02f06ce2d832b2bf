//! HTTP transport
//!
//! Thin JSON layer over [`EventService`]:
//! - POST   /events       - create an event
//! - GET    /events       - list events (`status`, `entity`, `metadata_key`,
//!   `metadata_value`, `sort`, `tz`)
//! - GET    /events/:id   - fetch one event (`tz`)
//! - PUT    /events/:id   - replace an event
//! - DELETE /events/:id   - delete an event
//!
//! Store calls are blocking and run on the blocking thread pool, one task
//! per request.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dr_event_store::{EventError, EventId, EventPayload, EventQuery, EventService, EventView};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

type SharedService = Arc<EventService>;

/// Query parameters of `GET /events`
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub entity: Option<String>,
    pub metadata_key: Option<String>,
    pub metadata_value: Option<String>,
    pub sort: Option<String>,
    pub tz: Option<String>,
}

/// Query parameters of `GET /events/:id`
#[derive(Debug, Default, Deserialize)]
pub struct DisplayParams {
    pub tz: Option<String>,
}

/// Errors returned to HTTP clients
#[derive(Debug)]
pub enum ApiError {
    Event(EventError),
    Body(StatusCode, String),
}

impl From<EventError> for ApiError {
    fn from(e: EventError) -> Self {
        ApiError::Event(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::Body(status, format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Body(status, reason) => (status, json!({ "error": reason })),
            ApiError::Event(EventError::Validation(v)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": v.reason, "field": v.field }),
            ),
            ApiError::Event(EventError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, json!({ "error": "Event not found" }))
            }
            ApiError::Event(EventError::Conflict(id)) => (
                StatusCode::CONFLICT,
                json!({ "error": format!("Event {} already exists", id) }),
            ),
            ApiError::Event(EventError::BadRequest(reason)) => {
                (StatusCode::BAD_REQUEST, json!({ "error": reason }))
            }
            ApiError::Event(EventError::Storage(detail)) => {
                log::error!("Storage failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal storage error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Build the event API router
pub fn router(service: SharedService, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(service)
}

/// Serve the event API until Ctrl-C
pub async fn serve(service: SharedService, config: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {:?}", config.bind))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    log::info!("Listening on http://{}", addr);
    axum::serve(listener, router(service, config.max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}

/// Run a store operation on the blocking pool
async fn blocking<T, F>(service: SharedService, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&EventService) -> dr_event_store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&service))
        .await
        .map_err(|e| EventError::Storage(format!("store task failed: {}", e)))?
        .map_err(ApiError::from)
}

async fn create_event(
    State(service): State<SharedService>,
    body: Result<Json<EventPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    let id = blocking(service, move |s| s.create(&payload)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id.to_string() }))))
}

async fn list_events(
    State(service): State<SharedService>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let query = EventQuery::from_params(
        params.status.as_deref(),
        params.entity.as_deref(),
        params.metadata_key.as_deref(),
        params.metadata_value.as_deref(),
        params.sort.as_deref(),
    )?;

    let records = blocking(service, move |s| s.list(&query)).await?;
    let tz = params.tz.as_deref();
    Ok(Json(records.iter().map(|r| EventView::render(r, tz)).collect()))
}

async fn get_event(
    State(service): State<SharedService>,
    Path(id): Path<String>,
    Query(params): Query<DisplayParams>,
) -> Result<Json<EventView>, ApiError> {
    let id = EventId::from(id);
    let record = blocking(service, move |s| s.get(&id)).await?;
    Ok(Json(EventView::render(&record, params.tz.as_deref())))
}

async fn update_event(
    State(service): State<SharedService>,
    Path(id): Path<String>,
    body: Result<Json<EventPayload>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(payload) = body?;
    let id = EventId::from(id);
    let record = blocking(service, move |s| s.update(&id, &payload)).await?;
    Ok(Json(json!({ "id": record.id.to_string() })))
}

async fn delete_event(
    State(service): State<SharedService>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = EventId::from(id);
    let deleted = id.to_string();
    blocking(service, move |s| s.delete(&id)).await?;
    Ok(Json(json!({ "id": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use chrono::{Duration, Utc};
    use dr_event_store::{EventValidator, MemoryStore, SqliteStore};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_with(service: EventService) -> Router {
        router(Arc::new(service), 100 * 1024)
    }

    fn app() -> Router {
        app_with(EventService::new(
            Arc::new(MemoryStore::new()),
            EventValidator::default(),
        ))
    }

    fn iso(offset: Duration) -> String {
        (Utc::now() + offset).to_rfc3339()
    }

    fn event(start: Duration, end: Duration, entity: &str) -> Value {
        json!({ "start_time": iso(start), "end_time": iso(end), "entity": entity })
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create(app: &Router, body: Value) -> String {
        let (status, value) = send(app, Method::POST, "/events", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{value}");
        value["id"].as_str().unwrap().to_string()
    }

    fn ids(value: &Value) -> Vec<&str> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_create_and_get_event() {
        let app = app();
        let mut body = event(Duration::minutes(-1), Duration::minutes(1), "tester");
        body["message"] = json!("hello");
        body["metadata"] = json!({ "foo": "bar" });
        let id = create(&app, body.clone()).await;

        let (status, all) = send(&app, Method::GET, "/events", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(ids(&all).contains(&id.as_str()));

        let (status, detail) = send(&app, Method::GET, &format!("/events/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["entity"], "tester");
        assert_eq!(detail["message"], "hello");
        assert_eq!(detail["metadata"]["foo"], "bar");
        assert!(detail["start_time"].as_str().unwrap().ends_with("+00:00"));
    }

    #[tokio::test]
    async fn test_status_and_entity_filters() {
        let app = app();
        let past = create(
            &app,
            event(Duration::hours(-2), Duration::hours(-1), "GridOperator1"),
        )
        .await;
        let a = create(&app, event(Duration::hours(-1), Duration::hours(1), "GridOperator1")).await;
        let b = create(&app, event(Duration::hours(2), Duration::hours(3), "GridOperator2")).await;

        let (_, active) = send(&app, Method::GET, "/events?status=active", None).await;
        assert_eq!(ids(&active), vec![a.as_str()]);

        let (_, future) = send(&app, Method::GET, "/events?status=future", None).await;
        assert_eq!(ids(&future), vec![b.as_str()]);

        let (_, old) = send(&app, Method::GET, "/events?status=past", None).await;
        assert_eq!(ids(&old), vec![past.as_str()]);

        let (_, by_entity) = send(&app, Method::GET, "/events?entity=GridOperator2", None).await;
        assert_eq!(ids(&by_entity), vec![b.as_str()]);

        let (_, all) = send(&app, Method::GET, "/events?status=all", None).await;
        assert_eq!(ids(&all).len(), 3);
    }

    #[tokio::test]
    async fn test_metadata_filter_and_sort() {
        let app = app();
        let mut tagged = event(Duration::hours(5), Duration::hours(6), "e");
        tagged["metadata"] = json!({ "program": "peak" });
        let late = create(&app, tagged).await;
        let early = create(&app, event(Duration::hours(1), Duration::hours(2), "e")).await;

        let uri = "/events?metadata_key=program&metadata_value=peak";
        let (_, matched) = send(&app, Method::GET, uri, None).await;
        assert_eq!(ids(&matched), vec![late.as_str()]);

        let (_, sorted) = send(&app, Method::GET, "/events?sort=start_time", None).await;
        assert_eq!(ids(&sorted), vec![early.as_str(), late.as_str()]);
    }

    #[tokio::test]
    async fn test_bad_query_parameters() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/events?status=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("status"));

        let (status, _) = send(&app, Method::GET, "/events?metadata_value=x", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_event() {
        let app = app();
        let id = create(&app, event(Duration::minutes(-2), Duration::minutes(2), "uploader")).await;

        let mut update = event(Duration::minutes(-5), Duration::minutes(5), "updater");
        update["message"] = json!("updated");
        update["metadata"] = json!({ "x": 1 });
        let (status, body) = send(&app, Method::PUT, &format!("/events/{id}"), Some(update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());

        let (_, detail) = send(&app, Method::GET, &format!("/events/{id}"), None).await;
        assert_eq!(detail["entity"], "updater");
        assert_eq!(detail["message"], "updated");
        assert_eq!(detail["metadata"], json!({ "x": 1 }));
    }

    #[tokio::test]
    async fn test_update_ignores_body_id() {
        let app = app();
        let id = create(&app, event(Duration::hours(-1), Duration::hours(1), "uploader")).await;

        let mut update = event(Duration::hours(-1), Duration::hours(2), "updater");
        update["id"] = json!("  ");
        let uri = format!("/events/{id}");
        let (status, body) = send(&app, Method::PUT, &uri, Some(update)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["id"], id.as_str());

        let (_, detail) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(detail["entity"], "updater");
    }

    #[tokio::test]
    async fn test_invalid_update_keeps_original() {
        let app = app();
        let id = create(&app, event(Duration::hours(-1), Duration::hours(1), "keeper")).await;
        let (_, before) = send(&app, Method::GET, &format!("/events/{id}"), None).await;

        let reversed = event(Duration::hours(1), Duration::hours(-1), "breaker");
        let uri = format!("/events/{id}");
        let (status, body) = send(&app, Method::PUT, &uri, Some(reversed)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "start_time");

        let (_, after) = send(&app, Method::GET, &format!("/events/{id}"), None).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_delete_event() {
        let app = app();
        let id = create(&app, event(Duration::minutes(-1), Duration::minutes(1), "deleter")).await;

        let (status, body) = send(&app, Method::DELETE, &format!("/events/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());

        let (status, _) = send(&app, Method::GET, &format!("/events/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, &format!("/events/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let app = app();

        let (status, _) = send(&app, Method::POST, "/events", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_times = json!({ "start_time": "bad", "end_time": "bad", "entity": "x" });
        let (status, body) = send(&app, Method::POST, "/events", Some(bad_times)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "start_time");

        let now = iso(Duration::zero());
        let no_entity = json!({ "start_time": now, "end_time": now });
        let (status, body) = send(&app, Method::POST, "/events", Some(no_entity)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "entity");

        let (status, _) = send(&app, Method::GET, "/events/nonexistent", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let valid = event(Duration::zero(), Duration::hours(1), "x");
        let (status, _) = send(&app, Method::PUT, "/events/nonexistent", Some(valid)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, "/events/nonexistent", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, all) = send(&app, Method::GET, "/events", None).await;
        assert!(ids(&all).is_empty());
    }

    #[tokio::test]
    async fn test_metadata_size_limits() {
        let app = app();

        let mut too_big = event(Duration::zero(), Duration::hours(1), "e");
        too_big["metadata"] = json!({ "blob": "x".repeat(4500) });
        let (status, body) = send(&app, Method::POST, "/events", Some(too_big)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "metadata");

        let mut large = event(Duration::zero(), Duration::hours(1), "e");
        large["metadata"] = json!({ "blob": "x".repeat(3500) });
        create(&app, large).await;
    }

    #[tokio::test]
    async fn test_explicit_id_conflict() {
        let app = app();
        let mut body = event(Duration::zero(), Duration::hours(1), "e");
        body["id"] = json!("evt-42");
        assert_eq!(create(&app, body.clone()).await, "evt-42");

        let (status, _) = send(&app, Method::POST, "/events", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_display_timezone() {
        let app = app();
        let body = json!({
            "start_time": "2025-06-01T12:00:00Z",
            "end_time": "2025-06-01T13:00:00Z",
            "entity": "e",
            "timezone": "Europe/Berlin"
        });
        let id = create(&app, body).await;

        let uri = format!("/events/{id}?tz=Europe/Berlin");
        let (_, local) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(local["start_time"], "2025-06-01T14:00:00+02:00");
        assert_eq!(local["timezone"], "Europe/Berlin");

        let uri = format!("/events/{id}?tz=Bogus/Zone");
        let (status, fallback) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fallback["start_time"], "2025-06-01T12:00:00+00:00");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let app = router(
            Arc::new(EventService::new(Arc::new(MemoryStore::new()), EventValidator::default())),
            64,
        );
        let mut body = event(Duration::zero(), Duration::hours(1), "e");
        body["message"] = json!("m".repeat(200));
        let (status, _) = send(&app, Method::POST, "/events", Some(body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_sqlite_backend_round_trip() {
        let app = app_with(EventService::new(
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            EventValidator::default(),
        ));
        let id = create(
            &app,
            event(Duration::hours(-1), Duration::hours(1), "GridOperator1"),
        )
        .await;

        let (_, active) = send(&app, Method::GET, "/events?status=active", None).await;
        assert_eq!(ids(&active), vec![id.as_str()]);
    }
}
