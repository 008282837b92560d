use axum::{
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use filemap_indexer::{Document, MapIndexer};
use futures::stream::Stream;
use log::{debug, info, warn};
use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};

/// Name of the push event carrying the full document list.
pub const UPDATE_EVENT: &str = "update";

#[derive(Clone)]
struct HttpState {
    indexer: Arc<MapIndexer>,
    port: u16,
}

/// Routes for the state query, raw file fetch and live push stream.
pub fn router(indexer: Arc<MapIndexer>, port: u16) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(banner))
        .route("/data", get(documents))
        .route("/data/*path", get(raw_file))
        .route("/events", get(events))
        .layer(cors)
        .with_state(HttpState { indexer, port })
}

async fn banner(State(state): State<HttpState>) -> String {
    info!("Index route accessed");
    format!("File Mapping Backend @ {}", state.port)
}

async fn documents(State(state): State<HttpState>) -> Json<Arc<[Document]>> {
    info!("Data route accessed");
    Json(state.indexer.snapshot())
}

async fn raw_file(State(state): State<HttpState>, UrlPath(path): UrlPath<String>) -> Response {
    let Some(full) = resolve_data_path(state.indexer.root(), &path) else {
        warn!("Rejected file request outside the data root: {path}");
        return StatusCode::BAD_REQUEST.into_response();
    };

    match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => {
            warn!("Failed to stat {}: {err}", full.display());
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match tokio::fs::read(&full).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&full).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.essence_str().to_string())], bytes).into_response()
        }
        Err(err) => {
            warn!("Failed to read {}: {err}", full.display());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Joins a request path onto the root, refusing absolute paths and `..`.
fn resolve_data_path(root: &Path, requested: &str) -> Option<PathBuf> {
    let requested = Path::new(requested);
    let mut full = root.to_path_buf();
    for component in requested.components() {
        match component {
            Component::Normal(part) => full.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (full != root).then_some(full)
}

async fn events(
    State(state): State<HttpState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Push subscriber connected");
    // subscribe first so no run lands between the snapshot and the receiver
    let mut updates = state.indexer.subscribe_updates();
    let initial = state.indexer.snapshot();

    let stream = async_stream::stream! {
        if let Some(event) = update_event(&initial) {
            yield Ok(event);
        }
        loop {
            let documents = match updates.recv().await {
                Ok(update) => update.documents,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Push subscriber lagged by {skipped} updates; resending snapshot");
                    state.indexer.snapshot()
                }
                Err(RecvError::Closed) => break,
            };
            if let Some(event) = update_event(&documents) {
                yield Ok(event);
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn update_event(documents: &[Document]) -> Option<Event> {
    match serde_json::to_string(documents) {
        Ok(json) => Some(Event::default().event(UPDATE_EVENT).data(json)),
        Err(err) => {
            warn!("Failed to serialize push event: {err}");
            None
        }
    }
}
