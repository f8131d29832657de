use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::aggregate::MergedItem;
use crate::error::Error;
use crate::registry::ImportReport;
use crate::state::AppState;
use crate::storage::{Feed, FeedItem, Folder, NewFeed, Story};

use super::responses::ApiError;

type ApiResult<T> = Result<T, ApiError>;

const DEFAULT_STORY_LIMIT: usize = 30;
const DEFAULT_COMBINED_LIMIT: usize = 50;
const LATEST_ITEMS_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    #[serde(alias = "feed_id")]
    feed: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolder {
    name: String,
    #[serde(default)]
    parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MoveFeed {
    folder_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    message: String,
    count: usize,
    feed: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    message: String,
    added: usize,
    skipped: usize,
    failed: usize,
    details: ImportReport,
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "Hacker News + RSS Reader API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "hn_stories": "/api/hn/stories",
            "rss_feeds": "/api/rss/feeds",
            "rss_items": "/api/rss/items",
            "combined": "/api/combined",
            "import_opml": "/api/rss/feeds/import",
            "folders": "/api/folders",
            "health": "/health",
        }
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn hn_stories(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Story>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_STORY_LIMIT);
    Ok(Json(state.ingestor.fetch_trending(limit).await?))
}

pub async fn list_feeds(State(state): State<AppState>) -> ApiResult<Json<Vec<Feed>>> {
    Ok(Json(state.registry.list().await?))
}

pub async fn create_feed(
    State(state): State<AppState>,
    new_feed: Result<Json<NewFeed>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Feed>)> {
    let Json(new_feed) = new_feed?;
    let feed = state.registry.create(new_feed).await?;
    Ok((StatusCode::CREATED, Json(feed)))
}

pub async fn delete_feed(
    State(state): State<AppState>,
    feed_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(feed_id) = feed_id?;
    state.registry.delete(feed_id).await?;
    Ok(Json(json!({ "message": "Feed deleted successfully" })))
}

pub async fn refresh_feed(
    State(state): State<AppState>,
    feed_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<RefreshResponse>> {
    let Path(feed_id) = feed_id?;
    let (feed, items) = state.registry.refresh(feed_id).await?;
    Ok(Json(RefreshResponse {
        message: format!("Refreshed {} items", items.len()),
        count: items.len(),
        feed: feed.title,
    }))
}

pub async fn move_feed(
    State(state): State<AppState>,
    feed_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<MoveFeed>, JsonRejection>,
) -> ApiResult<Json<Feed>> {
    let Path(feed_id) = feed_id?;
    let Json(body) = body?;
    state.registry.move_feed(feed_id, body.folder_id).await?;
    Ok(Json(state.registry.get(feed_id).await?))
}

/// One feed's items after a refresh, or the newest items across all feeds.
pub async fn list_items(
    State(state): State<AppState>,
    query: Result<Query<ItemsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<FeedItem>>> {
    let Query(query) = query?;
    let items = match query.feed {
        Some(feed_id) => state.registry.items(feed_id).await?,
        None => {
            state.aggregator.fetch_all_feed_items().await?;
            state
                .ingestor
                .db()
                .latest_items(LATEST_ITEMS_LIMIT)
                .await
                .map_err(Error::from)?
        }
    };
    Ok(Json(items))
}

pub async fn combined(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<MergedItem>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_COMBINED_LIMIT);
    Ok(Json(state.aggregator.combine(limit).await?))
}

/// Multipart upload with the OPML document in a `file` field.
pub async fn import_opml(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ImportResponse>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?;
            upload = Some(bytes);
            break;
        }
    }

    let Some(bytes) = upload else {
        return Err(ApiError::bad_request("No file provided"));
    };
    let content = String::from_utf8(bytes.to_vec())
        .map_err(|e| ApiError::internal(format!("Import failed: {e}")))?;

    let report = state.registry.import_opml(&content).await;
    Ok(Json(ImportResponse {
        message: format!("Imported {} feeds", report.added.len()),
        added: report.added.len(),
        skipped: report.skipped.len(),
        failed: report.failed.len(),
        details: report,
    }))
}

pub async fn list_folders(State(state): State<AppState>) -> ApiResult<Json<Vec<Folder>>> {
    Ok(Json(state.registry.folders().await?))
}

pub async fn create_folder(
    State(state): State<AppState>,
    body: Result<Json<CreateFolder>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Folder>)> {
    let Json(body) = body?;
    let folder = state
        .registry
        .create_folder(&body.name, body.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

pub async fn delete_folder(
    State(state): State<AppState>,
    folder_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(folder_id) = folder_id?;
    state.registry.delete_folder(folder_id).await?;
    Ok(Json(json!({ "message": "Folder deleted successfully" })))
}
