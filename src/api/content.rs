//! Public content endpoints: what the site pages render.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Serialize;
use tokio_stream::{Stream, StreamExt};

use super::{collection_from_slug, error, revision, success, ApiResult};
use crate::errors::AppErrorWithRevision;
use crate::models::{CategoryGroup, SiteInfo, GALLERY_CATEGORIES};
use crate::sync::JsonSnapshots;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SiteInfoData {
    pub info: SiteInfo,
}

#[derive(Debug, Serialize)]
pub struct CollectionData {
    pub collection: &'static str,
    pub items: serde_json::Value,
}

/// GET /api/site-info - Current site settings.
pub async fn get_site_info(State(state): State<AppState>) -> ApiResult<SiteInfoData> {
    let revision_id = revision(&state).await;
    let info = state.content.site_info.get().as_ref().clone();
    success(SiteInfoData { info }, revision_id)
}

/// GET /api/content/{collection} - Current snapshot of a collection.
pub async fn get_collection(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<CollectionData> {
    let revision_id = revision(&state).await;

    match collection_from_slug(&slug) {
        Ok(collection) => success(
            CollectionData {
                collection: collection.slug(),
                items: state.content.collection_json(collection),
            },
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/gallery/categories - Category picker taxonomy.
pub async fn get_gallery_categories(
    State(state): State<AppState>,
) -> ApiResult<&'static [CategoryGroup]> {
    let revision_id = revision(&state).await;
    success(GALLERY_CATEGORIES, revision_id)
}

/// GET /api/site-info/events - Site settings snapshots as server-sent events.
pub async fn site_info_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    snapshot_events(state.content.site_info_events())
}

/// GET /api/content/{collection}/events - Collection snapshots as server-sent events.
pub async fn collection_events(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppErrorWithRevision> {
    let collection = collection_from_slug(&slug).map_err(|error| AppErrorWithRevision {
        error,
        revision_id: 0,
    })?;
    tracing::debug!("Streaming {} snapshots", collection);
    Ok(snapshot_events(state.content.collection_events(collection)))
}

pub(super) fn snapshot_events(
    snapshots: JsonSnapshots,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = snapshots.filter_map(|snapshot| {
        match Event::default().event("snapshot").json_data(&snapshot) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!("Dropping unserializable snapshot event: {}", e);
                None
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
