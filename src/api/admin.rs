//! Admin write endpoints. Every route here sits behind `require_admin`.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{collection_from_slug, error, revision, success, ApiResult};
use crate::errors::AppError;
use crate::gateway::{ContentGateway, SaveOutcome};
use crate::models::{Collection, DraftBody, Entity, GalleryItem, Notice, SiteInfo, Teacher};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedData {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub folder: String,
    pub file_name: String,
}

async fn save_draft<E: Entity>(
    gateway: &ContentGateway,
    collection: Collection,
    body: serde_json::Value,
) -> Result<SaveOutcome, AppError> {
    let draft: DraftBody<E::Patch> = serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("Invalid {} record: {}", collection, e)))?;
    gateway.collection::<E>(collection).save(draft.into()).await
}

/// POST /api/admin/content/{collection} - Create a record, or merge into one when `id` is set.
pub async fn save_record(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<SaveOutcome> {
    let revision_id = revision(&state).await;

    let collection = match collection_from_slug(&slug) {
        Ok(c) => c,
        Err(e) => return error(e, revision_id),
    };

    let saved = match collection {
        Collection::Teachers => save_draft::<Teacher>(&state.gateway, collection, body).await,
        Collection::GalleryItems => {
            save_draft::<GalleryItem>(&state.gateway, collection, body).await
        }
        _ => save_draft::<Notice>(&state.gateway, collection, body).await,
    };

    match saved {
        Ok(outcome) => {
            let new_revision = revision(&state).await;
            success(outcome, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/admin/content/{collection}/{id} - Delete a record and the media it owns.
pub async fn delete_record(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, String)>,
) -> ApiResult<DeletedData> {
    let revision_id = revision(&state).await;

    let collection = match collection_from_slug(&slug) {
        Ok(c) => c,
        Err(e) => return error(e, revision_id),
    };

    let gateway = &state.gateway;
    let deleted = match collection {
        Collection::Teachers => gateway.collection::<Teacher>(collection).delete_entity(&id).await,
        Collection::GalleryItems => {
            gateway
                .collection::<GalleryItem>(collection)
                .delete_entity(&id)
                .await
        }
        _ => gateway.collection::<Notice>(collection).delete_entity(&id).await,
    };

    match deleted {
        Ok(()) => {
            let new_revision = revision(&state).await;
            success(DeletedData { id }, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/admin/site-info - Replace the site settings.
pub async fn save_site_info(
    State(state): State<AppState>,
    Json(info): Json<SiteInfo>,
) -> ApiResult<SiteInfo> {
    let revision_id = revision(&state).await;

    match state.gateway.save_site_info(&info).await {
        Ok(()) => {
            let new_revision = revision(&state).await;
            success(info, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/media?folder=&fileName= - Upload the raw request body.
pub async fn upload_media(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<UploadData> {
    let revision_id = revision(&state).await;

    if body.is_empty() {
        return error(
            AppError::Validation("Upload body is empty".to_string()),
            revision_id,
        );
    }

    let upload = state
        .gateway
        .upload_media(&query.folder, &query.file_name, body.to_vec());
    match upload.finish().await {
        Ok(url) => success(UploadData { url }, revision_id),
        Err(e) => error(e, revision_id),
    }
}
