//! Data models for the college website content.
//!
//! Field names match the stored documents and the frontend interfaces (camelCase).

mod collection;
mod draft;
mod gallery;
mod notice;
mod site_info;
mod teacher;

pub use collection::*;
pub use draft::*;
pub use gallery::*;
pub use notice::*;
pub use site_info::*;
pub use teacher::*;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::AppError;
use crate::store::Document;

/// A typed record living in one of the content collections.
///
/// The store keeps the fields without the id; `from_document` re-attaches the
/// store-assigned id before decoding.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Partial form of the entity used by admin drafts.
    type Patch: EntityPatch;

    fn id(&self) -> &str;

    /// URL of an uploaded asset owned by this record, if any.
    fn media_url(&self) -> Option<&str> {
        None
    }

    /// Built-in placeholder content shown while `collection` is empty.
    fn seed(collection: Collection) -> Vec<Self>;

    fn from_document(document: Document) -> Result<Self, AppError> {
        let Document { id, mut fields } = document;
        fields.insert("id".to_string(), serde_json::Value::String(id));
        Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
    }

    /// Stored fields of the record, without the id.
    fn to_fields(&self) -> Result<serde_json::Map<String, serde_json::Value>, AppError> {
        let mut fields = to_object(self)?;
        fields.remove("id");
        Ok(fields)
    }
}

/// Partial entity carried by a [`Draft`].
pub trait EntityPatch: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Check the patch before it reaches the store. A patch for a new record
    /// must carry every required field; a patch for an existing record only
    /// has to keep the fields it supplies valid.
    fn validate(&self, creating: bool) -> Result<(), AppError>;

    /// Fields to write: only the ones present in the patch.
    fn to_fields(&self) -> Result<serde_json::Map<String, serde_json::Value>, AppError> {
        let mut fields = to_object(self)?;
        fields.remove("id");
        Ok(fields)
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<serde_json::Map<String, serde_json::Value>, AppError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AppError::Internal(format!(
            "Expected a JSON object, got {}",
            other
        ))),
    }
}

/// Validate an optional required text field.
///
/// Missing is only acceptable for updates; present values must never be blank.
pub(crate) fn check_required(
    field: &str,
    value: Option<&str>,
    creating: bool,
) -> Result<(), AppError> {
    match value {
        Some(v) if v.trim().is_empty() => {
            Err(AppError::Validation(format!("{} must not be empty", field)))
        }
        None if creating => Err(AppError::Validation(format!("{} is required", field))),
        _ => Ok(()),
    }
}
