//! Admin drafts: a partial entity that is either new or addresses an existing record.

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// What the admin asked to save.
#[derive(Debug, Clone, PartialEq)]
pub enum Draft<P> {
    /// No id yet: the store assigns one.
    New(P),
    /// Merge `changes` into the record `id`, leaving other fields alone.
    Existing { id: String, changes: P },
}

impl<P> Draft<P> {
    /// Classify wire input. An absent, empty or blank id always means "new".
    pub fn from_parts(id: Option<String>, patch: P) -> Self {
        match id.filter(|id| !id.trim().is_empty()) {
            Some(id) => Draft::Existing { id, changes: patch },
            None => Draft::New(patch),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Draft::New(_) => None,
            Draft::Existing { id, .. } => Some(id),
        }
    }

    pub fn patch(&self) -> &P {
        match self {
            Draft::New(patch) => patch,
            Draft::Existing { changes, .. } => changes,
        }
    }
}

/// Request body for a save: the entity's fields plus an optional id.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "P: DeserializeOwned"))]
pub struct DraftBody<P> {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub patch: P,
}

impl<P> From<DraftBody<P>> for Draft<P> {
    fn from(body: DraftBody<P>) -> Self {
        Draft::from_parts(body.id, body.patch)
    }
}
