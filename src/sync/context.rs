//! Application-wide content context.
//!
//! Attaches one live view per collection plus the site settings at startup
//! and hands them to every page that reads content.

use std::pin::Pin;
use std::sync::Mutex;

use serde::Serialize;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use super::{lock, ContentSynchronizer, Live, LiveCollection, LiveDocument, Subscription};
use crate::models::{Collection, GalleryItem, Notice, SiteInfo, Teacher};

/// Serialized snapshots of one live view, current value first.
pub type JsonSnapshots = Pin<Box<dyn Stream<Item = serde_json::Value> + Send>>;

pub struct SiteContent {
    pub notices: LiveCollection<Notice>,
    pub results: LiveCollection<Notice>,
    pub routines: LiveCollection<Notice>,
    pub digital_content: LiveCollection<Notice>,
    pub teachers: LiveCollection<Teacher>,
    pub gallery: LiveCollection<GalleryItem>,
    pub site_info: LiveDocument<SiteInfo>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SiteContent {
    /// Subscribe to everything at once. Never fails: a view that cannot reach
    /// the store shows its fallback content.
    pub async fn attach(sync: &ContentSynchronizer) -> Self {
        let (notices, results, routines, digital_content, teachers, gallery, site_info) = tokio::join!(
            sync.subscribe::<Notice>(Collection::Notices),
            sync.subscribe::<Notice>(Collection::Results),
            sync.subscribe::<Notice>(Collection::Routines),
            sync.subscribe::<Notice>(Collection::DigitalContent),
            sync.subscribe::<Teacher>(Collection::Teachers),
            sync.subscribe::<GalleryItem>(Collection::GalleryItems),
            sync.subscribe_site_info(),
        );

        let subscriptions = vec![
            notices.1,
            results.1,
            routines.1,
            digital_content.1,
            teachers.1,
            gallery.1,
            site_info.1,
        ];
        tracing::info!("Site content attached ({} live views)", subscriptions.len());

        Self {
            notices: notices.0,
            results: results.0,
            routines: routines.0,
            digital_content: digital_content.0,
            teachers: teachers.0,
            gallery: gallery.0,
            site_info: site_info.0,
            subscriptions: Mutex::new(subscriptions),
        }
    }

    /// Tear every view down. Views keep their last snapshot.
    pub fn detach(&self) {
        let subscriptions = std::mem::take(&mut *lock(&self.subscriptions));
        if subscriptions.is_empty() {
            return;
        }
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
        tracing::info!("Site content detached");
    }

    pub fn notice_like(&self, collection: Collection) -> Option<&LiveCollection<Notice>> {
        match collection {
            Collection::Notices => Some(&self.notices),
            Collection::Results => Some(&self.results),
            Collection::Routines => Some(&self.routines),
            Collection::DigitalContent => Some(&self.digital_content),
            Collection::Teachers | Collection::GalleryItems => None,
        }
    }

    /// Current snapshot of a collection as JSON.
    pub fn collection_json(&self, collection: Collection) -> serde_json::Value {
        match collection {
            Collection::Teachers => to_json(&*self.teachers.items()),
            Collection::GalleryItems => to_json(&*self.gallery.items()),
            notice_like => self
                .notice_like(notice_like)
                .map(|live| to_json(&*live.items()))
                .unwrap_or_default(),
        }
    }

    /// Every snapshot of a collection as JSON, starting with the current one.
    pub fn collection_events(&self, collection: Collection) -> JsonSnapshots {
        match collection {
            Collection::Teachers => json_snapshots(&self.teachers),
            Collection::GalleryItems => json_snapshots(&self.gallery),
            notice_like => match self.notice_like(notice_like) {
                Some(live) => json_snapshots(live),
                None => Box::pin(tokio_stream::empty()),
            },
        }
    }

    pub fn site_info_events(&self) -> JsonSnapshots {
        json_snapshots(&self.site_info)
    }
}

impl Drop for SiteContent {
    fn drop(&mut self) {
        self.detach();
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!("Failed to serialize snapshot: {}", e);
        serde_json::Value::Null
    })
}

fn json_snapshots<T>(live: &Live<T>) -> JsonSnapshots
where
    T: Serialize + Send + Sync + 'static,
{
    Box::pin(WatchStream::new(live.receiver()).map(|snapshot| to_json(&*snapshot)))
}
