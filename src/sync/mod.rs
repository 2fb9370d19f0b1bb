//! Content synchronizer.
//!
//! Keeps a live, typed, in-memory view of every content collection and of the
//! site settings singleton. Each view is fed by a store subscription and
//! republished as an immutable snapshot. Empty collections publish built-in
//! seed data; a missing settings record is published as the default and
//! written back once.

mod context;

pub use context::{JsonSnapshots, SiteContent};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::errors::AppError;
use crate::models::{site_info_path, Collection, Entity, SiteInfo};
use crate::store::{ContentStore, Document, SnapshotStream};

/// What happens to seed data when a collection turns out to be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPolicy {
    /// Publish the seed for display only.
    DisplayOnly,
    /// Publish the seed and persist it once per subscription.
    WriteBack,
}

/// Lifecycle of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Live,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read side of a published value. Clones share the same feed.
#[derive(Debug, Clone)]
pub struct Live<T> {
    rx: watch::Receiver<Arc<T>>,
}

/// A live collection: `items()` is the latest snapshot.
pub type LiveCollection<E> = Live<Vec<E>>;
/// A live singleton.
pub type LiveDocument<T> = Live<T>;

impl<T> Live<T> {
    /// The latest published snapshot.
    pub fn get(&self) -> Arc<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next publish. Returns `false` once the subscription is torn down.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    pub fn receiver(&self) -> watch::Receiver<Arc<T>> {
        self.rx.clone()
    }
}

impl<E> Live<Vec<E>> {
    pub fn items(&self) -> Arc<Vec<E>> {
        self.get()
    }
}

/// Write side of a live view. Closing it is final.
struct Publisher<T> {
    slot: Arc<Mutex<Option<watch::Sender<Arc<T>>>>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Publisher<T> {
    fn new(initial: T) -> (Self, Live<T>) {
        let (tx, rx) = watch::channel(Arc::new(initial));
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            Live { rx },
        )
    }

    /// Publish unless closed. Returns whether the value went out.
    fn publish(&self, value: T) -> bool {
        match lock(&self.slot).as_ref() {
            Some(tx) => {
                tx.send_replace(Arc::new(value));
                true
            }
            None => false,
        }
    }

    fn close(&self) {
        lock(&self.slot).take();
    }
}

/// Handle that tears a live view down. Dropping it unsubscribes as well.
#[must_use = "dropping a Subscription detaches its live view"]
pub struct Subscription {
    label: String,
    state: Arc<Mutex<SubscriptionState>>,
    close: Box<dyn Fn() + Send + Sync>,
    listener: Option<AbortHandle>,
}

impl Subscription {
    fn new<T: Send + Sync + 'static>(
        label: String,
        state: Arc<Mutex<SubscriptionState>>,
        publisher: Publisher<T>,
        listener: Option<AbortHandle>,
    ) -> Self {
        Self {
            label,
            state,
            close: Box::new(move || publisher.close()),
            listener,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        *lock(&self.state)
    }

    /// Stop all further publishes. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        // Closing the publisher first guarantees nothing is published once this returns.
        (self.close)();
        if let Some(listener) = &self.listener {
            listener.abort();
        }
        let mut state = lock(&self.state);
        if *state != SubscriptionState::Unsubscribed {
            *state = SubscriptionState::Unsubscribed;
            tracing::debug!("Unsubscribed from {}", self.label);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Turns raw store snapshots into the value a live view publishes.
#[async_trait]
trait Projector: Send + 'static {
    type Snapshot: Send + 'static;
    type Output: Send + Sync + 'static;

    async fn project(&mut self, snapshot: Self::Snapshot) -> Self::Output;

    /// Value shown when the store cannot be read at all.
    fn fallback(&self) -> Self::Output;
}

struct CollectionProjector<E> {
    collection: Collection,
    store: Arc<dyn ContentStore>,
    policy: SeedPolicy,
    wrote_back: bool,
    _entity: std::marker::PhantomData<fn() -> E>,
}

impl<E: Entity> CollectionProjector<E> {
    async fn write_back_seed(&mut self) {
        if self.policy != SeedPolicy::WriteBack || self.wrote_back {
            return;
        }
        self.wrote_back = true;

        let seed = E::seed(self.collection);
        tracing::info!(
            "Writing {} seed records back to empty collection {}",
            seed.len(),
            self.collection
        );
        for record in &seed {
            let result = match record.to_fields() {
                Ok(fields) => self.store.create(self.collection.name(), fields).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!("Failed to write seed record to {}: {}", self.collection, e);
            }
        }
    }
}

#[async_trait]
impl<E: Entity> Projector for CollectionProjector<E> {
    type Snapshot = Vec<Document>;
    type Output = Vec<E>;

    async fn project(&mut self, documents: Vec<Document>) -> Vec<E> {
        let store_empty = documents.is_empty();
        let items: Vec<E> = documents
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                match E::from_document(doc) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        tracing::warn!("Skipping malformed record {}/{}: {}", self.collection, id, e);
                        None
                    }
                }
            })
            .collect();

        if !items.is_empty() {
            return items;
        }
        if store_empty {
            self.write_back_seed().await;
        }
        self.fallback()
    }

    fn fallback(&self) -> Vec<E> {
        E::seed(self.collection)
    }
}

struct SiteInfoProjector {
    store: Arc<dyn ContentStore>,
    repaired: bool,
}

#[async_trait]
impl Projector for SiteInfoProjector {
    type Snapshot = Option<Document>;
    type Output = SiteInfo;

    async fn project(&mut self, snapshot: Option<Document>) -> SiteInfo {
        match snapshot {
            Some(document) => SiteInfo::from_document(document).unwrap_or_else(|e| {
                tracing::warn!("Stored site info is unreadable, showing defaults: {}", e);
                SiteInfo::default()
            }),
            None => {
                let info = SiteInfo::default();
                if !self.repaired {
                    self.repaired = true;
                    tracing::info!("Site info missing, writing defaults");
                    let written = match info.to_fields() {
                        Ok(fields) => self.store.upsert_merge(&site_info_path(), fields).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = written {
                        tracing::warn!("Failed to write default site info: {}", e);
                        self.repaired = false;
                    }
                }
                info
            }
        }
    }

    fn fallback(&self) -> SiteInfo {
        SiteInfo::default()
    }
}

/// Owns the store subscriptions behind every live view.
#[derive(Clone)]
pub struct ContentSynchronizer {
    store: Arc<dyn ContentStore>,
    write_back: Arc<HashSet<Collection>>,
}

impl ContentSynchronizer {
    pub fn new(store: Arc<dyn ContentStore>, write_back: HashSet<Collection>) -> Self {
        Self {
            store,
            write_back: Arc::new(write_back),
        }
    }

    pub fn seed_policy(&self, collection: Collection) -> SeedPolicy {
        if self.write_back.contains(&collection) {
            SeedPolicy::WriteBack
        } else {
            SeedPolicy::DisplayOnly
        }
    }

    /// Subscribe to a collection using its default ordering.
    pub async fn subscribe<E: Entity>(
        &self,
        collection: Collection,
    ) -> (LiveCollection<E>, Subscription) {
        self.subscribe_ordered(collection, collection.default_order())
            .await
    }

    /// Subscribe to a collection sorted descending by `order_by`.
    pub async fn subscribe_ordered<E: Entity>(
        &self,
        collection: Collection,
        order_by: Option<&str>,
    ) -> (LiveCollection<E>, Subscription) {
        let projector = CollectionProjector::<E> {
            collection,
            store: self.store.clone(),
            policy: self.seed_policy(collection),
            wrote_back: false,
            _entity: std::marker::PhantomData,
        };
        let stream = self
            .store
            .subscribe_collection(collection.name(), order_by)
            .await;
        attach(collection.name().to_string(), stream, projector).await
    }

    /// Subscribe to the site settings singleton.
    pub async fn subscribe_site_info(&self) -> (LiveDocument<SiteInfo>, Subscription) {
        let path = site_info_path();
        let projector = SiteInfoProjector {
            store: self.store.clone(),
            repaired: false,
        };
        let stream = self.store.subscribe_document(&path).await;
        attach(path.to_string(), stream, projector).await
    }
}

/// Wait for the first snapshot, publish it, and keep a listener running for the rest.
async fn attach<P: Projector>(
    label: String,
    stream: Result<SnapshotStream<P::Snapshot>, AppError>,
    mut projector: P,
) -> (Live<P::Output>, Subscription) {
    let state = Arc::new(Mutex::new(SubscriptionState::Subscribing));
    tracing::debug!("Subscribing to {}", label);

    let mut stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("Could not subscribe to {}, showing fallback content: {}", label, e);
            let (publisher, live) = Publisher::new(projector.fallback());
            *lock(&state) = SubscriptionState::Unsubscribed;
            return (live, Subscription::new(label, state, publisher, None));
        }
    };

    let initial = match stream.next().await {
        Some(Ok(snapshot)) => projector.project(snapshot).await,
        Some(Err(e)) => {
            tracing::warn!("Initial load of {} failed, showing fallback content: {}", label, e);
            projector.fallback()
        }
        None => {
            tracing::warn!("Store closed the {} feed before the first snapshot", label);
            let (publisher, live) = Publisher::new(projector.fallback());
            *lock(&state) = SubscriptionState::Unsubscribed;
            return (live, Subscription::new(label, state, publisher, None));
        }
    };

    let (publisher, live) = Publisher::new(initial);
    *lock(&state) = SubscriptionState::Live;

    let listener = tokio::spawn(listen(
        label.clone(),
        stream,
        projector,
        publisher.clone(),
        state.clone(),
    ));

    tracing::debug!("{} is live", label);
    (
        live,
        Subscription::new(label, state, publisher, Some(listener.abort_handle())),
    )
}

async fn listen<P: Projector>(
    label: String,
    mut stream: SnapshotStream<P::Snapshot>,
    mut projector: P,
    publisher: Publisher<P::Output>,
    state: Arc<Mutex<SubscriptionState>>,
) {
    while let Some(next) = stream.next().await {
        match next {
            Ok(snapshot) => {
                let value = projector.project(snapshot).await;
                if !publisher.publish(value) {
                    return;
                }
            }
            Err(e) => {
                // Keep the stale snapshot visible.
                tracing::warn!("Skipping failed update of {}: {}", label, e);
            }
        }
    }

    tracing::warn!("Store feed for {} ended", label);
    *lock(&state) = SubscriptionState::Unsubscribed;
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::testing::ScriptedStore;
    use super::*;
    use crate::models::{Notice, Teacher};
    use serde_json::json;
    use std::time::Duration;

    fn notice_doc(id: &str, title: &str, date: &str) -> Document {
        Document::new(
            id,
            json!({ "title": title, "date": date, "link": "#", "type": "link" })
                .as_object()
                .unwrap()
                .clone(),
        )
    }

    async fn wait_for<T>(live: &mut Live<T>) {
        tokio::time::timeout(Duration::from_secs(5), live.changed())
            .await
            .expect("timed out waiting for publish");
    }

    #[tokio::test]
    async fn test_empty_collection_publishes_seed() {
        for collection in Collection::ALL {
            let store = ScriptedStore::new();
            let sync = ContentSynchronizer::new(store.clone(), HashSet::new());
            store.set_collection(collection.name(), vec![]);

            let published = if collection.is_notice_like() {
                let (live, _sub) = sync.subscribe::<Notice>(collection).await;
                live.items().len()
            } else if collection == Collection::Teachers {
                let (live, _sub) = sync.subscribe::<Teacher>(collection).await;
                live.items().len()
            } else {
                let (live, _sub) = sync
                    .subscribe::<crate::models::GalleryItem>(collection)
                    .await;
                live.items().len()
            };
            assert!(published > 0, "{} published no seed", collection);
            assert_eq!(store.create_calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_real_records_replace_seed() {
        let store = ScriptedStore::new();
        let sync = ContentSynchronizer::new(store.clone(), HashSet::new());
        let (mut live, sub) = sync.subscribe::<Notice>(Collection::Notices).await;
        assert_eq!(live.items().len(), 5);
        assert_eq!(sub.state(), SubscriptionState::Live);

        store.emit_collection("notices", vec![notice_doc("abc", "X", "2024-01-01")]);
        wait_for(&mut live).await;

        let items = live.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "abc");
        assert_eq!(items[0].title, "X");
    }

    #[tokio::test]
    async fn test_write_back_policy_persists_seed_once() {
        let store = ScriptedStore::new();
        let sync = ContentSynchronizer::new(
            store.clone(),
            HashSet::from([Collection::Teachers]),
        );
        assert_eq!(sync.seed_policy(Collection::Teachers), SeedPolicy::WriteBack);
        assert_eq!(sync.seed_policy(Collection::Notices), SeedPolicy::DisplayOnly);

        let (mut live, _sub) = sync.subscribe::<Teacher>(Collection::Teachers).await;
        let seeded = Teacher::seed(Collection::Teachers).len();
        assert_eq!(store.create_calls(), seeded);

        // A second empty snapshot does not write again.
        store.emit_collection("teachers", vec![]);
        wait_for(&mut live).await;
        assert_eq!(store.create_calls(), seeded);
    }

    #[tokio::test]
    async fn test_initial_failure_falls_back_silently() {
        let store = ScriptedStore::new();
        store.fail_next_subscribe();
        let sync = ContentSynchronizer::new(store.clone(), HashSet::new());

        let (live, sub) = sync.subscribe::<Notice>(Collection::Results).await;
        assert_eq!(live.items().as_ref(), &Notice::seed(Collection::Results));
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn test_failed_initial_snapshot_falls_back_then_recovers() {
        let store = ScriptedStore::new();
        store.fail_first_snapshot();
        let sync = ContentSynchronizer::new(store.clone(), HashSet::new());

        let (mut live, sub) = sync.subscribe::<Notice>(Collection::Notices).await;
        assert_eq!(live.items().len(), 5);
        assert_eq!(sub.state(), SubscriptionState::Live);

        store.emit_collection("notices", vec![notice_doc("n1", "Real", "2024-05-01")]);
        wait_for(&mut live).await;
        assert_eq!(live.items()[0].id, "n1");
    }

    #[tokio::test]
    async fn test_failed_update_keeps_stale_snapshot() {
        let store = ScriptedStore::new();
        store.set_collection("notices", vec![notice_doc("n1", "Kept", "2024-05-01")]);
        let sync = ContentSynchronizer::new(store.clone(), HashSet::new());
        let (mut live, _sub) = sync.subscribe::<Notice>(Collection::Notices).await;

        store.emit_error("notices");
        store.emit_collection("notices", vec![
            notice_doc("n1", "Kept", "2024-05-01"),
            notice_doc("n2", "New", "2024-06-01"),
        ]);
        wait_for(&mut live).await;

        // The error was skipped, the following snapshot still arrived.
        assert_eq!(live.items().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_records_are_skipped() {
        let store = ScriptedStore::new();
        let broken = Document::new("bad", json!({ "date": 5 }).as_object().unwrap().clone());
        store.set_collection(
            "notices",
            vec![broken, notice_doc("ok", "Fine", "2024-01-01")],
        );
        let sync = ContentSynchronizer::new(store.clone(), HashSet::new());

        let (live, _sub) = sync.subscribe::<Notice>(Collection::Notices).await;
        let items = live.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "ok");
    }

    #[tokio::test]
    async fn test_missing_site_info_is_repaired_once() {
        let store = ScriptedStore::new();
        let sync = ContentSynchronizer::new(store.clone(), HashSet::new());

        let (live, _sub) = sync.subscribe_site_info().await;
        assert_eq!(*live.get(), SiteInfo::default());

        let writes = store.upserts();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, site_info_path());
        assert_eq!(writes[0].1, SiteInfo::default().to_fields().unwrap());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_publishing() {
        let store = ScriptedStore::new();
        let sync = ContentSynchronizer::new(store.clone(), HashSet::new());
        let (mut live, sub) = sync.subscribe::<Notice>(Collection::Notices).await;

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);

        store.emit_collection("notices", vec![notice_doc("late", "Late", "2024-09-09")]);
        let changed = tokio::time::timeout(Duration::from_secs(1), live.changed())
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(live.items().len(), 5);
    }

    #[tokio::test]
    async fn test_dropping_subscription_detaches() {
        let store = ScriptedStore::new();
        let sync = ContentSynchronizer::new(store.clone(), HashSet::new());
        let (mut live, sub) = sync.subscribe::<Notice>(Collection::Routines).await;
        drop(sub);

        store.emit_collection("routines", vec![notice_doc("r", "R", "2024-01-01")]);
        let changed = tokio::time::timeout(Duration::from_secs(1), live.changed())
            .await
            .unwrap();
        assert!(!changed);
    }
}
