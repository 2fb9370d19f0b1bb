//! In-memory session registry with expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

/// Upper bound on how long an expired entry stays in the registry.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// An authenticated admin session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub identity: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

struct Entry {
    tx: watch::Sender<Option<Session>>,
    /// Timer that clears the session at its deadline.
    expiry: Option<AbortHandle>,
}

impl Entry {
    fn end(self) {
        if let Some(expiry) = self.expiry {
            expiry.abort();
        }
        self.tx.send_replace(None);
    }
}

/// Live sessions keyed by token. Each session has its own watch channel so
/// observers see sign-out and expiry as they happen.
pub struct SessionRegistry {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Entry>>,
    /// Shared channel handed out for unknown tokens; always `None`.
    absent: watch::Sender<Option<Session>>,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        let (absent, _) = watch::channel(None);
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
            absent,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session for `identity`.
    pub fn issue(&self, identity: &str) -> Session {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(8));
        let session = Session {
            token: uuid::Uuid::new_v4().simple().to_string(),
            identity: identity.to_string(),
            expires_at: Utc::now() + ttl,
        };
        let (tx, _) = watch::channel(Some(session.clone()));
        let expiry = spawn_expiry(tx.clone(), self.ttl);
        self.sessions()
            .insert(session.token.clone(), Entry { tx, expiry });
        tracing::info!("Session started for {}", identity);
        session
    }

    /// Observe the session behind `token`. Unknown and expired tokens get a
    /// channel that stays `None`.
    pub fn subscribe(&self, token: &str) -> watch::Receiver<Option<Session>> {
        let now = Utc::now();
        match self.sessions().get(token) {
            Some(entry) if entry.tx.borrow().as_ref().is_some_and(|s| !s.is_expired(now)) => {
                entry.tx.subscribe()
            }
            _ => self.absent.subscribe(),
        }
    }

    /// The session behind `token`, if it exists and has not expired.
    pub fn current(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        self.sessions()
            .get(token)
            .and_then(|entry| entry.tx.borrow().clone())
            .filter(|s| !s.is_expired(now))
    }

    /// End a session. Observers see `None` before the session is forgotten.
    pub fn revoke(&self, token: &str) -> bool {
        match self.sessions().remove(token) {
            Some(entry) => {
                entry.end();
                tracing::info!("Session ended");
                true
            }
            None => false,
        }
    }

    /// Expire every session past its deadline. Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| {
                entry
                    .tx
                    .borrow()
                    .as_ref()
                    .map_or(true, |s| s.is_expired(now))
            })
            .map(|(token, _)| token.clone())
            .collect();

        for token in &expired {
            if let Some(entry) = sessions.remove(token) {
                entry.end();
            }
        }
        if !expired.is_empty() {
            tracing::info!("Expired {} session(s)", expired.len());
        }
        expired.len()
    }

    /// Periodically expire sessions until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        let period = self.ttl.clamp(Duration::from_millis(10), MAX_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep(Utc::now());
            }
        })
    }
}

/// Push `None` to the session's observers once `ttl` has passed. The sweeper
/// only reclaims the entry afterwards.
fn spawn_expiry(tx: watch::Sender<Option<Session>>, ttl: Duration) -> Option<AbortHandle> {
    let runtime = tokio::runtime::Handle::try_current().ok()?;
    let deadline = tokio::time::Instant::now().checked_add(ttl)?;
    let task = runtime.spawn(async move {
        tokio::time::sleep_until(deadline).await;
        tx.send_replace(None);
    });
    Some(task.abort_handle())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_revoke_notifies_observers() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.issue("admin@example.com");
        let mut rx = registry.subscribe(&session.token);
        assert_eq!(rx.borrow().as_ref(), Some(&session));

        assert!(registry.revoke(&session.token));
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(registry.current(&session.token).is_none());
        assert!(!registry.revoke(&session.token));
    }

    #[tokio::test]
    async fn test_sweep_expires_old_sessions() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.issue("admin@example.com");
        let rx = registry.subscribe(&session.token);

        assert_eq!(registry.sweep(Utc::now()), 0);
        let later = Utc::now() + chrono::Duration::minutes(2);
        assert_eq!(registry.sweep(later), 1);
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_unknown_token_has_no_session() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        assert!(registry.subscribe("nope").borrow().is_none());
        assert!(registry.current("nope").is_none());
    }

    #[tokio::test]
    async fn test_sweeper_expires_in_background() {
        let registry = Arc::new(SessionRegistry::new(Duration::from_millis(50)));
        let session = registry.issue("admin@example.com");
        let mut rx = registry.subscribe(&session.token);
        let sweeper = registry.spawn_sweeper();

        tokio::time::timeout(Duration::from_secs(5), async {
            while rx.borrow().is_some() {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        sweeper.abort();
    }

    #[tokio::test]
    async fn test_session_expires_on_time_without_sweeper() {
        let registry = SessionRegistry::new(Duration::from_millis(200));
        let session = registry.issue("admin@example.com");
        let mut rx = registry.subscribe(&session.token);
        assert!(rx.borrow().is_some());

        tokio::time::timeout(Duration::from_secs(5), async {
            while rx.borrow().is_some() {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        assert!(registry.current(&session.token).is_none());
        assert!(registry.subscribe(&session.token).borrow().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_subscribes_as_absent() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.issue("admin@example.com");

        // Age the stored session past its deadline while its timer is still pending.
        {
            let sessions = registry.sessions();
            let entry = sessions.get(&session.token).unwrap();
            entry.tx.send_modify(|s| {
                if let Some(s) = s {
                    s.expires_at = Utc::now() - chrono::Duration::seconds(1);
                }
            });
        }

        assert!(registry.current(&session.token).is_none());
        assert!(registry.subscribe(&session.token).borrow().is_none());
    }
}
