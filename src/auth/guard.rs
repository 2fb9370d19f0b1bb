//! Admin session guard: decides between the login screen and an admin page.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use super::provider::{IdentityProvider, SignInError};
use super::sessions::Session;

/// Pages of the admin panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminPage {
    #[default]
    Dashboard,
    SiteInfo,
    Teachers,
    Notices,
    Results,
    Routines,
    DigitalContent,
    Gallery,
    ContactInfo,
}

impl AdminPage {
    pub const ALL: [AdminPage; 9] = [
        AdminPage::Dashboard,
        AdminPage::SiteInfo,
        AdminPage::Teachers,
        AdminPage::Notices,
        AdminPage::Results,
        AdminPage::Routines,
        AdminPage::DigitalContent,
        AdminPage::Gallery,
        AdminPage::ContactInfo,
    ];
}

/// What the admin route renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "page", rename_all = "camelCase")]
pub enum AdminView {
    Login,
    Page(AdminPage),
}

/// Front door to the admin panel.
#[derive(Clone)]
pub struct SessionGuard {
    provider: Arc<dyn IdentityProvider>,
}

impl SessionGuard {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Keep observing the session behind `token`.
    pub fn watch(&self, token: &str) -> SessionWatch {
        SessionWatch {
            rx: self.provider.subscribe_session(token),
        }
    }

    pub fn current(&self, token: &str) -> Option<Session> {
        self.provider.current_session(token)
    }

    pub async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Session, SignInError> {
        match self.provider.sign_in(identifier, secret).await {
            Ok(session) => Ok(session),
            Err(e) => {
                tracing::info!("Sign-in rejected: {}", e.code());
                Err(e)
            }
        }
    }

    pub async fn sign_out(&self, token: &str) {
        self.provider.sign_out(token).await;
    }
}

/// Continuous view of one session.
pub struct SessionWatch {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionWatch {
    /// The observed session, unless it has passed its deadline.
    pub fn session(&self) -> Option<Session> {
        live(self.rx.borrow().as_ref()).cloned()
    }

    pub fn can_enter_admin(&self) -> bool {
        live(self.rx.borrow().as_ref()).is_some()
    }

    pub fn resolve(&self, page: AdminPage) -> AdminView {
        view_for(self.rx.borrow().as_ref(), page)
    }

    /// Wait for the session to change, then resolve `page` again.
    /// Returns `None` once the session can no longer change.
    pub async fn next_view(&mut self, page: AdminPage) -> Option<AdminView> {
        self.rx.changed().await.ok()?;
        Some(self.resolve(page))
    }

    /// Resolved views for `page`, starting with the current one.
    pub fn into_views(self, page: AdminPage) -> impl Stream<Item = AdminView> + Send + 'static {
        WatchStream::new(self.rx).map(move |session| view_for(session.as_ref(), page))
    }
}

fn live(session: Option<&Session>) -> Option<&Session> {
    session.filter(|s| !s.is_expired(Utc::now()))
}

fn view_for(session: Option<&Session>, page: AdminPage) -> AdminView {
    match live(session) {
        Some(_) => AdminView::Page(page),
        None => AdminView::Login,
    }
}
