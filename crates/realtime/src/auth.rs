//! Auth monitor
//!
//! A process-wide singleton that observes session events from the backing
//! store's auth layer and fans validated transitions out to subscribers.
//! The reconnection coordinator is the primary listener: reconnection is
//! gated on a valid session and stops entirely on sign-out.

use async_trait::async_trait;
use cueline_core::{Result, UserId};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long `was_recently_refreshed` stays true after a refresh
const RECENT_REFRESH_WINDOW_MS: u64 = 5_000;

/// A validated auth session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// The signed-in user
    pub user_id: UserId,
    /// Opaque access token (held for the provider, never inspected)
    pub access_token: String,
    /// Expiry, seconds since the Unix epoch
    pub expires_at: i64,
}

impl AuthSession {
    /// True once the token expiry has passed
    pub fn is_expired(&self) -> bool {
        self.expires_at <= chrono::Utc::now().timestamp()
    }
}

/// Session events emitted by the backing store's auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// The client library refreshed its token
    TokenRefreshed,
    /// A user signed in
    SignedIn(AuthSession),
    /// The user signed out
    SignedOut,
}

/// Query side of the auth layer
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Fetch the current session, if any
    async fn get_session(&self) -> Result<Option<AuthSession>>;
}

/// A session-transition subscriber; receives the new session (None on
/// sign-out)
pub type AuthListener = Box<dyn Fn(Option<&AuthSession>) + Send + Sync>;

static GLOBAL_MONITOR: OnceCell<Arc<AuthMonitor>> = OnceCell::new();

/// Observes auth events and fans out validated session transitions
pub struct AuthMonitor {
    provider: Arc<dyn SessionProvider>,
    session: Mutex<Option<AuthSession>>,
    last_refresh: Mutex<Option<Instant>>,
    listeners: Mutex<HashMap<String, AuthListener>>,
    token_settle_ms: u64,
}

impl AuthMonitor {
    /// Create a monitor over a session provider
    pub fn new(provider: Arc<dyn SessionProvider>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            session: Mutex::new(None),
            last_refresh: Mutex::new(None),
            listeners: Mutex::new(HashMap::new()),
            token_settle_ms: 1_000,
        })
    }

    /// Create a monitor with a custom token-settle delay (tests)
    pub fn with_settle_delay(provider: Arc<dyn SessionProvider>, token_settle_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            provider,
            session: Mutex::new(None),
            last_refresh: Mutex::new(None),
            listeners: Mutex::new(HashMap::new()),
            token_settle_ms,
        })
    }

    /// Install the process-wide monitor; the first install wins
    pub fn install(monitor: Arc<AuthMonitor>) {
        let _ = GLOBAL_MONITOR.set(monitor);
    }

    /// The process-wide monitor, if installed
    pub fn global() -> Option<Arc<AuthMonitor>> {
        GLOBAL_MONITOR.get().cloned()
    }

    /// Handle one auth event
    ///
    /// `TOKEN_REFRESHED` waits for the client library to install the new
    /// token, then verifies the session with a `get_session` call before
    /// notifying listeners.
    pub async fn handle_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::TokenRefreshed => {
                tokio::time::sleep(Duration::from_millis(self.token_settle_ms)).await;
                let session = match self.provider.get_session().await {
                    Ok(session) => session,
                    Err(e) => {
                        warn!(target: "cueline::auth", error = %e, "session verify failed after refresh");
                        None
                    }
                };
                *self.session.lock() = session;
                *self.last_refresh.lock() = Some(Instant::now());
                debug!(target: "cueline::auth", "token refreshed and session verified");
                self.notify();
            }
            AuthEvent::SignedIn(session) => {
                *self.session.lock() = Some(session);
                debug!(target: "cueline::auth", "signed in");
                self.notify();
            }
            AuthEvent::SignedOut => {
                *self.session.lock() = None;
                debug!(target: "cueline::auth", "signed out");
                self.notify();
            }
        }
    }

    /// Register a listener; re-registration under the same id replaces the
    /// prior handler
    pub fn add_listener(&self, id: impl Into<String>, listener: AuthListener) {
        self.listeners.lock().insert(id.into(), listener);
    }

    /// Remove a listener
    pub fn remove_listener(&self, id: &str) {
        self.listeners.lock().remove(id);
    }

    /// True within 5 s of the last token refresh
    pub fn was_recently_refreshed(&self) -> bool {
        self.last_refresh
            .lock()
            .map_or(false, |t| t.elapsed() < Duration::from_millis(RECENT_REFRESH_WINDOW_MS))
    }

    /// True if a session exists and has not expired
    pub fn is_session_valid(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .map_or(false, |session| !session.is_expired())
    }

    /// The cached session, if any
    pub fn session(&self) -> Option<AuthSession> {
        self.session.lock().clone()
    }

    fn notify(&self) {
        let session = self.session.lock().clone();
        let listeners = self.listeners.lock();
        for listener in listeners.values() {
            listener(session.as_ref());
        }
    }
}
