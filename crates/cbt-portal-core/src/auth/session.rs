use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};

use tracing::{debug, warn};

use super::storage::{MemoryStorage, PersistedSession, SessionStorage};
use crate::models::{Role, User, UserUpdate};

/// Current authentication state.
///
/// `is_authenticated` is only ever true while `access_token` is non-empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_authenticated: bool,
    /// Last operation error, for display. Never persisted.
    pub error: Option<String>,
}

impl Session {
    /// Bearer credential, if one is present and non-empty
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    fn persisted(&self) -> PersistedSession {
        PersistedSession {
            user: self.user.clone(),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            is_authenticated: self.is_authenticated,
        }
    }

    fn from_persisted(record: PersistedSession) -> Self {
        let mut session = Self {
            user: record.user,
            access_token: non_empty(record.access_token),
            refresh_token: non_empty(record.refresh_token),
            is_authenticated: record.is_authenticated,
            error: None,
        };
        if session.is_authenticated && session.access_token.is_none() {
            warn!("Persisted session claims authentication without an access token; ignoring flag");
            session.is_authenticated = false;
        }
        session
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// A storage operation waiting to be written
enum PendingWrite {
    Save(PersistedSession),
    Remove,
}

/// Writes session records off the state lock.
///
/// Only the newest staged record is kept; older ones are dropped unwritten.
/// `io` serializes storage access so a stale record never lands after a
/// newer one.
struct Writer {
    storage: Arc<dyn SessionStorage>,
    pending: Mutex<Option<PendingWrite>>,
    io: Mutex<()>,
}

impl Writer {
    fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            pending: Mutex::new(None),
            io: Mutex::new(()),
        }
    }

    fn stage(&self, write: PendingWrite) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(write);
    }

    /// Start draining. Inside a tokio runtime this runs on the blocking
    /// pool; elsewhere it runs inline.
    fn kick(self: &Arc<Self>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let writer = Arc::clone(self);
                handle.spawn_blocking(move || writer.drain());
            }
            Err(_) => self.drain(),
        }
    }

    fn drain(&self) {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let write = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        match write {
            Some(PendingWrite::Save(record)) => {
                if let Err(e) = self.storage.save(&record) {
                    warn!(error = %e, "Failed to persist session");
                }
            }
            Some(PendingWrite::Remove) => {
                if let Err(e) = self.storage.remove() {
                    warn!(error = %e, "Failed to remove persisted session");
                }
            }
            None => {}
        }
    }
}

/// Single source of truth for who is logged in and with what credentials.
///
/// Clone is cheap and every clone shares the same state, so one store can
/// be handed to the API client, the auth service and the route guard.
/// Storage writes happen after the in-memory change is visible and never
/// hold up readers.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<Session>>,
    writer: Arc<Writer>,
}

impl SessionStore {
    /// Create an empty store backed by `storage` without reading it.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            state: Arc::new(RwLock::new(Session::default())),
            writer: Arc::new(Writer::new(storage)),
        }
    }

    /// Create a store and rehydrate it from `storage`.
    ///
    /// Unreadable records are logged and the store starts logged out.
    pub fn open(storage: Arc<dyn SessionStorage>) -> Self {
        let session = match storage.load() {
            Ok(Some(record)) => {
                let session = Session::from_persisted(record);
                debug!(authenticated = session.is_authenticated, "Session rehydrated");
                session
            }
            Ok(None) => {
                debug!("No persisted session found");
                Session::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session");
                Session::default()
            }
        };

        Self {
            state: Arc::new(RwLock::new(session)),
            writer: Arc::new(Writer::new(storage)),
        }
    }

    /// Store with no durable backing
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Read-only copy of the current state
    pub fn snapshot(&self) -> Session {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_authenticated
    }

    pub fn set_user(&self, user: User) {
        self.transition(|state| {
            state.user = Some(user);
            true
        });
    }

    /// Replace both tokens in one transition.
    pub fn set_tokens(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        self.transition(|state| {
            state.access_token = non_empty(Some(access_token));
            state.refresh_token = non_empty(Some(refresh_token));
            if state.access_token.is_none() && state.is_authenticated {
                warn!("Access token cleared while authenticated; marking session unauthenticated");
                state.is_authenticated = false;
            }
            true
        });
    }

    /// Set the authenticated flag. Setting it while no access token is
    /// present is refused and the flag stays false.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.transition(|state| {
            if authenticated && state.access_token.is_none() {
                warn!("Refusing to mark session authenticated without an access token");
                state.is_authenticated = false;
            } else {
                state.is_authenticated = authenticated;
            }
            true
        });
    }

    /// Install user and tokens and mark the session authenticated in one step.
    pub fn establish(
        &self,
        user: User,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        self.transition(|state| {
            state.user = Some(user);
            state.access_token = non_empty(Some(access_token));
            state.refresh_token = non_empty(Some(refresh_token));
            state.is_authenticated = state.access_token.is_some();
            state.error = None;
            if !state.is_authenticated {
                warn!("Session established without an access token");
            }
            true
        });
    }

    /// Reset to the logged-out state. Idempotent.
    pub fn clear(&self) {
        {
            let mut state = self.write();
            *state = Session::default();
            self.writer.stage(PendingWrite::Remove);
        }
        self.writer.kick();
    }

    /// Merge `update` into the current user. No-op without a user.
    pub fn update_user(&self, update: &UserUpdate) {
        self.transition(|state| match state.user.as_mut() {
            Some(user) => {
                update.apply_to(user);
                true
            }
            None => {
                debug!("update_user called with no user; ignoring");
                false
            }
        });
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.write().error = Some(message.into());
    }

    pub fn clear_error(&self) {
        self.write().error = None;
    }

    /// Wait until the latest transition has reached storage.
    pub async fn flush(&self) {
        let writer = Arc::clone(&self.writer);
        if let Err(e) = tokio::task::spawn_blocking(move || writer.drain()).await {
            warn!(error = %e, "Session flush did not complete");
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` under the write lock. When it returns true the new
    /// record is staged before the lock is released and written after.
    fn transition(&self, change: impl FnOnce(&mut Session) -> bool) {
        {
            let mut state = self.write();
            if !change(&mut state) {
                return;
            }
            self.writer.stage(PendingWrite::Save(state.persisted()));
        }
        self.writer.kick();
    }
}
