use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use rand::RngCore;
use tokio::time::Instant;

use crate::cpv::{CpvSearch, SearchPreset};
use crate::gateway::{Backend, Gateway};
use crate::session::{Listener, SessionController};

const SESSION_ID_PREFIX: &str = "tss_";
const SESSION_ID_BYTES: usize = 32;

/// Client sessions unused for this long are forgotten.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

/// Server-side state of one signed-in browser: its gateway handle, the
/// session controller fed by that handle's auth events, and the debounced
/// CPV search used by the code selector.
pub struct ClientSession {
    pub id: String,
    pub gateway: Arc<Gateway>,
    pub controller: Arc<SessionController>,
    pub search: CpvSearch,
    last_used: Mutex<Instant>,
    _listener: Listener,
}

impl ClientSession {
    /// Creates an unregistered session. Must be called inside a runtime.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let gateway = Arc::new(Gateway::new(backend));
        let controller = Arc::new(SessionController::new(Arc::clone(&gateway)));
        let listener = controller.listen();

        Self {
            id: new_session_id(),
            gateway,
            controller,
            search: CpvSearch::new(SearchPreset::BROWSER),
            last_used: Mutex::new(Instant::now()),
            _listener: listener,
        }
    }

    pub fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    /// Signed out, or unused for longer than `max_idle`.
    #[must_use]
    pub fn is_stale(&self, max_idle: Duration) -> bool {
        self.gateway.session().is_none() || self.idle_for() > max_idle
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{SESSION_ID_PREFIX}{}", hex::encode(bytes))
}

/// Sessions that completed sign-in, keyed by the id handed to the client.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<ClientSession>>>,
}

impl SessionRegistry {
    /// Registers a session, dropping stale ones on the way.
    pub fn insert(&self, session: ClientSession) -> Arc<ClientSession> {
        self.evict_stale(SESSION_IDLE_TIMEOUT);

        let session = Arc::new(session);
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.id.clone(), Arc::clone(&session));
        session
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<ClientSession>> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<ClientSession>> {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    /// Removes signed-out sessions and those idle for longer than
    /// `max_idle`. Returns how many were removed.
    pub fn evict_stale(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_stale(max_idle));

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted stale client sessions");
        }
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
