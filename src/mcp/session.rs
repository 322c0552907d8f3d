//! Per-product session pool.
//!
//! Sessions are born on `initialize`, refreshed by every request, and die
//! on explicit close or after sitting idle past the TTL. A periodic sweep
//! in the HTTP layer evicts expired entries; request handling and the
//! sweeper both mutate the map through the same async lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::mcp::server::McpServer;

/// Idle time after which a session is reaped.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Interval between reaper sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct SessionEntry {
    server: Arc<McpServer>,
    last_activity: Instant,
    client_info: Option<String>,
    // MCP processing is sequential per session; this lock serializes it.
    lock: Arc<Mutex<()>>,
}

/// A checked-out session: the per-session server plus its request lock.
#[derive(Clone)]
pub struct SessionHandle {
    /// Per-session MCP server.
    pub server: Arc<McpServer>,
    /// Client label recorded at initialize time.
    pub client_info: Option<String>,
    /// Serializes request processing within the session.
    pub lock: Arc<Mutex<()>>,
}

/// Sessions of one product endpoint, keyed by server-generated id.
///
/// A session id is only ever valid for the pool that created it; other
/// products' pools treat it as unknown.
pub struct SessionPool {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPool {
    /// Creates a pool with the standard TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL)
    }

    /// Creates a pool with a custom TTL (tests shrink it).
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new session and returns its generated id.
    pub async fn insert(&self, server: Arc<McpServer>, client_info: Option<String>) -> String {
        let id = Uuid::new_v4().to_string();
        let entry = SessionEntry {
            server,
            last_activity: Instant::now(),
            client_info,
            lock: Arc::new(Mutex::new(())),
        };
        self.sessions.write().await.insert(id.clone(), entry);
        id
    }

    /// Looks up a session, refreshing its activity timestamp.
    pub async fn touch(&self, id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_activity = Instant::now();
        Some(SessionHandle {
            server: Arc::clone(&entry.server),
            client_info: entry.client_info.clone(),
            lock: Arc::clone(&entry.lock),
        })
    }

    /// Removes a session; returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Evicts sessions idle longer than the TTL; returns the eviction
    /// count.
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, entry| entry.last_activity.elapsed() <= ttl);
        before - sessions.len()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the pool holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
