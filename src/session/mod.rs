//! Server-side session storage.
//!
//! Sessions are identified by a random id carried in a cookie. The store is
//! shared by every connection, so it is a [`DashMap`]; each request loads a
//! copy of its session, works on it through a [`Context`](crate::context::Context),
//! and saves it back when the response is ready.
//!
//! A session is only stored once it holds something (a logged-in user or a
//! pending flash message). Clients that never log in leave nothing behind.

use dashmap::DashMap;
use uuid::Uuid;

use crate::context::Flash;

/// Data kept for one session between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    /// Logged-in user, if any.
    pub user: Option<String>,
    /// Flash messages not yet shown.
    pub flash: Vec<Flash>,
    /// Per-session form token, generated when the session is created.
    pub token: String,
}

impl SessionData {
    /// Returns `true` when there is nothing worth keeping between requests.
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.flash.is_empty()
    }
}

/// A session as loaded for one request.
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub id: String,
    pub data: SessionData,
    /// `true` when no session existed for the presented id and a new one was made.
    pub created: bool,
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionData>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the session for `id`, or a [`fresh`](Self::fresh) one when `id`
    /// is absent or unknown. Nothing is stored until [`save`](Self::save).
    pub fn load(&self, id: Option<&str>) -> LoadedSession {
        if let Some(id) = id {
            if let Some(data) = self.sessions.get(id) {
                return LoadedSession {
                    id: id.to_owned(),
                    data: data.clone(),
                    created: false,
                };
            }
        }

        Self::fresh()
    }

    /// A new, not yet stored session with a random id and token.
    pub fn fresh() -> LoadedSession {
        LoadedSession {
            id: Uuid::new_v4().simple().to_string(),
            data: SessionData {
                token: Uuid::new_v4().simple().to_string(),
                ..SessionData::default()
            },
            created: true,
        }
    }

    /// Stores `data` under `id`, replacing what was there.
    pub fn save(&self, id: &str, data: SessionData) {
        self.sessions.insert(id.to_owned(), data);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Removes a session. Returns `true` if it existed.
    pub fn destroy(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
