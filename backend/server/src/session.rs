//! # Sessions
//!
//! In-process map from a v4 UUID cookie to the session's [`ViewState`].
//!
//! - Created on the first successful login, dropped on logout or after sitting idle
//! - Nothing survives a restart, users just log in again
//! - Concurrent requests on one session: last write wins
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderValue,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    response::{AppendHeaders, IntoResponseParts},
};
use gallery::view::{ViewError, ViewState};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

pub const SESSION_COOKIE: &str = "album_session";

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    state: ViewState,
    last_seen: Instant,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Entry>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn expired(&self, entry: &Entry) -> bool {
        entry.last_seen.elapsed() >= self.idle_timeout
    }

    /// `None` for unknown and idle sessions. An idle session is dropped.
    pub fn get(&self, id: Uuid) -> Option<ViewState> {
        let mut sessions = self.lock();

        match sessions.get(&id) {
            Some(entry) if self.expired(entry) => {
                sessions.remove(&id);
                debug!("Session expired after {:?} idle", self.idle_timeout);
                None
            }
            Some(entry) => Some(entry.state.clone()),
            None => None,
        }
    }

    /// Stores the state and drops every idle session.
    pub fn put(&self, id: Uuid, state: ViewState) {
        let mut sessions = self.lock();

        sessions.retain(|_, entry| !self.expired(entry));
        sessions.insert(
            id,
            Entry {
                state,
                last_seen: Instant::now(),
            },
        );
    }

    pub fn remove(&self, id: Uuid) -> Option<ViewState> {
        self.lock().remove(&id).map(|entry| entry.state)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Session id from the cookie, if the request carries a well-formed one.
pub struct SessionId(pub Option<Uuid>);

impl SessionId {
    pub fn require(&self) -> Result<Uuid, AppError> {
        self.0.ok_or(AppError::View(ViewError::LoginRequired))
    }
}

fn find_cookie(parts: &Parts) -> Option<Uuid> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionId(find_cookie(parts)))
    }
}

pub fn set_cookie(id: Uuid) -> impl IntoResponseParts {
    let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");

    AppendHeaders([(
        SET_COOKIE,
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static("")),
    )])
}

pub fn clear_cookie() -> impl IntoResponseParts {
    AppendHeaders([(
        SET_COOKIE,
        HeaderValue::from_static("album_session=; Path=/; HttpOnly; Max-Age=0"),
    )])
}
