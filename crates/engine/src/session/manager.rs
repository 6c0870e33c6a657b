//! Bounded list of open sessions with an active index

use super::SessionHandle;
use citenet_common::errors::{AppError, Result};
use citenet_common::metrics::record_session_event;

/// Open sessions, oldest first
#[derive(Debug)]
pub struct SessionManager {
    sessions: Vec<SessionHandle>,
    active: Option<usize>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Vec::new(),
            active: None,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Add a session and make it active
    ///
    /// Evicts the oldest sessions while over capacity. Returns the new
    /// session's index.
    pub fn push(&mut self, handle: SessionHandle) -> usize {
        self.sessions.push(handle);
        while self.sessions.len() > self.max_sessions {
            let evicted = self.sessions.remove(0);
            evicted.mark_closed();
            tracing::info!(session_id = %evicted.id(), "Evicted oldest session");
            record_session_event("evicted", self.sessions.len());
        }

        let index = self.sessions.len() - 1;
        self.active = Some(index);
        record_session_event("created", self.sessions.len());
        index
    }

    /// Close the session at `index`
    ///
    /// Returns the newly active index: the previous one when the active
    /// session was closed, `None` when nothing is left.
    pub fn close(&mut self, index: usize) -> Result<Option<usize>> {
        if index >= self.sessions.len() {
            return Err(AppError::SessionNotFound { index });
        }
        let closed = self.sessions.remove(index);
        closed.mark_closed();
        tracing::info!(session_id = %closed.id(), index, "Closed session");
        record_session_event("closed", self.sessions.len());

        self.active = match self.active {
            _ if self.sessions.is_empty() => None,
            Some(active) if active == index => Some(index.saturating_sub(1)),
            Some(active) if active > index => Some(active - 1),
            other => other,
        };
        Ok(self.active)
    }

    pub fn switch_to(&mut self, index: usize) -> Result<SessionHandle> {
        let handle = self.get(index)?;
        self.active = Some(index);
        Ok(handle)
    }

    pub fn get(&self, index: usize) -> Result<SessionHandle> {
        self.sessions
            .get(index)
            .cloned()
            .ok_or(AppError::SessionNotFound { index })
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<SessionHandle> {
        self.active.and_then(|i| self.sessions.get(i).cloned())
    }

    pub fn sessions(&self) -> &[SessionHandle] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Replace all sessions with restored ones
    pub fn restore(&mut self, sessions: Vec<SessionHandle>, active: Option<usize>) {
        for old in self.sessions.drain(..) {
            old.mark_closed();
        }
        self.sessions = sessions;
        while self.sessions.len() > self.max_sessions {
            self.sessions.remove(0);
        }
        self.active = match active {
            Some(i) if i < self.sessions.len() => Some(i),
            _ if self.sessions.is_empty() => None,
            _ => Some(self.sessions.len() - 1),
        };
    }
}
