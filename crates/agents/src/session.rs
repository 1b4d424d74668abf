//! Cloud credential sessions
//!
//! A session is acquired once per investigation, passed explicitly to every
//! probe, and released on every exit path through [`SessionGuard`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSession {
    pub session_id: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to acquire session for region {region}: {message}")]
    AcquireFailed { region: String, message: String },
}

pub trait SessionProvider: Send + Sync {
    fn acquire(&self, region: &str) -> Result<CloudSession, SessionError>;

    fn release(&self, session: &CloudSession);
}

/// Sessions built from the ambient profile (`AWS_PROFILE`), counted for diagnostics.
#[derive(Debug, Default)]
pub struct StaticSessionProvider {
    profile: Option<String>,
    active: AtomicUsize,
}

impl StaticSessionProvider {
    pub fn new(profile: Option<String>) -> Self {
        Self {
            profile,
            active: AtomicUsize::new(0),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("AWS_PROFILE").ok())
    }

    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl SessionProvider for StaticSessionProvider {
    fn acquire(&self, region: &str) -> Result<CloudSession, SessionError> {
        if region.trim().is_empty() {
            return Err(SessionError::AcquireFailed {
                region: region.to_string(),
                message: "region is empty".to_string(),
            });
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        let session = CloudSession {
            session_id: uuid::Uuid::new_v4().to_string(),
            region: region.to_string(),
            profile: self.profile.clone(),
        };
        debug!(session_id = %session.session_id, region, "Acquired cloud session");
        Ok(session)
    }

    fn release(&self, session: &CloudSession) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!(session_id = %session.session_id, "Released cloud session");
    }
}

/// Releases the wrapped session when dropped
pub struct SessionGuard<'a> {
    provider: &'a dyn SessionProvider,
    session: CloudSession,
}

impl<'a> SessionGuard<'a> {
    pub fn acquire(provider: &'a dyn SessionProvider, region: &str) -> Result<Self, SessionError> {
        let session = provider.acquire(region)?;
        Ok(Self { provider, session })
    }

    pub fn session(&self) -> &CloudSession {
        &self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.provider.release(&self.session);
    }
}
