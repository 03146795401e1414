// SPDX-License-Identifier: MIT

//! Short-lived confirmation sessions for block/edit prompts.
//!
//! A session holds one toggle per catalog reason and a single confirm/cancel
//! resolution, bounded by a single-shot deadline. Rendering and transport are
//! external; this module only owns the interaction state. Late interactions
//! after expiry or resolution are rejected and never retried.

use crate::reason::ReasonTag;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("prompt has expired")]
    Expired,
    #[error("prompt already resolved")]
    AlreadyResolved,
    #[error("only the prompt initiator may interact")]
    NotInitiator,
    #[error("select at least one reason")]
    NothingSelected,
    #[error("unknown prompt")]
    UnknownPrompt,
}

/// How a session ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Confirmed {
        reasons: Vec<ReasonTag>,
        /// True when a privileged edit confirmed with no reasons selected,
        /// which means "delete the record"
        delete: bool,
    },
    Cancelled,
}

/// One open confirmation prompt
#[derive(Clone, Debug)]
pub struct PromptSession {
    initiator: String,
    deadline: Instant,
    toggles: [bool; ReasonTag::CATALOG.len()],
    may_delete: bool,
    resolved: bool,
}

impl PromptSession {
    pub fn new(
        initiator: impl Into<String>,
        preselected: &[ReasonTag],
        may_delete: bool,
        deadline: Instant,
    ) -> Self {
        let mut toggles = [false; ReasonTag::CATALOG.len()];
        for (i, tag) in ReasonTag::CATALOG.iter().enumerate() {
            toggles[i] = preselected.contains(tag);
        }
        Self {
            initiator: initiator.into(),
            deadline,
            toggles,
            may_delete,
            resolved: false,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    fn guard(&self, actor: &str, now: Instant) -> Result<(), SessionError> {
        if self.resolved {
            return Err(SessionError::AlreadyResolved);
        }
        if self.is_expired(now) {
            return Err(SessionError::Expired);
        }
        if actor != self.initiator {
            return Err(SessionError::NotInitiator);
        }
        Ok(())
    }

    /// Flip a reason toggle; returns its new state
    pub fn toggle(
        &mut self,
        actor: &str,
        tag: ReasonTag,
        now: Instant,
    ) -> Result<bool, SessionError> {
        self.guard(actor, now)?;
        let index = ReasonTag::CATALOG
            .iter()
            .position(|t| *t == tag)
            .unwrap_or_default();
        self.toggles[index] = !self.toggles[index];
        Ok(self.toggles[index])
    }

    /// Reasons currently selected, in catalog order
    pub fn selected(&self) -> Vec<ReasonTag> {
        ReasonTag::CATALOG
            .iter()
            .zip(self.toggles)
            .filter_map(|(tag, on)| on.then_some(*tag))
            .collect()
    }

    /// Whether confirm is currently permitted
    pub fn can_confirm(&self) -> bool {
        self.toggles.iter().any(|on| *on) || self.may_delete
    }

    pub fn confirm(&mut self, actor: &str, now: Instant) -> Result<Resolution, SessionError> {
        self.guard(actor, now)?;
        let reasons = self.selected();
        if reasons.is_empty() && !self.may_delete {
            return Err(SessionError::NothingSelected);
        }
        self.resolved = true;
        let delete = reasons.is_empty();
        Ok(Resolution::Confirmed { reasons, delete })
    }

    pub fn cancel(&mut self, actor: &str, now: Instant) -> Result<Resolution, SessionError> {
        self.guard(actor, now)?;
        self.resolved = true;
        Ok(Resolution::Cancelled)
    }
}

/// Open sessions keyed by the outbound prompt id
#[derive(Debug, Default)]
pub struct SessionTable {
    inner: Mutex<HashMap<String, PromptSession>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly sent prompt, replacing any stale one under the key
    pub fn open(&self, prompt_id: impl Into<String>, session: PromptSession) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.insert(prompt_id.into(), session);
    }

    pub fn toggle(
        &self,
        prompt_id: &str,
        actor: &str,
        tag: ReasonTag,
        now: Instant,
    ) -> Result<bool, SessionError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let session = inner.get_mut(prompt_id).ok_or(SessionError::UnknownPrompt)?;
        session.toggle(actor, tag, now)
    }

    /// Confirm and close the session
    pub fn confirm(
        &self,
        prompt_id: &str,
        actor: &str,
        now: Instant,
    ) -> Result<Resolution, SessionError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let session = inner.get_mut(prompt_id).ok_or(SessionError::UnknownPrompt)?;
        let resolution = session.confirm(actor, now)?;
        inner.remove(prompt_id);
        Ok(resolution)
    }

    /// Cancel and close the session
    pub fn cancel(
        &self,
        prompt_id: &str,
        actor: &str,
        now: Instant,
    ) -> Result<Resolution, SessionError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let session = inner.get_mut(prompt_id).ok_or(SessionError::UnknownPrompt)?;
        let resolution = session.cancel(actor, now)?;
        inner.remove(prompt_id);
        Ok(resolution)
    }

    /// Drop sessions whose deadline has passed; returns how many were evicted
    pub fn evict_expired(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = inner.len();
        inner.retain(|_, session| !session.is_expired(now));
        before - inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
