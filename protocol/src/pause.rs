//! # Pausability
//!
//! A circuit breaker. While paused, entry points that create new
//! obligations (deposits, withdrawal requests, transfers) are rejected;
//! settling obligations that already exist is not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Capability of anything that can be halted by a pauser.
pub trait Pausable {
    /// `true` while paused.
    fn is_paused(&self) -> bool;

    /// Halts gated entry points. Idempotent.
    fn pause(&mut self, by: &Address, at: DateTime<Utc>);

    /// Resumes gated entry points. Idempotent.
    fn unpause(&mut self, by: &Address, at: DateTime<Utc>);
}

/// Who paused, and when. `None` means running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseState {
    paused: Option<PauseRecord>,
}

/// The record of an active pause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseRecord {
    /// The pauser that flipped the switch.
    pub by: Address,
    /// When it happened.
    pub at: DateTime<Utc>,
}

impl PauseState {
    /// The active pause, if any.
    pub fn record(&self) -> Option<&PauseRecord> {
        self.paused.as_ref()
    }
}

impl Pausable for PauseState {
    fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    fn pause(&mut self, by: &Address, at: DateTime<Utc>) {
        if self.paused.is_none() {
            self.paused = Some(PauseRecord { by: by.clone(), at });
        }
    }

    fn unpause(&mut self, _by: &Address, _at: DateTime<Utc>) {
        self.paused = None;
    }
}
