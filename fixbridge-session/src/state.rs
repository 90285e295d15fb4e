/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Lifecycle state of the harness session.
//!
//! The controller moves through `Idle → Starting → LoggedOn → Stopping → Idle`.
//! [`StateCell`] stores the current state in an atomic so order calls can
//! check it without taking the controller's lock, and exposes the legal
//! transitions as compare-and-swap operations.

use fixbridge_core::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// No session, nothing running.
    #[default]
    Idle = 0,
    /// Engine created, waiting for logon.
    Starting = 1,
    /// Logon dispatched, orders allowed.
    LoggedOn = 2,
    /// Tearing down.
    Stopping = 3,
}

impl LifecycleState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::LoggedOn,
            3 => Self::Stopping,
            _ => Self::Idle,
        }
    }

    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting => "Starting",
            Self::LoggedOn => "LoggedOn",
            Self::Stopping => "Stopping",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic holder of a [`LifecycleState`].
#[derive(Debug, Default)]
pub struct StateCell {
    state: AtomicU8,
}

impl StateCell {
    /// Creates a cell in `Idle`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Idle as u8),
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to` if the cell is currently in `from`.
    ///
    /// # Errors
    /// Returns `BridgeError::InvalidState` naming the actual state otherwise.
    pub fn transition(
        &self,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Result<(), BridgeError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| BridgeError::InvalidState {
                expected: from.to_string(),
                current: LifecycleState::from_u8(actual).to_string(),
            })
    }

    /// Moves to `to` unconditionally, returning the previous state.
    pub fn force(&self, to: LifecycleState) -> LifecycleState {
        LifecycleState::from_u8(self.state.swap(to as u8, Ordering::AcqRel))
    }

    /// Returns `Ok` if the session is logged on.
    ///
    /// # Errors
    /// Returns `BridgeError::NotConnected` in every other state.
    pub fn ensure_logged_on(&self) -> Result<(), BridgeError> {
        match self.get() {
            LifecycleState::LoggedOn => Ok(()),
            _ => Err(BridgeError::NotConnected),
        }
    }
}
