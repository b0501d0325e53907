// SPDX-FileCopyrightText: © 2025 MixKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Engine lifecycle state machine vocabulary.
//!
//! The engine walks the ladder `Stopped ↔ Ready ↔ Paused ↔ Playing` one
//! rung at a time. The `Ready → Paused` rung gates on preroll: it reports
//! [`StateChange::Async`] until every connected port has delivered a first
//! buffer or reached end-of-stream.
//!
//! ```text
//!     Stopped
//!        ↕
//!      Ready
//!        ↕        (upward crossing blocks on the preroll gate)
//!      Paused
//!        ↕
//!     Playing
//! ```

use serde::{Deserialize, Serialize};

/// The engine's lifecycle states, in ladder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No resources held, no session state.
    Stopped,
    /// Ready to accept ports and allocate a session.
    Ready,
    /// Session active; prerolling or holding a prerolled stream.
    Paused,
    /// Producing output.
    Playing,
}

impl EngineState {
    /// The next rung toward `target`, or `None` when already there.
    pub fn step_toward(self, target: Self) -> Option<Self> {
        use EngineState::{Paused, Playing, Ready, Stopped};
        match (self, target) {
            (a, b) if a == b => None,
            (Stopped, _) => Some(Ready),
            (Ready, Stopped) => Some(Stopped),
            (Ready, _) => Some(Paused),
            (Paused, Playing) => Some(Playing),
            (Paused, _) => Some(Ready),
            (Playing, _) => Some(Paused),
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Ready => "ready",
            Self::Paused => "paused",
            Self::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Immediate outcome of a state-change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// The transition completed synchronously.
    Success,
    /// The transition is in progress (preroll gate not yet satisfied).
    Async,
    /// The transition is not possible from the current state.
    Failure,
}

/// Snapshot answer to a state query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentState {
    Stopped,
    Ready,
    Paused,
    Playing,
    /// An asynchronous transition has not settled yet.
    TransitionPending,
}

impl From<EngineState> for CurrentState {
    fn from(state: EngineState) -> Self {
        match state {
            EngineState::Stopped => Self::Stopped,
            EngineState::Ready => Self::Ready,
            EngineState::Paused => Self::Paused,
            EngineState::Playing => Self::Playing,
        }
    }
}

/// Outcome of a bounded wait for a pending transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateWait {
    /// The transition settled; this is the state it settled in.
    Success(EngineState),
    /// Still pending when the wait expired.
    Pending,
    /// The engine failed terminally while waiting.
    Failure,
}
