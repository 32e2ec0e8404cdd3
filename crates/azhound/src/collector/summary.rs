//! Run lifecycle and end-of-run reporting.
//!
//! A run moves through `Idle → Enumerating → {Completed | Failed | Cancelled}
//! → Closed`. The state lives in a [`RunStateCell`] shared between the
//! producer task and the [`Collection`](super::Collection) handle so callers
//! can observe it while the run is in progress.

use azhound_core::{Error, Kind};
use core::{fmt, time::Duration};
use portable_atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Enumerating = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
    Closed = 5,
}

impl RunState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Enumerating,
            2 => Self::Completed,
            3 => Self::Failed,
            4 => Self::Cancelled,
            _ => Self::Closed,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Atomic holder of a run's [`RunState`].
#[derive(Debug)]
pub struct RunStateCell(AtomicU8);

impl Default for RunStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateCell {
    pub const fn new() -> Self {
        Self(AtomicU8::new(RunState::Idle as u8))
    }

    pub fn get(&self) -> RunState {
        RunState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to`; returns `false` if the cell was elsewhere.
    pub fn advance(&self, from: RunState, to: RunState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves a terminal state to `Closed`.
    ///
    /// Succeeds exactly once per run; returns `false` when the run is not in a
    /// terminal state, including when it is already closed.
    pub fn close(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                RunState::from_u8(raw)
                    .is_terminal()
                    .then_some(RunState::Closed as u8)
            })
            .is_ok()
    }
}

/// How a run ended.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// The listing was exhausted.
    Completed,
    /// The token was cancelled before the listing was exhausted.
    Cancelled,
    /// The first item or page error stopped the run.
    Failed(Error),
}

impl Outcome {
    pub const fn state(&self) -> RunState {
        match self {
            Self::Completed => RunState::Completed,
            Self::Cancelled => RunState::Cancelled,
            Self::Failed(_) => RunState::Failed,
        }
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Reported once per run, when the output stream closes.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub kind: Kind,
    /// Envelopes published onto the output stream.
    pub count: u64,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match &self.outcome {
            Outcome::Completed => "completed",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed(_) => "failed",
        };
        write!(
            f,
            "{} {}: {} item(s) in {:?}",
            self.kind, outcome, self.count, self.elapsed
        )
    }
}
