//src/session.rs
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    Active,
    Paused,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Cannot {action} a session that is {status}")]
pub struct SessionError {
    pub status: SessionStatus,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    /// `banked` seconds accumulated before `since`.
    Active { since: DateTime<Utc>, banked: u32 },
    Paused { banked: u32 },
    Ended { duration: u32 },
}

/// Timer bookkeeping for a workout in progress.
///
/// Only the final duration is persisted; the session itself lives in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkoutSession {
    state: State,
}

impl Default for WorkoutSession {
    fn default() -> Self {
        Self::new()
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    u32::try_from((to - from).num_seconds().max(0)).unwrap_or(u32::MAX)
}

impl WorkoutSession {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: State::NotStarted,
        }
    }

    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        match self.state {
            State::NotStarted => SessionStatus::NotStarted,
            State::Active { .. } => SessionStatus::Active,
            State::Paused { .. } => SessionStatus::Paused,
            State::Ended { .. } => SessionStatus::Ended,
        }
    }

    const fn refuse(&self, action: &'static str) -> SessionError {
        SessionError {
            status: self.status(),
            action,
        }
    }

    /// # Errors
    /// Fails unless the session has not started yet.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            State::NotStarted => {
                self.state = State::Active {
                    since: now,
                    banked: 0,
                };
                Ok(())
            }
            _ => Err(self.refuse("start")),
        }
    }

    /// # Errors
    /// Fails unless the session is active.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            State::Active { since, banked } => {
                self.state = State::Paused {
                    banked: banked.saturating_add(seconds_between(since, now)),
                };
                Ok(())
            }
            _ => Err(self.refuse("pause")),
        }
    }

    /// # Errors
    /// Fails unless the session is paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            State::Paused { banked } => {
                self.state = State::Active { since: now, banked };
                Ok(())
            }
            _ => Err(self.refuse("resume")),
        }
    }

    /// Overwrites the elapsed time. The session keeps its state.
    ///
    /// # Errors
    /// Fails unless the session is active or paused.
    pub fn adjust_elapsed(&mut self, seconds: u32, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            State::Active { .. } => {
                self.state = State::Active {
                    since: now,
                    banked: seconds,
                };
                Ok(())
            }
            State::Paused { .. } => {
                self.state = State::Paused { banked: seconds };
                Ok(())
            }
            _ => Err(self.refuse("adjust")),
        }
    }

    /// Elapsed whole seconds as of `now`.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> u32 {
        match self.state {
            State::NotStarted => 0,
            State::Active { since, banked } => banked.saturating_add(seconds_between(since, now)),
            State::Paused { banked } => banked,
            State::Ended { duration } => duration,
        }
    }

    /// Stops the session for good and returns the duration to persist.
    ///
    /// # Errors
    /// Fails unless the session is active or paused.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<u32, SessionError> {
        match self.state {
            State::Active { .. } | State::Paused { .. } => {
                let duration = self.elapsed(now);
                self.state = State::Ended { duration };
                Ok(duration)
            }
            _ => Err(self.refuse("end")),
        }
    }
}
