//! Thread-safe cancellation signals.
//!
//! A [`CancelToken`] fires either explicitly ([`CancelToken::cancel`]) or when
//! its deadline passes. Clones share state, so one clone can be handed to a
//! registration and another kept by the owner to cancel it.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Why a token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// [`CancelToken::cancel`] was called.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    cancelled: bool,
    deadline: Option<Instant>,
}

impl State {
    fn reason(&self, now: Instant) -> Option<CancelReason> {
        if self.cancelled {
            Some(CancelReason::Cancelled)
        } else if self.deadline.is_some_and(|deadline| now >= deadline) {
            Some(CancelReason::DeadlineExceeded)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    fired: Condvar,
}

/// Cloneable cancellation signal with an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelToken {
    /// A token that fires only when cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A token that fires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        let token = Self::new();
        token.lock().deadline = Some(deadline);
        token
    }

    /// Fire the token and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        self.lock().cancelled = true;
        self.shared.fired.notify_all();
    }

    /// Whether the token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Why the token fired, if it has.
    pub fn reason(&self) -> Option<CancelReason> {
        self.lock().reason(Instant::now())
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.lock().deadline
    }

    /// Time left until the deadline. `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Block until the token fires.
    pub fn wait(&self) -> CancelReason {
        let mut state = self.lock();
        loop {
            let now = Instant::now();
            if let Some(reason) = state.reason(now) {
                return reason;
            }
            state = match state.deadline {
                Some(deadline) => {
                    self.shared
                        .fired
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .shared
                    .fired
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Block until the token fires or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CancelReason> {
        let limit = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            let now = Instant::now();
            if let Some(reason) = state.reason(now) {
                return Some(reason);
            }
            if now >= limit {
                return None;
            }
            let until = state.deadline.map_or(limit, |deadline| deadline.min(limit));
            state = self
                .shared
                .fired
                .wait_timeout(state, until - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
