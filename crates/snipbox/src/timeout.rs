//! Deadline racing.
//!
//! An execution is modelled as two competing events: the operation itself and
//! a timer. Whichever finishes first wins and the loser is dropped, so a
//! timer can never fire against a later execution that reuses the adapter.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Outcome of [`race_against_deadline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raced<T> {
    Completed(T),
    TimedOut,
}

impl<T> Raced<T> {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Raced::TimedOut)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Raced::Completed(value) => Some(value),
            Raced::TimedOut => None,
        }
    }
}

/// Run `operation` against a `timeout` deadline.
///
/// If the deadline fires first, `on_expire` is called (to force termination
/// of whatever the operation drives) and the operation future is dropped.
pub async fn race_against_deadline<F, T, E>(operation: F, timeout: Duration, on_expire: E) -> Raced<T>
where
    F: Future<Output = T>,
    E: FnOnce(),
{
    tokio::select! {
        biased;
        value = operation => Raced::Completed(value),
        () = tokio::time::sleep(timeout) => {
            on_expire();
            Raced::TimedOut
        }
    }
}

/// A started deadline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.timeout
    }

    /// [`race_against_deadline`] with whatever time is left.
    pub async fn race<F, T, E>(&self, operation: F, on_expire: E) -> Raced<T>
    where
        F: Future<Output = T>,
        E: FnOnce(),
    {
        race_against_deadline(operation, self.remaining(), on_expire).await
    }
}
