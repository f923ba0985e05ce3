//! Lock coordination against a server-side advisory lock
//!
//! The coordinator turns a [`LockRequest`] into a [`LockOutcome`] with a single
//! lock query:
//!
//! - `wait_seconds == 0`: `pg_try_advisory_lock`, answered immediately
//! - `wait_seconds > 0`: `pg_advisory_lock`, cancelled at the deadline
//!
//! A lock obtained here belongs to the database session. It is never released
//! explicitly; closing the session releases it.
//!
//! When the deadline fires the coordinator asks the server to cancel and then
//! keeps waiting on the same query. The server decides the result: a grant that
//! lands just before the cancel still reports success and the lock is held.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{Error, Result};

/// One lock attempt: which lock, and how long to wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    lock_id: u32,
    wait_seconds: u32,
}

impl LockRequest {
    pub const fn new(lock_id: u32, wait_seconds: u32) -> Self {
        Self {
            lock_id,
            wait_seconds,
        }
    }

    pub const fn lock_id(&self) -> u32 {
        self.lock_id
    }

    pub const fn wait_seconds(&self) -> u32 {
        self.wait_seconds
    }

    /// Bounded wait, or `None` for a single non-blocking attempt.
    pub fn wait(&self) -> Option<Duration> {
        (self.wait_seconds > 0).then(|| Duration::from_secs(u64::from(self.wait_seconds)))
    }

    pub fn advisory_key(&self) -> i64 {
        advisory_key(self.lock_id)
    }
}

/// Advisory locks are keyed by `bigint`; every `u32` id maps onto its own key.
pub fn advisory_key(lock_id: u32) -> i64 {
    i64::from(lock_id)
}

/// Result of a lock attempt
#[derive(Debug)]
pub enum LockOutcome {
    /// This session holds the lock
    Acquired,
    /// Another session holds the lock (or held it until the deadline)
    NotAcquired,
    /// The attempt itself failed
    Failed(Error),
}

impl LockOutcome {
    pub const fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired)
    }
}

impl From<Result<bool>> for LockOutcome {
    fn from(result: Result<bool>) -> Self {
        match result {
            Ok(true) => Self::Acquired,
            Ok(false) => Self::NotAcquired,
            Err(err) => Self::Failed(err),
        }
    }
}

/// A database session able to take session-level advisory locks.
///
/// Any lock taken through a session stays held until the session ends.
#[async_trait]
pub trait LockSession: Send + Sync {
    /// Non-blocking attempt. `Ok(false)` means another session holds the lock.
    async fn try_advisory_lock(&self, key: i64) -> Result<bool>;

    /// Block until the lock is granted. Completion is the only success signal.
    async fn advisory_lock(&self, key: i64) -> Result<()>;

    /// Ask the server to cancel the statement currently running on this session.
    async fn cancel_in_flight(&self) -> Result<()>;
}

/// Issues the lock query and interprets the server's answer.
pub struct LockCoordinator<'a, S: ?Sized> {
    session: &'a S,
}

impl<'a, S> LockCoordinator<'a, S>
where
    S: LockSession + ?Sized,
{
    pub const fn new(session: &'a S) -> Self {
        Self { session }
    }

    /// Acquire according to the request: a single try, or a bounded wait.
    pub async fn acquire(&self, request: &LockRequest) -> LockOutcome {
        match request.wait() {
            None => {
                info!(lock_id = request.lock_id(), "Trying to obtain lock");
                self.try_acquire(request.lock_id()).await
            }
            Some(wait) => {
                info!(
                    lock_id = request.lock_id(),
                    wait_seconds = request.wait_seconds(),
                    "Obtaining lock with {} seconds timeout",
                    request.wait_seconds()
                );
                self.wait_acquire(request.lock_id(), wait).await
            }
        }
    }

    /// Single non-blocking attempt.
    pub async fn try_acquire(&self, lock_id: u32) -> LockOutcome {
        self.session
            .try_advisory_lock(advisory_key(lock_id))
            .await
            .into()
    }

    /// Blocking attempt, cancelled server-side once `wait` has elapsed.
    pub async fn wait_acquire(&self, lock_id: u32, wait: Duration) -> LockOutcome {
        let query = self.session.advisory_lock(advisory_key(lock_id));
        tokio::pin!(query);

        let result = tokio::select! {
            result = &mut query => result,
            () = tokio::time::sleep(wait) => {
                debug!(lock_id, "Wait deadline elapsed, cancelling lock query");
                if let Err(err) = self.session.cancel_in_flight().await {
                    return LockOutcome::Failed(err);
                }
                query.await
            }
        };

        match result {
            Ok(()) => LockOutcome::Acquired,
            Err(err) if err.is_query_canceled() => {
                debug!(lock_id, "Lock query cancelled by server");
                LockOutcome::NotAcquired
            }
            Err(err) => LockOutcome::Failed(err),
        }
    }
}
