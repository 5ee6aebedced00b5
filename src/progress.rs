//! Progress reporting and cooperative cancellation.
//!
//! A [`Progress`] wraps an optional caller callback and a
//! [`CancellationToken`]. Reported values are clamped to `[0, 1]` and only
//! forwarded when they increase, so callers always observe a monotonic
//! sequence no matter which stage reports.
//!
//! Cancellation is checked at stage and loop boundaries via
//! [`Progress::checkpoint`]. A running encode is never interrupted; the
//! request notices the flag at its next checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Fraction of the remaining distance the ramp covers per tick.
const RAMP_EASING: f32 = 0.15;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Progress sink for one request (or one document).
pub struct Progress {
    callback: Option<ProgressCallback>,
    token: CancellationToken,
    last: Mutex<Option<f32>>,
}

impl Progress {
    /// No callback, never cancelled.
    pub fn silent() -> Self {
        Self::with_token(None, CancellationToken::new())
    }

    pub fn new(callback: impl Fn(f32) + Send + Sync + 'static) -> Self {
        Self::with_token(Some(Arc::new(callback)), CancellationToken::new())
    }

    pub fn with_token(callback: Option<ProgressCallback>, token: CancellationToken) -> Self {
        Self {
            callback,
            token,
            last: Mutex::new(None),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Forward `value` if it is greater than everything reported so far.
    pub fn report(&self, value: f32) {
        let Some(callback) = &self.callback else {
            return;
        };
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if last.is_some_and(|prev| value <= prev) {
            return;
        }
        *last = Some(value);
        callback(value);
    }

    /// Fail with [`Cancelled`] once the token has been cancelled.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.token.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run `work` while a ticker eases the reported value from `from`
    /// toward `to`.
    ///
    /// The ramp is cosmetic: it keeps a progress bar moving during a
    /// blocking phase and says nothing about how far `work` has got. The
    /// ticker stops as soon as `work` returns and never reaches `to` itself.
    pub fn ramp<T>(&self, from: f32, to: f32, interval: Duration, work: impl FnOnce() -> T) -> T {
        self.report(from);
        if self.callback.is_none() || interval.is_zero() {
            return work();
        }

        let (done_tx, done_rx) = mpsc::channel::<()>();
        let this = self;
        thread::scope(|scope| {
            scope.spawn(move || {
                let mut current = from;
                while let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(interval) {
                    current += (to - current) * RAMP_EASING;
                    this.report(current);
                }
            });
            let result = work();
            drop(done_tx);
            result
        })
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::silent()
    }
}
