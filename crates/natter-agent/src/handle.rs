//! A cloneable handle for cancelling a session's request from other tasks.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for poking the session from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
    pub(crate) in_flight: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the in-flight request, if any.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether a request is currently in flight.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait until no request is in flight.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_running() {
            return;
        }
        notified.await;
    }

    /// Wait until idle, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        if !self.is_running() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }

    /// Claim the session for one request.
    ///
    /// Returns `None` while another request holds it. On success a fresh
    /// cancellation token is installed, so a stale `cancel()` aimed at an
    /// earlier request cannot hit this one.
    ///
    /// The cancel lock is held across the claim: anyone who sees
    /// `is_running()` and then calls `cancel()` reaches the new token.
    pub(crate) fn begin(&self) -> Option<(CancellationToken, InFlight)> {
        let mut current = self.cancel.lock();
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let token = CancellationToken::new();
        *current = token.clone();
        drop(current);
        Some((
            token,
            InFlight {
                handle: self.clone(),
                released: false,
            },
        ))
    }
}

/// Marks the session busy until released or dropped.
pub(crate) struct InFlight {
    handle: SessionHandle,
    released: bool,
}

impl InFlight {
    pub(crate) fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.handle.in_flight.store(false, Ordering::Release);
            self.handle.idle_notify.notify_waiters();
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.release();
    }
}
