// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared concurrency primitives for Loop and Parallel (§4.C9/C10, §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, Semaphore};

/// A cooperative cancellation signal. An awaiting task observes it at its
/// next suspension point; in-flight non-suspending work completes.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a permit pool sized to `max_concurrency`; `0` means unbounded.
pub fn build_semaphore(max_concurrency: usize) -> Arc<Semaphore> {
    if max_concurrency == 0 {
        Arc::new(Semaphore::new(Semaphore::MAX_PERMITS))
    } else {
        Arc::new(Semaphore::new(max_concurrency))
    }
}
