// ABOUTME: Per-user in-process single-flight lock keyed by normalized source URL
// ABOUTME: Release is guard-based so every admission exit path returns the lock
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Single-flight registry.
//!
//! Process-wide `user_id -> normalized_url` mapping under a plain mutex.
//! `try_acquire` succeeds iff the user is absent; the returned guard releases
//! the lock on drop, which is what guarantees the `Free -> Held -> Free` state
//! machine on every exit path of the admission controller. This component is
//! in-process by design; replicating it requires moving the lock into the
//! durable store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::errors::AppError;

/// Process-wide lock table
#[derive(Default)]
pub struct SingleFlightRegistry {
    inner: Mutex<HashMap<Uuid, String>>,
}

/// Releases the held lock on drop; `release` may also be called explicitly
/// and is idempotent
pub struct SingleFlightGuard {
    registry: Arc<SingleFlightRegistry>,
    user_id: Uuid,
    released: bool,
}

impl SingleFlightRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the per-user lock for a normalized URL.
    ///
    /// # Errors
    ///
    /// Returns `ANALYSIS_IN_PROGRESS` carrying the currently locked URL when
    /// the user already holds a lock (regardless of which URL).
    pub fn try_acquire(
        self: &Arc<Self>,
        user_id: Uuid,
        normalized_url: &str,
    ) -> Result<SingleFlightGuard, AppError> {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(locked_url) = table.get(&user_id) {
            return Err(AppError::AnalysisInProgress {
                locked_url: locked_url.clone(),
            });
        }
        table.insert(user_id, normalized_url.to_owned());
        Ok(SingleFlightGuard {
            registry: Arc::clone(self),
            user_id,
            released: false,
        })
    }

    /// Idempotent release of a user's lock
    pub fn release(&self, user_id: Uuid) {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        table.remove(&user_id);
    }

    /// Number of currently held locks (admin snapshot)
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SingleFlightGuard {
    /// Release explicitly; dropping the guard does the same
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(self.user_id);
        }
    }
}

impl Drop for SingleFlightGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
