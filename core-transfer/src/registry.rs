//! Active upload registry
//!
//! Keeps each running upload reachable by id so it can be cancelled without
//! holding its [`UploadHandle`](crate::upload::UploadHandle). Entries are
//! inserted when an upload starts and removed by the upload task itself when
//! it reaches a terminal state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::upload::UploadId;

#[derive(Debug, Default)]
pub struct UploadRegistry {
    active: Mutex<HashMap<UploadId, CancellationToken>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never panic, so a poisoned lock still holds a
    // consistent map.
    fn entries(&self) -> MutexGuard<'_, HashMap<UploadId, CancellationToken>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn insert(&self, id: UploadId, token: CancellationToken) {
        self.entries().insert(id, token);
        debug!(upload_id = %id, "Upload registered");
    }

    pub(crate) fn remove(&self, id: UploadId) {
        if self.entries().remove(&id).is_some() {
            debug!(upload_id = %id, "Upload unregistered");
        }
    }

    pub fn contains(&self, id: UploadId) -> bool {
        self.entries().contains_key(&id)
    }

    /// Ids of uploads that have not reached a terminal state
    pub fn active_ids(&self) -> Vec<UploadId> {
        self.entries().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Request cancellation of one upload. Returns `false` if the id is not
    /// active (unknown or already terminal).
    pub fn cancel(&self, id: UploadId) -> bool {
        match self.entries().get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Request cancellation of every active upload; returns how many were
    /// signalled.
    pub fn cancel_all(&self) -> usize {
        let entries = self.entries();
        for token in entries.values() {
            token.cancel();
        }
        entries.len()
    }
}
