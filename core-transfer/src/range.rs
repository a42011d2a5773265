//! Byte ranges and upload targets
//!
//! All ranges are half-open: `[lower_bound, upper_bound)`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::adapter::UploadSessionHandle;

/// Exactly the bytes of one upload part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferRange {
    pub lower_bound: u64,
    pub upper_bound: u64,
}

impl TransferRange {
    pub fn new(lower_bound: u64, upper_bound: u64) -> Self {
        Self {
            lower_bound,
            upper_bound,
        }
    }

    /// Build from an inclusive `first-last` pair as used in HTTP headers
    pub fn from_inclusive(first: u64, last: u64) -> Self {
        Self::new(first, last.saturating_add(1))
    }

    /// First part of an upload: `[0, min(part_size, total_size))`
    pub fn first(part_size: u64, total_size: u64) -> Self {
        Self::new(0, part_size.min(total_size))
    }

    /// The locally computed part after this one, or `None` when this range
    /// already ends at `total_size`.
    pub fn following(&self, part_size: u64, total_size: u64) -> Option<Self> {
        if self.upper_bound >= total_size {
            return None;
        }
        let upper = self.upper_bound.saturating_add(part_size).min(total_size);
        Some(Self::new(self.upper_bound, upper))
    }

    pub fn len(&self) -> u64 {
        self.upper_bound.saturating_sub(self.lower_bound)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `0 <= lower < upper <= total_size`
    pub fn is_valid_for(&self, total_size: u64) -> bool {
        self.lower_bound < self.upper_bound && self.upper_bound <= total_size
    }

    /// Inclusive index of the last byte
    pub fn last_byte(&self) -> u64 {
        self.upper_bound.saturating_sub(1)
    }

    /// `Content-Range` header value, e.g. `bytes 0-99/250`
    pub fn content_range(&self, total_size: u64) -> String {
        format!(
            "bytes {}-{}/{}",
            self.lower_bound,
            self.last_byte(),
            total_size
        )
    }
}

impl fmt::Display for TransferRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower_bound, self.upper_bound)
    }
}

/// Iterator over the locally computed ranges of an upload
///
/// Used when no server continuation intervenes; the upload engine walks the
/// same sequence one step at a time with [`TransferRange::following`].
#[derive(Debug, Clone)]
pub struct RangePlan {
    next: Option<TransferRange>,
    part_size: u64,
    total_size: u64,
}

impl RangePlan {
    pub fn new(part_size: u64, total_size: u64) -> Self {
        let next = if part_size == 0 || total_size == 0 {
            None
        } else {
            Some(TransferRange::first(part_size, total_size))
        };
        Self {
            next,
            part_size,
            total_size,
        }
    }
}

impl Iterator for RangePlan {
    type Item = TransferRange;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.following(self.part_size, self.total_size);
        Some(current)
    }
}

/// Where an upload is going and how it is split
///
/// Created once the session exists. Only `part_size` may change afterwards,
/// and only when a continuation response revises it.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    total_size: u64,
    part_size: u64,
    session: UploadSessionHandle,
}

impl UploadTarget {
    /// `part_size` is clipped to `total_size`.
    pub fn new(total_size: u64, part_size: u64, session: UploadSessionHandle) -> Self {
        Self {
            total_size,
            part_size: part_size.min(total_size),
            session,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    pub fn session(&self) -> &UploadSessionHandle {
        &self.session
    }

    pub(crate) fn revise_part_size(&mut self, part_size: u64) {
        self.part_size = part_size.min(self.total_size);
    }
}
