// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Short-lived memoization of named-permission checks.
//!
//! Entries are keyed by `(user, permission)` and expire lazily on read. The
//! cache is not a source of truth: a miss or an expired entry always falls
//! back to the authoritative store, and for a fixed store state
//! [`NoopPermissionCache`] must never change a decision. Grants made directly
//! in the store are picked up once the entry expires or the user is
//! invalidated.
//!
//! The cache lives in process memory and is not shared across instances.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::UserId;

/// Default lifetime of a cached permission decision (15 minutes).
pub const DEFAULT_PERMISSION_TTL: Duration = Duration::from_secs(15 * 60);

/// Source of wall-clock time, injectable for deterministic tests.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
	now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Mutex::new(start),
		}
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
		*now = add_duration(*now, by);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

fn add_duration(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
	chrono::Duration::from_std(by)
		.ok()
		.and_then(|delta| at.checked_add_signed(delta))
		.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A cached permission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCacheEntry {
	pub has_permission: bool,
	pub cached_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl PermissionCacheEntry {
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at <= now
	}
}

pub trait PermissionCache: Send + Sync {
	/// Returns the cached decision, or `None` on a miss or an expired entry.
	fn get(&self, user_id: UserId, permission: &str) -> Option<bool>;

	fn put(&self, user_id: UserId, permission: &str, has_permission: bool, ttl: Duration);

	/// Drops every entry for a user, e.g. after a membership change.
	fn invalidate_user(&self, user_id: UserId);

	fn clear(&self);
}

/// Process-local permission cache guarded by a single mutex.
///
/// Writes for the same key overwrite each other (last write wins).
pub struct InMemoryPermissionCache {
	entries: Mutex<HashMap<(UserId, String), PermissionCacheEntry>>,
	clock: std::sync::Arc<dyn Clock>,
}

impl Default for InMemoryPermissionCache {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryPermissionCache {
	pub fn new() -> Self {
		Self::with_clock(std::sync::Arc::new(SystemClock))
	}

	pub fn with_clock(clock: std::sync::Arc<dyn Clock>) -> Self {
		Self {
			entries: Mutex::new(HashMap::new()),
			clock,
		}
	}

	fn entries(&self) -> MutexGuard<'_, HashMap<(UserId, String), PermissionCacheEntry>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Returns the raw entry, including expired ones. Used for diagnostics.
	pub fn entry(&self, user_id: UserId, permission: &str) -> Option<PermissionCacheEntry> {
		self
			.entries()
			.get(&(user_id, permission.to_string()))
			.copied()
	}

	pub fn len(&self) -> usize {
		self.entries().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries().is_empty()
	}

	/// Removes every expired entry.
	pub fn purge_expired(&self) -> usize {
		let now = self.clock.now();
		let mut entries = self.entries();
		let before = entries.len();
		entries.retain(|_, entry| !entry.is_expired(now));
		before - entries.len()
	}
}

impl PermissionCache for InMemoryPermissionCache {
	fn get(&self, user_id: UserId, permission: &str) -> Option<bool> {
		let now = self.clock.now();
		let key = (user_id, permission.to_string());
		let mut entries = self.entries();

		match entries.get(&key) {
			Some(entry) if !entry.is_expired(now) => Some(entry.has_permission),
			Some(_) => {
				entries.remove(&key);
				tracing::trace!(user_id = %user_id, permission, "expired permission cache entry evicted");
				None
			}
			None => None,
		}
	}

	fn put(&self, user_id: UserId, permission: &str, has_permission: bool, ttl: Duration) {
		let now = self.clock.now();
		self.entries().insert(
			(user_id, permission.to_string()),
			PermissionCacheEntry {
				has_permission,
				cached_at: now,
				expires_at: add_duration(now, ttl),
			},
		);
	}

	fn invalidate_user(&self, user_id: UserId) {
		self.entries().retain(|(uid, _), _| *uid != user_id);
	}

	fn clear(&self) {
		self.entries().clear();
	}
}

/// A cache that never remembers anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPermissionCache;

impl PermissionCache for NoopPermissionCache {
	fn get(&self, _user_id: UserId, _permission: &str) -> Option<bool> {
		None
	}

	fn put(&self, _user_id: UserId, _permission: &str, _has_permission: bool, _ttl: Duration) {}

	fn invalidate_user(&self, _user_id: UserId) {}

	fn clear(&self) {}
}
