// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Named-permission checks backed by the permission cache.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{PermissionCache, DEFAULT_PERMISSION_TTL};
use crate::error::StoreResult;
use crate::store::DataStore;
use crate::types::{NamedPermission, UserId};

/// Answers "does this user hold permission X" using the cache first and the
/// authoritative store on a miss.
#[derive(Clone)]
pub struct PermissionChecker {
	store: Arc<dyn DataStore>,
	cache: Arc<dyn PermissionCache>,
	ttl: Duration,
}

impl PermissionChecker {
	pub fn new(store: Arc<dyn DataStore>, cache: Arc<dyn PermissionCache>) -> Self {
		Self {
			store,
			cache,
			ttl: DEFAULT_PERMISSION_TTL,
		}
	}

	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;
		self
	}

	#[tracing::instrument(skip(self, user_id), fields(user_id = %user_id))]
	pub async fn has_permission(&self, user_id: UserId, permission: &str) -> StoreResult<bool> {
		if let Some(cached) = self.cache.get(user_id, permission) {
			tracing::trace!(permission, cached, "permission cache hit");
			return Ok(cached);
		}

		let has_permission = self.store.has_named_permission(user_id, permission).await?;
		self.cache.put(user_id, permission, has_permission, self.ttl);
		tracing::debug!(permission, has_permission, "permission resolved from store");
		Ok(has_permission)
	}

	pub async fn has(&self, user_id: UserId, permission: NamedPermission) -> StoreResult<bool> {
		self.has_permission(user_id, &permission.to_string()).await
	}
}
