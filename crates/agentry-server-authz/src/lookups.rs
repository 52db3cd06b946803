// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded data-store access for validators.
//!
//! Every lookup made while deciding a request goes through [`Lookups`], which
//! applies the configured timeout and turns store failures into
//! [`AuthzError::Upstream`]. Validators never see a raw [`DataStore`].

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AuthzError, AuthzResult, StoreError, StoreResult};
use crate::membership::MembershipResolver;
use crate::permission::PermissionChecker;
use crate::store::{DataStore, OwnershipFact};
use crate::types::{CompanyId, NamedPermission, ResourceKind, UserId};

#[derive(Clone)]
pub struct Lookups {
	store: Arc<dyn DataStore>,
	membership: MembershipResolver,
	permissions: PermissionChecker,
	timeout: Option<Duration>,
}

impl Lookups {
	pub fn new(
		store: Arc<dyn DataStore>,
		permissions: PermissionChecker,
		timeout: Option<Duration>,
	) -> Self {
		Self {
			membership: MembershipResolver::new(store.clone()),
			store,
			permissions,
			timeout,
		}
	}

	pub fn membership(&self) -> &MembershipResolver {
		&self.membership
	}

	pub fn permissions(&self) -> &PermissionChecker {
		&self.permissions
	}

	async fn guarded<T, F>(&self, operation: &'static str, lookup: F) -> AuthzResult<T>
	where
		F: Future<Output = StoreResult<T>>,
	{
		let result = match self.timeout {
			Some(limit) => match tokio::time::timeout(limit, lookup).await {
				Ok(result) => result,
				Err(_) => Err(StoreError::Timeout {
					operation,
					timeout_ms: limit.as_millis() as u64,
				}),
			},
			None => lookup.await,
		};

		result.map_err(|e| {
			tracing::warn!(lookup = operation, error = %e, "data store lookup failed");
			AuthzError::Upstream(e)
		})
	}

	pub async fn ownership(
		&self,
		kind: ResourceKind,
		resource_id: &str,
	) -> AuthzResult<Option<OwnershipFact>> {
		self
			.guarded("get_ownership", self.store.get_ownership(kind, resource_id))
			.await
	}

	pub async fn is_member(&self, user_id: UserId, company_id: CompanyId) -> AuthzResult<bool> {
		self
			.guarded("is_member", self.membership.is_member(user_id, company_id))
			.await
	}

	pub async fn is_admin(&self, user_id: UserId, company_id: CompanyId) -> AuthzResult<bool> {
		self
			.guarded("is_admin", self.membership.is_admin(user_id, company_id))
			.await
	}

	pub async fn member_companies(&self, user_id: UserId) -> AuthzResult<BTreeSet<CompanyId>> {
		self
			.guarded("member_companies", self.membership.member_companies(user_id))
			.await
	}

	pub async fn has_permission(
		&self,
		user_id: UserId,
		permission: NamedPermission,
	) -> AuthzResult<bool> {
		self
			.guarded("has_permission", self.permissions.has(user_id, permission))
			.await
	}
}
