// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Company membership reads and the membership lifecycle.
//!
//! [`MembershipResolver`] answers the questions the engine and the filter
//! builders ask. [`MembershipService`] mutates memberships and enforces the
//! one invariant that spans rows: a company always keeps at least one
//! admin-equivalent member.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cache::PermissionCache;
use crate::error::{AuthzError, AuthzResult, StoreResult};
use crate::store::{DataStore, MembershipStore, MembershipWrite};
use crate::types::{CompanyId, UserId};

// =============================================================================
// Resolver
// =============================================================================

#[derive(Clone)]
pub struct MembershipResolver {
	store: Arc<dyn DataStore>,
}

impl MembershipResolver {
	pub fn new(store: Arc<dyn DataStore>) -> Self {
		Self { store }
	}

	pub async fn is_member(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<bool> {
		self.store.is_member(user_id, company_id).await
	}

	pub async fn is_admin(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<bool> {
		self.store.is_admin(user_id, company_id).await
	}

	/// Companies the user administers.
	pub async fn admin_companies(&self, user_id: UserId) -> StoreResult<BTreeSet<CompanyId>> {
		Ok(self.store.admin_companies_of(user_id).await?.into_iter().collect())
	}

	/// Companies the user belongs to in any role, admin companies included.
	pub async fn member_companies(&self, user_id: UserId) -> StoreResult<BTreeSet<CompanyId>> {
		let mut companies: BTreeSet<CompanyId> = self
			.store
			.member_companies_of(user_id)
			.await?
			.into_iter()
			.collect();
		companies.extend(self.store.admin_companies_of(user_id).await?);
		Ok(companies)
	}

	pub async fn role_of(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<Option<String>> {
		self.store.role_of(user_id, company_id).await
	}
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Adds, re-roles and removes company members.
///
/// The last-admin check runs inside the store write, so it holds under
/// concurrent requests. Every successful write drops the affected user's
/// permission cache entries.
#[derive(Clone)]
pub struct MembershipService {
	store: Arc<dyn MembershipStore>,
	cache: Arc<dyn PermissionCache>,
}

impl MembershipService {
	pub fn new(store: Arc<dyn MembershipStore>, cache: Arc<dyn PermissionCache>) -> Self {
		Self { store, cache }
	}

	#[tracing::instrument(skip(self, company_id, user_id), fields(company_id = %company_id, user_id = %user_id))]
	pub async fn add_member(
		&self,
		company_id: CompanyId,
		user_id: UserId,
		role: &str,
	) -> AuthzResult<()> {
		if !self.store.role_exists(role).await? {
			return Err(AuthzError::UnknownRole(role.to_string()));
		}
		if self.store.role_of(user_id, company_id).await?.is_some() {
			return Err(AuthzError::AlreadyMember {
				user_id,
				company_id,
			});
		}

		self.store.insert_membership(company_id, user_id, role).await?;
		self.cache.invalidate_user(user_id);
		tracing::info!(role, "member added");
		Ok(())
	}

	#[tracing::instrument(skip(self, company_id, user_id), fields(company_id = %company_id, user_id = %user_id))]
	pub async fn change_role(
		&self,
		company_id: CompanyId,
		user_id: UserId,
		new_role: &str,
	) -> AuthzResult<()> {
		if !self.store.role_exists(new_role).await? {
			return Err(AuthzError::UnknownRole(new_role.to_string()));
		}
		let current = self.current_role(company_id, user_id).await?;

		let outcome = self
			.store
			.update_membership_role(company_id, user_id, new_role)
			.await?;
		self.check_write(outcome, company_id, user_id)?;
		self.cache.invalidate_user(user_id);
		tracing::info!(from = %current, to = new_role, "member role changed");
		Ok(())
	}

	#[tracing::instrument(skip(self, company_id, user_id), fields(company_id = %company_id, user_id = %user_id))]
	pub async fn remove_member(&self, company_id: CompanyId, user_id: UserId) -> AuthzResult<()> {
		let current = self.current_role(company_id, user_id).await?;

		let outcome = self.store.delete_membership(company_id, user_id).await?;
		self.check_write(outcome, company_id, user_id)?;
		self.cache.invalidate_user(user_id);
		tracing::info!(role = %current, "member removed");
		Ok(())
	}

	async fn current_role(&self, company_id: CompanyId, user_id: UserId) -> AuthzResult<String> {
		self
			.store
			.role_of(user_id, company_id)
			.await?
			.ok_or(AuthzError::NotMember {
				user_id,
				company_id,
			})
	}

	fn check_write(
		&self,
		outcome: MembershipWrite,
		company_id: CompanyId,
		user_id: UserId,
	) -> AuthzResult<()> {
		match outcome {
			MembershipWrite::Applied => Ok(()),
			MembershipWrite::NotMember => Err(AuthzError::NotMember {
				user_id,
				company_id,
			}),
			MembershipWrite::LastAdmin => {
				tracing::info!("refusing to drop the last company admin");
				Err(AuthzError::LastAdmin { company_id })
			}
		}
	}
}
