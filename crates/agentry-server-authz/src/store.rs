// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository interfaces the decision engine reads from.
//!
//! The engine never talks to a database directly. Adapters implement
//! [`DataStore`] (reads used during a decision) and optionally
//! [`MembershipStore`] (membership writes used by
//! [`crate::membership::MembershipService`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::types::{CompanyId, ResourceKind, UserId};

/// The minimal ownership tuple needed to decide access to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipFact {
	pub id: String,
	pub owner_user_id: Option<UserId>,
	pub company_id: Option<CompanyId>,
	pub is_public: bool,
}

impl OwnershipFact {
	/// A private resource owned by a user, outside any company.
	pub fn personal(id: impl Into<String>, owner: UserId) -> Self {
		Self {
			id: id.into(),
			owner_user_id: Some(owner),
			company_id: None,
			is_public: false,
		}
	}

	/// Builder: scope to a company.
	pub fn in_company(mut self, company_id: CompanyId) -> Self {
		self.company_id = Some(company_id);
		self
	}

	/// Builder: set visibility.
	pub fn public(mut self, is_public: bool) -> Self {
		self.is_public = is_public;
		self
	}

	pub fn is_owned_by(&self, user_id: UserId) -> bool {
		self.owner_user_id == Some(user_id)
	}
}

/// Read-only lookups used while making a decision.
#[async_trait]
pub trait DataStore: Send + Sync {
	/// Returns `None` when the resource does not exist.
	async fn get_ownership(
		&self,
		kind: ResourceKind,
		resource_id: &str,
	) -> StoreResult<Option<OwnershipFact>>;

	async fn is_member(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<bool>;

	/// Must imply [`DataStore::is_member`].
	async fn is_admin(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<bool>;

	async fn admin_companies_of(&self, user_id: UserId) -> StoreResult<Vec<CompanyId>>;

	async fn member_companies_of(&self, user_id: UserId) -> StoreResult<Vec<CompanyId>>;

	async fn role_of(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<Option<String>>;

	/// Authoritative permission check. Never consults a cache.
	async fn has_named_permission(&self, user_id: UserId, permission: &str) -> StoreResult<bool>;
}

/// Outcome of a membership write that may remove an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipWrite {
	Applied,
	/// No membership row for the user in that company.
	NotMember,
	/// Refused: the company would be left without an admin-equivalent member.
	LastAdmin,
}

/// Membership writes.
///
/// Role changes and removals check the last-admin invariant and write in one
/// atomic step, so concurrent demotions cannot both succeed.
#[async_trait]
pub trait MembershipStore: DataStore {
	async fn role_exists(&self, role: &str) -> StoreResult<bool>;

	/// Counts memberships whose role is admin-equivalent.
	async fn count_admins(&self, company_id: CompanyId) -> StoreResult<i64>;

	async fn insert_membership(
		&self,
		company_id: CompanyId,
		user_id: UserId,
		role: &str,
	) -> StoreResult<()>;

	/// Sets the role unless the user is the company's only admin and `role`
	/// is not admin-equivalent.
	async fn update_membership_role(
		&self,
		company_id: CompanyId,
		user_id: UserId,
		role: &str,
	) -> StoreResult<MembershipWrite>;

	/// Deletes the membership unless the user is the company's only admin.
	async fn delete_membership(
		&self,
		company_id: CompanyId,
		user_id: UserId,
	) -> StoreResult<MembershipWrite>;
}
