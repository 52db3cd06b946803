// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory [`DataStore`] for tests and single-process tooling.
//!
//! Besides plain storage it can simulate an unavailable or slow backend and
//! counts authoritative permission lookups, which is how cache behaviour is
//! observed in tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::store::{DataStore, MembershipStore, MembershipWrite, OwnershipFact};
use crate::types::{is_admin_role, CompanyId, ResourceKind, UserId, ADMIN_EQUIVALENT_ROLES, MEMBER_ROLE};

#[derive(Debug, Default)]
struct Inner {
	resources: HashMap<(ResourceKind, String), OwnershipFact>,
	memberships: HashMap<(CompanyId, UserId), String>,
	permissions: HashMap<UserId, HashSet<String>>,
	roles: HashSet<String>,
}

impl Inner {
	/// Decides whether `user_id` may stop (or keep) being an admin of the
	/// company. Called with the write lock held.
	fn guard_admin_loss(
		&self,
		company_id: CompanyId,
		user_id: UserId,
		stays_admin: bool,
	) -> MembershipWrite {
		let Some(current) = self.memberships.get(&(company_id, user_id)) else {
			return MembershipWrite::NotMember;
		};
		if stays_admin || !is_admin_role(current) {
			return MembershipWrite::Applied;
		}
		let other_admins = self
			.memberships
			.iter()
			.filter(|((cid, uid), role)| *cid == company_id && *uid != user_id && is_admin_role(role))
			.count();
		if other_admins == 0 {
			MembershipWrite::LastAdmin
		} else {
			MembershipWrite::Applied
		}
	}
}

#[derive(Debug)]
pub struct InMemoryStore {
	inner: RwLock<Inner>,
	unavailable: AtomicBool,
	latency_ms: AtomicU64,
	permission_lookups: AtomicUsize,
}

impl Default for InMemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryStore {
	pub fn new() -> Self {
		let mut inner = Inner::default();
		inner.roles.insert(MEMBER_ROLE.to_string());
		for role in ADMIN_EQUIVALENT_ROLES {
			inner.roles.insert((*role).to_string());
		}

		Self {
			inner: RwLock::new(inner),
			unavailable: AtomicBool::new(false),
			latency_ms: AtomicU64::new(0),
			permission_lookups: AtomicUsize::new(0),
		}
	}

	fn read(&self) -> RwLockReadGuard<'_, Inner> {
		self.inner.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> RwLockWriteGuard<'_, Inner> {
		self.inner.write().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn insert_resource(&self, kind: ResourceKind, fact: OwnershipFact) {
		self.write().resources.insert((kind, fact.id.clone()), fact);
	}

	/// Adds or replaces a membership without any invariant checks.
	pub fn set_membership(&self, company_id: CompanyId, user_id: UserId, role: &str) {
		self
			.write()
			.memberships
			.insert((company_id, user_id), role.to_string());
	}

	pub fn grant_permission(&self, user_id: UserId, permission: impl Into<String>) {
		self
			.write()
			.permissions
			.entry(user_id)
			.or_default()
			.insert(permission.into());
	}

	pub fn revoke_permission(&self, user_id: UserId, permission: &str) {
		if let Some(perms) = self.write().permissions.get_mut(&user_id) {
			perms.remove(permission);
		}
	}

	pub fn add_role(&self, role: impl Into<String>) {
		self.write().roles.insert(role.into());
	}

	/// Makes every subsequent lookup fail with [`StoreError::Unavailable`].
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Delays every lookup by the given duration.
	pub fn set_latency(&self, latency: Duration) {
		self
			.latency_ms
			.store(latency.as_millis() as u64, Ordering::SeqCst);
	}

	/// Number of authoritative permission lookups served so far.
	pub fn permission_lookups(&self) -> usize {
		self.permission_lookups.load(Ordering::SeqCst)
	}

	async fn simulate(&self) -> StoreResult<()> {
		let latency = self.latency_ms.load(Ordering::SeqCst);
		if latency > 0 {
			tokio::time::sleep(Duration::from_millis(latency)).await;
		}
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()));
		}
		Ok(())
	}

	fn companies_where(&self, user_id: UserId, admin_only: bool) -> Vec<CompanyId> {
		let mut companies: Vec<CompanyId> = self
			.read()
			.memberships
			.iter()
			.filter(|((_, uid), role)| *uid == user_id && (!admin_only || is_admin_role(role)))
			.map(|((cid, _), _)| *cid)
			.collect();
		companies.sort();
		companies
	}
}

#[async_trait]
impl DataStore for InMemoryStore {
	async fn get_ownership(
		&self,
		kind: ResourceKind,
		resource_id: &str,
	) -> StoreResult<Option<OwnershipFact>> {
		self.simulate().await?;
		Ok(self
			.read()
			.resources
			.get(&(kind, resource_id.to_string()))
			.cloned())
	}

	async fn is_member(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<bool> {
		Ok(self.role_of(user_id, company_id).await?.is_some())
	}

	async fn is_admin(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<bool> {
		Ok(self
			.role_of(user_id, company_id)
			.await?
			.is_some_and(|role| is_admin_role(&role)))
	}

	async fn admin_companies_of(&self, user_id: UserId) -> StoreResult<Vec<CompanyId>> {
		self.simulate().await?;
		Ok(self.companies_where(user_id, true))
	}

	async fn member_companies_of(&self, user_id: UserId) -> StoreResult<Vec<CompanyId>> {
		self.simulate().await?;
		Ok(self.companies_where(user_id, false))
	}

	async fn role_of(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<Option<String>> {
		self.simulate().await?;
		Ok(self.read().memberships.get(&(company_id, user_id)).cloned())
	}

	async fn has_named_permission(&self, user_id: UserId, permission: &str) -> StoreResult<bool> {
		self.simulate().await?;
		self.permission_lookups.fetch_add(1, Ordering::SeqCst);
		Ok(self
			.read()
			.permissions
			.get(&user_id)
			.is_some_and(|perms| perms.contains(permission)))
	}
}

#[async_trait]
impl MembershipStore for InMemoryStore {
	async fn role_exists(&self, role: &str) -> StoreResult<bool> {
		self.simulate().await?;
		Ok(self.read().roles.contains(role))
	}

	async fn count_admins(&self, company_id: CompanyId) -> StoreResult<i64> {
		self.simulate().await?;
		Ok(self
			.read()
			.memberships
			.iter()
			.filter(|((cid, _), role)| *cid == company_id && is_admin_role(role))
			.count() as i64)
	}

	async fn insert_membership(
		&self,
		company_id: CompanyId,
		user_id: UserId,
		role: &str,
	) -> StoreResult<()> {
		self.simulate().await?;
		let mut inner = self.write();
		if inner.memberships.contains_key(&(company_id, user_id)) {
			return Err(StoreError::Constraint(format!(
				"membership ({user_id}, {company_id}) already exists"
			)));
		}
		inner
			.memberships
			.insert((company_id, user_id), role.to_string());
		Ok(())
	}

	async fn update_membership_role(
		&self,
		company_id: CompanyId,
		user_id: UserId,
		role: &str,
	) -> StoreResult<MembershipWrite> {
		self.simulate().await?;
		let mut inner = self.write();
		let outcome = inner.guard_admin_loss(company_id, user_id, is_admin_role(role));
		if outcome == MembershipWrite::Applied {
			inner
				.memberships
				.insert((company_id, user_id), role.to_string());
		}
		Ok(outcome)
	}

	async fn delete_membership(
		&self,
		company_id: CompanyId,
		user_id: UserId,
	) -> StoreResult<MembershipWrite> {
		self.simulate().await?;
		let mut inner = self.write();
		let outcome = inner.guard_admin_loss(company_id, user_id, false);
		if outcome == MembershipWrite::Applied {
			inner.memberships.remove(&(company_id, user_id));
		}
		Ok(outcome)
	}
}
