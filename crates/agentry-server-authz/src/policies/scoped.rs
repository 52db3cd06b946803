// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ownership and company-scope policy shared by the built-in resource kinds.

use async_trait::async_trait;

use super::{default_rules, CreateScope, ResourceRules, ResourceValidator};
use crate::context::SecurityContext;
use crate::decision::{AccessDecision, DenyReason};
use crate::error::AuthzResult;
use crate::lookups::Lookups;
use crate::types::{NamedPermission, Operation, ResourceKind, Role, UserId};

#[derive(Debug, Clone, Copy)]
pub struct ScopedPolicy {
	kind: ResourceKind,
	rules: ResourceRules,
}

impl ScopedPolicy {
	pub fn new(kind: ResourceKind, rules: ResourceRules) -> Self {
		Self { kind, rules }
	}

	pub fn for_kind(kind: ResourceKind) -> Self {
		Self::new(kind, default_rules(kind))
	}

	async fn public(&self, ctx: &SecurityContext, lookups: &Lookups) -> AuthzResult<AccessDecision> {
		if ctx.operation != Operation::Read {
			return Ok(AccessDecision::Denied(DenyReason::PublicReadOnly));
		}
		if !self.rules.public_visibility || ctx.data.is_public == Some(false) {
			return Ok(AccessDecision::Denied(DenyReason::NotPublic));
		}

		let Some(resource_id) = ctx.resource_id.as_deref() else {
			return Ok(AccessDecision::Allowed);
		};
		match lookups.ownership(self.kind, resource_id).await? {
			Some(fact) => Ok(AccessDecision::allow_if(fact.is_public, DenyReason::NotPublic)),
			None => Ok(AccessDecision::Denied(DenyReason::NotFound)),
		}
	}

	async fn create(
		&self,
		ctx: &SecurityContext,
		user_id: UserId,
		lookups: &Lookups,
	) -> AuthzResult<AccessDecision> {
		if self.rules.create_scope == CreateScope::Ignored {
			return Ok(AccessDecision::Allowed);
		}

		match ctx.scope_company() {
			Some(company_id) => Ok(AccessDecision::allow_if(
				lookups.is_member(user_id, company_id).await?,
				DenyReason::NotMember,
			)),
			None if self.rules.create_scope == CreateScope::Required => {
				Ok(AccessDecision::Denied(DenyReason::CompanyScopeRequired))
			}
			None => Ok(AccessDecision::Allowed),
		}
	}

	async fn read(
		&self,
		ctx: &SecurityContext,
		user_id: UserId,
		lookups: &Lookups,
	) -> AuthzResult<AccessDecision> {
		let Some(resource_id) = ctx.resource_id.as_deref() else {
			return Ok(AccessDecision::Allowed);
		};
		let Some(fact) = lookups.ownership(self.kind, resource_id).await? else {
			return Ok(AccessDecision::Denied(DenyReason::NotFound));
		};

		if (fact.is_public && self.rules.public_visibility) || fact.is_owned_by(user_id) {
			return Ok(AccessDecision::Allowed);
		}
		match fact.company_id {
			Some(company_id) => Ok(AccessDecision::allow_if(
				lookups.is_member(user_id, company_id).await?,
				DenyReason::NotVisible,
			)),
			None => Ok(AccessDecision::Denied(DenyReason::NotVisible)),
		}
	}

	/// Update and delete. `elevated` adds company-admin rights on top of ownership.
	async fn mutate(
		&self,
		ctx: &SecurityContext,
		user_id: UserId,
		elevated: bool,
		lookups: &Lookups,
	) -> AuthzResult<AccessDecision> {
		if ctx.data_owned_by_caller() {
			return Ok(AccessDecision::Allowed);
		}

		let company_id = match ctx.resource_id.as_deref() {
			Some(resource_id) => {
				let Some(fact) = lookups.ownership(self.kind, resource_id).await? else {
					return Ok(AccessDecision::Denied(DenyReason::NotFound));
				};
				if fact.is_owned_by(user_id) {
					return Ok(AccessDecision::Allowed);
				}
				fact.company_id
			}
			None => ctx.scope_company(),
		};

		match company_id {
			Some(company_id) if elevated => Ok(AccessDecision::allow_if(
				lookups.is_admin(user_id, company_id).await?,
				DenyReason::NotOwner,
			)),
			_ => Ok(AccessDecision::Denied(DenyReason::NotOwner)),
		}
	}

	async fn system_admin(
		&self,
		ctx: &SecurityContext,
		user_id: UserId,
		lookups: &Lookups,
	) -> AuthzResult<AccessDecision> {
		let permission = NamedPermission::new(self.kind, ctx.operation);
		Ok(AccessDecision::allow_if(
			lookups.has_permission(user_id, permission).await?,
			DenyReason::MissingPermission(permission.to_string()),
		))
	}
}

#[async_trait]
impl ResourceValidator for ScopedPolicy {
	fn kind(&self) -> ResourceKind {
		self.kind
	}

	fn public_visibility(&self) -> bool {
		self.rules.public_visibility
	}

	async fn validate(&self, ctx: &SecurityContext, lookups: &Lookups) -> AuthzResult<AccessDecision> {
		let user_id = match (ctx.user_role, ctx.user_id) {
			(Role::Public, _) => return self.public(ctx, lookups).await,
			(_, Some(user_id)) => user_id,
			(_, None) => return Ok(AccessDecision::Denied(DenyReason::Unauthenticated)),
		};

		match (ctx.user_role, ctx.operation) {
			(Role::Public, _) => self.public(ctx, lookups).await,
			(Role::Admin, _) => self.system_admin(ctx, user_id, lookups).await,
			(Role::User | Role::CompanyAdmin, Operation::Create) => self.create(ctx, user_id, lookups).await,
			(Role::User | Role::CompanyAdmin, Operation::Read) => self.read(ctx, user_id, lookups).await,
			(Role::User, Operation::Update | Operation::Delete) => {
				self.mutate(ctx, user_id, false, lookups).await
			}
			(Role::CompanyAdmin, Operation::Update | Operation::Delete) => {
				self.mutate(ctx, user_id, true, lookups).await
			}
		}
	}
}
