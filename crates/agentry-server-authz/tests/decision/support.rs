// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared fixtures for decision engine tests.
//!
//! Two companies, five users and a handful of resources:
//!
//! | user       | company A | company B | permissions              |
//! |------------|-----------|-----------|--------------------------|
//! | `owner_a`  | owner     |           |                          |
//! | `member_a` | member    |           |                          |
//! | `owner_b`  |           | owner     |                          |
//! | `outsider` |           |           |                          |
//! | `sysadmin` |           |           | agent:read, agent:update |

use std::sync::Arc;

use agentry_server_authz::{
	AccessDecision, AccessDecisionEngine, AuthzError, CompanyId, DenyReason, InMemoryPermissionCache,
	InMemoryStore, ManualClock, OwnershipFact, PermissionCache, ResourceKind, SecurityContext,
	UserId, MEMBER_ROLE,
};
use chrono::Utc;

pub const AGENT_PERSONAL: &str = "agent-personal";
pub const AGENT_COMPANY_A: &str = "agent-company-a";
pub const AGENT_PUBLIC: &str = "agent-public";
pub const AGENT_COMPANY_B: &str = "agent-company-b";
pub const TOOL_A: &str = "tool-a";
pub const TEAM_A: &str = "team-a";

pub struct Fixtures {
	pub store: Arc<InMemoryStore>,
	pub cache: Arc<InMemoryPermissionCache>,
	pub clock: Arc<ManualClock>,
	pub engine: AccessDecisionEngine,
	pub company_a: CompanyId,
	pub company_b: CompanyId,
	pub owner_a: UserId,
	pub member_a: UserId,
	pub owner_b: UserId,
	pub outsider: UserId,
	pub sysadmin: UserId,
}

impl Fixtures {
	pub fn new() -> Self {
		let store = Arc::new(InMemoryStore::new());
		let clock = Arc::new(ManualClock::new(Utc::now()));
		let cache = Arc::new(InMemoryPermissionCache::with_clock(clock.clone()));

		let company_a = CompanyId::generate();
		let company_b = CompanyId::generate();
		let owner_a = UserId::generate();
		let member_a = UserId::generate();
		let owner_b = UserId::generate();
		let outsider = UserId::generate();
		let sysadmin = UserId::generate();

		store.set_membership(company_a, owner_a, "owner");
		store.set_membership(company_a, member_a, MEMBER_ROLE);
		store.set_membership(company_b, owner_b, "owner");
		store.grant_permission(sysadmin, "agent:read");
		store.grant_permission(sysadmin, "agent:update");

		store.insert_resource(ResourceKind::Agent, OwnershipFact::personal(AGENT_PERSONAL, member_a));
		store.insert_resource(
			ResourceKind::Agent,
			OwnershipFact::personal(AGENT_COMPANY_A, member_a).in_company(company_a),
		);
		store.insert_resource(
			ResourceKind::Agent,
			OwnershipFact::personal(AGENT_PUBLIC, owner_b).public(true),
		);
		store.insert_resource(
			ResourceKind::Agent,
			OwnershipFact::personal(AGENT_COMPANY_B, owner_b).in_company(company_b),
		);
		store.insert_resource(
			ResourceKind::Tool,
			OwnershipFact::personal(TOOL_A, member_a).in_company(company_a),
		);
		store.insert_resource(
			ResourceKind::Team,
			OwnershipFact::personal(TEAM_A, owner_a).in_company(company_a),
		);
		store.insert_resource(
			ResourceKind::Company,
			OwnershipFact::personal(company_a.to_string(), owner_a).in_company(company_a),
		);

		let engine = AccessDecisionEngine::builder(store.clone())
			.with_default_validators()
			.with_cache(cache.clone())
			.build();

		Self {
			store,
			cache,
			clock,
			engine,
			company_a,
			company_b,
			owner_a,
			member_a,
			owner_b,
			outsider,
			sysadmin,
		}
	}

	/// A second engine over the same store with a different permission cache.
	pub fn engine_with_cache(&self, cache: Arc<dyn PermissionCache>) -> AccessDecisionEngine {
		AccessDecisionEngine::builder(self.store.clone())
			.with_default_validators()
			.with_cache(cache)
			.build()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expect {
	Allow,
	Deny(DenyReason),
	Configuration,
	CompanyContextRequired,
	Upstream,
}

pub struct AuthzCase {
	pub name: &'static str,
	pub ctx: SecurityContext,
	pub expected: Expect,
}

fn observed(result: Result<AccessDecision, AuthzError>) -> Expect {
	match result {
		Ok(AccessDecision::Allowed) => Expect::Allow,
		Ok(AccessDecision::Denied(reason)) => Expect::Deny(reason),
		Err(AuthzError::Configuration(_)) => Expect::Configuration,
		Err(AuthzError::CompanyContextRequired { .. }) => Expect::CompanyContextRequired,
		Err(AuthzError::Upstream(_)) => Expect::Upstream,
		Err(other) => panic!("unexpected error from decide: {other:?}"),
	}
}

pub async fn run_authz_cases(engine: &AccessDecisionEngine, cases: &[AuthzCase]) {
	for case in cases {
		let got = observed(engine.decide(&case.ctx).await);
		if got != case.expected {
			panic!(
				"Case '{}': {} {} {} - expected {:?}, got {:?}\nContext: {:?}",
				case.name,
				case.ctx.user_role,
				case.ctx.operation,
				case.ctx.resource,
				case.expected,
				got,
				case.ctx
			);
		}

		// validate() must agree with decide().
		let gate = engine.validate(&case.ctx).await;
		match (&case.expected, gate) {
			(Expect::Allow, Ok(())) => {}
			(Expect::Deny(reason), Err(AuthzError::AccessDenied { reason: got, .. })) => {
				assert_eq!(&got, reason, "Case '{}': validate reason mismatch", case.name)
			}
			(Expect::Configuration, Err(AuthzError::Configuration(_)))
			| (Expect::CompanyContextRequired, Err(AuthzError::CompanyContextRequired { .. }))
			| (Expect::Upstream, Err(AuthzError::Upstream(_))) => {}
			(expected, got) => panic!(
				"Case '{}': validate disagrees with decide - expected {:?}, got {:?}",
				case.name, expected, got
			),
		}
	}
}
