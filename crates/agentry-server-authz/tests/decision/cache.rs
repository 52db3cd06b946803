// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The permission cache changes latency, never outcomes.

use std::sync::Arc;
use std::time::Duration;

use agentry_server_authz::{
	AccessDecision, AuthzError, MembershipService, NoopPermissionCache, Operation, PermissionCache,
	ResourceKind, Role, SecurityContext, UserId, DEFAULT_PERMISSION_TTL, MEMBER_ROLE,
};
use proptest::prelude::*;

use super::support::{Fixtures, AGENT_COMPANY_A, AGENT_COMPANY_B, AGENT_PERSONAL, AGENT_PUBLIC};

const RESOURCES: [&str; 5] = [
	AGENT_PERSONAL,
	AGENT_COMPANY_A,
	AGENT_PUBLIC,
	AGENT_COMPANY_B,
	"missing",
];

fn outcome(result: Result<AccessDecision, AuthzError>) -> String {
	match result {
		Ok(decision) => format!("{decision:?}"),
		Err(err) => format!("error: {err}"),
	}
}

proptest! {
	/// Holds while the store does not change between calls. A grant or revoke
	/// made directly in the store stays masked by a cached answer until the
	/// entry expires or the user is invalidated; see
	/// `membership_change_invalidates_shared_cache`.
	#[test]
	fn noop_cache_never_changes_outcomes(
		calls in prop::collection::vec(
			(0usize..5, prop::sample::select(Role::all().to_vec()), prop::sample::select(Operation::all().to_vec()), 0usize..5),
			1..40,
		),
	) {
		let f = Fixtures::new();
		let noop = f.engine_with_cache(Arc::new(NoopPermissionCache));
		let users = [f.owner_a, f.member_a, f.owner_b, f.outsider, f.sysadmin];

		for (user, role, op, resource) in calls {
			let ctx = SecurityContext::new(role, op, ResourceKind::Agent)
				.with_user(users[user])
				.with_resource_id(RESOURCES[resource]);
			let cached = outcome(tokio_test::block_on(f.engine.decide(&ctx)));
			let uncached = outcome(tokio_test::block_on(noop.decide(&ctx)));
			prop_assert_eq!(cached, uncached, "diverged for {:?}", ctx);
		}
	}
}

#[tokio::test]
async fn repeated_admin_checks_hit_the_store_once() {
	let f = Fixtures::new();
	let ctx = SecurityContext::new(Role::Admin, Operation::Read, ResourceKind::Agent)
		.with_user(f.sysadmin)
		.with_resource_id(AGENT_PUBLIC);

	for _ in 0..5 {
		f.engine.validate(&ctx).await.unwrap();
	}
	assert_eq!(f.store.permission_lookups(), 1);
}

#[tokio::test]
async fn entries_expire_after_ttl() {
	let f = Fixtures::new();
	let ctx = SecurityContext::new(Role::Admin, Operation::Update, ResourceKind::Agent)
		.with_user(f.sysadmin)
		.with_resource_id(AGENT_PUBLIC);

	f.engine.validate(&ctx).await.unwrap();
	f.clock.advance(DEFAULT_PERMISSION_TTL - Duration::from_secs(1));
	f.engine.validate(&ctx).await.unwrap();
	assert_eq!(f.store.permission_lookups(), 1);

	f.clock.advance(Duration::from_secs(2));
	f.engine.validate(&ctx).await.unwrap();
	assert_eq!(f.store.permission_lookups(), 2);
}

#[tokio::test]
async fn membership_change_invalidates_shared_cache() {
	let f = Fixtures::new();
	let service = MembershipService::new(f.store.clone(), f.cache.clone());
	let ctx = SecurityContext::new(Role::Admin, Operation::Delete, ResourceKind::Agent)
		.with_user(f.sysadmin)
		.with_resource_id(AGENT_PUBLIC);

	assert!(!f.engine.decide(&ctx).await.unwrap().is_allowed());
	f.store.grant_permission(f.sysadmin, "agent:delete");
	// Still denied: the negative answer is cached.
	assert!(!f.engine.decide(&ctx).await.unwrap().is_allowed());

	service
		.add_member(f.company_b, f.sysadmin, MEMBER_ROLE)
		.await
		.unwrap();
	assert_eq!(f.cache.get(f.sysadmin, "agent:delete"), None);
	assert!(f.engine.decide(&ctx).await.unwrap().is_allowed());
}

#[tokio::test]
async fn unrelated_users_share_nothing() {
	let f = Fixtures::new();
	let other = UserId::generate();
	f.cache.put(f.sysadmin, "agent:read", true, DEFAULT_PERMISSION_TTL);
	assert_eq!(f.cache.get(other, "agent:read"), None);
}
