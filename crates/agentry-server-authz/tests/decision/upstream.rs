// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Store failures and timeouts fail closed and stay distinct from denials.

use std::sync::Arc;
use std::time::Duration;

use agentry_server_authz::{
	AccessDecisionEngine, AuthzError, InMemoryStore, Operation, OwnershipFact, ResourceKind, Role,
	SecurityContext, StoreError, UserId,
};

use super::support::{run_authz_cases, AuthzCase, Expect, Fixtures, AGENT_COMPANY_A, AGENT_PUBLIC};

#[tokio::test]
async fn unavailable_store_is_upstream_not_denied() {
	let f = Fixtures::new();
	f.store.set_unavailable(true);

	let cases = vec![
		AuthzCase {
			name: "public_read_needs_ownership_lookup",
			ctx: SecurityContext::new(Role::Public, Operation::Read, ResourceKind::Agent)
				.with_resource_id(AGENT_PUBLIC),
			expected: Expect::Upstream,
		},
		AuthzCase {
			name: "user_read_needs_ownership_lookup",
			ctx: SecurityContext::new(Role::User, Operation::Read, ResourceKind::Agent)
				.with_user(f.outsider)
				.with_resource_id(AGENT_COMPANY_A),
			expected: Expect::Upstream,
		},
		AuthzCase {
			name: "admin_needs_permission_lookup",
			ctx: SecurityContext::new(Role::Admin, Operation::Read, ResourceKind::Agent)
				.with_user(f.outsider),
			expected: Expect::Upstream,
		},
		AuthzCase {
			name: "public_write_is_denied_without_io",
			ctx: SecurityContext::new(Role::Public, Operation::Delete, ResourceKind::Agent)
				.with_resource_id(AGENT_PUBLIC),
			expected: Expect::Deny(agentry_server_authz::DenyReason::PublicReadOnly),
		},
	];

	run_authz_cases(&f.engine, &cases).await;
}

#[tokio::test(start_paused = true)]
async fn slow_store_times_out() {
	let store = Arc::new(InMemoryStore::new());
	let owner = UserId::generate();
	store.insert_resource(ResourceKind::Tool, OwnershipFact::personal("t1", owner));
	store.set_latency(Duration::from_secs(30));

	let engine = AccessDecisionEngine::builder(store)
		.with_default_validators()
		.lookup_timeout(Some(Duration::from_millis(500)))
		.build();
	let ctx = SecurityContext::new(Role::User, Operation::Read, ResourceKind::Tool)
		.with_user(owner)
		.with_resource_id("t1");

	let err = engine.validate(&ctx).await.unwrap_err();
	assert!(matches!(
		err,
		AuthzError::Upstream(StoreError::Timeout {
			operation: "get_ownership",
			timeout_ms: 500
		})
	));
	assert!(!err.is_client_error());
}

#[tokio::test(start_paused = true)]
async fn fast_enough_store_is_not_cut_off() {
	let store = Arc::new(InMemoryStore::new());
	let owner = UserId::generate();
	store.insert_resource(ResourceKind::Tool, OwnershipFact::personal("t1", owner));
	store.set_latency(Duration::from_millis(100));

	let engine = AccessDecisionEngine::builder(store)
		.with_default_validators()
		.lookup_timeout(Some(Duration::from_millis(500)))
		.build();
	let ctx = SecurityContext::new(Role::User, Operation::Read, ResourceKind::Tool)
		.with_user(owner)
		.with_resource_id("t1");

	engine.validate(&ctx).await.unwrap();
}
