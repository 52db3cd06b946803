// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end scenarios covering each role tier once.

use std::time::Duration;

use agentry_server_authz::{
	AccessDecision, AuthzError, CompanyId, DenyReason, MembershipService, Operation, OwnershipFact,
	PermissionCache, ResourceKind, Role, SecurityContext, UserId, DEFAULT_PERMISSION_TTL,
	MEMBER_ROLE,
};

use super::support::{Fixtures, AGENT_COMPANY_A, AGENT_PUBLIC};

#[tokio::test]
async fn user_cannot_read_foreign_private_agent() {
	let f = Fixtures::new();
	let stranger = UserId::generate();
	f.store
		.insert_resource(ResourceKind::Agent, OwnershipFact::personal("v-agent", stranger));

	// member_a belongs to company A only; the agent has no company.
	let ctx = SecurityContext::new(Role::User, Operation::Read, ResourceKind::Agent)
		.with_user(f.member_a)
		.with_resource_id("v-agent");

	let err = f.engine.validate(&ctx).await.unwrap_err();
	assert_eq!(err.to_string(), "access denied");
	assert_eq!(err.deny_reason(), Some(&DenyReason::NotVisible));
}

#[tokio::test]
async fn company_admin_deletes_company_agent_owned_by_someone_else() {
	let f = Fixtures::new();
	let ctx = SecurityContext::new(Role::CompanyAdmin, Operation::Delete, ResourceKind::Agent)
		.with_user(f.owner_a)
		.with_resource_id(AGENT_COMPANY_A);

	f.engine.validate(&ctx).await.unwrap();
}

#[tokio::test]
async fn system_admin_without_named_permission_is_denied() {
	let f = Fixtures::new();
	let ctx = SecurityContext::new(Role::Admin, Operation::Delete, ResourceKind::Agent)
		.with_user(f.sysadmin)
		.with_resource_id(AGENT_PUBLIC);

	let err = f.engine.validate(&ctx).await.unwrap_err();
	assert!(matches!(
		err,
		AuthzError::AccessDenied {
			reason: DenyReason::MissingPermission(ref p),
			..
		} if p == "agent:delete"
	));
}

#[tokio::test]
async fn anonymous_reads_public_agent_but_cannot_update_it() {
	let f = Fixtures::new();
	let read = SecurityContext::new(Role::Public, Operation::Read, ResourceKind::Agent)
		.with_resource_id(AGENT_PUBLIC);
	f.engine.validate(&read).await.unwrap();

	let update = SecurityContext::new(Role::Public, Operation::Update, ResourceKind::Agent)
		.with_resource_id(AGENT_PUBLIC);
	let err = f.engine.validate(&update).await.unwrap_err();
	assert_eq!(err.deny_reason(), Some(&DenyReason::PublicReadOnly));
}

#[tokio::test]
async fn expired_negative_cache_entry_is_not_trusted() {
	let f = Fixtures::new();
	let admin = UserId::generate();
	f.store.grant_permission(admin, "agent:read");
	f.cache.put(admin, "agent:read", false, DEFAULT_PERMISSION_TTL);
	f.clock.advance(DEFAULT_PERMISSION_TTL + Duration::from_secs(1));

	let ctx = SecurityContext::new(Role::Admin, Operation::Read, ResourceKind::Agent)
		.with_user(admin)
		.with_resource_id(AGENT_COMPANY_A);

	assert_eq!(f.engine.decide(&ctx).await.unwrap(), AccessDecision::Allowed);
	assert_eq!(f.store.permission_lookups(), 1);
	assert_eq!(f.cache.get(admin, "agent:read"), Some(true));
}

#[tokio::test]
async fn demoting_the_only_admin_is_rejected_before_mutation() {
	let f = Fixtures::new();
	let service = MembershipService::new(f.store.clone(), f.cache.clone());
	let company = CompanyId::generate();
	let only_admin = UserId::generate();
	f.store.set_membership(company, only_admin, "company_admin");

	let err = service
		.change_role(company, only_admin, MEMBER_ROLE)
		.await
		.unwrap_err();
	assert!(matches!(err, AuthzError::LastAdmin { company_id } if company_id == company));
	assert!(f.engine.membership().is_admin(only_admin, company).await.unwrap());

	// A cached decision survives a rejected change untouched.
	f.cache.put(only_admin, "team:read", true, DEFAULT_PERMISSION_TTL);
	let _ = service.remove_member(company, only_admin).await;
	assert_eq!(f.cache.get(only_admin, "team:read"), Some(true));
}
