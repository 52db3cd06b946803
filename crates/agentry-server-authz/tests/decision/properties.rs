// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Universally quantified decision properties.

use std::sync::Arc;

use agentry_server_authz::{
	AccessDecision, AccessDecisionEngine, AuthzError, CompanyId, DenyReason, InMemoryStore,
	MembershipService, MembershipStore, NoopPermissionCache, Operation, OwnershipFact, ResourceData, ResourceKind,
	Role, ScopedPolicy, SecurityContext, UserId, MEMBER_ROLE,
};
use proptest::prelude::*;

fn kinds() -> impl Strategy<Value = ResourceKind> {
	prop::sample::select(ResourceKind::all().to_vec())
}

fn operations() -> impl Strategy<Value = Operation> {
	prop::sample::select(Operation::all().to_vec())
}

fn roles() -> impl Strategy<Value = Role> {
	prop::sample::select(Role::all().to_vec())
}

fn membership_roles() -> impl Strategy<Value = &'static str> {
	prop::sample::select(vec![MEMBER_ROLE, "owner", "company_admin", "admin"])
}

/// Who owns the resource relative to the caller.
#[derive(Debug, Clone, Copy)]
enum Owner {
	Caller,
	Other,
	Nobody,
}

/// Which company the resource belongs to relative to the caller.
#[derive(Debug, Clone, Copy)]
enum Scope {
	Administered,
	Foreign,
	Personal,
}

fn owners() -> impl Strategy<Value = Owner> {
	prop_oneof![Just(Owner::Caller), Just(Owner::Other), Just(Owner::Nobody)]
}

fn scopes() -> impl Strategy<Value = Scope> {
	prop_oneof![Just(Scope::Administered), Just(Scope::Foreign), Just(Scope::Personal)]
}

struct World {
	store: Arc<InMemoryStore>,
	engine: AccessDecisionEngine,
	caller: UserId,
	home: CompanyId,
	foreign: CompanyId,
}

impl World {
	fn new() -> Self {
		let store = Arc::new(InMemoryStore::new());
		let caller = UserId::generate();
		let home = CompanyId::generate();
		let foreign = CompanyId::generate();
		store.set_membership(home, caller, "company_admin");
		store.set_membership(foreign, UserId::generate(), "owner");
		let engine = AccessDecisionEngine::builder(store.clone())
			.with_default_validators()
			.with_cache(Arc::new(NoopPermissionCache))
			.build();
		Self {
			store,
			engine,
			caller,
			home,
			foreign,
		}
	}

	fn insert(&self, kind: ResourceKind, owner: Owner, scope: Scope, is_public: bool) -> String {
		let id = format!("{kind}-{}", UserId::generate());
		let mut fact = OwnershipFact::personal(id.clone(), self.caller).public(is_public);
		fact.owner_user_id = match owner {
			Owner::Caller => Some(self.caller),
			Owner::Other => Some(UserId::generate()),
			Owner::Nobody => None,
		};
		fact.company_id = self.company(scope);
		self.store.insert_resource(kind, fact);
		id
	}

	fn company(&self, scope: Scope) -> Option<CompanyId> {
		match scope {
			Scope::Administered => Some(self.home),
			Scope::Foreign => Some(self.foreign),
			Scope::Personal => None,
		}
	}

	fn decide(&self, ctx: &SecurityContext) -> AccessDecision {
		tokio_test::block_on(self.engine.decide(ctx)).unwrap()
	}
}

proptest! {
	#[test]
	fn unknown_resource_names_fail_closed(name in "[a-z_]{0,16}") {
		prop_assume!(ResourceKind::all().iter().all(|k| k.as_str() != name));
		let err = SecurityContext::from_parts(None, "admin", "read", &name).unwrap_err();
		prop_assert!(matches!(err, AuthzError::Configuration(_)));
	}

	#[test]
	fn unregistered_kinds_fail_closed(
		registered in kinds(),
		requested in kinds(),
		role in roles(),
		op in operations(),
	) {
		let store = Arc::new(InMemoryStore::new());
		let engine = AccessDecisionEngine::builder(store)
			.register(Arc::new(ScopedPolicy::for_kind(registered)))
			.build();
		let ctx = SecurityContext::new(role, op, requested).with_user(UserId::generate());
		let result = tokio_test::block_on(engine.decide(&ctx));
		if registered == requested {
			prop_assert!(result.is_ok());
		} else {
			prop_assert!(matches!(result, Err(AuthzError::Configuration(_))));
		}
	}

	#[test]
	fn ownership_is_sufficient_for_mutation(
		kind in kinds(),
		op in prop_oneof![Just(Operation::Update), Just(Operation::Delete)],
		role in prop_oneof![Just(Role::User), Just(Role::CompanyAdmin)],
		scope in scopes(),
		is_public in any::<bool>(),
		via_payload in any::<bool>(),
	) {
		let world = World::new();
		let id = world.insert(kind, Owner::Caller, scope, is_public);
		let mut ctx = SecurityContext::new(role, op, kind)
			.with_user(world.caller)
			.with_resource_id(id);
		if via_payload {
			ctx = ctx.with_data(ResourceData::owned_by(world.caller));
		}
		prop_assert_eq!(world.decide(&ctx), AccessDecision::Allowed);
	}

	#[test]
	fn company_admin_is_a_superset_of_user(
		kind in kinds(),
		op in operations(),
		owner in owners(),
		scope in scopes(),
		payload_scope in scopes(),
		is_public in any::<bool>(),
		targeted in any::<bool>(),
	) {
		let world = World::new();
		let id = world.insert(kind, owner, scope, is_public);
		let data = ResourceData {
			company_id: world.company(payload_scope),
			..ResourceData::default()
		};

		let build = |role| {
			let ctx = SecurityContext::new(role, op, kind)
				.with_user(world.caller)
				.with_data(data.clone());
			if targeted { ctx.with_resource_id(id.clone()) } else { ctx }
		};

		if world.decide(&build(Role::User)).is_allowed() {
			prop_assert!(world.decide(&build(Role::CompanyAdmin)).is_allowed());
		}
	}

	#[test]
	fn admin_role_alone_is_never_enough(
		kind in kinds(),
		op in operations(),
		owner in owners(),
		scope in scopes(),
		is_public in any::<bool>(),
	) {
		let world = World::new();
		let id = world.insert(kind, owner, scope, is_public);
		let ctx = SecurityContext::new(Role::Admin, op, kind)
			.with_user(world.caller)
			.with_resource_id(id)
			.with_data(ResourceData::owned_by(world.caller));

		let expected = DenyReason::MissingPermission(format!("{kind}:{op}"));
		prop_assert_eq!(world.decide(&ctx), AccessDecision::Denied(expected));
	}

	#[test]
	fn public_role_is_read_only(
		kind in kinds(),
		op in operations(),
		owner in owners(),
		scope in scopes(),
		is_public in any::<bool>(),
	) {
		let world = World::new();
		let id = world.insert(kind, owner, scope, is_public);
		let ctx = SecurityContext::new(Role::Public, op, kind).with_resource_id(id.clone());
		let decision = world.decide(&ctx);

		if op != Operation::Read {
			prop_assert_eq!(decision, AccessDecision::Denied(DenyReason::PublicReadOnly));
		} else {
			let flagged_private = SecurityContext::new(Role::Public, op, kind)
				.with_resource_id(id)
				.with_data(ResourceData::default().with_public(false));
			prop_assert_eq!(
				world.decide(&flagged_private),
				AccessDecision::Denied(DenyReason::NotPublic)
			);
		}
	}

	#[test]
	fn no_change_ever_removes_the_last_admin(
		members in prop::collection::vec(membership_roles(), 1..6),
		target in any::<prop::sample::Index>(),
		new_role in prop::option::of(membership_roles()),
	) {
		let store = Arc::new(InMemoryStore::new());
		let service = MembershipService::new(store.clone(), Arc::new(NoopPermissionCache));
		let company = CompanyId::generate();
		let users: Vec<UserId> = members
			.iter()
			.map(|role| {
				let user = UserId::generate();
				store.set_membership(company, user, role);
				user
			})
			.collect();
		let target = users[target.index(users.len())];

		tokio_test::block_on(async {
			let before = store.count_admins(company).await.unwrap();
			let result = match new_role {
				Some(role) => service.change_role(company, target, role).await,
				None => service.remove_member(company, target).await,
			};
			let after = store.count_admins(company).await.unwrap();

			if before >= 1 {
				prop_assert!(after >= 1, "admins dropped from {} to {}", before, after);
			}
			if let Err(AuthzError::LastAdmin { .. }) = result {
				prop_assert_eq!(before, after);
			}
			Ok::<(), TestCaseError>(())
		})?;
	}
}

#[test]
fn plain_member_can_leave_company_without_admins() {
	let store = Arc::new(InMemoryStore::new());
	let service = MembershipService::new(store.clone(), Arc::new(NoopPermissionCache));
	let company = CompanyId::generate();
	let member = UserId::generate();
	store.set_membership(company, member, MEMBER_ROLE);

	tokio_test::block_on(service.remove_member(company, member)).unwrap();
}
