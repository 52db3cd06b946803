// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secure filters never show a row that a single-row read would deny.

use std::collections::BTreeSet;
use std::sync::Arc;

use agentry_server_authz::filter::apply;
use agentry_server_authz::{
	AccessDecisionEngine, CompanyId, InMemoryStore, NoopPermissionCache, Operation, OwnershipFact,
	Predicate, ResourceKind, Role, SearchFilter, SecurityContext, SortSpec, UserId, VisibleRow,
	MEMBER_ROLE,
};
use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;

/// How a generated row relates to the caller.
#[derive(Debug, Clone, Copy)]
enum RowKind {
	Public,
	Owned,
	HomeCompany,
	Foreign,
}

fn row_kinds() -> impl Strategy<Value = RowKind> {
	prop_oneof![
		Just(RowKind::Public),
		Just(RowKind::Owned),
		Just(RowKind::HomeCompany),
		Just(RowKind::Foreign),
	]
}

struct Catalog {
	store: Arc<InMemoryStore>,
	engine: AccessDecisionEngine,
	caller: UserId,
	home: CompanyId,
	rows: Vec<VisibleRow>,
}

impl Catalog {
	fn new(kind: ResourceKind, shapes: &[RowKind], caller_is_admin: bool, can_read_all: bool) -> Self {
		let store = Arc::new(InMemoryStore::new());
		let caller = UserId::generate();
		let home = CompanyId::generate();
		let foreign = CompanyId::generate();
		store.set_membership(home, caller, if caller_is_admin { "owner" } else { MEMBER_ROLE });
		if can_read_all {
			store.grant_permission(caller, format!("{kind}:read"));
		}

		let now = Utc::now();
		let rows = shapes
			.iter()
			.enumerate()
			.map(|(i, shape)| {
				let stranger = UserId::generate();
				let (owner, company, is_public) = match shape {
					RowKind::Public => (Some(stranger), None, true),
					RowKind::Owned => (Some(caller), None, false),
					RowKind::HomeCompany => (Some(stranger), Some(home), false),
					RowKind::Foreign => (Some(stranger), Some(foreign), false),
				};
				let row = VisibleRow {
					id: format!("row-{i}"),
					owner_user_id: owner,
					company_id: company,
					is_public,
					name: format!("row {i}"),
					created_at: now - ChronoDuration::seconds(i as i64),
					updated_at: now,
				};
				let mut fact = OwnershipFact::personal(row.id.clone(), stranger).public(is_public);
				fact.owner_user_id = owner;
				fact.company_id = company;
				store.insert_resource(kind, fact);
				row
			})
			.collect();

		let engine = AccessDecisionEngine::builder(store.clone())
			.with_default_validators()
			.with_cache(Arc::new(NoopPermissionCache))
			.build();

		Self {
			store,
			engine,
			caller,
			home,
			rows,
		}
	}

	async fn check_round_trip(&self, kind: ResourceKind, role: Role, scope: Option<CompanyId>) -> Result<(), String> {
		let user = (role != Role::Public).then_some(self.caller);
		let mut list = SecurityContext::new(role, Operation::Read, kind);
		if let Some(user) = user {
			list = list.with_user(user);
		}

		// The filter is only reached once the list-level read is allowed.
		let allowed = self
			.engine
			.decide(&list)
			.await
			.map_err(|e| e.to_string())?
			.is_allowed();
		if !allowed {
			return Ok(());
		}

		let predicate = self
			.engine
			.secure_filter(kind, role, user, scope)
			.await
			.map_err(|e| e.to_string())?;
		for row in apply(self.rows.clone(), &predicate, SortSpec::default()) {
			let single = list.clone().with_resource_id(row.id.clone());
			let decision = self.engine.decide(&single).await.map_err(|e| e.to_string())?;
			if !decision.is_allowed() {
				return Err(format!("{role} saw {row:?} via filter but read was {decision:?}"));
			}
		}
		Ok(())
	}
}

proptest! {
	#[test]
	fn filtered_rows_pass_individual_read(
		kind in prop::sample::select(ResourceKind::all().to_vec()),
		role in prop::sample::select(Role::all().to_vec()),
		shapes in prop::collection::vec(row_kinds(), 0..12),
		caller_is_admin in any::<bool>(),
		can_read_all in any::<bool>(),
		scoped in any::<bool>(),
	) {
		let catalog = Catalog::new(kind, &shapes, caller_is_admin, can_read_all);
		let scope = scoped.then_some(catalog.home);
		let result = tokio_test::block_on(catalog.check_round_trip(kind, role, scope));
		prop_assert!(result.is_ok(), "{}", result.unwrap_err());
	}
}

#[tokio::test]
async fn member_listing_shows_public_own_and_company_rows() {
	let shapes = [RowKind::Public, RowKind::Owned, RowKind::HomeCompany, RowKind::Foreign];
	let catalog = Catalog::new(ResourceKind::Agent, &shapes, false, false);

	let predicate = catalog
		.engine
		.secure_filter(ResourceKind::Agent, Role::User, Some(catalog.caller), None)
		.await
		.unwrap();
	let visible: BTreeSet<String> = apply(catalog.rows.clone(), &predicate, SortSpec::default())
		.into_iter()
		.map(|r| r.id)
		.collect();

	assert_eq!(
		visible,
		BTreeSet::from(["row-0".to_string(), "row-1".to_string(), "row-2".to_string()])
	);
}

#[tokio::test]
async fn search_narrows_but_never_widens() {
	let shapes = [RowKind::Public, RowKind::Owned, RowKind::Foreign];
	let catalog = Catalog::new(ResourceKind::Tool, &shapes, false, false);

	let access = catalog
		.engine
		.secure_filter(ResourceKind::Tool, Role::User, Some(catalog.caller), None)
		.await
		.unwrap();
	// Asking for private rows must not surface the foreign one.
	let search = SearchFilter {
		is_public: Some(false),
		..SearchFilter::default()
	};
	let ids: Vec<String> = apply(catalog.rows.clone(), &search.restrict(access), SortSpec::default())
		.into_iter()
		.map(|r| r.id)
		.collect();
	assert_eq!(ids, vec!["row-1".to_string()]);
}

#[tokio::test]
async fn system_admin_listing_depends_on_read_permission() {
	let shapes = [RowKind::Public, RowKind::Foreign];

	let without = Catalog::new(ResourceKind::Agent, &shapes, false, false);
	let predicate = without
		.engine
		.secure_filter(ResourceKind::Agent, Role::Admin, Some(without.caller), None)
		.await
		.unwrap();
	assert_eq!(predicate, Predicate::IsPublic);

	let with = Catalog::new(ResourceKind::Agent, &shapes, false, true);
	let predicate = with
		.engine
		.secure_filter(ResourceKind::Agent, Role::Admin, Some(with.caller), None)
		.await
		.unwrap();
	assert_eq!(predicate, Predicate::Always);
	assert_eq!(with.store.permission_lookups(), 1);
}
