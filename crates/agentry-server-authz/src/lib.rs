// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization core for the Agentry server.
//!
//! This crate decides whether a `(user, role, operation, resource)` request
//! may proceed and narrows list results to the rows a caller may see:
//!
//! - [`AccessDecisionEngine`]: per-resource validators dispatched by role
//! - [`PermissionCache`]: short-lived memoization of named-permission checks
//! - [`MembershipResolver`] / [`MembershipService`]: company membership reads
//!   and the last-admin invariant
//! - [`filter`]: secure-filter predicates, search criteria and sorting
//!
//! Storage is abstracted behind [`DataStore`]; [`InMemoryStore`] is provided
//! for tests, and `agentry-server-db` provides the SQLite adapter.

pub mod cache;
pub mod context;
pub mod decision;
pub mod engine;
pub mod error;
pub mod filter;
pub mod lookups;
pub mod membership;
pub mod memory;
pub mod permission;
pub mod policies;
pub mod store;
pub mod types;

pub use cache::{
	Clock, InMemoryPermissionCache, ManualClock, NoopPermissionCache, PermissionCache,
	PermissionCacheEntry, SystemClock, DEFAULT_PERMISSION_TTL,
};
pub use context::{ResourceData, SecurityContext};
pub use decision::{AccessDecision, DenyReason};
pub use engine::{AccessDecisionEngine, EngineBuilder, DEFAULT_LOOKUP_TIMEOUT};
pub use error::{AuthzError, AuthzResult, StoreError, StoreResult};
pub use filter::{
	access_predicate, CallerScope, Predicate, SearchFilter, SortField, SortOrder, SortSpec,
	VisibleRow,
};
pub use lookups::Lookups;
pub use membership::{MembershipResolver, MembershipService};
pub use memory::InMemoryStore;
pub use permission::PermissionChecker;
pub use policies::{default_rules, CreateScope, ResourceRules, ResourceValidator, ScopedPolicy};
pub use store::{DataStore, MembershipStore, MembershipWrite, OwnershipFact};
pub use types::{
	is_admin_role, CompanyId, NamedPermission, Operation, ResourceKind, Role, UserId,
	ADMIN_EQUIVALENT_ROLES, MEMBER_ROLE,
};
