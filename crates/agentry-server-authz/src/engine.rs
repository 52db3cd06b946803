// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access decision engine.
//!
//! [`AccessDecisionEngine::decide`] evaluates a [`SecurityContext`] in three
//! phases:
//!
//! 1. **Dispatch**: find the validator registered for the resource kind. A
//!    missing validator is a configuration error, never an allow.
//! 2. **Request preconditions**: company mode needs a company id, and every
//!    role except `public` needs a user id.
//! 3. **Resource policy**: the validator decides by role and operation.
//!
//! Denials are values ([`AccessDecision::Denied`]). [`AccessDecisionEngine::validate`]
//! turns them into [`AuthzError::AccessDenied`] for callers that only need a
//! yes/no gate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use agentry_server_config::AuthzConfig;
use tracing::instrument;

use crate::cache::{InMemoryPermissionCache, NoopPermissionCache, PermissionCache, DEFAULT_PERMISSION_TTL};
use crate::context::SecurityContext;
use crate::decision::{AccessDecision, DenyReason};
use crate::error::{AuthzError, AuthzResult};
use crate::filter::{access_predicate, CallerScope, Predicate};
use crate::lookups::Lookups;
use crate::membership::MembershipResolver;
use crate::permission::PermissionChecker;
use crate::policies::{ResourceValidator, ScopedPolicy};
use crate::store::DataStore;
use crate::types::{CompanyId, NamedPermission, Operation, ResourceKind, Role, UserId};

/// Default bound on a single data-store lookup during a decision.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AccessDecisionEngine {
	validators: HashMap<ResourceKind, Arc<dyn ResourceValidator>>,
	company_required: HashSet<ResourceKind>,
	lookups: Lookups,
}

impl AccessDecisionEngine {
	pub fn builder(store: Arc<dyn DataStore>) -> EngineBuilder {
		EngineBuilder::new(store)
	}

	/// An engine with every built-in validator and default settings.
	pub fn with_defaults(store: Arc<dyn DataStore>) -> Self {
		EngineBuilder::new(store).with_default_validators().build()
	}

	pub fn is_registered(&self, kind: ResourceKind) -> bool {
		self.validators.contains_key(&kind)
	}

	pub fn membership(&self) -> &MembershipResolver {
		self.lookups.membership()
	}

	pub fn permissions(&self) -> &PermissionChecker {
		self.lookups.permissions()
	}

	fn validator(&self, kind: ResourceKind) -> AuthzResult<&Arc<dyn ResourceValidator>> {
		self.validators.get(&kind).ok_or_else(|| {
			tracing::error!(resource = %kind, "no validator registered for resource");
			AuthzError::Configuration(format!("no validator registered for resource '{kind}'"))
		})
	}

	/// Decides a request without turning a denial into an error.
	#[instrument(
		skip(self, ctx),
		fields(
			user_id = ?ctx.user_id,
			role = %ctx.user_role,
			operation = %ctx.operation,
			resource = %ctx.resource,
		)
	)]
	pub async fn decide(&self, ctx: &SecurityContext) -> AuthzResult<AccessDecision> {
		let validator = self.validator(ctx.resource)?;

		let company_mode = ctx.company_mode || self.company_required.contains(&ctx.resource);
		if company_mode && ctx.company_id.is_none() {
			tracing::info!("company context required but missing");
			return Err(AuthzError::CompanyContextRequired {
				resource: ctx.resource,
				operation: ctx.operation,
			});
		}

		if ctx.user_role != Role::Public && ctx.user_id.is_none() {
			tracing::info!(reason = %DenyReason::Unauthenticated, "access denied");
			return Ok(AccessDecision::Denied(DenyReason::Unauthenticated));
		}

		let decision = validator.validate(ctx, &self.lookups).await?;
		match &decision {
			AccessDecision::Allowed => tracing::debug!("access allowed"),
			AccessDecision::Denied(reason) => tracing::info!(reason = %reason, "access denied"),
		}
		Ok(decision)
	}

	/// Gate form of [`Self::decide`]: `Ok(())` or an error.
	pub async fn validate(&self, ctx: &SecurityContext) -> AuthzResult<()> {
		match self.decide(ctx).await? {
			AccessDecision::Allowed => Ok(()),
			AccessDecision::Denied(reason) => Err(AuthzError::AccessDenied {
				context: Box::new(ctx.clone()),
				reason,
			}),
		}
	}

	/// Builds the visibility predicate for a list or search request.
	#[instrument(skip(self, user_id), fields(user_id = ?user_id))]
	pub async fn secure_filter(
		&self,
		kind: ResourceKind,
		role: Role,
		user_id: Option<UserId>,
		company_scope: Option<CompanyId>,
	) -> AuthzResult<Predicate> {
		let validator = self.validator(kind)?;

		let mut caller = CallerScope {
			user_id,
			..CallerScope::default()
		};
		if let Some(user_id) = user_id {
			match role {
				Role::Public => {}
				Role::User | Role::CompanyAdmin => {
					caller.member_companies = self.lookups.member_companies(user_id).await?;
				}
				Role::Admin => {
					caller.can_read_all = self
						.lookups
						.has_permission(user_id, NamedPermission::new(kind, Operation::Read))
						.await?;
				}
			}
		}

		Ok(access_predicate(
			role,
			validator.public_visibility(),
			&caller,
			company_scope,
		))
	}
}

/// Assembles an [`AccessDecisionEngine`].
///
/// A builder without registered validators produces an engine that rejects
/// every request with a configuration error.
pub struct EngineBuilder {
	store: Arc<dyn DataStore>,
	validators: HashMap<ResourceKind, Arc<dyn ResourceValidator>>,
	company_required: HashSet<ResourceKind>,
	cache: Arc<dyn PermissionCache>,
	cache_ttl: Duration,
	lookup_timeout: Option<Duration>,
}

impl EngineBuilder {
	pub fn new(store: Arc<dyn DataStore>) -> Self {
		Self {
			store,
			validators: HashMap::new(),
			company_required: HashSet::new(),
			cache: Arc::new(InMemoryPermissionCache::new()),
			cache_ttl: DEFAULT_PERMISSION_TTL,
			lookup_timeout: Some(DEFAULT_LOOKUP_TIMEOUT),
		}
	}

	/// Applies the `[authz]` configuration section.
	pub fn from_config(store: Arc<dyn DataStore>, config: &AuthzConfig) -> AuthzResult<Self> {
		let mut builder = Self::new(store)
			.with_default_validators()
			.cache_ttl(Duration::from_secs(config.permission_cache_ttl_secs))
			.lookup_timeout((config.lookup_timeout_ms > 0).then(|| Duration::from_millis(config.lookup_timeout_ms)));

		if !config.permission_cache_enabled {
			builder = builder.with_cache(Arc::new(NoopPermissionCache));
		}
		for name in &config.company_required_resources {
			builder = builder.require_company_context(name.parse()?);
		}
		Ok(builder)
	}

	/// Replaces the permission cache. Share the same cache with
	/// [`crate::MembershipService`] so membership changes invalidate it.
	pub fn with_cache(mut self, cache: Arc<dyn PermissionCache>) -> Self {
		self.cache = cache;
		self
	}

	pub fn cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;
		self
	}

	/// `None` lets lookups run unbounded.
	pub fn lookup_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.lookup_timeout = timeout;
		self
	}

	/// Registers a validator, replacing any existing one for the same kind.
	pub fn register(mut self, validator: Arc<dyn ResourceValidator>) -> Self {
		self.validators.insert(validator.kind(), validator);
		self
	}

	pub fn with_default_validators(mut self) -> Self {
		for kind in ResourceKind::all() {
			self
				.validators
				.insert(*kind, Arc::new(ScopedPolicy::for_kind(*kind)));
		}
		self
	}

	/// Always treats requests for this kind as company-mode requests.
	pub fn require_company_context(mut self, kind: ResourceKind) -> Self {
		self.company_required.insert(kind);
		self
	}

	pub fn permission_cache(&self) -> Arc<dyn PermissionCache> {
		self.cache.clone()
	}

	pub fn build(self) -> AccessDecisionEngine {
		let permissions = PermissionChecker::new(self.store.clone(), self.cache).with_ttl(self.cache_ttl);
		AccessDecisionEngine {
			validators: self.validators,
			company_required: self.company_required,
			lookups: Lookups::new(self.store, permissions, self.lookup_timeout),
		}
	}
}
