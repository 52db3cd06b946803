// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-resource access policies.
//!
//! Each guarded [`ResourceKind`] maps to one [`ResourceValidator`]. The
//! built-in kinds share [`ScopedPolicy`] and differ only in their
//! [`ResourceRules`]; custom validators can be registered on the engine
//! builder for kinds with bespoke rules.

mod scoped;

pub use scoped::ScopedPolicy;

use async_trait::async_trait;

use crate::context::SecurityContext;
use crate::decision::AccessDecision;
use crate::error::AuthzResult;
use crate::lookups::Lookups;
use crate::types::ResourceKind;

/// Decides role-specific access for a single resource kind.
///
/// Called only after the engine has checked company mode and authentication.
/// Implementations must return `Denied` for anything they do not explicitly
/// allow and must not mutate state.
#[async_trait]
pub trait ResourceValidator: Send + Sync {
	fn kind(&self) -> ResourceKind;

	/// Whether rows of this kind can ever be visible to anonymous callers.
	fn public_visibility(&self) -> bool {
		true
	}

	async fn validate(&self, ctx: &SecurityContext, lookups: &Lookups) -> AuthzResult<AccessDecision>;
}

/// How a kind treats the company scope on `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateScope {
	/// Personal creates are allowed; a company scope requires membership.
	Optional,
	/// Creates must name a company the caller belongs to.
	Required,
	/// The kind is not created inside a company (companies themselves, waitlist).
	Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRules {
	pub public_visibility: bool,
	pub create_scope: CreateScope,
}

impl ResourceRules {
	pub const fn new(public_visibility: bool, create_scope: CreateScope) -> Self {
		Self {
			public_visibility,
			create_scope,
		}
	}
}

/// Built-in rules for every resource kind.
pub fn default_rules(kind: ResourceKind) -> ResourceRules {
	match kind {
		ResourceKind::Agent
		| ResourceKind::Tool
		| ResourceKind::Llmstxt
		| ResourceKind::Organization
		| ResourceKind::AgentLog => ResourceRules::new(true, CreateScope::Optional),
		ResourceKind::Team => ResourceRules::new(false, CreateScope::Required),
		ResourceKind::Company | ResourceKind::Waitlist => ResourceRules::new(false, CreateScope::Ignored),
	}
}
