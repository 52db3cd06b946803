// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request security context.
//!
//! A [`SecurityContext`] is built by a resource service for every guarded call
//! and handed to [`crate::AccessDecisionEngine::validate`]. It is never persisted.
//!
//! [`ResourceData`] carries facts about the target that the service already
//! holds (owner, company, visibility). It must be filled from the stored
//! record, never copied from a request body.

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, AuthzResult};
use crate::types::{CompanyId, Operation, ResourceKind, Role, UserId};

/// Everything the engine needs to decide one `(user, role, operation, resource)` tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityContext {
	pub user_id: Option<UserId>,
	pub user_role: Role,
	pub operation: Operation,
	pub resource: ResourceKind,
	pub resource_id: Option<String>,
	pub company_id: Option<CompanyId>,
	/// Set when the endpoint runs in company mode and needs an explicit company scope.
	#[serde(default)]
	pub company_mode: bool,
	#[serde(default)]
	pub data: ResourceData,
}

impl SecurityContext {
	pub fn new(user_role: Role, operation: Operation, resource: ResourceKind) -> Self {
		Self {
			user_id: None,
			user_role,
			operation,
			resource,
			resource_id: None,
			company_id: None,
			company_mode: false,
			data: ResourceData::default(),
		}
	}

	/// Builds a context from the string form used at service boundaries.
	///
	/// Unknown roles, operations or resource kinds fail with
	/// [`AuthzError::Configuration`]; nothing defaults to an allow.
	pub fn from_parts(
		user_id: Option<&str>,
		user_role: &str,
		operation: &str,
		resource: &str,
	) -> AuthzResult<Self> {
		let user_id = user_id
			.map(|id| {
				id.parse::<UserId>()
					.map_err(|e| AuthzError::Configuration(format!("invalid user id '{id}': {e}")))
			})
			.transpose()?;

		let mut ctx = Self::new(user_role.parse()?, operation.parse()?, resource.parse()?);
		ctx.user_id = user_id;
		Ok(ctx)
	}

	/// Builder: set the calling user.
	pub fn with_user(mut self, user_id: UserId) -> Self {
		self.user_id = Some(user_id);
		self
	}

	/// Builder: target a specific resource instance.
	pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
		self.resource_id = Some(resource_id.into());
		self
	}

	/// Builder: set the request's company scope (`x-company-id`).
	pub fn with_company(mut self, company_id: CompanyId) -> Self {
		self.company_id = Some(company_id);
		self
	}

	/// Builder: require a company scope for this request.
	pub fn in_company_mode(mut self) -> Self {
		self.company_mode = true;
		self
	}

	/// Builder: attach facts about the target.
	pub fn with_data(mut self, data: ResourceData) -> Self {
		self.data = data;
		self
	}

	/// The company an operation is scoped to: the payload's company first,
	/// then the request's company header.
	pub fn scope_company(&self) -> Option<CompanyId> {
		self.data.company_id.or(self.company_id)
	}

	/// Returns true if the payload names the caller as the resource owner.
	pub(crate) fn data_owned_by_caller(&self) -> bool {
		match (self.data.user_id, self.user_id) {
			(Some(owner), Some(caller)) => owner == caller,
			_ => false,
		}
	}
}

/// Facts about the target resource supplied by the calling service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub company_id: Option<CompanyId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<UserId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_public: Option<bool>,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResourceData {
	pub fn owned_by(user_id: UserId) -> Self {
		Self {
			user_id: Some(user_id),
			..Self::default()
		}
	}

	pub fn in_company(company_id: CompanyId) -> Self {
		Self {
			company_id: Some(company_id),
			..Self::default()
		}
	}

	/// Builder: set visibility.
	pub fn with_public(mut self, is_public: bool) -> Self {
		self.is_public = Some(is_public);
		self
	}

	/// Builder: set the owning company.
	pub fn with_company(mut self, company_id: CompanyId) -> Self {
		self.company_id = Some(company_id);
		self
	}
}
