// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for access decisions.
//!
//! - **ID newtypes**: [`UserId`] and [`CompanyId`] wrap UUIDs so user and
//!   company identifiers cannot be mixed up at call sites
//! - **Request role**: [`Role`], the caller's privilege tier for one request
//! - **Operations and resources**: [`Operation`] and [`ResourceKind`]
//! - **Named permissions**: [`NamedPermission`], the `"<resource>:<operation>"`
//!   strings a system admin must hold
//!
//! Every enum parses from its snake_case wire form. Unknown strings fail with
//! [`AuthzError::Configuration`] so callers can never fall through to a default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthzError;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(CompanyId, "Unique identifier for a company (tenant).");

// =============================================================================
// Request Role
// =============================================================================

/// The caller's privilege tier for a single request.
///
/// `Admin` is the global system role. `CompanyAdmin` and `User` describe the
/// caller's standing inside the company the request targets; they differ by
/// scope, not by a numeric rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Anonymous or unauthenticated caller.
	Public,
	/// Authenticated user acting on their own resources.
	User,
	/// Administrator of one or more companies.
	CompanyAdmin,
	/// System administrator. Still needs a named permission per operation.
	Admin,
}

impl Role {
	/// Returns all request roles, least privileged first.
	pub fn all() -> &'static [Role] {
		&[Role::Public, Role::User, Role::CompanyAdmin, Role::Admin]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Public => "public",
			Role::User => "user",
			Role::CompanyAdmin => "company_admin",
			Role::Admin => "admin",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = AuthzError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Role::all()
			.iter()
			.copied()
			.find(|r| r.as_str() == s)
			.ok_or_else(|| AuthzError::Configuration(format!("unknown role '{s}'")))
	}
}

// =============================================================================
// Operations
// =============================================================================

/// Operations that can be performed on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
	Create,
	Read,
	Update,
	Delete,
}

impl Operation {
	pub fn all() -> &'static [Operation] {
		&[
			Operation::Create,
			Operation::Read,
			Operation::Update,
			Operation::Delete,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Operation::Create => "create",
			Operation::Read => "read",
			Operation::Update => "update",
			Operation::Delete => "delete",
		}
	}

	/// Returns true for operations that modify an existing resource.
	pub fn is_mutation(&self) -> bool {
		matches!(self, Operation::Update | Operation::Delete)
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Operation {
	type Err = AuthzError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Operation::all()
			.iter()
			.copied()
			.find(|o| o.as_str() == s)
			.ok_or_else(|| AuthzError::Configuration(format!("unknown operation '{s}'")))
	}
}

// =============================================================================
// Resource Kinds
// =============================================================================

/// Types of resources guarded by the access decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
	Agent,
	Company,
	Organization,
	Team,
	Tool,
	AgentLog,
	Llmstxt,
	Waitlist,
}

impl ResourceKind {
	pub fn all() -> &'static [ResourceKind] {
		&[
			ResourceKind::Agent,
			ResourceKind::Company,
			ResourceKind::Organization,
			ResourceKind::Team,
			ResourceKind::Tool,
			ResourceKind::AgentLog,
			ResourceKind::Llmstxt,
			ResourceKind::Waitlist,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ResourceKind::Agent => "agent",
			ResourceKind::Company => "company",
			ResourceKind::Organization => "organization",
			ResourceKind::Team => "team",
			ResourceKind::Tool => "tool",
			ResourceKind::AgentLog => "agent_log",
			ResourceKind::Llmstxt => "llmstxt",
			ResourceKind::Waitlist => "waitlist",
		}
	}
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ResourceKind {
	type Err = AuthzError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ResourceKind::all()
			.iter()
			.copied()
			.find(|k| k.as_str() == s)
			.ok_or_else(|| AuthzError::Configuration(format!("no validator registered for resource '{s}'")))
	}
}

// =============================================================================
// Named Permissions
// =============================================================================

/// A fine-grained permission of the form `"<resource>:<operation>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedPermission {
	pub resource: ResourceKind,
	pub operation: Operation,
}

impl NamedPermission {
	pub fn new(resource: ResourceKind, operation: Operation) -> Self {
		Self {
			resource,
			operation,
		}
	}
}

impl fmt::Display for NamedPermission {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.resource, self.operation)
	}
}

impl FromStr for NamedPermission {
	type Err = AuthzError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (resource, operation) = s
			.split_once(':')
			.ok_or_else(|| AuthzError::Configuration(format!("malformed permission '{s}'")))?;
		Ok(Self::new(resource.parse()?, operation.parse()?))
	}
}

// =============================================================================
// Membership Roles
// =============================================================================

/// Default role name given to a plain company member.
pub const MEMBER_ROLE: &str = "member";

/// Membership role names that grant company administration.
pub const ADMIN_EQUIVALENT_ROLES: &[&str] = &["owner", "company_admin", "admin"];

/// Returns true if a membership role name administers its company.
pub fn is_admin_role(role: &str) -> bool {
	ADMIN_EQUIVALENT_ROLES.contains(&role)
}
