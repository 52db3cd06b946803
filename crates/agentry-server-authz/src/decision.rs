// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decision values returned by resource validators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single access decision. There is no partial allow; row-level
/// narrowing happens in [`crate::filter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum AccessDecision {
	Allowed,
	Denied(DenyReason),
}

impl AccessDecision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, AccessDecision::Allowed)
	}

	pub(crate) fn allow_if(condition: bool, otherwise: DenyReason) -> Self {
		if condition {
			AccessDecision::Allowed
		} else {
			AccessDecision::Denied(otherwise)
		}
	}
}

/// Why a request was denied. Kept for audit and debugging; never shown to
/// the end caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
	/// A non-public role arrived without a user id.
	Unauthenticated,
	/// The public role may only read.
	PublicReadOnly,
	/// The target is not publicly visible.
	NotPublic,
	/// The target resource does not exist.
	NotFound,
	/// The caller is neither owner nor in a company that can see the resource.
	NotVisible,
	/// The caller is not a member of the company the operation targets.
	NotMember,
	/// The operation requires ownership (or company administration).
	NotOwner,
	/// The resource kind can only be created inside a company.
	CompanyScopeRequired,
	/// A system admin lacks the named permission.
	MissingPermission(String),
}

impl fmt::Display for DenyReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DenyReason::Unauthenticated => write!(f, "unauthenticated"),
			DenyReason::PublicReadOnly => write!(f, "public_read_only"),
			DenyReason::NotPublic => write!(f, "not_public"),
			DenyReason::NotFound => write!(f, "not_found"),
			DenyReason::NotVisible => write!(f, "not_visible"),
			DenyReason::NotMember => write!(f, "not_member"),
			DenyReason::NotOwner => write!(f, "not_owner"),
			DenyReason::CompanyScopeRequired => write!(f, "company_scope_required"),
			DenyReason::MissingPermission(p) => write!(f, "missing_permission:{p}"),
		}
	}
}
