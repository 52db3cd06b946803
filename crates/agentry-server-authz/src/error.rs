// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::context::SecurityContext;
use crate::decision::DenyReason;
use crate::types::{CompanyId, Operation, ResourceKind, UserId};

pub type AuthzResult<T> = Result<T, AuthzError>;
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum AuthzError {
	/// The caller may not perform the operation. The message never includes
	/// the reason or ownership details; those stay on the value for auditing.
	#[error("access denied")]
	AccessDenied {
		context: Box<SecurityContext>,
		reason: DenyReason,
	},

	#[error("configuration error: {0}")]
	Configuration(String),

	#[error("company context required for {operation} on {resource}")]
	CompanyContextRequired {
		resource: ResourceKind,
		operation: Operation,
	},

	#[error("data store unavailable: {0}")]
	Upstream(#[from] StoreError),

	#[error("company {company_id} must keep at least one admin")]
	LastAdmin { company_id: CompanyId },

	#[error("user {user_id} is already a member of company {company_id}")]
	AlreadyMember {
		user_id: UserId,
		company_id: CompanyId,
	},

	#[error("user {user_id} is not a member of company {company_id}")]
	NotMember {
		user_id: UserId,
		company_id: CompanyId,
	},

	#[error("unknown membership role '{0}'")]
	UnknownRole(String),
}

impl AuthzError {
	/// Returns true if the error is the caller's fault rather than a server defect
	/// or an unavailable dependency.
	pub fn is_client_error(&self) -> bool {
		!matches!(self, AuthzError::Configuration(_) | AuthzError::Upstream(_))
	}

	/// Returns the denial reason when the error is an access denial.
	pub fn deny_reason(&self) -> Option<&DenyReason> {
		match self {
			AuthzError::AccessDenied { reason, .. } => Some(reason),
			_ => None,
		}
	}
}

/// Failures reported by a data store adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
	#[error("{0}")]
	Unavailable(String),

	#[error("lookup '{operation}' timed out after {timeout_ms}ms")]
	Timeout {
		operation: &'static str,
		timeout_ms: u64,
	},

	#[error("constraint violated: {0}")]
	Constraint(String),
}
