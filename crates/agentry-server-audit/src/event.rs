// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit event model.
//!
//! Every guarded operation produces a `start` event followed by exactly one
//! `success` or `failure` event, all sharing the same `operation_id`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use agentry_server_authz::{Operation, ResourceKind, Role, SecurityContext, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Phase
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
	Start,
	Success,
	Failure,
}

impl AuditPhase {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditPhase::Start => "start",
			AuditPhase::Success => "success",
			AuditPhase::Failure => "failure",
		}
	}
}

impl fmt::Display for AuditPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

// =============================================================================
// Severity
// =============================================================================

/// RFC 5424 severities used by the audit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	Debug = 7,
	#[default]
	Info = 6,
	Notice = 5,
	Warning = 4,
	Error = 3,
	Critical = 2,
}

impl AuditSeverity {
	/// Returns the RFC 5424 numeric severity code.
	pub fn as_syslog_code(&self) -> u8 {
		*self as u8
	}

	/// Returns all severity levels from most to least severe.
	pub fn all() -> &'static [AuditSeverity] {
		&[
			AuditSeverity::Critical,
			AuditSeverity::Error,
			AuditSeverity::Warning,
			AuditSeverity::Notice,
			AuditSeverity::Info,
			AuditSeverity::Debug,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			AuditSeverity::Debug => "debug",
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Error => "error",
			AuditSeverity::Critical => "critical",
		}
	}
}

impl PartialOrd for AuditSeverity {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AuditSeverity {
	fn cmp(&self, other: &Self) -> Ordering {
		// Lower numeric value = higher severity (Critical=2 > Debug=7)
		(*other as u8).cmp(&(*self as u8))
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditSeverity {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let lowered = s.to_lowercase();
		AuditSeverity::all()
			.iter()
			.copied()
			.find(|severity| severity.as_str() == lowered)
			.ok_or_else(|| format!("unknown audit severity '{s}'"))
	}
}

// =============================================================================
// Operation info
// =============================================================================

/// Describes the guarded operation an audit trail belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditInfo {
	pub user_id: Option<UserId>,
	pub user_role: Role,
	pub operation: Operation,
	pub resource: ResourceKind,
	pub resource_id: Option<String>,
	#[serde(default)]
	pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AuditInfo {
	pub fn new(user_role: Role, operation: Operation, resource: ResourceKind) -> Self {
		Self {
			user_id: None,
			user_role,
			operation,
			resource,
			resource_id: None,
			metadata: serde_json::Map::new(),
		}
	}

	pub fn with_user(mut self, user_id: UserId) -> Self {
		self.user_id = Some(user_id);
		self
	}

	pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
		self.resource_id = Some(resource_id.into());
		self
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}
}

impl From<&SecurityContext> for AuditInfo {
	fn from(ctx: &SecurityContext) -> Self {
		let mut metadata = serde_json::Map::new();
		if let Some(company_id) = ctx.company_id {
			metadata.insert("company_id".to_string(), company_id.to_string().into());
		}
		if ctx.company_mode {
			metadata.insert("company_mode".to_string(), true.into());
		}

		Self {
			user_id: ctx.user_id,
			user_role: ctx.user_role,
			operation: ctx.operation,
			resource: ctx.resource,
			resource_id: ctx.resource_id.clone(),
			metadata,
		}
	}
}

// =============================================================================
// Event
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
	pub id: Uuid,
	pub operation_id: u64,
	pub timestamp: DateTime<Utc>,
	pub phase: AuditPhase,
	pub severity: AuditSeverity,
	pub user_id: Option<UserId>,
	pub user_role: Role,
	pub operation: Operation,
	pub resource: ResourceKind,
	pub resource_id: Option<String>,
	pub metadata: serde_json::Value,
	pub duration_ms: Option<u64>,
	pub error: Option<String>,
}

impl AuditEvent {
	fn from_info(operation_id: u64, info: &AuditInfo, phase: AuditPhase) -> Self {
		Self {
			id: Uuid::new_v4(),
			operation_id,
			timestamp: Utc::now(),
			phase,
			severity: AuditSeverity::Info,
			user_id: info.user_id,
			user_role: info.user_role,
			operation: info.operation,
			resource: info.resource,
			resource_id: info.resource_id.clone(),
			metadata: serde_json::Value::Object(info.metadata.clone()),
			duration_ms: None,
			error: None,
		}
	}

	pub fn start(operation_id: u64, info: &AuditInfo) -> Self {
		Self::from_info(operation_id, info, AuditPhase::Start)
	}

	pub fn success(operation_id: u64, info: &AuditInfo, elapsed: Duration) -> Self {
		let mut event = Self::from_info(operation_id, info, AuditPhase::Success);
		event.duration_ms = Some(duration_ms(elapsed));
		event
	}

	pub fn failure(
		operation_id: u64,
		info: &AuditInfo,
		elapsed: Duration,
		error: impl Into<String>,
	) -> Self {
		let mut event = Self::from_info(operation_id, info, AuditPhase::Failure);
		event.severity = AuditSeverity::Warning;
		event.duration_ms = Some(duration_ms(elapsed));
		event.error = Some(error.into());
		event
	}

	pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = severity;
		self
	}
}

fn duration_ms(elapsed: Duration) -> u64 {
	u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
