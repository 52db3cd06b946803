// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Writes audit events to the `audit` tracing target.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::AuditSinkError;
use crate::event::{AuditEvent, AuditSeverity};
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;

pub struct TracingAuditSink {
	filter: AuditFilterConfig,
}

impl TracingAuditSink {
	pub fn new(filter: AuditFilterConfig) -> Self {
		Self { filter }
	}
}

impl Default for TracingAuditSink {
	fn default() -> Self {
		Self::new(AuditFilterConfig::default())
	}
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"tracing"
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, event: Arc<AuditEvent>) -> Result<(), AuditSinkError> {
		let user_id = event.user_id.map(|u| u.to_string());
		if event.severity >= AuditSeverity::Warning {
			warn!(
				target: "audit",
				operation_id = event.operation_id,
				phase = %event.phase,
				user_id = user_id.as_deref(),
				role = %event.user_role,
				operation = %event.operation,
				resource = %event.resource,
				resource_id = event.resource_id.as_deref(),
				duration_ms = event.duration_ms,
				error = event.error.as_deref(),
				"audit"
			);
		} else {
			info!(
				target: "audit",
				operation_id = event.operation_id,
				phase = %event.phase,
				user_id = user_id.as_deref(),
				role = %event.user_role,
				operation = %event.operation,
				resource = %event.resource,
				resource_id = event.resource_id.as_deref(),
				duration_ms = event.duration_ms,
				"audit"
			);
		}
		Ok(())
	}
}
