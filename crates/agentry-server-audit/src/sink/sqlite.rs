// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::AuditSinkError;
use crate::event::AuditEvent;
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;

/// Persists events to the `audit_events` table created by the schema bootstrap.
pub struct SqliteAuditSink {
	pool: SqlitePool,
	filter: AuditFilterConfig,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool, filter: AuditFilterConfig) -> Self {
		Self { pool, filter }
	}
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		"sqlite"
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, event: Arc<AuditEvent>) -> Result<(), AuditSinkError> {
		let metadata_json = serde_json::to_string(&event.metadata)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize metadata: {e}")))?;
		let operation_id = i64::try_from(event.operation_id).map_err(|_| {
			AuditSinkError::Permanent(format!("operation id {} out of range", event.operation_id))
		})?;
		let duration_ms = event.duration_ms.map(|d| i64::try_from(d).unwrap_or(i64::MAX));

		sqlx::query(
			r#"
			INSERT INTO audit_events (
				id, operation_id, timestamp, phase, severity, user_id, user_role,
				operation, resource, resource_id, metadata, duration_ms, error
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(event.id.to_string())
		.bind(operation_id)
		.bind(event.timestamp.to_rfc3339())
		.bind(event.phase.as_str())
		.bind(event.severity.as_str())
		.bind(event.user_id.map(|u| u.to_string()))
		.bind(event.user_role.as_str())
		.bind(event.operation.as_str())
		.bind(event.resource.as_str())
		.bind(&event.resource_id)
		.bind(&metadata_json)
		.bind(duration_ms)
		.bind(&event.error)
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if is_transient_error(&e) {
				AuditSinkError::Transient(format!("database error: {e}"))
			} else {
				AuditSinkError::Permanent(format!("database error: {e}"))
			}
		})?;

		Ok(())
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		sqlx::query("SELECT 1")
			.execute(&self.pool)
			.await
			.map_err(|e| AuditSinkError::Transient(format!("health check failed: {e}")))?;
		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked")
		}
		_ => false,
	}
}
