// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;

pub use crate::error::AuditSinkError;
use crate::event::AuditEvent;
use crate::filter::AuditFilterConfig;

#[cfg(feature = "sink-sqlite")]
pub mod sqlite;

#[cfg(feature = "sink-tracing")]
pub mod tracing;

/// Destination for audit events. Publishing runs off the request path.
#[async_trait]
pub trait AuditSink: Send + Sync {
	fn name(&self) -> &str;

	fn filter(&self) -> &AuditFilterConfig;

	async fn publish(&self, event: Arc<AuditEvent>) -> Result<(), AuditSinkError>;

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		Ok(())
	}
}
