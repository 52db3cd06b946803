// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Execution wrapper that brackets guarded operations with audit events.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agentry_server_authz::{AccessDecisionEngine, AuthzError, SecurityContext};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::event::{AuditEvent, AuditInfo};
use crate::pipeline::AuditEmitter;

/// Runs operations and records `start` / `success` / `failure` audit events.
///
/// Operation ids come from a per-context counter and increase monotonically.
/// Audit failures are logged and never change the operation's result.
pub struct ExecutionContext {
	emitter: Arc<dyn AuditEmitter>,
	next_id: AtomicU64,
}

impl ExecutionContext {
	pub fn new(emitter: Arc<dyn AuditEmitter>) -> Self {
		Self {
			emitter,
			next_id: AtomicU64::new(1),
		}
	}

	pub fn next_operation_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}

	fn record(&self, event: AuditEvent) {
		let operation_id = event.operation_id;
		let phase = event.phase;
		if let Err(e) = self.emitter.emit(event) {
			warn!(operation_id, %phase, error = %e, "failed to emit audit event");
		}
	}

	/// Runs `op`, returning its result unchanged.
	#[instrument(
		skip(self, info, op),
		fields(
			operation_id = tracing::field::Empty,
			resource = %info.resource,
			operation = %info.operation,
		)
	)]
	pub async fn execute<T, E, F, Fut>(&self, info: AuditInfo, op: F) -> Result<T, E>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: Display,
	{
		let operation_id = self.next_operation_id();
		tracing::Span::current().record("operation_id", operation_id);

		self.record(AuditEvent::start(operation_id, &info));
		let started = Instant::now();

		let result = op().await;
		let elapsed = started.elapsed();

		match &result {
			Ok(_) => {
				debug!(duration_ms = elapsed.as_millis() as u64, "operation succeeded");
				self.record(AuditEvent::success(operation_id, &info, elapsed));
			}
			Err(e) => {
				debug!(duration_ms = elapsed.as_millis() as u64, error = %e, "operation failed");
				self.record(AuditEvent::failure(operation_id, &info, elapsed, e.to_string()));
			}
		}

		result
	}

	/// Validates `ctx` with `engine` and, when allowed, runs `op`.
	///
	/// A denial is audited as a failure of the same operation.
	pub async fn execute_authorized<T, E, F, Fut>(
		&self,
		engine: &AccessDecisionEngine,
		ctx: &SecurityContext,
		op: F,
	) -> Result<T, E>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: Display + From<AuthzError>,
	{
		self.execute(AuditInfo::from(ctx), || async move {
			engine.validate(ctx).await?;
			op().await
		})
		.await
	}
}
