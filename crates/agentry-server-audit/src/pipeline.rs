// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agentry_server_config::{AuditConfig, QueueOverflowPolicy};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEvent, AuditSeverity};
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;

/// Accepts audit events from request paths.
///
/// `emit` must return without waiting on any sink.
pub trait AuditEmitter: Send + Sync {
	fn emit(&self, event: AuditEvent) -> AuditResult<()>;
}

/// Discards every event. Used when auditing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl AuditEmitter for NoopEmitter {
	fn emit(&self, _event: AuditEvent) -> AuditResult<()> {
		Ok(())
	}
}

/// Bounded queue in front of a background task that fans events out to sinks.
pub struct AuditService {
	tx: mpsc::Sender<AuditEvent>,
	overflow_policy: QueueOverflowPolicy,
	/// Permits for sends parked under `Block`; one queue's worth at most.
	parked_sends: Arc<Semaphore>,
	global_filter: AuditFilterConfig,
	dropped: AtomicU64,
}

impl AuditService {
	/// Starts the fan-out task. Must be called inside a Tokio runtime.
	pub fn new(
		global_filter: AuditFilterConfig,
		queue_capacity: usize,
		overflow_policy: QueueOverflowPolicy,
		sinks: Vec<Arc<dyn AuditSink>>,
	) -> Self {
		let queue_capacity = queue_capacity.max(1);
		let (tx, rx) = mpsc::channel(queue_capacity);

		tokio::spawn(Self::background_task(rx, sinks));

		Self {
			tx,
			overflow_policy,
			parked_sends: Arc::new(Semaphore::new(queue_capacity)),
			global_filter,
			dropped: AtomicU64::new(0),
		}
	}

	/// Builds the emitter described by `config`.
	///
	/// A disabled audit section yields a [`NoopEmitter`].
	pub fn from_config(
		config: &AuditConfig,
		sinks: Vec<Arc<dyn AuditSink>>,
	) -> AuditResult<Arc<dyn AuditEmitter>> {
		if !config.enabled {
			info!("audit logging disabled");
			return Ok(Arc::new(NoopEmitter));
		}

		if config.queue_capacity == 0 {
			return Err(AuditError::ConfigError(
				"queue_capacity must be greater than zero".to_string(),
			));
		}

		let min_severity = config
			.min_severity
			.parse::<AuditSeverity>()
			.map_err(AuditError::ConfigError)?;

		info!(
			queue_capacity = config.queue_capacity,
			overflow_policy = ?config.queue_overflow_policy,
			min_severity = %min_severity,
			sinks = sinks.len(),
			"audit service started"
		);

		Ok(Arc::new(Self::new(
			AuditFilterConfig::with_min_severity(min_severity),
			config.queue_capacity,
			config.queue_overflow_policy,
			sinks,
		)))
	}

	async fn background_task(mut rx: mpsc::Receiver<AuditEvent>, sinks: Vec<Arc<dyn AuditSink>>) {
		while let Some(event) = rx.recv().await {
			let event = Arc::new(event);

			for sink in &sinks {
				if !sink.filter().allows(&event) {
					continue;
				}

				let sink = Arc::clone(sink);
				let event = Arc::clone(&event);

				tokio::spawn(async move {
					if let Err(e) = sink.publish(event).await {
						warn!(sink = sink.name(), error = %e, "audit sink publish failed");
					}
				});
			}
		}
	}

	/// Number of events rejected because the queue was full.
	pub fn dropped(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}

	/// Waits for queue space instead of applying the overflow policy.
	pub async fn emit_blocking(&self, event: AuditEvent) -> AuditResult<()> {
		if !self.global_filter.allows(&event) {
			return Ok(());
		}
		self.tx.send(event).await.map_err(|_| AuditError::Shutdown)
	}
}

impl AuditEmitter for AuditService {
	/// # Overflow Policy Behavior
	///
	/// - `Block`: when the queue is full, parks the send on a spawned task; the
	///   caller never waits. At most `queue_capacity` sends are parked at once,
	///   beyond that the event is rejected like `DropNewest`
	/// - `DropNewest`: rejects the new event when the queue is full
	/// - `DropOldest`: same as `DropNewest`; an mpsc channel cannot evict queued events
	#[instrument(skip(self, event), fields(operation_id = event.operation_id, phase = %event.phase))]
	fn emit(&self, event: AuditEvent) -> AuditResult<()> {
		if !self.global_filter.allows(&event) {
			return Ok(());
		}

		match self.overflow_policy {
			QueueOverflowPolicy::Block => match self.tx.try_send(event) {
				Ok(()) => Ok(()),
				Err(TrySendError::Full(event)) => {
					let Ok(permit) = Arc::clone(&self.parked_sends).try_acquire_owned() else {
						self.dropped.fetch_add(1, Ordering::Relaxed);
						return Err(AuditError::QueueFull);
					};
					let tx = self.tx.clone();
					tokio::spawn(async move {
						let _ = tx.send(event).await;
						drop(permit);
					});
					Ok(())
				}
				Err(TrySendError::Closed(_)) => Err(AuditError::Shutdown),
			},
			QueueOverflowPolicy::DropNewest | QueueOverflowPolicy::DropOldest => {
				match self.tx.try_send(event) {
					Ok(()) => Ok(()),
					Err(TrySendError::Full(_)) => {
						self.dropped.fetch_add(1, Ordering::Relaxed);
						Err(AuditError::QueueFull)
					}
					Err(TrySendError::Closed(_)) => Err(AuditError::Shutdown),
				}
			}
		}
	}
}
