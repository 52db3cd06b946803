// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod error;
pub mod event;
pub mod execution;
pub mod filter;
pub mod pipeline;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{AuditEvent, AuditInfo, AuditPhase, AuditSeverity};
pub use execution::ExecutionContext;
pub use filter::AuditFilterConfig;
pub use pipeline::{AuditEmitter, AuditService, NoopEmitter};
pub use sink::AuditSink;

pub use agentry_server_config::{AuditConfig, QueueOverflowPolicy};

#[cfg(feature = "sink-sqlite")]
pub use sink::sqlite::SqliteAuditSink;

#[cfg(feature = "sink-tracing")]
pub use sink::tracing::TracingAuditSink;
