// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each section has a resolved `*Config` and a
//! partial `*ConfigLayer` used while merging sources.

mod audit;
mod authz;
mod database;
mod logging;

pub use audit::{AuditConfig, AuditConfigLayer, QueueOverflowPolicy};
pub use authz::{AuthzConfig, AuthzConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
