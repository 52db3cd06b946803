// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::event::{AuditEvent, AuditPhase, AuditSeverity};

/// Selects which events reach the pipeline or an individual sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilterConfig {
	pub min_severity: AuditSeverity,
	/// When set, only these phases pass.
	pub phases: Option<Vec<AuditPhase>>,
}

impl AuditFilterConfig {
	pub fn with_min_severity(min_severity: AuditSeverity) -> Self {
		Self {
			min_severity,
			phases: None,
		}
	}

	pub fn allows(&self, event: &AuditEvent) -> bool {
		if event.severity < self.min_severity {
			return false;
		}
		match &self.phases {
			Some(phases) => phases.contains(&event.phase),
			None => true,
		}
	}
}
