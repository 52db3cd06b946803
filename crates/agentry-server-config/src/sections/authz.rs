// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access decision engine configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_PERMISSION_CACHE_TTL_SECS: u64 = 15 * 60;
const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 5000;

/// Access decision settings (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzConfig {
	pub permission_cache_enabled: bool,
	pub permission_cache_ttl_secs: u64,
	/// Bound on each data-store lookup during a decision. Zero disables it.
	pub lookup_timeout_ms: u64,
	/// Resource kinds that always require an explicit company scope.
	pub company_required_resources: Vec<String>,
}

impl Default for AuthzConfig {
	fn default() -> Self {
		Self {
			permission_cache_enabled: true,
			permission_cache_ttl_secs: DEFAULT_PERMISSION_CACHE_TTL_SECS,
			lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
			company_required_resources: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthzConfigLayer {
	pub permission_cache_enabled: Option<bool>,
	pub permission_cache_ttl_secs: Option<u64>,
	pub lookup_timeout_ms: Option<u64>,
	pub company_required_resources: Option<Vec<String>>,
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.permission_cache_enabled.is_some() {
			self.permission_cache_enabled = other.permission_cache_enabled;
		}
		if other.permission_cache_ttl_secs.is_some() {
			self.permission_cache_ttl_secs = other.permission_cache_ttl_secs;
		}
		if other.lookup_timeout_ms.is_some() {
			self.lookup_timeout_ms = other.lookup_timeout_ms;
		}
		if other.company_required_resources.is_some() {
			self.company_required_resources = other.company_required_resources;
		}
	}

	pub fn finalize(self) -> AuthzConfig {
		let company_required_resources = self
			.company_required_resources
			.unwrap_or_default()
			.into_iter()
			.map(|r| r.trim().to_string())
			.filter(|r| !r.is_empty())
			.collect();

		AuthzConfig {
			permission_cache_enabled: self.permission_cache_enabled.unwrap_or(true),
			permission_cache_ttl_secs: self
				.permission_cache_ttl_secs
				.unwrap_or(DEFAULT_PERMISSION_CACHE_TTL_SECS),
			lookup_timeout_ms: self.lookup_timeout_ms.unwrap_or(DEFAULT_LOOKUP_TIMEOUT_MS),
			company_required_resources,
		}
	}
}
