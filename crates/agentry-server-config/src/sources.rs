// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuditConfigLayer, AuthzConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, QueueOverflowPolicy,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/agentry/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: AGENTRY_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()),
			authz: Some(load_authz_from_env()?),
			audit: Some(load_audit_from_env()?),
			logging: Some(load_logging_from_env()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid usize value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|s| {
		s.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	})
}

fn load_database_from_env() -> DatabaseConfigLayer {
	DatabaseConfigLayer {
		url: env_var("AGENTRY_SERVER_DATABASE_URL"),
	}
}

fn load_authz_from_env() -> Result<AuthzConfigLayer, ConfigError> {
	Ok(AuthzConfigLayer {
		permission_cache_enabled: env_bool("AGENTRY_SERVER_PERMISSION_CACHE_ENABLED"),
		permission_cache_ttl_secs: env_u64("AGENTRY_SERVER_PERMISSION_CACHE_TTL_SECS")?,
		lookup_timeout_ms: env_u64("AGENTRY_SERVER_LOOKUP_TIMEOUT_MS")?,
		company_required_resources: env_list("AGENTRY_SERVER_COMPANY_REQUIRED_RESOURCES"),
	})
}

fn load_audit_from_env() -> Result<AuditConfigLayer, ConfigError> {
	let queue_overflow_policy = match env_var("AGENTRY_SERVER_AUDIT_QUEUE_OVERFLOW_POLICY") {
		Some(v) => Some(parse_overflow_policy(&v).ok_or_else(|| ConfigError::InvalidValue {
			key: "AGENTRY_SERVER_AUDIT_QUEUE_OVERFLOW_POLICY".to_string(),
			message: format!("expected drop_newest, drop_oldest or block, got '{v}'"),
		})?),
		None => None,
	};

	Ok(AuditConfigLayer {
		enabled: env_bool("AGENTRY_SERVER_AUDIT_ENABLED"),
		queue_capacity: env_usize("AGENTRY_SERVER_AUDIT_QUEUE_CAPACITY")?,
		queue_overflow_policy,
		min_severity: env_var("AGENTRY_SERVER_AUDIT_MIN_SEVERITY"),
	})
}

fn parse_overflow_policy(value: &str) -> Option<QueueOverflowPolicy> {
	match value.to_lowercase().as_str() {
		"drop_newest" => Some(QueueOverflowPolicy::DropNewest),
		"drop_oldest" => Some(QueueOverflowPolicy::DropOldest),
		"block" => Some(QueueOverflowPolicy::Block),
		_ => None,
	}
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("AGENTRY_SERVER_LOG_LEVEL"),
		json: env_bool("AGENTRY_SERVER_LOG_JSON"),
	}
}
