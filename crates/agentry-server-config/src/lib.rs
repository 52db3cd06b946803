// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Agentry server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`AGENTRY_SERVER_*`)
//! - Tracing subscriber initialisation driven by the logging section
//!
//! # Usage
//!
//! ```ignore
//! use agentry_server_config::{init_tracing, load_config};
//!
//! let config = load_config()?;
//! init_tracing(&config.logging)?;
//! ```

pub mod error;
pub mod layer;
pub mod logging;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use logging::init_tracing;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Severity names accepted for `audit.min_severity`, most to least severe.
pub const AUDIT_SEVERITIES: &[&str] = &["critical", "error", "warning", "notice", "info", "debug"];

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub authz: AuthzConfig,
	pub audit: AuditConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`AGENTRY_SERVER_*`)
/// 2. Config file (`/etc/agentry/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge an arbitrary set of sources in precedence order.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let authz = layer.authz.unwrap_or_default().finalize();
	let audit = layer.audit.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&audit)?;

	info!(
		database = %database.url,
		permission_cache_enabled = authz.permission_cache_enabled,
		permission_cache_ttl_secs = authz.permission_cache_ttl_secs,
		lookup_timeout_ms = authz.lookup_timeout_ms,
		audit_enabled = audit.enabled,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		authz,
		audit,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(audit: &AuditConfig) -> Result<(), ConfigError> {
	if audit.queue_capacity == 0 {
		return Err(ConfigError::Validation(
			"audit.queue_capacity must be greater than zero".to_string(),
		));
	}

	let severity = audit.min_severity.to_lowercase();
	if !AUDIT_SEVERITIES.contains(&severity.as_str()) {
		return Err(ConfigError::Validation(format!(
			"audit.min_severity '{}' is not one of {}",
			audit.min_severity,
			AUDIT_SEVERITIES.join(", ")
		)));
	}

	Ok(())
}
