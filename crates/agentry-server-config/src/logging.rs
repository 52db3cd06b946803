// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ConfigError;
use crate::sections::LoggingConfig;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Fails if a subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&config.level))
		.map_err(|e| ConfigError::InvalidValue {
			key: "logging.level".to_string(),
			message: e.to_string(),
		})?;

	let registry = tracing_subscriber::registry().with(filter);
	let result = if config.json {
		registry.with(fmt::layer().json()).try_init()
	} else {
		registry.with(fmt::layer()).try_init()
	};

	result.map_err(|e| ConfigError::Tracing(e.to_string()))
}
