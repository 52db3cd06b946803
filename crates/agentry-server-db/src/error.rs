// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use agentry_server_authz::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Corrupt row: {0}")]
	Corrupt(String),

	#[error("Internal: {0}")]
	Internal(String),
}

impl DbError {
	fn is_unique_violation(&self) -> bool {
		match self {
			DbError::Sqlx(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
			_ => false,
		}
	}
}

impl From<DbError> for StoreError {
	fn from(err: DbError) -> Self {
		if err.is_unique_violation() {
			return StoreError::Constraint(err.to_string());
		}
		match err {
			DbError::Conflict(msg) => StoreError::Constraint(msg),
			other => StoreError::Unavailable(other.to_string()),
		}
	}
}
