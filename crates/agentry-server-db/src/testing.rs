// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Helpers for tests that need a real SQLite schema.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::schema::ensure_schema;
use crate::store::SqliteDataStore;

/// In-memory pool pinned to one connection so every query sees the same database.
pub async fn create_test_pool() -> SqlitePool {
	SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap()
}

pub async fn create_schema_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	ensure_schema(&pool).await.unwrap();
	pool
}

pub async fn create_test_store() -> SqliteDataStore {
	SqliteDataStore::new(create_schema_test_pool().await)
}
