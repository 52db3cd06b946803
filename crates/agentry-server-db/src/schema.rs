// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Idempotent schema bootstrap for the tables the access core reads.

use agentry_server_authz::{ADMIN_EQUIVALENT_ROLES, MEMBER_ROLE};
use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

/// Tables for resources that carry an owner, an optional company and a
/// public flag. Companies and waitlist entries have their own shapes.
const OWNED_RESOURCE_TABLES: &[&str] = &[
	"agents",
	"tools",
	"teams",
	"organizations",
	"agent_logs",
	"llmstxt_entries",
];

const FIXED_STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS companies (
		id TEXT PRIMARY KEY NOT NULL,
		name TEXT NOT NULL,
		owner_user_id TEXT,
		is_public INTEGER NOT NULL DEFAULT 0,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS roles (
		name TEXT PRIMARY KEY NOT NULL,
		is_admin INTEGER NOT NULL DEFAULT 0
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS company_members (
		company_id TEXT NOT NULL,
		user_id TEXT NOT NULL,
		role TEXT NOT NULL REFERENCES roles(name),
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL,
		PRIMARY KEY (company_id, user_id)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_company_members_user ON company_members(user_id)",
	r#"
	CREATE TABLE IF NOT EXISTS user_permissions (
		user_id TEXT NOT NULL,
		permission TEXT NOT NULL,
		granted_at TEXT NOT NULL,
		PRIMARY KEY (user_id, permission)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS waitlist_entries (
		id TEXT PRIMARY KEY NOT NULL,
		email TEXT NOT NULL UNIQUE,
		user_id TEXT,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS audit_events (
		id TEXT PRIMARY KEY NOT NULL,
		operation_id INTEGER NOT NULL,
		timestamp TEXT NOT NULL,
		phase TEXT NOT NULL CHECK (phase IN ('start', 'success', 'failure')),
		severity TEXT NOT NULL,
		user_id TEXT,
		user_role TEXT NOT NULL,
		operation TEXT NOT NULL,
		resource TEXT NOT NULL,
		resource_id TEXT,
		metadata TEXT NOT NULL,
		duration_ms INTEGER,
		error TEXT
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_audit_events_operation ON audit_events(operation_id)",
];

fn owned_resource_table(table: &str) -> String {
	format!(
		r#"
		CREATE TABLE IF NOT EXISTS {table} (
			id TEXT PRIMARY KEY NOT NULL,
			name TEXT NOT NULL,
			owner_user_id TEXT,
			company_id TEXT,
			is_public INTEGER NOT NULL DEFAULT 0,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL
		)
		"#
	)
}

/// Creates every table and seeds the built-in membership roles.
#[tracing::instrument(skip(pool))]
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), DbError> {
	let mut tx = pool.begin().await?;

	for statement in FIXED_STATEMENTS {
		sqlx::query(statement).execute(&mut *tx).await?;
	}

	for table in OWNED_RESOURCE_TABLES {
		sqlx::query(&owned_resource_table(table))
			.execute(&mut *tx)
			.await?;
		sqlx::query(&format!(
			"CREATE INDEX IF NOT EXISTS idx_{table}_company ON {table}(company_id)"
		))
		.execute(&mut *tx)
		.await?;
	}

	sqlx::query("INSERT OR IGNORE INTO roles (name, is_admin) VALUES (?, 0)")
		.bind(MEMBER_ROLE)
		.execute(&mut *tx)
		.await?;
	for role in ADMIN_EQUIVALENT_ROLES {
		sqlx::query("INSERT OR IGNORE INTO roles (name, is_admin) VALUES (?, 1)")
			.bind(*role)
			.execute(&mut *tx)
			.await?;
	}

	tx.commit().await?;
	tracing::debug!("schema ensured");
	Ok(())
}
