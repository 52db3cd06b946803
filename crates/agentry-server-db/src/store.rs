// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite implementation of the access-core data store.
//!
//! This module provides:
//! - Ownership facts per resource kind
//! - Company membership reads and writes
//! - Named permission grants
//! - Secure-filtered list queries

use std::str::FromStr;

use agentry_server_authz::{
	is_admin_role, CompanyId, DataStore, MembershipStore, MembershipWrite, OwnershipFact,
	Predicate, ResourceKind, SortSpec, StoreResult, UserId, VisibleRow,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::DbError;
use crate::sql::{order_by, KindTable, SqlFilter, SqlValue};

/// Holds for a `company_members` row when losing it as an admin still leaves
/// the company with one. Evaluated inside the single UPDATE/DELETE statement,
/// so the check and the write cannot interleave with another writer.
const KEEPS_AN_ADMIN: &str = r#"(
	role NOT IN (SELECT name FROM roles WHERE is_admin = 1)
	OR EXISTS (
		SELECT 1
		FROM company_members other
		JOIN roles r ON r.name = other.role
		WHERE other.company_id = company_members.company_id
			AND other.user_id <> company_members.user_id
			AND r.is_admin = 1
	)
)"#;

/// A stored resource as written by resource services.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
	pub id: String,
	pub name: String,
	pub owner_user_id: Option<UserId>,
	pub company_id: Option<CompanyId>,
	pub is_public: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
	pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id: id.into(),
			name: name.into(),
			owner_user_id: None,
			company_id: None,
			is_public: false,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn owned_by(mut self, user_id: UserId) -> Self {
		self.owner_user_id = Some(user_id);
		self
	}

	pub fn in_company(mut self, company_id: CompanyId) -> Self {
		self.company_id = Some(company_id);
		self
	}

	pub fn public(mut self, is_public: bool) -> Self {
		self.is_public = is_public;
		self
	}

	pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
		self.created_at = at;
		self.updated_at = at;
		self
	}
}

/// Page bounds for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
	pub limit: u32,
	pub offset: u32,
}

impl Default for Page {
	fn default() -> Self {
		Self {
			limit: 50,
			offset: 0,
		}
	}
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_ts(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Corrupt(format!("invalid timestamp '{raw}': {e}")))
}

fn parse_id<T: FromStr>(raw: Option<String>, column: &str) -> Result<Option<T>, DbError>
where
	T::Err: std::fmt::Display,
{
	raw.map(|s| {
		s.parse::<T>()
			.map_err(|e| DbError::Corrupt(format!("invalid {column} '{s}': {e}")))
	})
	.transpose()
}

pub(crate) fn row_to_visible(row: &SqliteRow) -> Result<VisibleRow, DbError> {
	Ok(VisibleRow {
		id: row.try_get("id")?,
		owner_user_id: parse_id(row.try_get("owner_user_id")?, "owner_user_id")?,
		company_id: parse_id(row.try_get("company_id")?, "company_id")?,
		is_public: row.try_get("is_public")?,
		name: row.try_get("name")?,
		created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
		updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
	})
}

/// Data store backed by the schema from [`crate::schema::ensure_schema`].
#[derive(Clone)]
pub struct SqliteDataStore {
	pool: SqlitePool,
}

impl SqliteDataStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	// =========================================================================
	// Resources
	// =========================================================================

	/// Inserts a resource row for `kind`.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if a row with the same id exists.
	#[tracing::instrument(skip(self, record), fields(resource = %kind, resource_id = %record.id))]
	pub async fn insert_resource(
		&self,
		kind: ResourceKind,
		record: &ResourceRecord,
	) -> Result<(), DbError> {
		let result = match kind {
			ResourceKind::Company => {
				sqlx::query(
					r#"
					INSERT INTO companies (id, name, owner_user_id, is_public, created_at, updated_at)
					VALUES (?, ?, ?, ?, ?, ?)
					"#,
				)
				.bind(&record.id)
				.bind(&record.name)
				.bind(record.owner_user_id.map(|u| u.to_string()))
				.bind(record.is_public)
				.bind(format_ts(record.created_at))
				.bind(format_ts(record.updated_at))
				.execute(&self.pool)
				.await
			}
			ResourceKind::Waitlist => {
				sqlx::query(
					r#"
					INSERT INTO waitlist_entries (id, email, user_id, created_at, updated_at)
					VALUES (?, ?, ?, ?, ?)
					"#,
				)
				.bind(&record.id)
				.bind(&record.name)
				.bind(record.owner_user_id.map(|u| u.to_string()))
				.bind(format_ts(record.created_at))
				.bind(format_ts(record.updated_at))
				.execute(&self.pool)
				.await
			}
			_ => {
				let table = KindTable::for_kind(kind);
				sqlx::query(&format!(
					r#"
					INSERT INTO {} (id, name, owner_user_id, company_id, is_public, created_at, updated_at)
					VALUES (?, ?, ?, ?, ?, ?, ?)
					"#,
					table.table
				))
				.bind(&record.id)
				.bind(&record.name)
				.bind(record.owner_user_id.map(|u| u.to_string()))
				.bind(record.company_id.map(|c| c.to_string()))
				.bind(record.is_public)
				.bind(format_ts(record.created_at))
				.bind(format_ts(record.updated_at))
				.execute(&self.pool)
				.await
			}
		};

		match result {
			Ok(_) => Ok(()),
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::Conflict(
				format!("{kind} '{}' already exists", record.id),
			)),
			Err(e) => Err(e.into()),
		}
	}

	/// Returns false when nothing was deleted.
	pub async fn delete_resource(&self, kind: ResourceKind, resource_id: &str) -> Result<bool, DbError> {
		let table = KindTable::for_kind(kind);
		let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table.table))
			.bind(resource_id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	async fn fetch_ownership(
		&self,
		kind: ResourceKind,
		resource_id: &str,
	) -> Result<Option<OwnershipFact>, DbError> {
		let table = KindTable::for_kind(kind);
		let sql = format!(
			"SELECT {} FROM {} WHERE id = ?",
			table.select_list(),
			table.table
		);
		let row = sqlx::query(&sql)
			.bind(resource_id)
			.fetch_optional(&self.pool)
			.await?;

		row.map(|row| {
			let visible = row_to_visible(&row)?;
			Ok(OwnershipFact {
				id: visible.id,
				owner_user_id: visible.owner_user_id,
				company_id: visible.company_id,
				is_public: visible.is_public,
			})
		})
		.transpose()
	}

	/// Lists rows of `kind` matching `predicate`, sorted and paged.
	///
	/// `predicate` should be the engine's secure filter, optionally narrowed
	/// with [`agentry_server_authz::SearchFilter::restrict`].
	#[tracing::instrument(skip(self, predicate), fields(resource = %kind, limit = page.limit, offset = page.offset))]
	pub async fn list_visible(
		&self,
		kind: ResourceKind,
		predicate: &Predicate,
		sort: SortSpec,
		page: Page,
	) -> Result<Vec<VisibleRow>, DbError> {
		if *predicate == Predicate::Never {
			return Ok(Vec::new());
		}

		let table = KindTable::for_kind(kind);
		let filter = SqlFilter::render(predicate, &table);
		let sql = format!(
			"SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
			table.select_list(),
			table.table,
			filter.clause,
			order_by(sort, &table),
		);

		let mut query = sqlx::query(&sql);
		for value in filter.binds {
			query = match value {
				SqlValue::Text(text) => query.bind(text),
				SqlValue::Bool(flag) => query.bind(flag),
			};
		}
		let rows = query
			.bind(i64::from(page.limit))
			.bind(i64::from(page.offset))
			.fetch_all(&self.pool)
			.await?;

		tracing::debug!(rows = rows.len(), "listed visible rows");
		rows.iter().map(row_to_visible).collect()
	}

	// =========================================================================
	// Roles & permissions
	// =========================================================================

	/// Registers a membership role name. Admin-equivalence follows the role name.
	pub async fn add_role(&self, role: &str) -> Result<(), DbError> {
		sqlx::query("INSERT OR IGNORE INTO roles (name, is_admin) VALUES (?, ?)")
			.bind(role)
			.bind(is_admin_role(role))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn grant_permission(&self, user_id: UserId, permission: &str) -> Result<(), DbError> {
		sqlx::query(
			"INSERT OR IGNORE INTO user_permissions (user_id, permission, granted_at) VALUES (?, ?, ?)",
		)
		.bind(user_id.to_string())
		.bind(permission)
		.bind(format_ts(Utc::now()))
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn revoke_permission(&self, user_id: UserId, permission: &str) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM user_permissions WHERE user_id = ? AND permission = ?")
			.bind(user_id.to_string())
			.bind(permission)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	// =========================================================================
	// Membership
	// =========================================================================

	async fn fetch_role(&self, user_id: UserId, company_id: CompanyId) -> Result<Option<String>, DbError> {
		let role = sqlx::query_scalar::<_, String>(
			"SELECT role FROM company_members WHERE company_id = ? AND user_id = ?",
		)
		.bind(company_id.to_string())
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await?;
		Ok(role)
	}

	async fn fetch_companies(&self, user_id: UserId, admin_only: bool) -> Result<Vec<CompanyId>, DbError> {
		let ids: Vec<String> = sqlx::query_scalar(
			r#"
			SELECT m.company_id
			FROM company_members m
			LEFT JOIN roles r ON r.name = m.role
			WHERE m.user_id = ? AND (? = 0 OR COALESCE(r.is_admin, 0) = 1)
			ORDER BY m.company_id
			"#,
		)
		.bind(user_id.to_string())
		.bind(admin_only)
		.fetch_all(&self.pool)
		.await?;

		ids.into_iter()
			.map(|id| {
				id.parse::<CompanyId>()
					.map_err(|e| DbError::Corrupt(format!("invalid company_id '{id}': {e}")))
			})
			.collect()
	}

	/// Classifies a guarded membership write. A row that still exists after a
	/// no-op write was held back by the last-admin condition.
	async fn write_outcome(
		&self,
		rows_affected: u64,
		company_id: CompanyId,
		user_id: UserId,
	) -> Result<MembershipWrite, DbError> {
		if rows_affected > 0 {
			return Ok(MembershipWrite::Applied);
		}
		Ok(match self.fetch_role(user_id, company_id).await? {
			Some(_) => MembershipWrite::LastAdmin,
			None => MembershipWrite::NotMember,
		})
	}

	async fn fetch_admin_count(&self, company_id: CompanyId) -> Result<i64, DbError> {
		let count = sqlx::query_scalar::<_, i64>(
			r#"
			SELECT COUNT(*)
			FROM company_members m
			JOIN roles r ON r.name = m.role
			WHERE m.company_id = ? AND r.is_admin = 1
			"#,
		)
		.bind(company_id.to_string())
		.fetch_one(&self.pool)
		.await?;
		Ok(count)
	}
}

#[async_trait]
impl DataStore for SqliteDataStore {
	async fn get_ownership(
		&self,
		kind: ResourceKind,
		resource_id: &str,
	) -> StoreResult<Option<OwnershipFact>> {
		Ok(self.fetch_ownership(kind, resource_id).await?)
	}

	async fn is_member(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<bool> {
		Ok(self.fetch_role(user_id, company_id).await?.is_some())
	}

	async fn is_admin(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<bool> {
		Ok(self
			.fetch_role(user_id, company_id)
			.await?
			.is_some_and(|role| is_admin_role(&role)))
	}

	async fn admin_companies_of(&self, user_id: UserId) -> StoreResult<Vec<CompanyId>> {
		Ok(self.fetch_companies(user_id, true).await?)
	}

	async fn member_companies_of(&self, user_id: UserId) -> StoreResult<Vec<CompanyId>> {
		Ok(self.fetch_companies(user_id, false).await?)
	}

	async fn role_of(&self, user_id: UserId, company_id: CompanyId) -> StoreResult<Option<String>> {
		Ok(self.fetch_role(user_id, company_id).await?)
	}

	async fn has_named_permission(&self, user_id: UserId, permission: &str) -> StoreResult<bool> {
		let exists = sqlx::query_scalar::<_, bool>(
			"SELECT EXISTS(SELECT 1 FROM user_permissions WHERE user_id = ? AND permission = ?)",
		)
		.bind(user_id.to_string())
		.bind(permission)
		.fetch_one(&self.pool)
		.await
		.map_err(DbError::from)?;
		Ok(exists)
	}
}

#[async_trait]
impl MembershipStore for SqliteDataStore {
	async fn role_exists(&self, role: &str) -> StoreResult<bool> {
		let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM roles WHERE name = ?)")
			.bind(role)
			.fetch_one(&self.pool)
			.await
			.map_err(DbError::from)?;
		Ok(exists)
	}

	async fn count_admins(&self, company_id: CompanyId) -> StoreResult<i64> {
		Ok(self.fetch_admin_count(company_id).await?)
	}

	async fn insert_membership(
		&self,
		company_id: CompanyId,
		user_id: UserId,
		role: &str,
	) -> StoreResult<()> {
		let now = format_ts(Utc::now());
		let result = sqlx::query(
			r#"
			INSERT INTO company_members (company_id, user_id, role, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(company_id.to_string())
		.bind(user_id.to_string())
		.bind(role)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => Ok(()),
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::Conflict(
				format!("user {user_id} is already a member of company {company_id}"),
			)
			.into()),
			Err(e) => Err(DbError::from(e).into()),
		}
	}

	async fn update_membership_role(
		&self,
		company_id: CompanyId,
		user_id: UserId,
		role: &str,
	) -> StoreResult<MembershipWrite> {
		let sql = format!(
			"UPDATE company_members SET role = ?, updated_at = ? WHERE company_id = ? AND user_id = ? AND (? = 1 OR {KEEPS_AN_ADMIN})"
		);
		let result = sqlx::query(&sql)
			.bind(role)
			.bind(format_ts(Utc::now()))
			.bind(company_id.to_string())
			.bind(user_id.to_string())
			.bind(is_admin_role(role))
			.execute(&self.pool)
			.await
			.map_err(DbError::from)?;
		Ok(self
			.write_outcome(result.rows_affected(), company_id, user_id)
			.await?)
	}

	async fn delete_membership(
		&self,
		company_id: CompanyId,
		user_id: UserId,
	) -> StoreResult<MembershipWrite> {
		let sql = format!(
			"DELETE FROM company_members WHERE company_id = ? AND user_id = ? AND {KEEPS_AN_ADMIN}"
		);
		let result = sqlx::query(&sql)
			.bind(company_id.to_string())
			.bind(user_id.to_string())
			.execute(&self.pool)
			.await
			.map_err(DbError::from)?;
		Ok(self
			.write_outcome(result.rows_affected(), company_id, user_id)
			.await?)
	}
}
