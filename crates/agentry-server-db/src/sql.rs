// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rendering of secure-filter predicates into parameterized SQLite.
//!
//! Column names come from a fixed per-kind table; only values are bound.

use agentry_server_authz::{Predicate, ResourceKind, SortField, SortSpec};

/// Where a resource kind lives and how its ownership columns are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindTable {
	pub table: &'static str,
	pub name: &'static str,
	pub owner: Option<&'static str>,
	pub company: Option<&'static str>,
	pub public: Option<&'static str>,
}

impl KindTable {
	pub const fn owned(table: &'static str) -> Self {
		Self {
			table,
			name: "name",
			owner: Some("owner_user_id"),
			company: Some("company_id"),
			public: Some("is_public"),
		}
	}

	pub fn for_kind(kind: ResourceKind) -> Self {
		match kind {
			ResourceKind::Agent => Self::owned("agents"),
			ResourceKind::Tool => Self::owned("tools"),
			ResourceKind::Team => Self::owned("teams"),
			ResourceKind::Organization => Self::owned("organizations"),
			ResourceKind::AgentLog => Self::owned("agent_logs"),
			ResourceKind::Llmstxt => Self::owned("llmstxt_entries"),
			// A company is scoped to itself.
			ResourceKind::Company => Self {
				company: Some("id"),
				..Self::owned("companies")
			},
			ResourceKind::Waitlist => Self {
				table: "waitlist_entries",
				name: "email",
				owner: Some("user_id"),
				company: None,
				public: None,
			},
		}
	}

	pub fn owner_expr(&self) -> &'static str {
		self.owner.unwrap_or("NULL")
	}

	pub fn company_expr(&self) -> &'static str {
		self.company.unwrap_or("NULL")
	}

	pub fn public_expr(&self) -> &'static str {
		self.public.unwrap_or("0")
	}

	/// Columns in the order [`crate::store::row_to_visible`] expects.
	pub fn select_list(&self) -> String {
		format!(
			"id, {} AS owner_user_id, {} AS company_id, {} AS is_public, {} AS name, created_at, updated_at",
			self.owner_expr(),
			self.company_expr(),
			self.public_expr(),
			self.name,
		)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
	Text(String),
	Bool(bool),
}

/// A WHERE clause fragment plus its positional bind values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFilter {
	pub clause: String,
	pub binds: Vec<SqlValue>,
}

impl SqlFilter {
	pub fn render(predicate: &Predicate, table: &KindTable) -> Self {
		let mut binds = Vec::new();
		let clause = render_into(predicate, table, &mut binds);
		Self { clause, binds }
	}
}

fn render_into(predicate: &Predicate, table: &KindTable, binds: &mut Vec<SqlValue>) -> String {
	match predicate {
		Predicate::Always => "1".to_string(),
		Predicate::Never => "0".to_string(),
		Predicate::IsPublic => format!("{} = 1", table.public_expr()),
		Predicate::PublicEquals(expected) => {
			binds.push(SqlValue::Bool(*expected));
			format!("{} = ?", table.public_expr())
		}
		Predicate::OwnedBy(user_id) => {
			binds.push(SqlValue::Text(user_id.to_string()));
			format!("{} = ?", table.owner_expr())
		}
		Predicate::CompanyIn(companies) => {
			if companies.is_empty() {
				return "0".to_string();
			}
			let placeholders = vec!["?"; companies.len()].join(", ");
			binds.extend(companies.iter().map(|c| SqlValue::Text(c.to_string())));
			format!("{} IN ({placeholders})", table.company_expr())
		}
		Predicate::NameContains(needle) => {
			binds.push(SqlValue::Text(needle.to_ascii_lowercase()));
			format!("instr(lower({}), ?) > 0", table.name)
		}
		Predicate::And(parts) => join(parts, " AND ", "1", table, binds),
		Predicate::Or(parts) => join(parts, " OR ", "0", table, binds),
	}
}

fn join(
	parts: &[Predicate],
	separator: &str,
	empty: &str,
	table: &KindTable,
	binds: &mut Vec<SqlValue>,
) -> String {
	if parts.is_empty() {
		return empty.to_string();
	}
	let rendered: Vec<String> = parts
		.iter()
		.map(|p| format!("({})", render_into(p, table, binds)))
		.collect();
	rendered.join(separator)
}

/// ORDER BY clause matching [`SortSpec::compare`], including the id tie-break.
pub fn order_by(sort: SortSpec, table: &KindTable) -> String {
	let column = match sort.field {
		SortField::CreatedAt => "created_at",
		SortField::UpdatedAt => "updated_at",
		SortField::Name => table.name,
	};
	let direction = sort.order.as_sql();
	format!("{column} {direction}, id {direction}")
}
