// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secure filters for list and search endpoints.
//!
//! An access [`Predicate`] describes which rows a caller may see. It is
//! combined with caller-supplied search criteria by AND only, so a search can
//! narrow the visible set but never widen it. Predicates evaluate in memory
//! via [`Predicate::matches`] and are rendered to SQL by the database crate.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CompanyId, Role, UserId};

// =============================================================================
// Predicates
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
	Always,
	Never,
	IsPublic,
	OwnedBy(UserId),
	CompanyIn(BTreeSet<CompanyId>),
	/// ASCII case-insensitive substring match on the row name.
	NameContains(String),
	PublicEquals(bool),
	And(Vec<Predicate>),
	Or(Vec<Predicate>),
}

impl Predicate {
	/// Conjunction that folds away `Always` and short-circuits on `Never`.
	pub fn and(self, other: Predicate) -> Predicate {
		match (self, other) {
			(Predicate::Never, _) | (_, Predicate::Never) => Predicate::Never,
			(Predicate::Always, p) | (p, Predicate::Always) => p,
			(Predicate::And(mut a), Predicate::And(b)) => {
				a.extend(b);
				Predicate::And(a)
			}
			(Predicate::And(mut a), p) => {
				a.push(p);
				Predicate::And(a)
			}
			(p, Predicate::And(mut b)) => {
				b.insert(0, p);
				Predicate::And(b)
			}
			(a, b) => Predicate::And(vec![a, b]),
		}
	}

	/// Disjunction that folds away `Never` and short-circuits on `Always`.
	pub fn or(self, other: Predicate) -> Predicate {
		match (self, other) {
			(Predicate::Always, _) | (_, Predicate::Always) => Predicate::Always,
			(Predicate::Never, p) | (p, Predicate::Never) => p,
			(Predicate::Or(mut a), Predicate::Or(b)) => {
				a.extend(b);
				Predicate::Or(a)
			}
			(Predicate::Or(mut a), p) => {
				a.push(p);
				Predicate::Or(a)
			}
			(p, Predicate::Or(mut b)) => {
				b.insert(0, p);
				Predicate::Or(b)
			}
			(a, b) => Predicate::Or(vec![a, b]),
		}
	}

	pub fn matches(&self, row: &VisibleRow) -> bool {
		match self {
			Predicate::Always => true,
			Predicate::Never => false,
			Predicate::IsPublic => row.is_public,
			Predicate::OwnedBy(user_id) => row.owner_user_id == Some(*user_id),
			Predicate::CompanyIn(companies) => row
				.company_id
				.is_some_and(|company_id| companies.contains(&company_id)),
			Predicate::NameContains(needle) => row
				.name
				.to_ascii_lowercase()
				.contains(&needle.to_ascii_lowercase()),
			Predicate::PublicEquals(expected) => row.is_public == *expected,
			Predicate::And(parts) => parts.iter().all(|p| p.matches(row)),
			Predicate::Or(parts) => parts.iter().any(|p| p.matches(row)),
		}
	}
}

/// The projection of a stored row that filters and sorts operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleRow {
	pub id: String,
	pub owner_user_id: Option<UserId>,
	pub company_id: Option<CompanyId>,
	pub is_public: bool,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Access predicate
// =============================================================================

/// Facts about the caller gathered before building an access predicate.
#[derive(Debug, Clone, Default)]
pub struct CallerScope {
	pub user_id: Option<UserId>,
	pub member_companies: BTreeSet<CompanyId>,
	/// Whether a system admin holds `<kind>:read`.
	pub can_read_all: bool,
}

/// Builds the row-visibility predicate for a list or search request.
///
/// Public rows are included only when the kind can be public at all. A
/// non-public role without a user id sees what an anonymous caller sees.
pub fn access_predicate(
	role: Role,
	public_visibility: bool,
	caller: &CallerScope,
	company_scope: Option<CompanyId>,
) -> Predicate {
	let public = if public_visibility {
		Predicate::IsPublic
	} else {
		Predicate::Never
	};

	let visible = match (role, caller.user_id) {
		(Role::Public, _) | (_, None) => public,
		(Role::Admin, Some(_)) if caller.can_read_all => Predicate::Always,
		(Role::Admin, Some(_)) => public,
		(Role::User | Role::CompanyAdmin, Some(user_id)) => {
			let companies = if caller.member_companies.is_empty() {
				Predicate::Never
			} else {
				Predicate::CompanyIn(caller.member_companies.clone())
			};
			public.or(Predicate::OwnedBy(user_id)).or(companies)
		}
	};

	match company_scope {
		Some(company_id) => visible.and(Predicate::CompanyIn(BTreeSet::from([company_id]))),
		None => visible,
	}
}

// =============================================================================
// Search
// =============================================================================

/// Caller-supplied search criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name_contains: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub company_id: Option<CompanyId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub owner: Option<UserId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_public: Option<bool>,
}

impl SearchFilter {
	pub fn to_predicate(&self) -> Predicate {
		let mut predicate = Predicate::Always;
		if let Some(name) = self.name_contains.as_deref().filter(|n| !n.is_empty()) {
			predicate = predicate.and(Predicate::NameContains(name.to_string()));
		}
		if let Some(company_id) = self.company_id {
			predicate = predicate.and(Predicate::CompanyIn(BTreeSet::from([company_id])));
		}
		if let Some(owner) = self.owner {
			predicate = predicate.and(Predicate::OwnedBy(owner));
		}
		if let Some(is_public) = self.is_public {
			predicate = predicate.and(Predicate::PublicEquals(is_public));
		}
		predicate
	}

	/// ANDs the search onto an access predicate.
	pub fn restrict(&self, access: Predicate) -> Predicate {
		access.and(self.to_predicate())
	}
}

// =============================================================================
// Sorting
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
	#[default]
	CreatedAt,
	UpdatedAt,
	Name,
}

impl SortField {
	pub fn as_str(&self) -> &'static str {
		match self {
			SortField::CreatedAt => "created_at",
			SortField::UpdatedAt => "updated_at",
			SortField::Name => "name",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
	Asc,
	#[default]
	Desc,
}

impl SortOrder {
	pub fn as_sql(&self) -> &'static str {
		match self {
			SortOrder::Asc => "ASC",
			SortOrder::Desc => "DESC",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
	pub field: SortField,
	pub order: SortOrder,
}

impl SortSpec {
	/// Parses user-supplied sort parameters. Anything outside the allow-list
	/// falls back to the default rather than failing.
	pub fn parse(sort_by: Option<&str>, sort_order: Option<&str>) -> Self {
		let field = match sort_by.map(str::trim) {
			Some("created_at") => SortField::CreatedAt,
			Some("updated_at") => SortField::UpdatedAt,
			Some("name") => SortField::Name,
			Some(other) => {
				tracing::debug!(sort_by = other, "ignoring unknown sort field");
				return Self::default();
			}
			None => SortField::default(),
		};
		let order = match sort_order.map(|o| o.trim().to_ascii_lowercase()).as_deref() {
			Some("asc") => SortOrder::Asc,
			Some("desc") | None => SortOrder::Desc,
			Some(other) => {
				tracing::debug!(sort_order = other, "ignoring unknown sort order");
				return Self::default();
			}
		};
		Self { field, order }
	}

	/// Orders rows by the sort field, breaking ties by id.
	pub fn compare(&self, a: &VisibleRow, b: &VisibleRow) -> Ordering {
		let ordering = match self.field {
			SortField::CreatedAt => a.created_at.cmp(&b.created_at),
			SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
			SortField::Name => a.name.cmp(&b.name),
		}
		.then_with(|| a.id.cmp(&b.id));

		match self.order {
			SortOrder::Asc => ordering,
			SortOrder::Desc => ordering.reverse(),
		}
	}
}

/// Filters and sorts rows in memory.
pub fn apply(
	rows: impl IntoIterator<Item = VisibleRow>,
	predicate: &Predicate,
	sort: SortSpec,
) -> Vec<VisibleRow> {
	let mut visible: Vec<VisibleRow> = rows
		.into_iter()
		.filter(|row| predicate.matches(row))
		.collect();
	visible.sort_by(|a, b| sort.compare(a, b));
	visible
}
