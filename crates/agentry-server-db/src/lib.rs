// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the Agentry access core.
//!
//! [`SqliteDataStore`] implements the authz [`DataStore`] and
//! [`MembershipStore`] traits and runs secure-filtered list queries by
//! rendering [`Predicate`]s into parameterized SQL.
//!
//! [`DataStore`]: agentry_server_authz::DataStore
//! [`MembershipStore`]: agentry_server_authz::MembershipStore
//! [`Predicate`]: agentry_server_authz::Predicate

pub mod error;
pub mod pool;
pub mod schema;
pub mod sql;
pub mod store;
pub mod testing;

pub use error::DbError;
pub use pool::{connect, create_pool};
pub use schema::ensure_schema;
pub use sql::{KindTable, SqlFilter, SqlValue};
pub use store::{Page, ResourceRecord, SqliteDataStore};
