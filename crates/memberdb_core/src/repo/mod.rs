//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define member/team data access contracts.
//! - Keep SQL and descriptor wiring inside the persistence boundary.
//!
//! # Invariants
//! - Repository writes enforce `Entity::validate()` before persistence.
//! - Repositories are constructed with `try_new`, which rejects connections
//!   missing the current schema.

pub mod crud;
pub mod member_repo;
pub mod team_repo;
