//! Entity model for the member store.
//!
//! # Invariants
//! - Every entity is identified by a UUID assigned once at construction.
//! - `Member -> Team` is a non-owning reference; teams never own members.

pub mod entity;
pub mod member;
pub mod projection;
pub mod team;
