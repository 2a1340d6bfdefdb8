//! Domain model for CP tracking, user profiles and group features.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep wire-facing field names (camelCase) stable for existing clients.
//!
//! # Invariants
//! - Categories are a closed set (`mind|body|soul`).
//! - Lifetime CP counters never decrease.

pub mod category;
pub mod commitment;
pub mod group;
pub mod profile;
pub mod user;
