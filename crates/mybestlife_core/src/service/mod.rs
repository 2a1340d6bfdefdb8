//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, store and tracker calls into use-case APIs.
//! - Keep server, FFI and CLI layers decoupled from storage details.

pub mod auth_service;
pub mod commitment_service;
pub mod group_service;
pub mod profile_service;
pub mod user_cp_service;
