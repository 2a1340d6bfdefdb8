//! Flutter-facing bridge crate.

pub mod api;
