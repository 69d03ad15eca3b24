//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for the operations that create or modify it

pub mod build;
pub mod dependency;
pub mod project;
pub mod project_version;
pub mod source_repository;
pub mod user;
