//! Project entity model and DTOs.

use packforge_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A project row from the `projects` table.
///
/// A project owns zero or more versions. Mirror projects track foreign
/// package repositories; basemirror projects provide the OS base
/// package set other versions build against.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub is_mirror: bool,
    pub is_basemirror: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_mirror: bool,
    #[serde(default)]
    pub is_basemirror: bool,
}
