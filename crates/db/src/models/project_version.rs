//! Project version entity model, policy/type enums and DTOs.

use packforge_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Rule constraining which versions may be added as a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "dependency_policy", rename_all = "lowercase")]
pub enum DependencyPolicy {
    /// Dependencies must share the exact basemirror version.
    Strict,
    /// Dependencies must share the basemirror's owning project.
    Distribution,
    /// No constraint.
    Any,
}

impl DependencyPolicy {
    /// Check this policy (the policy of the version being depended on)
    /// against a would-be dependent.
    ///
    /// `own_*` describe the depended-on version's basemirror;
    /// `dependent_*` the dependent's.
    pub fn compatible(
        self,
        own_basemirror: Option<DbId>,
        own_basemirror_project: Option<DbId>,
        dependent_basemirror: Option<DbId>,
        dependent_basemirror_project: Option<DbId>,
    ) -> bool {
        match self {
            DependencyPolicy::Strict => own_basemirror == dependent_basemirror,
            DependencyPolicy::Distribution => {
                own_basemirror_project == dependent_basemirror_project
            }
            DependencyPolicy::Any => true,
        }
    }
}

/// How a version came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "projectversion_type", rename_all = "lowercase")]
pub enum VersionType {
    Normal,
    Overlay,
    Snapshot,
}

/// A row from the `projectversions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectVersion {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub dependency_policy: DependencyPolicy,
    pub basemirror_id: Option<DbId>,
    pub mirror_architectures: Vec<String>,
    pub is_locked: bool,
    pub is_deleted: bool,
    pub ci_builds_enabled: bool,
    pub projectversiontype: VersionType,
    pub baseprojectversion_id: Option<DbId>,
    pub mirror_state: Option<String>,
    pub external_repo: bool,
    pub mirror_url: Option<String>,
    pub mirror_distribution: Option<String>,
    pub mirror_components: Option<Vec<String>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A version joined with its owning project, for listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectVersionInfo {
    pub id: DbId,
    pub project_id: DbId,
    pub project_name: String,
    pub is_mirror: bool,
    pub name: String,
    pub description: Option<String>,
    pub dependency_policy: DependencyPolicy,
    pub is_locked: bool,
    pub ci_builds_enabled: bool,
    pub projectversiontype: VersionType,
}

impl ProjectVersionInfo {
    /// `project/version` display name.
    pub fn fullname(&self) -> String {
        format!("{}/{}", self.project_name, self.name)
    }
}

/// DTO for creating a new version within a project.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProjectVersion {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub description: Option<String>,
    pub dependency_policy: DependencyPolicy,
    /// Basemirror reference in `"project/version"` form.
    #[validate(length(min = 3))]
    pub basemirror: String,
    pub architectures: Vec<String>,
    #[serde(default)]
    pub cibuilds: bool,
}

/// DTO for editing an existing version.
#[derive(Debug, Clone, Deserialize)]
pub struct EditProjectVersion {
    pub description: Option<String>,
    pub dependency_policy: DependencyPolicy,
    #[serde(default)]
    pub cibuilds: bool,
}
