//! Source repository, per-version association, and post-build hooks.

use packforge_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A git/dsc source repository registered with the service.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SourceRepository {
    pub id: DbId,
    pub url: String,
    pub name: String,
    pub state: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Association of a source repository with a project version, carrying
/// the architecture subset built for that pair.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SourceRepoAssociation {
    pub id: DbId,
    pub sourcerepository_id: DbId,
    pub projectversion_id: DbId,
    pub architectures: Vec<String>,
}

/// A webhook fired after builds of one repository/version association.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PostBuildHook {
    pub id: DbId,
    pub sourcerepositoryprojectversion_id: DbId,
    pub url: String,
    pub method: Option<String>,
    pub skip_ssl: bool,
    pub enabled: bool,
}
