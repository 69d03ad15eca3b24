//! Build and build task models, and the build state vocabulary.

use packforge_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of a build row in the two-level source → deb tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "build_type", rename_all = "lowercase")]
pub enum BuildType {
    /// Parent build producing the Debian source package.
    Source,
    /// Per-architecture binary build.
    Deb,
}

/// State of a build, driven by the (external) build scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "build_state", rename_all = "snake_case")]
pub enum BuildState {
    New,
    NeedsBuild,
    Scheduled,
    Building,
    BuildFailed,
    NeedsPublish,
    Publishing,
    PublishFailed,
    Successful,
    AlreadyExists,
    NothingDone,
}

impl BuildState {
    /// States in which a deb build blocks deletion of its version.
    pub fn blocks_version_delete(self) -> bool {
        matches!(
            self,
            BuildState::NeedsBuild
                | BuildState::Scheduled
                | BuildState::Building
                | BuildState::NeedsPublish
                | BuildState::Publishing
        )
    }

    /// States in which the build may still append to its log file.
    ///
    /// A live log session keeps tailing while the build is in one of
    /// these states and stops once it leaves them.
    pub fn keeps_log_open(self) -> bool {
        matches!(
            self,
            BuildState::Building | BuildState::Publishing | BuildState::NeedsPublish
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildState::New => "new",
            BuildState::NeedsBuild => "needs_build",
            BuildState::Scheduled => "scheduled",
            BuildState::Building => "building",
            BuildState::BuildFailed => "build_failed",
            BuildState::NeedsPublish => "needs_publish",
            BuildState::Publishing => "publishing",
            BuildState::PublishFailed => "publish_failed",
            BuildState::Successful => "successful",
            BuildState::AlreadyExists => "already_exists",
            BuildState::NothingDone => "nothing_done",
        }
    }
}

/// A row from the `builds` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Build {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    pub projectversion_id: Option<DbId>,
    pub sourcerepository_id: Option<DbId>,
    pub buildtype: BuildType,
    pub buildstate: BuildState,
    pub sourcename: String,
    pub version: Option<String>,
    pub architecture: Option<String>,
    /// Names of the Debian packages this build produced.
    pub debianpackages: serde_json::Value,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Build {
    /// True when the build produced at least one Debian package.
    pub fn has_packages(&self) -> bool {
        self.debianpackages
            .as_array()
            .map(|a| !a.is_empty())
            .unwrap_or(false)
    }
}

/// A cleanup marker for one build attempt.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BuildTask {
    pub id: DbId,
    pub build_id: DbId,
    pub task_id: String,
}
