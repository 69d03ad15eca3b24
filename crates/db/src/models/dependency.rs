//! Dependency edge model.

use packforge_core::types::DbId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A directed edge: `projectversion_id` depends on `dependency_id`.
///
/// At most one edge exists per ordered pair; the inverse view
/// ("dependents") is derived by querying the edge set, never stored.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectVersionDependency {
    pub projectversion_id: DbId,
    pub dependency_id: DbId,
    pub use_cibuilds: bool,
}

/// One member of a transitive dependency closure, in BFS order.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct ClosureEntry {
    /// The dependency version.
    pub version_id: DbId,
    /// The `use_cibuilds` flag of the first edge reaching this version.
    pub use_cibuilds: bool,
}

/// DTO for adding a dependency edge.
#[derive(Debug, Clone, Deserialize)]
pub struct AddDependency {
    /// Fully qualified dependency name, `"project/version"`.
    pub dependency: String,
    #[serde(default)]
    pub use_cibuilds: bool,
}
