//! Repository work item definitions and their wire encoding.

use packforge_core::types::DbId;
use serde_json::{json, Value};

/// A unit of repository work for the aptly backend.
///
/// Each variant maps to one recognized operation name; arguments are
/// positional on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum AptlyTask {
    /// Create the package repository for a freshly created version.
    InitRepository {
        basemirror_project: String,
        basemirror_version: String,
        project: String,
        version: String,
        architectures: Vec<String>,
    },
    /// Freeze a version's repository content into a snapshot repository.
    SnapshotRepository {
        basemirror_project: String,
        basemirror_version: String,
        project: String,
        version: String,
        architectures: Vec<String>,
        new_version_name: String,
        old_version_id: DbId,
        new_version_id: DbId,
    },
    /// Remove the package repository of a deleted version.
    DeleteRepository {
        basemirror_project: String,
        basemirror_version: String,
        project: String,
        version: String,
        architectures: Vec<String>,
    },
}

impl AptlyTask {
    /// The operation name keying this task on the wire.
    pub fn operation(&self) -> &'static str {
        match self {
            AptlyTask::InitRepository { .. } => "init_repository",
            AptlyTask::SnapshotRepository { .. } => "snapshot_repository",
            AptlyTask::DeleteRepository { .. } => "delete_repository",
        }
    }

    /// Wire encoding: `{"<operation>": [positional args...]}`.
    pub fn wire_json(&self) -> Value {
        let args = match self {
            AptlyTask::InitRepository {
                basemirror_project,
                basemirror_version,
                project,
                version,
                architectures,
            }
            | AptlyTask::DeleteRepository {
                basemirror_project,
                basemirror_version,
                project,
                version,
                architectures,
            } => vec![
                json!(basemirror_project),
                json!(basemirror_version),
                json!(project),
                json!(version),
                json!(architectures),
            ],
            AptlyTask::SnapshotRepository {
                basemirror_project,
                basemirror_version,
                project,
                version,
                architectures,
                new_version_name,
                old_version_id,
                new_version_id,
            } => vec![
                json!(basemirror_project),
                json!(basemirror_version),
                json!(project),
                json!(version),
                json!(architectures),
                json!(new_version_name),
                json!(old_version_id),
                json!(new_version_id),
            ],
        };

        let mut map = serde_json::Map::new();
        map.insert(self.operation().to_string(), Value::Array(args));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_repository_wire_shape() {
        let task = AptlyTask::InitRepository {
            basemirror_project: "debian".into(),
            basemirror_version: "10".into(),
            project: "myproj".into(),
            version: "1.0".into(),
            architectures: vec!["amd64".into(), "armhf".into()],
        };
        assert_eq!(task.operation(), "init_repository");
        assert_eq!(
            task.wire_json(),
            serde_json::json!({
                "init_repository": ["debian", "10", "myproj", "1.0", ["amd64", "armhf"]]
            })
        );
    }

    #[test]
    fn snapshot_repository_carries_old_and_new_ids() {
        let task = AptlyTask::SnapshotRepository {
            basemirror_project: "debian".into(),
            basemirror_version: "10".into(),
            project: "myproj".into(),
            version: "1.0".into(),
            architectures: vec!["amd64".into()],
            new_version_name: "1.0-frozen".into(),
            old_version_id: 3,
            new_version_id: 9,
        };
        assert_eq!(
            task.wire_json(),
            serde_json::json!({
                "snapshot_repository":
                    ["debian", "10", "myproj", "1.0", ["amd64"], "1.0-frozen", 3, 9]
            })
        );
    }

    #[test]
    fn delete_repository_wire_shape() {
        let task = AptlyTask::DeleteRepository {
            basemirror_project: "debian".into(),
            basemirror_version: "10".into(),
            project: "myproj".into(),
            version: "1.0".into(),
            architectures: vec!["amd64".into()],
        };
        assert_eq!(
            task.wire_json(),
            serde_json::json!({
                "delete_repository": ["debian", "10", "myproj", "1.0", ["amd64"]]
            })
        );
    }
}
