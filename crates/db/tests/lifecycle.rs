//! Integration tests for version lifecycle operations: create, clone,
//! snapshot, lock and the cascading delete state machine.

mod common;

use assert_matches::assert_matches;
use packforge_aptly::{AptlyQueue, AptlyTask};
use packforge_core::config::BuildoutConfig;
use packforge_core::error::CoreError;
use packforge_db::lifecycle::VersionLifecycle;
use packforge_db::models::project_version::{
    CreateProjectVersion, DependencyPolicy, VersionType,
};
use packforge_db::repositories::{
    BuildRepo, DependencyRepo, ProjectVersionRepo, SourceRepositoryRepo,
};
use packforge_db::DbError;
use sqlx::PgPool;

use common::*;

fn create_input(name: &str, basemirror: &str, archs: &[&str]) -> CreateProjectVersion {
    CreateProjectVersion {
        name: name.to_string(),
        description: Some("test version".to_string()),
        dependency_policy: DependencyPolicy::Strict,
        basemirror: basemirror.to_string(),
        architectures: archs.iter().map(|s| s.to_string()).collect(),
        cibuilds: false,
    }
}

fn test_buildout() -> BuildoutConfig {
    BuildoutConfig {
        root: std::env::temp_dir().join("packforge-test-buildout"),
    }
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_version_enqueues_init_repository(pool: PgPool) {
    create_basemirror(&pool, "base", "10", &["amd64", "armhf"]).await;
    let proj = create_project(&pool, "myproj").await;
    let (queue, mut rx) = AptlyQueue::channel();

    let version = VersionLifecycle::create(
        &pool,
        &queue,
        proj.id,
        &create_input("1.0", "base/10", &["amd64"]),
    )
    .await
    .expect("create should succeed");

    assert_eq!(version.name, "1.0");
    assert!(version.mirror_state.is_none());
    assert_eq!(version.projectversiontype, VersionType::Normal);

    let task = rx.try_recv().expect("init task enqueued");
    assert_matches!(task, AptlyTask::InitRepository { project, version, architectures, .. } => {
        assert_eq!(project, "myproj");
        assert_eq!(version, "1.0");
        assert_eq!(architectures, vec!["amd64".to_string()]);
    });
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_rejects_architecture_outside_basemirror(pool: PgPool) {
    create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let (queue, mut rx) = AptlyQueue::channel();

    let err = VersionLifecycle::create(
        &pool,
        &queue,
        proj.id,
        &create_input("1.0", "base/10", &["amd64", "riscv64"]),
    )
    .await
    .expect_err("foreign architecture must be rejected");
    assert_matches!(
        err,
        DbError::Core(CoreError::Validation(msg)) if msg.contains("riscv64")
    );
    assert!(rx.try_recv().is_err(), "no work item on failure");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_rejects_duplicate_name_even_when_deleted(pool: PgPool) {
    create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let (queue, _rx) = AptlyQueue::channel();

    let version = VersionLifecycle::create(
        &pool,
        &queue,
        proj.id,
        &create_input("1.0", "base/10", &["amd64"]),
    )
    .await
    .unwrap();

    let err = VersionLifecycle::create(
        &pool,
        &queue,
        proj.id,
        &create_input("1.0", "base/10", &["amd64"]),
    )
    .await
    .expect_err("duplicate name must conflict");
    assert_matches!(err, DbError::Core(CoreError::Conflict(_)));

    // Soft-delete the version; the name stays reserved and the error
    // says so.
    ProjectVersionRepo::mark_deleted(&pool, version.id, "1.0-deleted")
        .await
        .unwrap();
    sqlx::query("UPDATE projectversions SET name = '1.0' WHERE id = $1")
        .bind(version.id)
        .execute(&pool)
        .await
        .unwrap();
    let err = VersionLifecycle::create(
        &pool,
        &queue,
        proj.id,
        &create_input("1.0", "base/10", &["amd64"]),
    )
    .await
    .expect_err("deleted name is still reserved");
    assert_matches!(
        err,
        DbError::Core(CoreError::Conflict(msg)) if msg.contains("marked as deleted")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_rejects_invalid_basemirror_reference(pool: PgPool) {
    let proj = create_project(&pool, "myproj").await;
    let (queue, _rx) = AptlyQueue::channel();

    let err = VersionLifecycle::create(
        &pool,
        &queue,
        proj.id,
        &create_input("1.0", "nosuchmirror", &["amd64"]),
    )
    .await
    .expect_err("malformed reference must be rejected");
    assert_matches!(err, DbError::Core(CoreError::Validation(_)));

    let err = VersionLifecycle::create(
        &pool,
        &queue,
        proj.id,
        &create_input("1.0", "nosuch/mirror", &["amd64"]),
    )
    .await
    .expect_err("unknown basemirror must be rejected");
    assert_matches!(
        err,
        DbError::Core(CoreError::Validation(msg)) if msg.contains("Base mirror not found")
    );
}

// ---------------------------------------------------------------------------
// clone
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn clone_copies_edges_architectures_and_associations(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64", "armhf"]).await;
    let proj = create_project(&pool, "myproj").await;
    let libs = create_project(&pool, "libs").await;
    let (queue, mut rx) = AptlyQueue::channel();

    let original = VersionLifecycle::create(
        &pool,
        &queue,
        proj.id,
        &create_input("1.0", "base/10", &["amd64"]),
    )
    .await
    .unwrap();
    let dep = create_version(&pool, libs.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    DependencyRepo::insert_edge(&pool, original.id, dep.id, true)
        .await
        .unwrap();
    let repo = insert_source_repository(&pool, "hello").await;
    associate_repository(&pool, repo, original.id, &["amd64"]).await;
    let _ = rx.try_recv();

    let cloned = VersionLifecycle::clone(
        &pool,
        &queue,
        original.id,
        &create_input("2.0", "base/10", &["amd64"]),
    )
    .await
    .expect("clone should succeed");

    assert_eq!(cloned.baseprojectversion_id, Some(original.id));
    assert_eq!(cloned.projectversiontype, VersionType::Normal);

    let edges = DependencyRepo::direct_edges(&pool, cloned.id).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].dependency_id, dep.id);
    assert!(edges[0].use_cibuilds, "clone preserves the edge CI flag");

    let assocs = SourceRepositoryRepo::associations_for_version(&pool, cloned.id)
        .await
        .unwrap();
    assert_eq!(assocs.len(), 1);
    assert_eq!(assocs[0].architectures, vec!["amd64".to_string()]);

    let task = rx.try_recv().expect("init task enqueued for the clone");
    assert_matches!(task, AptlyTask::InitRepository { version, .. } => {
        assert_eq!(version, "2.0");
    });
}

// ---------------------------------------------------------------------------
// snapshot
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn snapshot_requires_locked_dependencies(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let libs = create_project(&pool, "libs").await;
    let (queue, _rx) = AptlyQueue::channel();

    let version =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let dep = create_version(&pool, libs.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    DependencyRepo::insert_edge(&pool, version.id, dep.id, false)
        .await
        .unwrap();

    let err = VersionLifecycle::snapshot(&pool, &queue, version.id, "1.0-s1")
        .await
        .expect_err("unlocked dependency must block snapshot");
    assert_matches!(
        err,
        DbError::Core(CoreError::Conflict(msg)) if msg.contains("is not locked")
    );
    assert!(
        ProjectVersionRepo::find_by_fullname(&pool, "myproj", "1.0-s1")
            .await
            .unwrap()
            .is_none(),
        "no version is created on failure"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn snapshot_requires_successful_latest_builds(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let (queue, _rx) = AptlyQueue::channel();

    let version =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let repo = insert_source_repository(&pool, "hello").await;
    associate_repository(&pool, repo, version.id, &["amd64"]).await;

    // An older successful build is superseded by a failed one.
    insert_build(&pool, Some(version.id), Some(repo), None, "deb", "successful", "hello", &["hello"])
        .await;
    insert_build(&pool, Some(version.id), Some(repo), None, "deb", "build_failed", "hello", &[])
        .await;

    let err = VersionLifecycle::snapshot(&pool, &queue, version.id, "1.0-s1")
        .await
        .expect_err("failed latest build must block snapshot");
    assert_matches!(
        err,
        DbError::Core(CoreError::Conflict(msg)) if msg.contains("successful")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn snapshot_freezes_dependencies_and_associations(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let libs = create_project(&pool, "libs").await;
    let (queue, mut rx) = AptlyQueue::channel();

    let version =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let dep = create_version(&pool, libs.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    ProjectVersionRepo::set_locked(&pool, dep.id, true).await.unwrap();
    DependencyRepo::insert_edge(&pool, version.id, dep.id, true)
        .await
        .unwrap();

    let repo = insert_source_repository(&pool, "hello").await;
    associate_repository(&pool, repo, version.id, &["amd64"]).await;
    insert_build(&pool, Some(version.id), Some(repo), None, "deb", "successful", "hello", &["hello"])
        .await;

    let snapshot = VersionLifecycle::snapshot(&pool, &queue, version.id, "1.0-s1")
        .await
        .expect("snapshot should succeed");

    assert!(snapshot.is_locked);
    assert!(!snapshot.ci_builds_enabled);
    assert_eq!(snapshot.projectversiontype, VersionType::Snapshot);
    assert_eq!(snapshot.baseprojectversion_id, Some(version.id));

    let edges = DependencyRepo::direct_edges(&pool, snapshot.id).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert!(!edges[0].use_cibuilds, "snapshot edge copy resets the CI flag");

    let assocs = SourceRepositoryRepo::associations_for_version(&pool, snapshot.id)
        .await
        .unwrap();
    assert_eq!(assocs.len(), 1);
    assert_eq!(assocs[0].architectures, vec!["amd64".to_string()]);

    let task = rx.try_recv().expect("snapshot task enqueued");
    assert_matches!(
        task,
        AptlyTask::SnapshotRepository { new_version_name, old_version_id, new_version_id, .. } => {
            assert_eq!(new_version_name, "1.0-s1");
            assert_eq!(old_version_id, version.id);
            assert_eq!(new_version_id, snapshot.id);
        }
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn snapshot_of_snapshot_is_rejected(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let (queue, _rx) = AptlyQueue::channel();

    let version =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let snapshot = VersionLifecycle::snapshot(&pool, &queue, version.id, "1.0-s1")
        .await
        .expect("snapshot without builds or deps succeeds");

    let err = VersionLifecycle::snapshot(&pool, &queue, snapshot.id, "1.0-s2")
        .await
        .expect_err("snapshotting a snapshot must be rejected");
    assert_matches!(
        err,
        DbError::Core(CoreError::Conflict(msg)) if msg.contains("overlay/snapshot")
    );
}

// ---------------------------------------------------------------------------
// lock
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn lock_sets_flag_and_rejects_external_basemirror(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let version =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;

    VersionLifecycle::lock(&pool, version.id).await.unwrap();
    let locked = ProjectVersionRepo::find_by_id(&pool, version.id)
        .await
        .unwrap()
        .unwrap();
    assert!(locked.is_locked);

    sqlx::query("UPDATE projectversions SET external_repo = TRUE WHERE id = $1")
        .bind(base.id)
        .execute(&pool)
        .await
        .unwrap();
    let other =
        create_version(&pool, proj.id, "2.0", DependencyPolicy::Strict, Some(base.id)).await;
    let err = VersionLifecycle::lock(&pool, other.id)
        .await
        .expect_err("external basemirror must block lock");
    assert_matches!(
        err,
        DbError::Core(CoreError::Conflict(msg)) if msg.contains("external")
    );
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_is_blocked_by_dependents_and_lock(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let libs = create_project(&pool, "libs").await;
    let (queue, _rx) = AptlyQueue::channel();
    let buildout = test_buildout();

    let version =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let dependent =
        create_version(&pool, libs.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    DependencyRepo::insert_edge(&pool, dependent.id, version.id, false)
        .await
        .unwrap();

    let err = VersionLifecycle::delete(&pool, &queue, &buildout, version.id, false)
        .await
        .expect_err("dependents must block delete");
    assert_matches!(
        err,
        DbError::Core(CoreError::Conflict(msg)) if msg.contains("libs/1.0")
    );

    DependencyRepo::delete_edge(&pool, dependent.id, version.id)
        .await
        .unwrap();
    ProjectVersionRepo::set_locked(&pool, version.id, true).await.unwrap();
    let err = VersionLifecycle::delete(&pool, &queue, &buildout, version.id, false)
        .await
        .expect_err("locked version must block delete");
    assert_matches!(err, DbError::Core(CoreError::Conflict(msg)) if msg.contains("locked"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_with_building_deb_requires_force(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let (queue, mut rx) = AptlyQueue::channel();
    let buildout = test_buildout();

    let version =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let repo = insert_source_repository(&pool, "hello").await;
    let source =
        insert_build(&pool, Some(version.id), Some(repo), None, "source", "successful", "hello", &[])
            .await;
    let deb = insert_build(
        &pool,
        Some(version.id),
        Some(repo),
        Some(source),
        "deb",
        "building",
        "hello",
        &[],
    )
    .await;
    insert_buildtask(&pool, deb).await;

    let err = VersionLifecycle::delete(&pool, &queue, &buildout, version.id, false)
        .await
        .expect_err("in-flight build must block delete without force");
    assert_matches!(
        err,
        DbError::Core(CoreError::Conflict(msg)) if msg.contains("building")
    );

    VersionLifecycle::delete(&pool, &queue, &buildout, version.id, true)
        .await
        .expect("force delete proceeds");

    assert!(BuildRepo::find_by_id(&pool, deb).await.unwrap().is_none());
    assert!(BuildRepo::find_by_id(&pool, source).await.unwrap().is_none());
    let (tasks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM buildtasks WHERE build_id = $1")
        .bind(deb)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tasks, 0, "buildtask rows are removed");

    let task = rx.try_recv().expect("delete task enqueued");
    assert_matches!(task, AptlyTask::DeleteRepository { version, .. } => {
        assert_eq!(version, "1.0", "pre-rename name is remembered");
    });
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_preserves_shared_source_builds(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let (queue, _rx) = AptlyQueue::channel();
    let buildout = test_buildout();

    let doomed =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let survivor =
        create_version(&pool, proj.id, "2.0", DependencyPolicy::Strict, Some(base.id)).await;
    let repo = insert_source_repository(&pool, "hello").await;

    let source =
        insert_build(&pool, None, Some(repo), None, "source", "successful", "hello", &[]).await;
    insert_build(&pool, Some(doomed.id), Some(repo), Some(source), "deb", "successful", "hello", &[])
        .await;
    insert_build(
        &pool,
        Some(survivor.id),
        Some(repo),
        Some(source),
        "deb",
        "successful",
        "hello",
        &[],
    )
    .await;

    VersionLifecycle::delete(&pool, &queue, &buildout, doomed.id, true)
        .await
        .expect("delete should succeed");

    assert!(
        BuildRepo::find_by_id(&pool, source).await.unwrap().is_some(),
        "source build shared with a live version survives"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_severs_provenance_and_removes_the_row(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let (queue, _rx) = AptlyQueue::channel();
    let buildout = test_buildout();

    let original =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let cloned = VersionLifecycle::clone(
        &pool,
        &queue,
        original.id,
        &create_input("2.0", "base/10", &["amd64"]),
    )
    .await
    .unwrap();
    assert_eq!(cloned.baseprojectversion_id, Some(original.id));

    VersionLifecycle::delete(&pool, &queue, &buildout, original.id, false)
        .await
        .expect("delete should succeed");

    assert!(
        ProjectVersionRepo::find_by_id_include_deleted(&pool, original.id)
            .await
            .unwrap()
            .is_none(),
        "row is hard-deleted"
    );
    let surviving = ProjectVersionRepo::find_by_id(&pool, cloned.id)
        .await
        .unwrap()
        .expect("clone survives");
    assert_eq!(surviving.baseprojectversion_id, None, "provenance severed");

    // Deleting the same id again reports not-found, without crashing
    // any cleanup step.
    let err = VersionLifecycle::delete(&pool, &queue, &buildout, original.id, false)
        .await
        .expect_err("second delete reports not found");
    assert_matches!(err, DbError::Core(CoreError::NotFound { .. }));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_resumes_after_interrupted_cleanup(pool: PgPool) {
    // A crash between the soft-delete commit and the cleanup steps
    // leaves a soft-deleted row behind; re-running the delete finishes
    // the job instead of tripping over the locked/renamed state.
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "myproj").await;
    let (queue, mut rx) = AptlyQueue::channel();
    let buildout = test_buildout();

    let version =
        create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let repo = insert_source_repository(&pool, "hello").await;
    associate_repository(&pool, repo, version.id, &["amd64"]).await;

    ProjectVersionRepo::mark_deleted(&pool, version.id, "1.0-deleted")
        .await
        .unwrap();

    VersionLifecycle::delete(&pool, &queue, &buildout, version.id, false)
        .await
        .expect("re-run completes the cleanup");

    assert!(
        ProjectVersionRepo::find_by_id_include_deleted(&pool, version.id)
            .await
            .unwrap()
            .is_none()
    );
    let assocs = SourceRepositoryRepo::associations_for_version(&pool, version.id)
        .await
        .unwrap();
    assert!(assocs.is_empty(), "associations are cleaned up");

    let task = rx.try_recv().expect("delete task enqueued");
    assert_matches!(task, AptlyTask::DeleteRepository { version, .. } => {
        assert_eq!(version, "1.0", "suffix is stripped from the remembered name");
    });
}
