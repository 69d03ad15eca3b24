//! Integration tests for the dependency graph engine: cycle detection,
//! duplicate edges, policy enforcement and candidate computation.

mod common;

use assert_matches::assert_matches;
use packforge_core::error::CoreError;
use packforge_db::graph::DependencyGraph;
use packforge_db::models::project_version::DependencyPolicy;
use packforge_db::repositories::DependencyRepo;
use packforge_db::DbError;
use sqlx::PgPool;

use common::*;

#[sqlx::test(migrations = "../../db/migrations")]
async fn add_and_remove_dependency(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let app = create_project(&pool, "app").await;
    let libs = create_project(&pool, "libs").await;
    let app_v = create_version(&pool, app.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let libs_v =
        create_version(&pool, libs.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;

    DependencyGraph::add_dependency(&pool, app_v.id, libs_v.id, false)
        .await
        .expect("edge should be added");
    assert_eq!(count_edges(&pool, app_v.id).await, 1);

    DependencyGraph::remove_dependency(&pool, app_v.id, libs_v.id)
        .await
        .expect("edge should be removed");
    assert_eq!(count_edges(&pool, app_v.id).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_edge_conflicts_and_is_not_persisted_twice(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let app = create_project(&pool, "app").await;
    let libs = create_project(&pool, "libs").await;
    let app_v = create_version(&pool, app.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let libs_v =
        create_version(&pool, libs.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;

    DependencyGraph::add_dependency(&pool, app_v.id, libs_v.id, false)
        .await
        .expect("first add succeeds");
    let err = DependencyGraph::add_dependency(&pool, app_v.id, libs_v.id, false)
        .await
        .expect_err("second add conflicts");
    assert_matches!(err, DbError::Core(CoreError::Conflict(msg)) if msg.contains("already exists"));
    assert_eq!(count_edges(&pool, app_v.id).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn transitive_cycle_is_rejected(pool: PgPool) {
    // a -> b and c -> a exist; adding b -> c would close the loop.
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "proj").await;
    let a = create_version(&pool, proj.id, "a", DependencyPolicy::Strict, Some(base.id)).await;
    let b = create_version(&pool, proj.id, "b", DependencyPolicy::Strict, Some(base.id)).await;
    let c = create_version(&pool, proj.id, "c", DependencyPolicy::Strict, Some(base.id)).await;

    DependencyGraph::add_dependency(&pool, a.id, b.id, false)
        .await
        .unwrap();
    DependencyGraph::add_dependency(&pool, c.id, a.id, false)
        .await
        .unwrap();

    let err = DependencyGraph::add_dependency(&pool, b.id, c.id, false)
        .await
        .expect_err("cycle must be rejected");
    assert_matches!(err, DbError::Core(CoreError::Conflict(_)));
    assert_eq!(count_edges(&pool, b.id).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn self_dependency_is_rejected(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "proj").await;
    let v = create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;

    let err = DependencyGraph::add_dependency(&pool, v.id, v.id, false)
        .await
        .expect_err("self dependency must be rejected");
    assert_matches!(err, DbError::Core(CoreError::Conflict(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn strict_policy_rejects_different_basemirror(pool: PgPool) {
    // debian/10 (strict, base/10) with dependency libs/1.0 (strict,
    // base/10); libs/2.0 is on base/11 and must be rejected.
    let base10 = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let base11 = create_version(
        &pool,
        base10.project_id,
        "11",
        DependencyPolicy::Strict,
        None,
    )
    .await;

    let debian = create_project(&pool, "debian").await;
    let libs = create_project(&pool, "libs").await;
    let debian10 =
        create_version(&pool, debian.id, "10", DependencyPolicy::Strict, Some(base10.id)).await;
    let libs1 =
        create_version(&pool, libs.id, "1.0", DependencyPolicy::Strict, Some(base10.id)).await;
    let libs2 =
        create_version(&pool, libs.id, "2.0", DependencyPolicy::Strict, Some(base11.id)).await;

    DependencyGraph::add_dependency(&pool, debian10.id, libs1.id, false)
        .await
        .expect("same basemirror is allowed");

    let err = DependencyGraph::add_dependency(&pool, debian10.id, libs2.id, false)
        .await
        .expect_err("different basemirror must conflict");
    assert_matches!(
        err,
        DbError::Core(CoreError::Conflict(msg)) if msg.contains("basemirror")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deep_policy_mismatch_is_rejected(pool: PgPool) {
    // candidate's closure contains a strict version on another
    // basemirror; the add must fail even though the direct pair is
    // compatible.
    let base10 = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let base11 = create_version(
        &pool,
        base10.project_id,
        "11",
        DependencyPolicy::Strict,
        None,
    )
    .await;

    let proj = create_project(&pool, "proj").await;
    let top = create_version(&pool, proj.id, "top", DependencyPolicy::Strict, Some(base10.id)).await;
    let mid = create_version(&pool, proj.id, "mid", DependencyPolicy::Any, Some(base10.id)).await;
    let deep =
        create_version(&pool, proj.id, "deep", DependencyPolicy::Strict, Some(base11.id)).await;

    // mid -> deep is allowed: deep's strict policy compares against
    // mid... it must actually fail, so build it directly.
    DependencyRepo::insert_edge(&pool, mid.id, deep.id, false)
        .await
        .unwrap();

    let err = DependencyGraph::add_dependency(&pool, top.id, mid.id, false)
        .await
        .expect_err("deep strict mismatch must conflict");
    assert_matches!(err, DbError::Core(CoreError::Conflict(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn locked_version_rejects_edge_mutations(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "proj").await;
    let v = create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let dep = create_version(&pool, proj.id, "dep", DependencyPolicy::Strict, Some(base.id)).await;

    sqlx::query("UPDATE projectversions SET is_locked = TRUE WHERE id = $1")
        .bind(v.id)
        .execute(&pool)
        .await
        .unwrap();

    let err = DependencyGraph::add_dependency(&pool, v.id, dep.id, false)
        .await
        .expect_err("locked version must reject adds");
    assert_matches!(err, DbError::Core(CoreError::Conflict(msg)) if msg.contains("locked"));

    let err = DependencyGraph::remove_dependency(&pool, v.id, dep.id)
        .await
        .expect_err("locked version must reject removals");
    assert_matches!(err, DbError::Core(CoreError::Conflict(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn mirror_dependency_forces_cibuilds_off(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "proj").await;
    let mirror = create_mirror_project(&pool, "extmirror", false).await;
    let v = create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let m = create_version(&pool, mirror.id, "1.0", DependencyPolicy::Any, Some(base.id)).await;

    DependencyGraph::add_dependency(&pool, v.id, m.id, true)
        .await
        .expect("mirror dependency is allowed");

    let edges = DependencyRepo::direct_edges(&pool, v.id).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert!(!edges[0].use_cibuilds, "mirrors never serve CI builds");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn basemirror_candidate_is_rejected(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "proj").await;
    let v = create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;

    let err = DependencyGraph::add_dependency(&pool, v.id, base.id, false)
        .await
        .expect_err("basemirror versions cannot be dependencies");
    assert_matches!(err, DbError::Core(CoreError::Conflict(msg)) if msg.contains("basemirror"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn candidates_exclude_self_and_existing_dependencies(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let proj = create_project(&pool, "proj").await;
    let v = create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    let dep = create_version(&pool, proj.id, "dep", DependencyPolicy::Strict, Some(base.id)).await;
    let free =
        create_version(&pool, proj.id, "free", DependencyPolicy::Strict, Some(base.id)).await;

    DependencyGraph::add_dependency(&pool, v.id, dep.id, false)
        .await
        .unwrap();

    let candidates = DependencyGraph::candidates(&pool, v.id, None).await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|c| c.id).collect();
    assert!(ids.contains(&free.id), "unrelated version is a candidate");
    assert!(!ids.contains(&v.id), "the version itself is excluded");
    assert!(!ids.contains(&dep.id), "existing dependencies are excluded");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn candidates_include_distribution_and_any_policies(pool: PgPool) {
    let base10 = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let base11 = create_version(
        &pool,
        base10.project_id,
        "11",
        DependencyPolicy::Strict,
        None,
    )
    .await;
    let other_base = create_basemirror(&pool, "otherdist", "1", &["amd64"]).await;

    let proj = create_project(&pool, "proj").await;
    let v = create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base10.id)).await;

    // Sibling basemirror of the same distribution, policy distribution:
    // eligible.
    let sibling = create_version(
        &pool,
        proj.id,
        "sib",
        DependencyPolicy::Distribution,
        Some(base11.id),
    )
    .await;
    // Same name shape but strict: not eligible (different basemirror).
    let strict_sibling = create_version(
        &pool,
        proj.id,
        "strict-sib",
        DependencyPolicy::Strict,
        Some(base11.id),
    )
    .await;
    // Foreign distribution but policy any: eligible.
    let anyver = create_version(
        &pool,
        proj.id,
        "anyver",
        DependencyPolicy::Any,
        Some(other_base.id),
    )
    .await;

    let candidates = DependencyGraph::candidates(&pool, v.id, None).await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|c| c.id).collect();
    assert!(ids.contains(&sibling.id));
    assert!(ids.contains(&anyver.id));
    assert!(!ids.contains(&strict_sibling.id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn candidates_are_ordered_and_filterable(pool: PgPool) {
    let base = create_basemirror(&pool, "base", "10", &["amd64"]).await;
    let beta = create_project(&pool, "beta").await;
    let alpha = create_project(&pool, "Alpha").await;
    let proj = create_project(&pool, "proj").await;
    let v = create_version(&pool, proj.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    create_version(&pool, beta.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;
    create_version(&pool, alpha.id, "1.0", DependencyPolicy::Strict, Some(base.id)).await;

    let candidates = DependencyGraph::candidates(&pool, v.id, None).await.unwrap();
    let names: Vec<_> = candidates.iter().map(|c| c.fullname()).collect();
    let alpha_pos = names.iter().position(|n| n == "Alpha/1.0").unwrap();
    let beta_pos = names.iter().position(|n| n == "beta/1.0").unwrap();
    assert!(alpha_pos < beta_pos, "ordering is case-insensitive by project");

    let filtered = DependencyGraph::candidates(&pool, v.id, Some("alpha"))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].fullname(), "Alpha/1.0");
}
