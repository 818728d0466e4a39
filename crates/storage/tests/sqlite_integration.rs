use std::sync::Arc;

use certify_core::model::{
    FileMeta, PersistedSnapshot, ProjectId, QuestionId, Response, UploadId, UploadRecord,
};
use certify_core::time::fixed_now;
use storage::repository::{KeyValueStore, Storage};
use storage::snapshot::SnapshotRepository;
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_kv_overwrites_and_removes() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_basic?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.get("questionnaire_a").await.unwrap(), None);

    repo.set("questionnaire_a", "{\"v\":1}").await.unwrap();
    repo.set("questionnaire_a", "{\"v\":2}").await.unwrap();
    assert_eq!(
        repo.get("questionnaire_a").await.unwrap().as_deref(),
        Some("{\"v\":2}")
    );

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_entries")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);

    repo.remove("questionnaire_a").await.unwrap();
    repo.remove("questionnaire_a").await.unwrap();
    assert_eq!(repo.get("questionnaire_a").await.unwrap(), None);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(versions, 1);
}

#[tokio::test]
async fn snapshot_round_trips_through_sqlite() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_snapshot?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    let snapshots = SnapshotRepository::new(Arc::clone(&storage.kv));

    let snapshot = PersistedSnapshot {
        project_id: ProjectId::new("acme"),
        responses: vec![
            Response::new(QuestionId::new("energy-policy"), false, fixed_now()),
            Response::new(QuestionId::new("energy-source"), "renewable", fixed_now()),
        ],
        uploads: vec![
            UploadRecord::failed(
                UploadId::new("energy-bills"),
                FileMeta::from_file_name("bills.xlsx", 1_000),
                "virus scan rejected the file",
            ),
        ],
        last_saved_at: fixed_now(),
    };
    snapshots.save(&snapshot).await.unwrap();

    let loaded = snapshots
        .load(&ProjectId::new("acme"))
        .await
        .unwrap()
        .expect("snapshot stored");
    assert_eq!(loaded, snapshot);

    snapshots.delete(&ProjectId::new("acme")).await.unwrap();
    assert!(
        snapshots
            .load(&ProjectId::new("acme"))
            .await
            .unwrap()
            .is_none()
    );
}
