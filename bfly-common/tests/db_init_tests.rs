//! Integration tests for journal database initialization

use bfly_common::db::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_init_creates_parent_folder_and_schema() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("bfly.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'observations'")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(tables, vec!["observations".to_string()]);

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("bfly.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO observations (observation_id, image_ref, species_id, confidence, observed_at, submitted_by)
         VALUES ('a', 'img', 'monarch', 0.9, '2025-06-01T00:00:00+00:00', 'alex')",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM observations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_confidence_check_constraint() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("bfly.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO observations (observation_id, image_ref, species_id, confidence, observed_at, submitted_by)
         VALUES ('b', 'img', 'monarch', 1.5, '2025-06-01T00:00:00+00:00', 'alex')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}
