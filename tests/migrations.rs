use account_server::test_support::TestDatabase;
use sqlx::migrate::Migrator;

static TEST_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn table_count(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name = $1",
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .expect("lookup succeeded")
}

#[tokio::test]
async fn migrations_apply_and_revert_cleanly() {
    let test_db = TestDatabase::new_from_env()
        .await
        .unwrap_or_else(|err| panic!("failed to provision test database: {err:?}"));

    let pool = test_db.pool_clone();

    TEST_MIGRATOR.run(&pool).await.expect("migrations run");

    TEST_MIGRATOR
        .undo(&pool, 0)
        .await
        .expect("migrations revert");

    for table in ["users", "subscriptions", "videos", "watch_history"] {
        assert_eq!(
            table_count(&pool, table).await,
            0,
            "{table} should be dropped after revert"
        );
    }

    TEST_MIGRATOR.run(&pool).await.expect("migrations rerun");

    assert_eq!(table_count(&pool, "users").await, 1);

    test_db.close().await.expect("failed to drop test database");
}
