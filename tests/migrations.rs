use sqlx::migrate::Migrator;
use todo_api::test_support::{TestDatabase, TestDatabaseError};

static TEST_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn table_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name IN ('users', 'refresh_tokens', 'todos')",
    )
    .fetch_one(pool)
    .await
    .expect("lookup succeeded")
}

#[tokio::test]
async fn migrations_apply_and_revert_cleanly() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping migration revert test: no test database configured");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let pool = test_db.pool_clone();

    TEST_MIGRATOR.run(&pool).await.expect("migrations run");
    assert_eq!(table_count(&pool).await, 3);

    TEST_MIGRATOR
        .undo(&pool, 0)
        .await
        .expect("migrations revert");
    assert_eq!(table_count(&pool).await, 0, "tables should be dropped after revert");

    TEST_MIGRATOR.run(&pool).await.expect("migrations rerun");
    assert_eq!(table_count(&pool).await, 3);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn refresh_tokens_allow_one_row_per_user() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping refresh token constraint test: no test database configured");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };
    let pool = test_db.pool_clone();

    let user_id = uuid::Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username, password_hash) VALUES ($1, 'alice', 'x')")
        .bind(user_id)
        .execute(&pool)
        .await
        .expect("insert user");

    let insert = "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, now() + interval '1 hour')";
    sqlx::query(insert)
        .bind(user_id)
        .bind("first")
        .execute(&pool)
        .await
        .expect("first token");
    let second = sqlx::query(insert)
        .bind(user_id)
        .bind("second")
        .execute(&pool)
        .await;
    assert!(second.is_err(), "second refresh token row must be rejected");

    test_db.close().await.expect("failed to drop test database");
}
