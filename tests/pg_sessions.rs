use std::sync::Arc;

use todo_api::auth::{
    AuthError, Credentials, PgCredentialStore, PgRefreshTokenStore, SessionManager,
};
use todo_api::test_support::{
    TestDatabase, TestDatabaseError, fast_password_service, test_auth_config,
};
use todo_api::todos::{PgTodoStore, TodoFilter, TodoInput, TodoStore};

async fn database(test: &str) -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping {test}: no test database configured");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

fn sessions(db: &TestDatabase) -> Arc<SessionManager> {
    let manager = SessionManager::new(
        &test_auth_config(),
        Arc::new(PgCredentialStore::new(db.pool_clone())),
        Arc::new(PgRefreshTokenStore::new(db.pool_clone())),
        fast_password_service(),
    )
    .expect("session manager");
    Arc::new(manager)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_has_one_winner() {
    let Some(db) = database("concurrent refresh test").await else {
        return;
    };
    let sessions = sessions(&db);

    sessions
        .register(&Credentials::new("alice", "Passw0rd!"))
        .await
        .expect("register");
    let (_, pair) = sessions.login("alice", "Passw0rd!").await.expect("login");

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let sessions = sessions.clone();
            let token = pair.refresh.token.clone();
            tokio::spawn(async move { sessions.refresh_tokens(&token).await })
        })
        .collect();

    let mut successes = 0;
    for attempt in attempts {
        match attempt.await.expect("task completed") {
            Ok(_) => successes += 1,
            Err(AuthError::InvalidRefreshToken) => {}
            Err(err) => panic!("unexpected refresh failure: {err}"),
        }
    }
    assert_eq!(successes, 1);

    db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn second_login_invalidates_first_refresh_token() {
    let Some(db) = database("single refresh token test").await else {
        return;
    };
    let sessions = sessions(&db);

    sessions
        .register(&Credentials::new("alice", "Passw0rd!"))
        .await
        .expect("register");
    let (_, first) = sessions.login("alice", "Passw0rd!").await.expect("first login");
    let (_, second) = sessions.login("alice", "Passw0rd!").await.expect("second login");

    let err = sessions.refresh_tokens(&first.refresh.token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefreshToken));
    sessions
        .refresh_tokens(&second.refresh.token)
        .await
        .expect("latest token redeems");

    let err = sessions
        .register(&Credentials::new("alice", "Other1234"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UsernameTaken));

    db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn pg_todo_store_filters_by_owner_tags_and_date() {
    let Some(db) = database("todo store test").await else {
        return;
    };
    let sessions = sessions(&db);
    let owner = sessions
        .register(&Credentials::new("alice", "Passw0rd!"))
        .await
        .expect("register")
        .id;
    let store = PgTodoStore::new(db.pool_clone());

    for (title, tags, due_date) in [
        ("Write report", vec!["work"], "2026-11-02"),
        ("Water plants", vec!["home"], "2026-11-02"),
        ("Ship release", vec!["work", "urgent"], "2026-11-05"),
    ] {
        let draft = TodoInput {
            title: title.into(),
            description: "something to do".into(),
            tags: tags.into_iter().map(String::from).collect(),
            due_date: due_date.into(),
        }
        .validate()
        .expect("valid todo");
        store.create(owner, &draft).await.expect("create");
    }

    let (_, total) = store
        .list(
            owner,
            &TodoFilter {
                tags: vec!["urgent".into(), "home".into()],
                ..Default::default()
            },
        )
        .await
        .expect("list");
    assert_eq!(total, 2);

    let (page, total) = store
        .list(
            owner,
            &TodoFilter {
                due_date: chrono::NaiveDate::from_ymd_opt(2026, 11, 2),
                limit: 1,
                ..Default::default()
            },
        )
        .await
        .expect("list");
    assert_eq!(total, 2);
    assert_eq!(page.len(), 1);

    let (_, total) = store
        .list(uuid::Uuid::new_v4(), &TodoFilter::default())
        .await
        .expect("list");
    assert_eq!(total, 0);

    db.close().await.expect("failed to drop test database");
}
