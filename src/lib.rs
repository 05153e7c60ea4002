pub mod auth;
pub mod catchers;
pub mod db;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod todos;

use crate::auth::memory::{MemoryCredentialStore, MemoryRefreshTokenStore};
use crate::auth::{AuthConfig, AuthState, PasswordService, PgCredentialStore, PgRefreshTokenStore};
use crate::db::TodoDb;
use crate::request_logger::RequestLogger;
use crate::todos::{PgTodoStore, TodoState};
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket, Route};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

pub const API_BASE: &str = "/v1";

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Every API route, including the generated `openapi.json`.
pub fn api_routes() -> Vec<Route> {
    openapi_get_routes![
        // Health
        routes::health::health_check,
        // Auth
        auth::routes::register,
        auth::routes::login,
        auth::routes::refresh,
        auth::routes::logout,
        auth::routes::me,
        // Todos
        todos::routes::list_todos,
        todos::routes::create_todo,
        todos::routes::get_todo,
        todos::routes::update_todo,
        todos::routes::delete_todo,
    ]
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Put, Method::Delete]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(TodoDb::init())
        .attach(cors)
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match TodoDb::fetch(&rocket) {
                    Some(db) => match db::run_migrations(db).await {
                        Ok(_) => Ok(rocket),
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    },
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite(
            "Session and Todo State",
            |rocket| async move {
                let pool = match TodoDb::fetch(&rocket) {
                    Some(db) => (**db).clone(),
                    None => return Err(rocket),
                };

                let config = match AuthConfig::from_env() {
                    Ok(config) => config,
                    Err(err) => {
                        log::error!("invalid auth configuration: {}", err);
                        return Err(rocket);
                    }
                };
                log::info!("auth configuration loaded: {:?}", config);

                let passwords = match PasswordService::new() {
                    Ok(passwords) => passwords,
                    Err(err) => {
                        log::error!("failed to initialize password hashing: {}", err);
                        return Err(rocket);
                    }
                };

                let store_timeout = config.store_timeout();
                let auth_state = match AuthState::new(
                    config,
                    Arc::new(PgCredentialStore::new(pool.clone())),
                    Arc::new(PgRefreshTokenStore::new(pool.clone())),
                    passwords,
                ) {
                    Ok(state) => state,
                    Err(err) => {
                        log::error!("failed to initialize session manager: {}", err);
                        return Err(rocket);
                    }
                };
                let todo_state = TodoState::new(Arc::new(PgTodoStore::new(pool)), store_timeout);

                Ok(rocket.manage(auth_state).manage(todo_state))
            },
        ))
        .attach(AdHoc::on_liftoff("Spawn Refresh Token Purge", |rocket| {
            Box::pin(async move {
                match rocket.state::<AuthState>() {
                    Some(state) => spawn_refresh_purge(state.clone()),
                    None => log::error!("failed to spawn refresh token purge: auth state not found"),
                }
            })
        }))
        .mount(API_BASE, api_routes())
        .register("/", catchers::all())
        .mount(
            "/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Todo API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

/// Periodically delete refresh-token rows past their expiry. Rotation never
/// accepts them, so this only bounds table growth.
fn spawn_refresh_purge(state: AuthState) {
    let period = state.config.refresh_purge_interval();
    tokio::spawn(async move {
        log::info!("purging expired refresh tokens every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match state.sessions.purge_expired_refresh_tokens().await {
                Ok(0) => {}
                Ok(purged) => log::info!("purged {} expired refresh token(s)", purged),
                Err(err) => log::warn!("refresh token purge failed: {}", err),
            }
        }
    });
}

/// Session state backed by in-process stores, for local runs and tests.
pub fn memory_auth_state(
    config: AuthConfig,
    passwords: PasswordService,
) -> auth::AuthResult<AuthState> {
    AuthState::new(
        config,
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemoryRefreshTokenStore::new()),
        passwords,
    )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::auth::{AuthConfig, AuthState, PasswordService};
    use crate::todos::{MemoryTodoStore, TodoState};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Auth configuration with fixed, distinct secrets and short timeouts.
    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "test-access-secret".into(),
            refresh_token_secret: "test-refresh-secret".into(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_minutes: 60,
            store_timeout_secs: 5,
            refresh_purge_interval_secs: 60,
        }
    }

    /// Argon2 with minimal cost so tests stay fast.
    pub fn fast_password_service() -> PasswordService {
        PasswordService::with_params(1024, 1, 1).expect("valid argon2 parameters")
    }

    /// In-memory session state using [`test_auth_config`].
    pub fn memory_auth_state() -> AuthState {
        crate::memory_auth_state(test_auth_config(), fast_password_service())
            .expect("session manager")
    }

    pub fn memory_todo_state() -> TodoState {
        TodoState::new(Arc::new(MemoryTodoStore::new()), Duration::from_secs(5))
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("neither TEST_DATABASE_URL nor TEST_USE_CONTAINERS=1 is set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Throwaway database, migrated and dropped again when the value goes
        /// out of scope.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<GenericImage>>,
        }

        impl TestDatabase {
            /// Use `TEST_DATABASE_URL` when set, otherwise start a Postgres
            /// container if `TEST_USE_CONTAINERS=1`.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
                    return Self::from_url(&url, None).await;
                }
                if std::env::var("TEST_USE_CONTAINERS").as_deref() == Ok("1") {
                    return Self::with_container().await;
                }
                Err(TestDatabaseError::MissingUrl)
            }

            async fn with_container() -> Result<Self, TestDatabaseError> {
                let container = GenericImage::new("postgres", "16-alpine")
                    .with_wait_for(WaitFor::message_on_stderr(
                        "database system is ready to accept connections",
                    ))
                    .with_env_var("POSTGRES_DB", "postgres")
                    .with_env_var("POSTGRES_USER", "postgres")
                    .with_env_var("POSTGRES_PASSWORD", "postgres")
                    .start()
                    .await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::from_url(&url, Some(container)).await
            }

            async fn from_url(
                url: &str,
                container: Option<ContainerAsync<GenericImage>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let database_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                sqlx::query(&format!("CREATE DATABASE \"{}\" TEMPLATE template0", database_name))
                    .execute(&admin_pool)
                    .await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(8)
                    .connect_with(base_options.database(&database_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name,
                    container,
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        // Servers before 13 reject `WITH (FORCE)`.
        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database_with_fallback(admin_options, &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database_with_fallback(admin_options, &db_name)
                                        .await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        auth_state: Option<AuthState>,
        todo_state: Option<TodoState>,
        catchers: bool,
        request_logger: bool,
    }

    impl Default for TestRocketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestRocketBuilder {
        /// Start a builder with a random port, logging disabled and the
        /// envelope catchers registered.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                auth_state: None,
                todo_state: None,
                catchers: true,
                request_logger: false,
            }
        }

        /// Mount routes under `/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push((crate::API_BASE.to_string(), routes));
            self
        }

        /// Mount every API route under `/v1`.
        pub fn mount_all_api_routes(self) -> Self {
            self.mount_api_routes(crate::api_routes())
        }

        pub fn manage_auth_state(mut self, state: AuthState) -> Self {
            self.auth_state = Some(state);
            self
        }

        pub fn manage_todo_state(mut self, state: TodoState) -> Self {
            self.todo_state = Some(state);
            self
        }

        /// Leave Rocket's default HTML catchers in place.
        pub fn without_catchers(mut self) -> Self {
            self.catchers = false;
            self
        }

        /// Attach the request logging fairing.
        pub fn with_request_logger(mut self) -> Self {
            self.request_logger = true;
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if self.catchers {
                rocket = rocket.register("/", crate::catchers::all());
            }
            if let Some(state) = self.auth_state {
                rocket = rocket.manage(state);
            }
            if let Some(state) = self.todo_state {
                rocket = rocket.manage(state);
            }
            if self.request_logger {
                rocket = rocket.attach(crate::request_logger::RequestLogger);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
