#[macro_use]
extern crate rocket;

pub mod auth;
pub mod db;
pub mod error;
pub mod media;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod store;

use crate::auth::{AuthConfig, AuthService};
use crate::db::AccountsDb;
use crate::media::{LocalMediaStore, MediaConfig, MediaStore};
use crate::request_logger::RequestLogger;
use crate::store::{MemoryUserStore, PgUserStore, UserStore};
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::fs::FileServer;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Backing store selected with `ACCOUNT_STORE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl StoreKind {
    pub fn from_env() -> Self {
        match std::env::var("ACCOUNT_STORE") {
            Ok(value) if value.trim().eq_ignore_ascii_case("memory") => StoreKind::Memory,
            _ => StoreKind::Postgres,
        }
    }
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let media_config = MediaConfig::from_env();
    std::fs::create_dir_all(&media_config.root).expect("Failed to create media directory");
    log::info!("Media directory initialized at: {}", media_config.root.display());

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    let rocket = rocket::build().attach(RequestLogger).attach(cors);

    let rocket = match StoreKind::from_env() {
        StoreKind::Memory => {
            log::warn!("using in-memory account store; data is lost on shutdown");
            let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
            rocket.manage(users)
        }
        StoreKind::Postgres => rocket
            .attach(AccountsDb::init())
            // Run database migrations on startup
            .attach(AdHoc::try_on_ignite("Run Migrations", |rocket| async move {
                match AccountsDb::fetch(&rocket) {
                    Some(accounts) => {
                        let pool = (**accounts).clone();
                        match db::run_migrations(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            }))
            .attach(AdHoc::try_on_ignite(
                "Manage Account Store",
                |rocket| async move {
                    match AccountsDb::fetch(&rocket) {
                        Some(accounts) => {
                            let pool = (**accounts).clone();
                            let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
                            Ok(rocket.manage(users))
                        }
                        None => Err(rocket),
                    }
                },
            )),
    };

    let media_store: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(media_config.clone()));

    let rocket = rocket
        .attach(AdHoc::try_on_ignite("Auth Service", |rocket| async move {
            let Some(users) = rocket.state::<Arc<dyn UserStore>>().cloned() else {
                log::error!("account store not available for auth service");
                return Err(rocket);
            };
            match AuthConfig::from_env().and_then(|config| AuthService::from_config(config, users))
            {
                Ok(service) => Ok(rocket.manage(service)),
                Err(e) => {
                    log::error!("auth configuration invalid: {}", e);
                    Err(rocket)
                }
            }
        }))
        .manage(media_store)
        .mount("/api/v1", routes::api_routes())
        .register("/", routes::catchers());

    if media_config.public_base.starts_with('/') {
        rocket.mount(
            media_config.public_base.as_str(),
            FileServer::from(&media_config.root),
        )
    } else {
        rocket
    }
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::path::PathBuf;
    use std::sync::Arc;

    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use uuid::Uuid;

    use crate::auth::{AuthConfig, AuthService};
    use crate::media::{LocalMediaStore, MediaConfig, MediaStore};
    use crate::request_logger::RequestLogger;
    use crate::routes;
    use crate::store::{MemoryUserStore, UserStore};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Auth settings with fixed secrets and plain-HTTP cookies.
    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "test-access-secret-0123456789".into(),
            refresh_token_secret: "test-refresh-secret-9876543210".into(),
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 10 * 24 * 60 * 60,
            token_leeway_secs: 0,
            access_cookie_name: "accessToken".into(),
            refresh_cookie_name: "refreshToken".into(),
            cookie_domain: None,
            cookie_secure: false,
            password_min_length: 10,
            revoke_sessions_on_password_change: true,
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::ImageExt;
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        const POSTGRES_TAG: &str = "16-alpine";

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral, migrated database for integration tests. Lives in a
        /// disposable Postgres container unless `TEST_DATABASE_URL` names a
        /// server to create it on.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Provision a fresh database on `TEST_DATABASE_URL`, or in a new
            /// container when the variable is unset.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                match std::env::var("TEST_DATABASE_URL") {
                    Ok(url) if !url.trim().is_empty() => Self::new(&url).await,
                    _ => Self::new_in_container().await,
                }
            }

            /// Launch a stock Postgres container and provision inside it.
            pub async fn new_in_container() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().with_tag(POSTGRES_TAG).start().await?;
                let host = container.get_host().await?;
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

                let mut database = Self::new(&url).await?;
                database.container = Some(container);
                Ok(database)
            }

            /// Provision a fresh database given a base connection string.
            pub async fn new(base_url: &str) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = base_url.parse()?;
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

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container: None,
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
                    container.rm().await?;
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
                // The container takes the database with it.
                if self.container.is_some() {
                    return;
                }
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
                                    let _ =
                                        drop_database_with_fallback(admin_options, &db_name).await;
                                });
                            }
                        });
                    }
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        users: Arc<dyn UserStore>,
        auth_config: AuthConfig,
        media_root: PathBuf,
    }

    impl Default for TestRocketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging
        /// disabled, an empty in-memory store and a scratch media directory.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                users: Arc::new(MemoryUserStore::new()),
                auth_config: test_auth_config(),
                media_root: std::env::temp_dir()
                    .join(format!("account-server-media-{}", Uuid::new_v4().simple())),
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Mount the full application route set under `/api/v1`.
        pub fn mount_all_routes(self) -> Self {
            self.mount_api_routes(routes::api_routes())
        }

        pub fn with_store(mut self, users: Arc<dyn UserStore>) -> Self {
            self.users = users;
            self
        }

        pub fn with_auth_config(mut self, config: AuthConfig) -> Self {
            self.auth_config = config;
            self
        }

        pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
            self.media_root = root.into();
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let service = AuthService::from_config(self.auth_config, self.users.clone())
                .expect("valid test auth configuration");
            let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(MediaConfig {
                root: self.media_root,
                public_base: "/media".into(),
            }));

            let mut rocket = rocket::custom(self.figment)
                .attach(RequestLogger)
                .manage(self.users)
                .manage(service)
                .manage(media)
                .register("/", routes::catchers());

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Asynchronous client that keeps cookies between requests.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }

        /// Asynchronous client that never replays cookies; tests attach
        /// them explicitly.
        pub async fn untracked_client(self) -> AsyncClient {
            AsyncClient::untracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
