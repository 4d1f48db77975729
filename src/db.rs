use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("accounts_db")]
pub struct AccountsDb(sqlx::PgPool);

/// Apply pending migrations from `./migrations`.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
