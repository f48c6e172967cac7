use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgSslMode},
};
use std::{str::FromStr, sync::Arc};

pub mod memory;
pub mod pg;
pub mod store;

pub mod models {
    pub mod profile;
    pub mod subscription;
}

pub mod dtos {
    pub mod profile;
    pub mod subscription;
}

/// Connects to Postgres, creating the target database and applying
/// migrations when needed. Returns the shared pool that
/// [`pg::PgRecordStore`] wraps.
pub async fn setup(
    database_url: &str,
    require_ssl: bool,
) -> Result<Arc<PgPool>, Box<dyn std::error::Error>> {
    ensure_database(database_url, require_ssl).await?;

    let pool = PgPool::connect_with(options(database_url, require_ssl)?).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    log::info!("record store ready");
    Ok(Arc::new(pool))
}

fn options(database_url: &str, require_ssl: bool) -> Result<PgConnectOptions, sqlx::Error> {
    let mut options = PgConnectOptions::from_str(database_url)?;
    if require_ssl {
        options = options.ssl_mode(PgSslMode::Require);
    }
    Ok(options)
}

// First-run convenience: connect to the maintenance database and create the
// target one when it does not exist yet.
async fn ensure_database(
    database_url: &str,
    require_ssl: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = url::Url::parse(database_url)?;
    let db_name = url.path().trim_start_matches('/');

    let admin_url = format!(
        "postgresql://{}:{}@{}:{}/postgres",
        url.username(),
        url.password().unwrap_or(""),
        url.host_str().unwrap_or("localhost"),
        url.port().unwrap_or(5432),
    );
    let admin_pool = PgPool::connect_with(options(&admin_url, require_ssl)?).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&admin_pool)
            .await?;

    if !exists {
        log::info!("creating database {}", db_name);
        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name))
            .execute(&admin_pool)
            .await?;
    }

    admin_pool.close().await;
    Ok(())
}
