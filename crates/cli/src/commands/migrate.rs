//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! snippetbox-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SNIPPETBOX_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Application tables live in `crates/web/migrations/`. The session table
//! is created by `tower-sessions-sqlx-store` in the `tower_sessions` schema.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CommandError, database_url};

/// Run the application and session-store migrations.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = snippetbox_web::db::create_pool(&database_url).await?;

    tracing::info!("Running application migrations...");
    sqlx::migrate!("../web/migrations").run(&pool).await?;

    tracing::info!("Running session store migration...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
