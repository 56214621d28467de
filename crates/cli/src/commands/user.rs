//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! snippetbox-cli user create -n "Alice" -e alice@example.com -p 'correct horse'
//! ```

use snippetbox_core::{Email, UserId};
use snippetbox_web::services::auth::{AuthService, UserDirectory};

use super::{CommandError, database_url};

/// Register a user with the same rules as the signup form.
///
/// # Returns
///
/// The ID of the created user.
pub async fn create(name: &str, email: &str, password: &str) -> Result<UserId, CommandError> {
    let email = Email::parse(email)?;
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = snippetbox_web::db::create_pool(&database_url).await?;

    let id = AuthService::new(pool).insert(name, &email, password).await?;

    tracing::info!(user_id = %id, email = %email, "User created");
    Ok(id)
}
