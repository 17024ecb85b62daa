//! Default administrator seeding

use crate::config::SeedConfig;
use crate::error::{HttpError, HttpResult};
use folio_auth::PasswordHasher;
use folio_orm::{validate_password, Database, NewUser, Role, User};
use std::sync::Arc;
use tracing::{info, warn};

/// Create the configured administrator when the database has none.
///
/// Returns the created user, or `None` when an admin already exists.
pub async fn ensure_default_admin(
    db: &Database,
    hasher: Arc<dyn PasswordHasher>,
    seed: &SeedConfig,
) -> HttpResult<Option<User>> {
    if db.users.count_admins().await? > 0 {
        return Ok(None);
    }

    validate_password(&seed.password)?;
    let password = seed.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash_password(&password))
        .await
        .map_err(|e| HttpError::internal(format!("Password hashing task failed: {}", e)))??;

    let new_user = NewUser {
        username: seed.username.clone(),
        email: seed.email.clone(),
        password_hash,
        role: Role::Admin,
        status: true,
    };
    new_user.validate()?;

    let user = db.users.create(new_user).await?;
    info!(user = %user.username, "Created default administrator");
    if seed.password == "admin123" {
        warn!("The default administrator uses the stock password; set ADMIN_PASSWORD");
    }

    Ok(Some(user))
}
