use super::connect;
use anyhow::Context;
use folio_auth::{BcryptHasher, PasswordHasher};
use folio_orm::{validate_password, NewUser, Role};

/// Create an administrator account
pub async fn create_admin(username: &str, password: &str, email: &str) -> anyhow::Result<()> {
    validate_password(password)?;

    let new_user = NewUser {
        username: username.trim().to_string(),
        email: email.trim().to_string(),
        password_hash: String::new(),
        role: Role::Admin,
        status: true,
    };
    new_user.validate()?;

    let password = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || BcryptHasher::default().hash_password(&password))
        .await
        .context("Password hashing task failed")??;

    let db = connect().await?;
    let user = db
        .users
        .create(NewUser {
            password_hash,
            ..new_user
        })
        .await
        .context("Failed to create the administrator")?;
    db.close().await;

    println!("✅ Administrator '{}' created (id {})", user.username, user.id);
    Ok(())
}
