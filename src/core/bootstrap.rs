use crate::core::security;
use crate::core::state::AppState;
use crate::db::types::UserRole;
use crate::repositories::CreateUser;

/// Makes sure the configured first admin exists with the configured password.
pub(crate) async fn ensure_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping admin creation");
        return Ok(());
    }

    let email = admin.first_admin_email.trim().to_lowercase();
    let mut uow = state.store().begin().await?;

    if let Some(user) = uow.find_user_by_email(&email).await? {
        let verified = security::verify_password(&admin.first_admin_password, &user.hashed_password)
            .unwrap_or(false);
        if verified && user.role == UserRole::Admin {
            tracing::info!("Default admin already up to date");
            return Ok(());
        }

        let hashed_password = if verified {
            user.hashed_password.clone()
        } else {
            security::hash_password(&admin.first_admin_password)?
        };
        uow.update_user_credentials(user.id, &hashed_password, UserRole::Admin).await?;
        uow.commit().await?;
        tracing::info!(email = %email, "Updated default admin");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_admin_password)?;
    uow.insert_user(CreateUser {
        email: email.clone(),
        hashed_password,
        role: UserRole::Admin,
        full_name: Some("Administrator".to_string()),
        created_at: state.clock().now_utc(),
    })
    .await?;
    uow.commit().await?;

    tracing::info!(email = %email, "Created default admin");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, seed::ExamScenario};

    #[tokio::test]
    async fn creates_then_repairs_the_first_admin() {
        let scenario = ExamScenario::open_now().await;
        let overrides =
            [("FIRST_ADMIN_EMAIL", "Admin@Uni.test"), ("FIRST_ADMIN_PASSWORD", "admin-pass")];
        let app = test_support::test_app_with(&scenario, &overrides);

        ensure_admin(&app.state).await.unwrap();
        let mut uow = app.state.store().begin().await.unwrap();
        let admin = uow.find_user_by_email("admin@uni.test").await.unwrap().expect("admin");
        assert_eq!(admin.role, UserRole::Admin);
        uow.update_user_credentials(admin.id, "stale", UserRole::Student).await.unwrap();
        uow.commit().await.unwrap();

        ensure_admin(&app.state).await.unwrap();
        let mut uow = app.state.store().begin().await.unwrap();
        let repaired = uow.find_user(admin.id).await.unwrap().expect("admin");
        assert_eq!(repaired.role, UserRole::Admin);
        assert!(security::verify_password("admin-pass", &repaired.hashed_password).unwrap());
        assert_eq!(uow.count_users(UserRole::Admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn skips_without_a_password() {
        let scenario = ExamScenario::open_now().await;
        let app = test_support::test_app(&scenario);
        ensure_admin(&app.state).await.unwrap();
        let mut uow = app.state.store().begin().await.unwrap();
        assert_eq!(uow.count_users(UserRole::Admin).await.unwrap(), 0);
    }
}
