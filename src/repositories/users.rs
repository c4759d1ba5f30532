use time::PrimitiveDateTime;

use crate::db::models::User;
use crate::db::types::UserRole;

const COLUMNS: &str = "id, email, hashed_password, role, full_name, created_at";

#[derive(Debug, Clone)]
pub(crate) struct CreateUser {
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) role: UserRole,
    pub(crate) full_name: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_email(
    executor: impl sqlx::PgExecutor<'_>,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list(
    executor: impl sqlx::PgExecutor<'_>,
    role: Option<UserRole>,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE ($1::userrole IS NULL OR role = $1) ORDER BY id"
    ))
    .bind(role)
    .fetch_all(executor)
    .await
}

pub(crate) async fn count_by_role(
    executor: impl sqlx::PgExecutor<'_>,
    role: UserRole,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
        .bind(role)
        .fetch_one(executor)
        .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateUser,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, hashed_password, role, full_name, created_at)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {COLUMNS}"
    ))
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.role)
    .bind(params.full_name)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn update_credentials(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
    hashed_password: &str,
    role: UserRole,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET hashed_password = $1, role = $2 WHERE id = $3")
        .bind(hashed_password)
        .bind(role)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}
