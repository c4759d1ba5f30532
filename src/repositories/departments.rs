use crate::db::models::Department;

const COLUMNS: &str = "id, name, code";

#[derive(Debug, Clone)]
pub(crate) struct CreateDepartment {
    pub(crate) name: String,
    pub(crate) code: String,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<Option<Department>, sqlx::Error> {
    sqlx::query_as::<_, Department>(&format!("SELECT {COLUMNS} FROM departments WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_code(
    executor: impl sqlx::PgExecutor<'_>,
    code: &str,
) -> Result<Option<Department>, sqlx::Error> {
    sqlx::query_as::<_, Department>(&format!("SELECT {COLUMNS} FROM departments WHERE code = $1"))
        .bind(code)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list(executor: impl sqlx::PgExecutor<'_>) -> Result<Vec<Department>, sqlx::Error> {
    sqlx::query_as::<_, Department>(&format!("SELECT {COLUMNS} FROM departments ORDER BY id"))
        .fetch_all(executor)
        .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateDepartment,
) -> Result<Department, sqlx::Error> {
    sqlx::query_as::<_, Department>(&format!(
        "INSERT INTO departments (name, code) VALUES ($1,$2) RETURNING {COLUMNS}"
    ))
    .bind(params.name)
    .bind(params.code)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM departments WHERE id = $1").bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}
