//! Project access queries

use sqlx::PgPool;
use uuid::Uuid;

/// Whether `user_id` belongs to the organization that owns `project_id`.
/// Unknown projects are indistinguishable from inaccessible ones.
pub async fn is_project_member(pool: &PgPool, project_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM projects p
            JOIN organization_members m ON m.organization_id = p.organization_id
            WHERE p.id = $1 AND m.user_id = $2
        )
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Component types configured for a project (empty when the project uses the default list)
pub async fn list_component_types(pool: &PgPool, project_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT component_type FROM project_component_types WHERE project_id = $1 ORDER BY component_type",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
}
