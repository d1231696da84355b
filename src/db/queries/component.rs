//! Component bulk insert

use std::collections::{BTreeSet, HashMap};

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::services::takeoff::ComponentDraft;
use crate::types::ImportContext;

/// Rows per INSERT statement; keeps bind parameters well under the Postgres limit
const INSERT_CHUNK_SIZE: usize = 1_000;

/// Insert all drafts in one transaction. Drawings are created on demand.
///
/// A unique violation on `(drawing_id, identity_key)` aborts the whole batch.
pub async fn insert_components(
    pool: &PgPool,
    context: &ImportContext,
    drafts: &[ComponentDraft],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let drawing_ids = upsert_drawings(&mut tx, context.project_id, drafts).await?;
    let rows = drafts
        .iter()
        .map(|draft| {
            drawing_ids
                .get(&draft.drawing)
                .map(|drawing_id| (*drawing_id, draft))
                .ok_or(sqlx::Error::RowNotFound)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut written = 0;
    for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO components (id, project_id, drawing_id, component_type, identity_key, spec, description, comments, created_by) ",
        );
        builder.push_values(chunk, |mut b, (drawing_id, draft)| {
            b.push_bind(Uuid::new_v4())
                .push_bind(context.project_id)
                .push_bind(*drawing_id)
                .push_bind(draft.component_type.as_str())
                .push_bind(Json(draft.identity_key.clone()))
                .push_bind(draft.spec.as_deref())
                .push_bind(draft.description.as_deref())
                .push_bind(draft.comments.as_deref())
                .push_bind(context.user_id);
        });
        written += builder.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Normalized drawing number → drawing id, creating missing drawings
async fn upsert_drawings(
    conn: &mut PgConnection,
    project_id: Uuid,
    drafts: &[ComponentDraft],
) -> Result<HashMap<String, Uuid>, sqlx::Error> {
    let drawings: Vec<&str> = drafts
        .iter()
        .map(|d| d.drawing.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut ids = HashMap::with_capacity(drawings.len());
    for chunk in drawings.chunks(INSERT_CHUNK_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO drawings (id, project_id, drawing_no_norm) ");
        builder.push_values(chunk, |mut b, drawing| {
            b.push_bind(Uuid::new_v4())
                .push_bind(project_id)
                .push_bind(*drawing);
        });
        // no-op update so RETURNING also yields pre-existing drawings
        builder.push(
            " ON CONFLICT (project_id, drawing_no_norm) DO UPDATE SET drawing_no_norm = EXCLUDED.drawing_no_norm \
             RETURNING id, drawing_no_norm",
        );

        let rows: Vec<(Uuid, String)> = builder.build_query_as().fetch_all(&mut *conn).await?;
        ids.extend(rows.into_iter().map(|(id, drawing)| (drawing, id)));
    }

    Ok(ids)
}
