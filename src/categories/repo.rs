use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::dto::CategoryPatch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
}

pub async fn list_all(db: &PgPool) -> sqlx::Result<Vec<Category>> {
    sqlx::query_as::<_, Category>("SELECT id, name, parent_id FROM categories ORDER BY name, id")
        .fetch_all(db)
        .await
}

pub async fn find(db: &PgPool, id: i32) -> sqlx::Result<Option<Category>> {
    sqlx::query_as::<_, Category>("SELECT id, name, parent_id FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn exists(db: &PgPool, id: i32) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await
}

pub async fn insert(db: &PgPool, name: &str, parent_id: Option<i32>) -> sqlx::Result<Category> {
    sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, parent_id)
        VALUES ($1, $2)
        RETURNING id, name, parent_id
        "#,
    )
    .bind(name)
    .bind(parent_id)
    .fetch_one(db)
    .await
}

/// Applies `patch` with COALESCE semantics; `parent_id: Some(None)` detaches.
pub async fn update(db: &PgPool, id: i32, patch: &CategoryPatch) -> sqlx::Result<Option<Category>> {
    let (set_parent, parent) = match patch.parent_id {
        Some(p) => (true, p),
        None => (false, None),
    };
    sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories
           SET name = COALESCE($2, name),
               parent_id = CASE WHEN $3 THEN $4 ELSE parent_id END
         WHERE id = $1
        RETURNING id, name, parent_id
        "#,
    )
    .bind(id)
    .bind(patch.name.as_deref())
    .bind(set_parent)
    .bind(parent)
    .fetch_optional(db)
    .await
}

pub async fn delete(db: &PgPool, id: i32) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
