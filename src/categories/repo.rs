use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::products::repo::Product;

/// Category row. Deleting one cascades to its products.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, Category>(
        "SELECT id, name, description FROM categories ORDER BY name",
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Category>> {
    let row = sqlx::query_as::<_, Category>(
        "SELECT id, name, description FROM categories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn products_of(db: &PgPool, category_id: Uuid) -> anyhow::Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>(
        r#"
        SELECT p.id, p.name, p.description, p.price, p.category_id,
               c.name AS category_name, u.username AS created_by, p.created_at
        FROM products p
        JOIN categories c ON c.id = p.category_id
        JOIN users u ON u.id = p.created_by
        WHERE p.category_id = $1
        ORDER BY p.created_at DESC
        "#,
    )
    .bind(category_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn create(db: &PgPool, name: &str, description: &str) -> anyhow::Result<Category> {
    let row = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, description)
        VALUES ($1, $2)
        RETURNING id, name, description
        "#,
    )
    .bind(name)
    .bind(description)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    name: &str,
    description: &str,
) -> anyhow::Result<Option<Category>> {
    let row = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories
        SET name = $2, description = $3
        WHERE id = $1
        RETURNING id, name, description
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
