use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::products::dto::{CreateProductRequest, UpdateProductRequest};

/// Product row as served to clients: joined with its category name and the
/// creator's username.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: Uuid,
    pub category_name: String,
    pub created_by: String,
    pub created_at: OffsetDateTime,
}

const SELECT_PRODUCT: &str = r#"
    SELECT p.id, p.name, p.description, p.price, p.category_id,
           c.name AS category_name, u.username AS created_by, p.created_at
    FROM products p
    JOIN categories c ON c.id = p.category_id
    JOIN users u ON u.id = p.created_by
"#;

const MAX_PAGE_SIZE: i64 = 100;

/// Sanitizes client-supplied pagination. Negative values would make Postgres
/// reject the query, so they collapse to zero; the page size is capped.
pub fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(0, MAX_PAGE_SIZE), offset.max(0))
}

/// Maps the `ordering` query parameter onto a whitelisted ORDER BY clause.
/// Unknown values fall back to newest-first.
pub fn order_clause(ordering: Option<&str>) -> &'static str {
    match ordering {
        Some("price") => "p.price ASC",
        Some("-price") => "p.price DESC",
        Some("created_at") => "p.created_at ASC",
        _ => "p.created_at DESC",
    }
}

pub async fn list(
    db: &PgPool,
    search: Option<&str>,
    ordering: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Product>> {
    let (limit, offset) = clamp_page(limit, offset);
    let sql = format!(
        "{SELECT_PRODUCT}
         WHERE ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%' OR c.name ILIKE '%' || $1 || '%')
         ORDER BY {}
         LIMIT $2 OFFSET $3",
        order_clause(ordering)
    );
    let rows = sqlx::query_as::<_, Product>(&sql)
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Product>> {
    let sql = format!("{SELECT_PRODUCT} WHERE p.id = $1");
    let row = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn create(
    db: &PgPool,
    created_by: Uuid,
    req: &CreateProductRequest,
) -> anyhow::Result<Product> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO products (name, description, price, category_id, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.category_id)
    .bind(created_by)
    .fetch_one(db)
    .await?;

    get(db, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("inserted product {id} not found"))
}

/// Updates mutable fields only. `created_at` and `created_by` are set once
/// at insert and never touched again.
pub async fn update(
    db: &PgPool,
    id: Uuid,
    req: &UpdateProductRequest,
) -> anyhow::Result<Option<Product>> {
    let updated: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET name = $2, description = $3, price = $4, category_id = $5
        WHERE id = $1
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.category_id)
    .fetch_optional(db)
    .await?;

    match updated {
        Some(id) => get(db, id).await,
        None => Ok(None),
    }
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_whitelist() {
        assert_eq!(order_clause(Some("price")), "p.price ASC");
        assert_eq!(order_clause(Some("-price")), "p.price DESC");
        assert_eq!(order_clause(Some("created_at")), "p.created_at ASC");
        assert_eq!(order_clause(Some("-created_at")), "p.created_at DESC");
        // Unknown or absent values fall back to newest-first.
        assert_eq!(order_clause(Some("price; DROP TABLE users")), "p.created_at DESC");
        assert_eq!(order_clause(None), "p.created_at DESC");
    }

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(clamp_page(20, 0), (20, 0));
        // Negative values would be a Postgres error; they collapse to zero.
        assert_eq!(clamp_page(-1, 0), (0, 0));
        assert_eq!(clamp_page(20, -5), (20, 0));
        // Page size is capped.
        assert_eq!(clamp_page(10_000, 0), (100, 0));
    }
}
