use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::{AdminUser, AuthUser},
    error::ApiError,
    extract::{Json as BodyJson, Path, Query},
    products::{
        dto::{CreateProductRequest, ProductListParams, UpdateProductRequest},
        repo::{self, Product},
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product).delete(delete_product))
}

#[instrument(skip(state, _user))]
pub async fn list_products(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<ProductListParams>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = repo::list(
        &state.db,
        params.search.as_deref(),
        params.ordering.as_deref(),
        params.limit,
        params.offset,
    )
    .await?;
    Ok(Json(products))
}

#[instrument(skip(state, _user))]
pub async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let product = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;
    Ok(Json(product))
}

#[instrument(skip(state, admin, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    BodyJson(payload): BodyJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    validate_name(&payload.name)?;
    ensure_category_exists(&state, payload.category_id).await?;

    let product = repo::create(&state.db, admin.id, &payload).await?;
    info!(product_id = %product.id, created_by = %admin.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    BodyJson(payload): BodyJson<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    validate_name(&payload.name)?;
    ensure_category_exists(&state, payload.category_id).await?;

    let product = repo::update(&state.db, id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;
    info!(product_id = %product.id, "product updated");
    Ok(Json(product))
}

#[instrument(skip(state, _admin))]
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Product not found".into()));
    }
    info!(product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation_with_details(
            "Bad Request",
            serde_json::json!({ "name": ["This field may not be blank."] }),
        ));
    }
    Ok(())
}

async fn ensure_category_exists(state: &AppState, category_id: Uuid) -> Result<(), ApiError> {
    if crate::categories::repo::get(&state.db, category_id)
        .await?
        .is_none()
    {
        return Err(ApiError::validation_with_details(
            "Bad Request",
            serde_json::json!({ "category_id": ["Invalid category."] }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("Mechanical keyboard").is_ok());
    }
}
