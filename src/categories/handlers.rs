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
    categories::{
        dto::{CategoryDetail, CreateCategoryRequest, UpdateCategoryRequest},
        repo::{self, Category},
    },
    error::ApiError,
    extract::{Json as BodyJson, Path},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/:id", get(get_category))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}

#[instrument(skip(state, _user))]
pub async fn list_categories(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = repo::list(&state.db).await?;
    Ok(Json(categories))
}

#[instrument(skip(state, _user))]
pub async fn get_category(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CategoryDetail>, ApiError> {
    let category = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".into()))?;
    let products = repo::products_of(&state.db, id).await?;
    Ok(Json(CategoryDetail::new(category, products)))
}

#[instrument(skip(state, _admin, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    BodyJson(payload): BodyJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    validate_name(&payload.name)?;
    let category = repo::create(&state.db, &payload.name, &payload.description).await?;
    info!(category_id = %category.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_category(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    BodyJson(payload): BodyJson<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    validate_name(&payload.name)?;
    let category = repo::update(&state.db, id, &payload.name, &payload.description)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".into()))?;
    info!(category_id = %category.id, "category updated");
    Ok(Json(category))
}

/// Cascade: the store removes the category's products with it.
#[instrument(skip(state, _admin))]
pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Category not found".into()));
    }
    info!(category_id = %id, "category deleted");
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
