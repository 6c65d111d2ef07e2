use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categories::repo::Category;
use crate::products::repo::Product;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Retrieve view: the category with its products embedded.
#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub products: Vec<Product>,
}

impl CategoryDetail {
    pub fn new(category: Category, products: Vec<Product>) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
            products,
        }
    }
}
