use serde::{Deserialize, Serialize};

use crate::categories::repo::Category;

/// Body for both create and rename.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

/// Cached under the user's `categories:` prefix, hence `Deserialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

/// Query string for `GET /categories`. Page and limit arrive as raw
/// strings; anything unparsable falls back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListCategoriesQuery {
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}
