use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::services::validate_name;
use crate::cache;
use crate::categories::dto::{CategoryRequest, CategoryResponse, ListCategoriesQuery};
use crate::categories::repo::Category;
use crate::error::ApiError;
use crate::pagination::{page_offset, parse_limit, parse_page};
use crate::state::AppState;

const LIST_CACHE_TTL: Duration = Duration::from_secs(300);

pub(crate) fn list_cache_prefix(user_id: i64) -> String {
    format!("categories:{user_id}:")
}

fn list_cache_key(user_id: i64, search: &str, page: i64, limit: i64) -> String {
    format!("categories:{user_id}:{search}:{page}:{limit}")
}

/// List page as stored in the cache.
#[derive(Debug, Serialize, Deserialize)]
struct CachedPage {
    categories: Vec<CategoryResponse>,
    total: i64,
}

pub async fn create(
    state: &AppState,
    user_id: i64,
    input: CategoryRequest,
) -> Result<CategoryResponse, ApiError> {
    validate_name("name", &input.name)?;
    let category = Category::create(&state.db, user_id, &input.name).await?;
    cache::invalidate(state.cache.as_ref(), &list_cache_prefix(user_id)).await;
    info!(user_id, category_id = category.id, "category created");
    Ok(CategoryResponse::from(category))
}

/// Paginated, searchable listing with a read-through cache.
pub async fn list(
    state: &AppState,
    user_id: i64,
    query: ListCategoriesQuery,
) -> Result<(Vec<CategoryResponse>, i64, i64, i64), ApiError> {
    let search = query.search.unwrap_or_default();
    let page = parse_page(query.page.as_deref());
    let limit = parse_limit(query.limit.as_deref());

    let key = list_cache_key(user_id, &search, page, limit);
    if let Some(cached) = cache::get_json::<CachedPage>(state.cache.as_ref(), &key).await {
        return Ok((cached.categories, cached.total, page, limit));
    }

    let offset = page_offset(page, limit);
    let (categories, total) = Category::list(&state.db, user_id, &search, limit, offset).await?;
    let categories: Vec<CategoryResponse> =
        categories.into_iter().map(CategoryResponse::from).collect();

    cache::put_json(
        state.cache.as_ref(),
        &key,
        &CachedPage {
            categories: categories.clone(),
            total,
        },
        LIST_CACHE_TTL,
    )
    .await;

    Ok((categories, total, page, limit))
}

pub async fn update(
    state: &AppState,
    user_id: i64,
    category_id: i64,
    input: CategoryRequest,
) -> Result<CategoryResponse, ApiError> {
    validate_name("name", &input.name)?;
    let category = Category::update(&state.db, category_id, user_id, &input.name).await?;
    cache::invalidate(state.cache.as_ref(), &list_cache_prefix(user_id)).await;
    Ok(CategoryResponse::from(category))
}

pub async fn delete(state: &AppState, user_id: i64, category_id: i64) -> Result<(), ApiError> {
    Category::delete(&state.db, category_id, user_id).await?;
    cache::invalidate(state.cache.as_ref(), &list_cache_prefix(user_id)).await;
    info!(user_id, category_id, "category deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_embeds_the_full_query() {
        assert_eq!(list_cache_key(4, "groc", 2, 20), "categories:4:groc:2:20");
        assert_eq!(list_cache_key(4, "", 1, 10), "categories:4::1:10");
        assert!(list_cache_key(4, "x", 1, 10).starts_with(&list_cache_prefix(4)));
    }

    #[test]
    fn prefixes_do_not_collide_between_users() {
        assert!(!list_cache_key(41, "x", 1, 10).starts_with(&list_cache_prefix(4)));
    }
}
