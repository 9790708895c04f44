//! Front page: newest posts, paginated.

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use super::helpers::Page;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Posts per page.
const PAGE_SIZE: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    pub page: Option<String>,
}

/// Parse the 1-based `page` parameter. Absent means the first page.
fn parse_page(raw: Option<&str>) -> AppResult<i64> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(1);
    };

    match raw.parse::<i64>() {
        Ok(page) if page >= 1 => Ok(page),
        _ => Err(AppError::BadRequest("invalid page".to_string())),
    }
}

/// GET /
async fn home(
    State(state): State<AppState>,
    page: Page,
    Query(query): Query<HomeQuery>,
) -> AppResult<Html<String>> {
    let current = parse_page(query.page.as_deref())?;
    let offset = (current - 1)
        .checked_mul(PAGE_SIZE)
        .ok_or_else(|| AppError::BadRequest("invalid page".to_string()))?;

    let posts = &state.store().posts;
    let (items, total) = tokio::try_join!(posts.list(PAGE_SIZE, offset), posts.count())?;
    let total_pages = ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1);

    let mut context = tera::Context::new();
    context.insert("posts", &items);
    context.insert("page", &current);
    context.insert("total_pages", &total_pages);
    context.insert("has_prev", &(current > 1));
    context.insert("has_next", &(current < total_pages));
    page.render("home.html", context)
}

/// Create the front page router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(home))
}
