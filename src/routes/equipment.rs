use axum::{extract::State, routing::get, Json, Router};

use crate::analysis::UserSummary;
use crate::middleware::CurrentUser;
use crate::models::{AppState, DatasetListItem, Equipment};
use crate::types::AppResult;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/equipment", get(list_equipment))
        .route("/api/summary", get(user_summary))
}

async fn list_equipment(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<Equipment>>> {
    Ok(Json(state.store.list_user_equipment(user.id()).await?))
}

/// Aggregate over every dataset the caller still has.
async fn user_summary(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<UserSummary>> {
    let equipment = state.store.list_user_equipment(user.id()).await?;
    let datasets = state.store.list_datasets(user.id()).await?;

    Ok(Json(UserSummary::build(
        &equipment,
        datasets.into_iter().map(DatasetListItem::from).collect(),
    )))
}
