use crate::error::{AppError, Result};
use crate::model::StatsQuery;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use ferry_core::Stats;
use tracing::warn;

pub async fn admin_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Stats>> {
    if !state.admin_key_matches(query.key.as_deref().unwrap_or_default()) {
        warn!("admin stats requested with a wrong key");
        return Err(AppError::Forbidden);
    }

    Ok(Json(state.depot().stats().await?))
}
