//! `/api/users` CP handlers.

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use log::info;
use mybestlife_core::repo::{RepoError, SqliteGroupRepository, SqliteUserRepository};
use mybestlife_core::service::group_service::GroupService;
use mybestlife_core::service::user_cp_service::{UserCpService, UserStats};
use mybestlife_core::CpSyncPayload;
use serde_json::{json, Value};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/commitment-points",
            get(commitment_points).put(sync_commitment_points),
        )
        .route("/stats", get(stats))
}

pub async fn commitment_points(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CpSyncPayload>, ApiError> {
    let payload = state.with_db(|conn| {
        Ok(UserCpService::new(SqliteUserRepository::new(conn)).commitment_points(&user.user_id)?)
    })?;
    Ok(Json(payload))
}

/// Overwrites the caller's CP aggregates and mirrors daily CP into memberships.
///
/// Both writes commit together or not at all.
pub async fn sync_commitment_points(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CpSyncPayload>,
) -> Result<Json<Value>, ApiError> {
    let updated = state.with_db(|conn| {
        let tx = conn.unchecked_transaction().map_err(RepoError::from)?;
        let updated = UserCpService::new(SqliteUserRepository::new(&tx))
            .sync_commitment_points(&user.user_id, &payload)?;
        let memberships = GroupService::new(SqliteGroupRepository::new(&tx))
            .mirror_daily_cp(&user.user_id, payload.daily_cp)?;
        tx.commit().map_err(RepoError::from)?;
        info!("event=cp_sync module=server status=ok memberships={memberships}");
        Ok(updated)
    })?;
    Ok(Json(json!({
        "message": "Commitment points updated",
        "user": updated,
    })))
}

pub async fn stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserStats>, ApiError> {
    let stats = state.with_db(|conn| {
        Ok(UserCpService::new(SqliteUserRepository::new(conn)).stats(&user.user_id)?)
    })?;
    Ok(Json(stats))
}
