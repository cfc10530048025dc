//! Admin API endpoints.
//!
//! The gate only lets ADMIN principals reach these.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::info;

use super::error::{ApiError, ResultExt, parse_uuid};
use crate::auth::Auth;
use crate::db::Database;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/enabled", post(set_enabled))
        .with_state(state)
}

/// List all accounts.
async fn list_users(State(state): State<AdminState>) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list()
        .await
        .db_err("Failed to list users")?;

    Ok(Json(users))
}

#[derive(Deserialize)]
struct SetEnabledRequest {
    enabled: bool,
}

/// Enable or disable an account. Disabling takes effect on the account's
/// next request, whatever tokens it holds.
async fn set_enabled(
    State(state): State<AdminState>,
    Auth(admin): Auth,
    Path(id): Path<String>,
    Json(payload): Json<SetEnabledRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid(&id)?;

    if id == admin.user_id && !payload.enabled {
        return Err(ApiError::bad_request("Cannot disable your own account"));
    }

    let updated = state
        .db
        .users()
        .set_enabled(id, payload.enabled)
        .await
        .db_err("Failed to update user")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!(admin = admin.display_name, user_id = %id, enabled = payload.enabled, "Account enabled flag changed");

    let summary = state
        .db
        .users()
        .get_summary(id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(summary))
}
