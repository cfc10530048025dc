//! Email verification callback.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use super::error::ApiError;
use super::response::ResponseModel;
use crate::registration::{RegistrationService, VerificationError};

#[derive(Clone)]
pub struct VerifyState {
    pub registration: RegistrationService,
}

pub fn router(state: VerifyState) -> Router {
    Router::new().route("/verify", get(verify)).with_state(state)
}

#[derive(Deserialize)]
struct VerifyParams {
    token: String,
}

/// Outcomes are reported in the body. Only a server-side failure changes the status.
async fn verify(
    State(state): State<VerifyState>,
    Query(params): Query<VerifyParams>,
) -> Result<impl IntoResponse, ApiError> {
    match state.registration.verify(&params.token).await {
        Ok(()) => Ok(Json(ResponseModel::success("Email verified successfully"))),
        Err(VerificationError::Store(e)) => {
            Err(ApiError::db_error("Failed to verify account", e))
        }
        Err(e) => Ok(Json(ResponseModel::fail(e.message(), e.code()))),
    }
}
