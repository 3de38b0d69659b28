use crate::AppState;
use service_core::{
    axum::{extract::State, http::header, response::IntoResponse, Json},
    error::AppError,
};

/// Public keys of every active signing key version.
#[tracing::instrument(skip(state))]
pub async fn jwks(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let jwks = state.signer.get_signing_keys().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(jwks),
    ))
}
