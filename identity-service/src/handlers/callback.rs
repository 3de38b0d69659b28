use service_core::{
    axum::{
        extract::{Path, Query, State},
        response::Response,
    },
    error::AppError,
};

use super::found;
use crate::commands::ExternalAuthorizationCallbackCommand;
use crate::AppState;

/// Landing point of the external identity provider. Always redirects once
/// the challenge is known; failures travel in the redirect query.
pub async fn authorize_callback(
    State(state): State<AppState>,
    Path(identity_provider): Path<String>,
    Query(mut command): Query<ExternalAuthorizationCallbackCommand>,
) -> Result<Response, AppError> {
    command.identity_provider = identity_provider;
    let ticket = state.callback.handle(command).await?;
    Ok(found(ticket.location))
}
