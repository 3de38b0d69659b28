use service_core::{
    axum::{
        extract::{Query, State},
        response::{IntoResponse, Response},
    },
    error::AppError,
};

use super::found;
use crate::commands::AuthorizeCommand;
use crate::provider::RedirectTicket;
use crate::services::IdentityError;
use crate::AppState;

/// Starts an authorization round trip and redirects the browser to the
/// external identity provider.
pub async fn authorize(
    State(state): State<AppState>,
    Query(command): Query<AuthorizeCommand>,
) -> Response {
    let error_redirect_uri = command.error_redirect_uri().map(str::to_string);
    let client_state = command.state.clone();

    match state.authorize.handle(command).await {
        Ok(ticket) => found(ticket.location),
        Err(IdentityError::Internal(e)) => AppError::InternalError(e).into_response(),
        Err(e) => match error_redirect_uri {
            Some(redirect_uri) => {
                tracing::warn!(code = e.code(), error = %e, "Authorization request rejected");
                found(RedirectTicket::from_error(&redirect_uri, &client_state, &e).location)
            }
            None => AppError::from(e).into_response(),
        },
    }
}
