use service_core::error::AppError;
use thiserror::Error;

/// Every failure the authorization core can report. Each variant carries a
/// stable `code()` that is sent to clients next to the display message.
#[derive(Error, Debug)]
pub enum IdentityError {
    // Validation
    #[error("The descriptor '{0}' is not in a valid format.")]
    InvalidDescriptorFormat(String),

    #[error("The action '{0}' is not in a valid format.")]
    InvalidKeyChainActionFormat(String),

    #[error("A keychain can only contain actions of a single service, found: {0}.")]
    MultipleServiceScopesInKeyChain(String),

    #[error("The code challenge method '{0}' is invalid. Only 'S256' and 'S512' are supported.")]
    InvalidCodeChallengeMode(String),

    #[error("The response mode '{0}' is invalid. Only 'query' and 'fragment' are supported.")]
    InvalidResponseMode(String),

    #[error("The user identifier '{0}' is invalid.")]
    InvalidUserIdentifier(String),

    #[error("The parameter '{0}' in the authentication request is invalid.")]
    InvalidAuthenticationParameter(String),

    #[error("The identity provider '{0}' is not supported.")]
    InvalidIdentityProvider(String),

    #[error("The client id '{0}' is invalid.")]
    InvalidClientId(String),

    #[error("The state of the authentication callback is invalid.")]
    InvalidCallbackState,

    // Protocol
    #[error("External authentication challenge with correlation id '{0}' was not found.")]
    ChallengeNotFound(String),

    #[error("External authentication challenge with correlation id '{0}' expired.")]
    ChallengeExpired(String),

    #[error("The external identity provider failed to authenticate the user: {0}")]
    AuthenticationFailed(String),

    #[error("The nonce of the id token does not match the authentication challenge.")]
    InvalidNonce,

    #[error("The external identity provider returned an invalid id token.")]
    InvalidIdToken,

    #[error("The external identity provider did not return a valid refresh token.")]
    InvalidRefreshToken,

    #[error("The external identity provider returned an invalid access token.")]
    InvalidAccessToken,

    #[error("The object id '{access_token}' of the access token did not match the object id '{id_token}' of the id token.")]
    AccessTokenObjectIdMismatch {
        access_token: String,
        id_token: String,
    },

    #[error("The external identity provider returned an error: {0}")]
    ExternalIdentityProvider(String),

    #[error("The user '{0}' was not found.")]
    UserNotFound(String),

    #[error("The authorization grant was not found.")]
    GrantNotFound,

    #[error("The authorization code is invalid.")]
    AuthorizationCodeNotFound,

    #[error("The authorization code has expired.")]
    AuthorizationCodeExpired,

    // Authorization
    #[error("The user is not authorized to request the service action: '{0}'.")]
    UnauthorizedServiceAction(String),

    #[error("The user is not authorized to request the scope: '{0}'.")]
    UnauthorizedScope(String),

    #[error("The scope '{0}' is invalid or does not exist.")]
    InvalidAuthorizationScope(String),

    #[error("The action '{0}' in the keychain is invalid or does not exist.")]
    InvalidKeyChainAction(String),

    #[error("The client is not allowed to request the scope '{0}'.")]
    UnauthorizedScopeRequest(String),

    #[error("The client is not allowed to request the service action '{0}'.")]
    UnauthorizedServiceActionRequest(String),

    #[error("The service application '{0}' was not found.")]
    ServiceApplicationNotFound(String),

    // Signing
    #[error("Key with id {0} was not found.")]
    SigningKeyNotFound(String),

    #[error("Could not find a valid signing key")]
    NoValidSigningKey,

    #[error("The signature of the jwt provided is invalid.")]
    InvalidSignature,

    #[error("Cannot serialize token before it was signed.")]
    TokenNotSigned,

    #[error("The key type '{0}' is not supported for signing.")]
    UnsupportedKeyType(String),

    #[error("The signing algorithm '{0}' is not supported.")]
    UnsupportedAlgorithm(String),

    // JWT
    #[error("{0}")]
    MalformedJwt(String),

    #[error("Invalid jwt header")]
    InvalidJwtHeader,

    #[error("Invalid jwt payload")]
    InvalidJwtPayload,

    #[error("The required claim '{0}' is missing.")]
    MissingClaim(String),

    #[error("The claim '{0}' does not have the expected type.")]
    InvalidClaim(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IdentityError {
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::InvalidDescriptorFormat(_) => "InvalidIdentityDescriptorFormat",
            IdentityError::InvalidKeyChainActionFormat(_) => "Identity.InvalidKeyChainActionFormat",
            IdentityError::MultipleServiceScopesInKeyChain(_) => {
                "Identity.MultipleServiceScopesInKeyChain"
            }
            IdentityError::InvalidCodeChallengeMode(_) => "InvalidCodeChallengeMode",
            IdentityError::InvalidResponseMode(_) => "InvalidResponseMode",
            IdentityError::InvalidUserIdentifier(_) => "InvalidUserIdentifier",
            IdentityError::InvalidAuthenticationParameter(_) => {
                "Identity.InvalidAuthenticationParameter"
            }
            IdentityError::InvalidIdentityProvider(_) => "Identity.InvalidIdentityProvider",
            IdentityError::InvalidClientId(_) => "Identity.InvalidClientId",
            IdentityError::InvalidCallbackState => "Identity.InvalidCallbackState",
            IdentityError::ChallengeNotFound(_) => "ExternalAuthenticationChallengeNotFound",
            IdentityError::ChallengeExpired(_) => "ExternalAuthenticationChallengeExpired",
            IdentityError::AuthenticationFailed(_) => "ExternalIdentityProviderAuthenticationFailed",
            IdentityError::InvalidNonce => "ExternalIdentityProviderIdTokenInvalidNonce",
            IdentityError::InvalidIdToken => "ExternalIdentityProviderInvalidIdToken",
            IdentityError::InvalidRefreshToken => "ExternalIdentityProviderInvalidRefreshToken",
            IdentityError::InvalidAccessToken => "ExternalIdentityProviderInvalidAccessToken",
            IdentityError::AccessTokenObjectIdMismatch { .. } => {
                "ExternalIdentityProviderAccessTokenObjectIdDidNotMatchIdToken"
            }
            IdentityError::ExternalIdentityProvider(_) => "Identity.ExternalIdentityProviderError",
            IdentityError::UserNotFound(_) => "Identity.UserNotFound",
            IdentityError::GrantNotFound => "Identity.InvalidAuthorizationGrant",
            IdentityError::AuthorizationCodeNotFound => "Identity.InvalidAuthorizationCode",
            IdentityError::AuthorizationCodeExpired => "Identity.AuthCodeExpired",
            IdentityError::UnauthorizedServiceAction(_) => "UnauthorizedServiceAction",
            IdentityError::UnauthorizedScope(_) => "UnauthorizedScope",
            IdentityError::InvalidAuthorizationScope(_) => "InvalidAuthorizationScope",
            IdentityError::InvalidKeyChainAction(_) => "InvalidKeyChainAction",
            IdentityError::UnauthorizedScopeRequest(_) => "UnauthorizedAuthorizationScopeRequest",
            IdentityError::UnauthorizedServiceActionRequest(_) => {
                "UnauthorizedAuthorizationServiceActionsRequest"
            }
            IdentityError::ServiceApplicationNotFound(_) => "ServiceApplicationNotFound",
            IdentityError::SigningKeyNotFound(_)
            | IdentityError::NoValidSigningKey
            | IdentityError::InvalidSignature
            | IdentityError::TokenNotSigned
            | IdentityError::UnsupportedKeyType(_)
            | IdentityError::UnsupportedAlgorithm(_) => "Identity.Sign",
            IdentityError::MalformedJwt(_)
            | IdentityError::InvalidJwtHeader
            | IdentityError::InvalidJwtPayload
            | IdentityError::MissingClaim(_)
            | IdentityError::InvalidClaim(_) => "JWT",
            IdentityError::Internal(_) => "Identity.Internal",
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        let described = anyhow::anyhow!("{}: {}", err.code(), err);
        match err {
            IdentityError::ChallengeNotFound(_)
            | IdentityError::UserNotFound(_)
            | IdentityError::GrantNotFound
            | IdentityError::AuthorizationCodeNotFound
            | IdentityError::ServiceApplicationNotFound(_)
            | IdentityError::SigningKeyNotFound(_) => AppError::NotFound(described),
            IdentityError::UnauthorizedServiceAction(_)
            | IdentityError::UnauthorizedScope(_)
            | IdentityError::UnauthorizedScopeRequest(_)
            | IdentityError::UnauthorizedServiceActionRequest(_) => AppError::Forbidden(described),
            IdentityError::InvalidSignature => AppError::Unauthorized(described),
            IdentityError::ExternalIdentityProvider(message) => AppError::BadGateway(message),
            IdentityError::NoValidSigningKey
            | IdentityError::TokenNotSigned
            | IdentityError::UnsupportedKeyType(_)
            | IdentityError::UnsupportedAlgorithm(_) => AppError::InternalError(described),
            IdentityError::Internal(e) => AppError::InternalError(e),
            _ => AppError::BadRequest(described),
        }
    }
}
