pub mod authorization_code;
pub mod challenge;
pub mod code_challenge_mode;
pub mod correlation_id;
pub mod enterprise_application;
pub mod grant;
pub mod refresh_token;
pub mod response_mode;
pub mod role;
pub mod scope;
pub mod service_action;
pub mod service_application;
pub mod user;

pub use authorization_code::AuthorizationCode;
pub use challenge::{
    ClientAuthorizationRequest, ExternalAuthenticationChallenge, IdentityProviderRoundTrip,
};
pub use code_challenge_mode::CodeChallengeMode;
pub use correlation_id::CorrelationId;
pub use enterprise_application::EnterpriseApplication;
pub use grant::AuthorizationGrant;
pub use refresh_token::RefreshToken;
pub use response_mode::ResponseMode;
pub use role::OzoneRole;
pub use scope::Scope;
pub use service_action::ServiceAction;
pub use service_application::ServiceApplication;
pub use user::{OzoneUser, UserIdentifier};
