//! Command handlers behind the HTTP surface. They turn raw request
//! parameters into typed requests and route them to a provider.

pub mod authorize;
pub mod callback;

pub use authorize::{AuthorizeCommand, AuthorizeCommandHandler};
pub use callback::{ExternalAuthorizationCallbackCommand, ExternalAuthorizationCallbackCommandHandler};
