pub mod token_client;

pub use token_client::{
    HttpOAuthTokenClient, OAuthTokenClient, OAuthTokenResponse, TokenExchangeRequest,
};
