//! Platform OAuth2 authentication library
//!
//! Discovers a platform's identity provider configuration and runs the
//! OAuth2 flows the CLI needs. Stateless apart from the short-lived login
//! listener; persisting tokens is the caller's job.
//!
//! Flows:
//! 1. `PlatformClient::discover()` reads the platform's well-known document
//! 2. `PlatformClient::client_credentials_token()` runs the machine grant
//! 3. `PlatformClient::login()` runs authorization code + PKCE through a
//!    local callback listener and the user's browser
//! 4. `PlatformClient::revoke()` revokes a refresh token on logout

pub mod client;
pub mod constants;
pub mod cookie;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod login;
pub mod pkce;
pub mod token;

pub use client::PlatformClient;
pub use constants::*;
pub use discovery::{Field, PlatformConfiguration};
pub use endpoint::normalize_endpoint;
pub use error::{Error, Result};
pub use login::LoginOptions;
pub use pkce::{build_authorization_url, compute_challenge, generate_verifier};
pub use token::{Token, TokenResponse, access_token_expiration};
