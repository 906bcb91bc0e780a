//! Authentication module
//!
//! Supports: private app / access token (Bearer) and OAuth2 refresh token.
//!
//! The `Authenticator` applies credentials to requests and caches the
//! OAuth access token until shortly before it expires.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, CachedToken, TOKEN_PATH};
