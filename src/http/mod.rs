//! HTTP client module
//!
//! Every HubSpot request goes through [`HttpClient`]:
//!
//! - a governor token bucket per account, plus a tighter one for `/search`
//! - credentials from the auth module, with one token refresh after a 401
//! - 429 waits for `Retry-After`, except when the daily quota is spent
//! - 5xx and connection failures back off and try again

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
