//! Staff authentication
//!
//! - [`JwtService`] - validates identity-provider tokens
//! - [`CurrentUser`] - authenticated staff member
//! - [`require_auth`] - middleware guarding the loyalty API

pub mod extractor;
pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
pub use middleware::require_auth;
