/// Middleware module
///
/// Bearer token authentication for protected scopes.

mod bearer_auth;

pub use bearer_auth::BearerAuth;
