/// Authentication module
///
/// Handles signing configuration, access token issuance/validation,
/// and single-use refresh token rotation.

mod claims;
mod jwt;
mod refresh_token;
mod signing;

pub use claims::{Claim, Claims, REGISTERED_CLAIMS};
pub use jwt::{decode_access_token, issue_access_token, validate_access_token, DecodedToken};
pub use refresh_token::{
    generate_secret, AuthResponse, RefreshRecord, RefreshRecordRequest, RefreshTokenManager,
    RotateRequest,
};
pub use signing::{SigningContext, SIGNING_ALGORITHM};
