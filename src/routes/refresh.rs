/// Token Routes
///
/// Refresh token rotation, revocation and claim introspection.

use actix_web::{
    error::{JsonPayloadError, PathError},
    web, HttpRequest, HttpResponse,
};
use uuid::Uuid;

use crate::auth::{Claim, Claims, RefreshTokenManager, RotateRequest};
use crate::error::{AuthError, ErrorContext};

/// POST /auth/refresh
///
/// Exchange an access token plus refresh record for a new pair.
/// The access token may be expired; its signature, issuer and audience
/// must still check out. The presented refresh record is consumed.
///
/// # Errors
/// - 400: Body is not a complete auth response
/// - 401: Invalid access token, unknown record or wrong secret
/// - 503: Refresh token store unavailable
pub async fn refresh(
    body: web::Json<RotateRequest>,
    manager: web::Data<RefreshTokenManager>,
) -> Result<HttpResponse, AuthError> {
    let context = ErrorContext::new("token_refresh");

    let auth = manager.rotate(body.into_inner()).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        token_id = %auth.refresh_record.id,
        "Token refreshed successfully"
    );

    Ok(HttpResponse::Ok().json(auth))
}

/// GET /api/me
///
/// Claims carried by the caller's access token. Claims are injected by
/// `BearerAuth`.
pub async fn current_claims(claims: web::ReqData<Claims>) -> HttpResponse {
    let claims: Vec<Claim> = claims.iter().cloned().collect();
    HttpResponse::Ok().json(claims)
}

/// DELETE /api/refresh-tokens/{id}
///
/// # Errors
/// - 400: Id is not a UUID
/// - 401: No record with this id
/// - 503: Refresh token store unavailable
pub async fn revoke(
    path: web::Path<Uuid>,
    manager: web::Data<RefreshTokenManager>,
) -> Result<HttpResponse, AuthError> {
    let context = ErrorContext::new("token_revoke");
    let id = path.into_inner();

    manager.revoke(id).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    Ok(HttpResponse::NoContent().finish())
}

/// Maps unparsable JSON bodies to `MalformedRequest` so they share the
/// JSON error shape.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Rejected request body");
    AuthError::MalformedRequest(err.to_string()).into()
}

/// Maps unparsable path segments, such as a non-UUID refresh token id, to
/// `MalformedRequest`.
pub fn path_error_handler(err: PathError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected path parameter");
    AuthError::MalformedRequest(err.to_string()).into()
}
