mod refresh;

use actix_web::HttpResponse;

pub use refresh::{current_claims, json_error_handler, path_error_handler, refresh, revoke};

/// GET /health_check
///
/// Liveness only; the store is not probed.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
