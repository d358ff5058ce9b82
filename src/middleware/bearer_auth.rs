/// Bearer Authentication Middleware
///
/// Validates the access token from the Authorization header and injects
/// the recovered `Claims` into request extensions for route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{validate_access_token, SigningContext};
use crate::error::AuthError;

const BEARER_PREFIX: &str = "Bearer ";

/// Rejects requests without a valid, unexpired access token.
pub struct BearerAuth {
    context: Arc<SigningContext>,
}

impl BearerAuth {
    pub fn new(context: Arc<SigningContext>) -> Self {
        Self { context }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = BearerAuthService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(BearerAuthService {
            service: Rc::new(service),
            context: Arc::clone(&self.context),
        }))
    }
}

pub struct BearerAuthService<S> {
    service: Rc<S>,
    context: Arc<SigningContext>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let Some(token) = token else {
            tracing::warn!(path = %req.path(), "Missing or invalid Authorization header");
            let err: Error = AuthError::MissingBearerToken.into();
            return Box::pin(async move { Err::<ServiceResponse<B>, Error>(err) });
        };

        match validate_access_token(&token, &self.context, false) {
            Ok(claims) => {
                tracing::debug!(
                    subject = claims.get("sub").unwrap_or("<none>"),
                    claim_count = claims.len(),
                    "Access token validated"
                );
                req.extensions_mut().insert(claims);

                let service = Rc::clone(&self.service);
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => {
                tracing::warn!(path = %req.path(), error = %e, "Access token rejected");
                let err: Error = e.into();
                Box::pin(async move { Err::<ServiceResponse<B>, Error>(err) })
            }
        }
    }
}
