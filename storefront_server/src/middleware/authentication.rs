//! Access token middleware.
//!
//! Wrap any scope that needs a signed-in user with this middleware. It reads the access token from the
//! `sf_access_token` header, verifies the JWT against the shared auth secret and stores the resulting [`AccessClaims`] in
//! the request extensions, where the [`AclMiddlewareFactory`](super::AclMiddlewareFactory) and the handlers find them.
//!
//! Requests without a valid token never reach the wrapped service and get a 401.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use sf_common::Secret;

use crate::{
    auth::TokenIssuer,
    errors::{AuthError, ServerError},
};

pub const ACCESS_TOKEN_HEADER: &str = "sf_access_token";

pub struct AuthenticationMiddlewareFactory {
    verifier: TokenIssuer,
}

impl AuthenticationMiddlewareFactory {
    pub fn new(secret: Secret<String>) -> Self {
        AuthenticationMiddlewareFactory { verifier: TokenIssuer::from_secret(&secret) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthenticationMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AuthenticationMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddlewareService { verifier: self.verifier.clone(), service: Rc::new(service) }))
    }
}

pub struct AuthenticationMiddlewareService<S> {
    verifier: TokenIssuer,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let verifier = self.verifier.clone();
        Box::pin(async move {
            trace!("🔐️ Checking access token for {}", req.path());
            let token = req
                .headers()
                .get(ACCESS_TOKEN_HEADER)
                .ok_or(AuthError::MissingToken)
                .and_then(|v| v.to_str().map_err(|e| AuthError::PoorlyFormattedToken(e.to_string())))
                .map_err(ServerError::from)?;
            let claims = verifier.verify_token(token).map_err(|e| {
                warn!("🔐️ Rejected access token for {}. {e}", req.path());
                ServerError::from(e)
            })?;
            trace!("🔐️ Access token for user #{} ✅️", claims.user_id);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
