use crate::error::AppError;
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use std::any::Any;
use std::future::{Ready, ready};
use std::panic::AssertUnwindSafe;

/// Turns a panicking handler into a 500 response so the worker keeps serving.
///
/// The request is handed to the inner service untouched; cloning the
/// `HttpRequest` here would break the router's exclusive access to it.
pub struct PanicGuard;

impl<S, B> Transform<S, ServiceRequest> for PanicGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = PanicGuardService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PanicGuardService { service }))
    }
}

pub struct PanicGuardService<S> {
    service: S,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl<S, B> Service<ServiceRequest> for PanicGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().clone();
        let path = req.path().to_string();
        let fut = self.service.call(req);

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => {
                    log::error!(
                        "Panic while handling {method} {path}: {}",
                        panic_message(payload.as_ref())
                    );
                    // rendered through AppError's ResponseError impl
                    Err(AppError::InternalError("handler panicked".to_string()).into())
                }
            }
        })
    }
}
