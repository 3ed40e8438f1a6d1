//! Actix middleware that puts a payment gate in front of an `App`.
//!
//! Requests that match no configured route pass straight through. Matched
//! requests go through [`require_payment`]; the wrapped handler runs only
//! after the facilitator has settled, and its response carries the
//! `X-PAYMENT-RESPONSE` receipt.

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue, ACCESS_CONTROL_EXPOSE_HEADERS};
use actix_web::{Error, ResponseError};
use futures::future::LocalBoxFuture;
use x402::{SchemeFacilitator, SettleResponse, PAYMENT_RESPONSE_HEADER};

use crate::config::PaymentConfig;
use crate::metrics;
use crate::middleware::{check_payment_gate, payment_response_header, require_payment};

/// `App::wrap` target holding the route table and the facilitator.
pub struct PaymentGate<F> {
    config: Arc<PaymentConfig>,
    facilitator: Arc<F>,
}

impl<F> Clone for PaymentGate<F> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            facilitator: Arc::clone(&self.facilitator),
        }
    }
}

impl<F: SchemeFacilitator> PaymentGate<F> {
    pub fn new(config: PaymentConfig, facilitator: F) -> Self {
        Self::shared(Arc::new(config), Arc::new(facilitator))
    }

    /// Build from already shared parts, e.g. once per `HttpServer` worker.
    pub fn shared(config: Arc<PaymentConfig>, facilitator: Arc<F>) -> Self {
        Self {
            config,
            facilitator,
        }
    }
}

impl<S, B, F> Transform<S, ServiceRequest> for PaymentGate<F>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    F: SchemeFacilitator + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = PaymentGateMiddleware<S, F>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PaymentGateMiddleware {
            service: Rc::new(service),
            config: Arc::clone(&self.config),
            facilitator: Arc::clone(&self.facilitator),
        }))
    }
}

pub struct PaymentGateMiddleware<S, F> {
    service: Rc<S>,
    config: Arc<PaymentConfig>,
    facilitator: Arc<F>,
}

impl<S, B, F> Service<ServiceRequest> for PaymentGateMiddleware<S, F>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    F: SchemeFacilitator + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let config = Arc::clone(&self.config);
        let facilitator = Arc::clone(&self.facilitator);

        Box::pin(async move {
            let Some(route) = check_payment_gate(req.request(), &config) else {
                return service
                    .call(req)
                    .await
                    .map(ServiceResponse::map_into_left_body);
            };
            let endpoint = route.pattern.as_str();

            // The borrow of `req` must end before the inner service takes it.
            let outcome =
                require_payment(req.request(), route, &config, facilitator.as_ref()).await;

            match outcome {
                Ok(settlement) => {
                    let mut res = service.call(req).await?;
                    if !res.status().is_success() {
                        tracing::warn!(
                            status = res.status().as_u16(),
                            route = endpoint,
                            "handler failed after settlement"
                        );
                    }
                    attach_receipt(&mut res, &settlement);
                    metrics::record(endpoint, res.status().as_u16(), Ok(()));
                    Ok(res.map_into_left_body())
                }
                Err(err) => {
                    let response = err.error_response();
                    metrics::record(endpoint, response.status().as_u16(), Err(&err));
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

fn attach_receipt<B>(res: &mut ServiceResponse<B>, settlement: &SettleResponse) {
    let value = payment_response_header(settlement)
        .map_err(|e| e.to_string())
        .and_then(|v| HeaderValue::from_str(&v).map_err(|e| e.to_string()));
    match value {
        Ok(value) => {
            let headers = res.headers_mut();
            headers.insert(HeaderName::from_static("x-payment-response"), value);
            headers.insert(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(PAYMENT_RESPONSE_HEADER),
            );
        }
        Err(e) => tracing::error!(error = %e, "failed to encode settlement receipt"),
    }
}
