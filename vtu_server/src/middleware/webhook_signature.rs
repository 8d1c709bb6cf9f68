//! Webhook signature validation.
//!
//! Wraps a webhook resource and rejects any request whose body does not carry a valid signature for the
//! configured scheme. The body has to be read in full to validate it, so the middleware buffers the payload and
//! puts it back before handing the request to the route handler.
//!
//! Rejections are a bare 401 with no body. A signature failure is either a misconfiguration or an attack, and
//! neither deserves diagnostics.
use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{self, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    web,
    Error,
    FromRequest,
};
use futures::future::{ok, Ready};
use log::*;
use vtu_common::Secret;

use crate::helpers::{constant_time_eq, hmac_sha512_matches};

/// How a gateway signs its webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// Hex HMAC-SHA512 of the raw body, keyed with the shared secret. Paystack (`x-paystack-signature`) and
    /// Monnify (`monnify-signature`) both use this.
    HmacSha512 { header: &'static str },
    /// A static shared token sent verbatim with every request. Flutterwave's `verif-hash`.
    StaticToken { header: &'static str },
}

impl SignatureScheme {
    fn header(&self) -> &'static str {
        match self {
            Self::HmacSha512 { header } | Self::StaticToken { header } => header,
        }
    }
}

pub struct WebhookSignatureFactory {
    scheme: SignatureScheme,
    secret: Secret,
    skip: bool,
}

impl WebhookSignatureFactory {
    pub fn new(scheme: SignatureScheme, secret: Secret, skip: bool) -> Self {
        Self { scheme, secret, skip }
    }
}

impl<S> Transform<S, ServiceRequest> for WebhookSignatureFactory
where S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse;
    type Transform = WebhookSignatureMiddleware<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(WebhookSignatureMiddleware {
            service: Rc::new(service),
            scheme: self.scheme,
            secret: self.secret.clone(),
            skip: self.skip,
        })
    }
}

pub struct WebhookSignatureMiddleware<S> {
    service: Rc<S>,
    scheme: SignatureScheme,
    secret: Secret,
    skip: bool,
}

impl<S> Service<ServiceRequest> for WebhookSignatureMiddleware<S>
where S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse;

    dev::forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let scheme = self.scheme;
        let secret = self.secret.clone();
        let skip = self.skip;
        Box::pin(async move {
            if skip {
                warn!("📬️ Webhook signature check skipped for {}", req.path());
                return service.call(req).await;
            }
            if !secret.is_set() {
                error!("📬️ No signing secret configured for {}. Rejecting the webhook.", req.path());
                return Err(ErrorUnauthorized(""));
            }
            let header = req
                .headers()
                .get(scheme.header())
                .and_then(|v| v.to_str().ok())
                .map(String::from)
                .ok_or_else(|| {
                    debug!("📬️ Webhook on {} is missing the {} header", req.path(), scheme.header());
                    ErrorUnauthorized("")
                })?;
            let (http_req, mut payload) = req.into_parts();
            let body = web::Bytes::from_request(&http_req, &mut payload).await?;
            let valid = match scheme {
                SignatureScheme::HmacSha512 { .. } => hmac_sha512_matches(secret.reveal(), &body, &header),
                SignatureScheme::StaticToken { .. } => {
                    constant_time_eq(secret.reveal().as_bytes(), header.as_bytes())
                },
            };
            if !valid {
                warn!("📬️ Webhook on {} carried an invalid signature. Rejecting.", http_req.path());
                return Err(ErrorUnauthorized(""));
            }
            let mut req = ServiceRequest::from_parts(http_req, dev::Payload::None);
            req.set_payload(bytes_to_payload(body));
            service.call(req).await
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> dev::Payload {
    let (_, mut pl) = actix_http::h1::Payload::create(true);
    pl.unread_data(buf);
    dev::Payload::from(pl)
}
