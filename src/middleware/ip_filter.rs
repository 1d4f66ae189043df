use std::net::IpAddr;
use std::task::{Context, Poll};

use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use crate::config::{AllowedIps, ForwardedFor};
use crate::error::AppError;
use crate::middleware::client_ip::resolve_client_ip;

/// Restricts a route to the configured allow-list. An empty list lets every caller through.
#[derive(Clone, Debug)]
pub struct IpFilterLayer {
    allowed_ips: AllowedIps,
    forwarded_for: ForwardedFor,
}

impl IpFilterLayer {
    pub fn new(allowed_ips: AllowedIps, forwarded_for: ForwardedFor) -> Self {
        Self {
            allowed_ips,
            forwarded_for,
        }
    }
}

impl<S> Layer<S> for IpFilterLayer {
    type Service = IpFilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IpFilterService {
            inner,
            allowed_ips: self.allowed_ips.clone(),
            forwarded_for: self.forwarded_for,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IpFilterService<S> {
    inner: S,
    allowed_ips: AllowedIps,
    forwarded_for: ForwardedFor,
}

impl<S, B> Service<Request<B>> for IpFilterService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = futures_util::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let client_ip = resolve_client_ip(req.headers(), req.extensions(), self.forwarded_for);

        if !is_allowed(&client_ip, &self.allowed_ips) {
            tracing::warn!(client_ip = %client_ip, "blocked callback request from non-whitelisted IP");
            let response = AppError::Forbidden.into_response();
            return Box::pin(async move { Ok(response) });
        }

        // Drive the instance that was polled ready, leave the fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await })
    }
}

pub fn is_allowed(client_ip: &str, allowed_ips: &AllowedIps) -> bool {
    match allowed_ips {
        AllowedIps::Any => true,
        AllowedIps::Cidrs(cidrs) => client_ip
            .parse::<IpAddr>()
            .map(|ip| cidrs.iter().any(|cidr| cidr.contains(&ip)))
            .unwrap_or(false),
    }
}
