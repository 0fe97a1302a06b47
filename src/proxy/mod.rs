//! Reverse-proxy handling strategy.
//!
//! [`ProxyStrategy::forward`] checks the method allow-list, rewrites the
//! request URL for the destination ([`rewrite`]), rebuilds the headers
//! ([`headers`]), and streams the upstream response back as it arrives.
//! A failed upstream call is a 502 and is never retried.

pub mod headers;
pub mod rewrite;

use std::net::IpAddr;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::config::model::ProxyConfig;
use crate::error::{FrontdoorError, ValidationError};
use crate::response::method_not_allowed;
use crate::server::HttpClient;
use rewrite::ProxyRewrite;

#[derive(Debug, Clone)]
pub struct ProxyStrategy {
    destination: Url,
    path_prefix: String,
    strip_prefix: String,
    methods: Vec<Method>,
    gzip: bool,
}

impl ProxyStrategy {
    pub fn new(
        destination: &str,
        strip_prefix: &str,
        methods: Vec<Method>,
        gzip: bool,
    ) -> Result<Self, FrontdoorError> {
        let url = Url::parse(destination).map_err(|source| FrontdoorError::InvalidDestination {
            url: destination.to_string(),
            source,
        })?;
        Ok(Self {
            path_prefix: rewrite::destination_path(destination, &url),
            destination: url,
            strip_prefix: strip_prefix.to_string(),
            methods,
            gzip,
        })
    }

    /// Build from a route's proxy block. Any method that is not a valid
    /// HTTP token fails the whole route rather than widening the allow-list.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, FrontdoorError> {
        let mut methods = Vec::with_capacity(config.methods.len());
        let mut errors = Vec::new();
        for m in &config.methods {
            match Method::from_bytes(m.as_bytes()) {
                Ok(method) => methods.push(method),
                Err(_) => errors.push(ValidationError {
                    route: config.to.clone(),
                    field: "proxy.methods".into(),
                    message: format!("'{m}' is not a valid HTTP method"),
                    suggestion: None,
                }),
            }
        }
        if !errors.is_empty() {
            return Err(FrontdoorError::ConfigValidation { errors });
        }
        Self::new(&config.to, &config.strip_prefix, methods, config.gzip)
    }

    #[must_use]
    pub fn destination(&self) -> &Url {
        &self.destination
    }

    /// Whether responses on this route go through the gzip layer.
    #[must_use]
    pub const fn gzip(&self) -> bool {
        self.gzip
    }

    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    #[must_use]
    pub fn rewrite(&self, uri: &Uri) -> ProxyRewrite {
        rewrite::rewrite(
            &self.destination,
            &self.path_prefix,
            &self.strip_prefix,
            uri.path(),
            uri.query().unwrap_or_default(),
        )
    }

    pub async fn forward(&self, client: &HttpClient, client_ip: IpAddr, req: Request) -> Response {
        if !self.allows(req.method()) {
            return method_not_allowed();
        }

        let target = self.rewrite(req.uri());
        let uri = match target.to_uri() {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(upstream = %target, error = %e, "rewritten upstream URL is invalid");
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };

        let (parts, body) = req.into_parts();
        let mut builder = axum::http::Request::builder().method(parts.method).uri(uri);
        if let Some(h) = builder.headers_mut() {
            *h = headers::build_forwarded_headers(&parts.headers, client_ip, &target.authority);
        }
        let outbound = match builder.body(body) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(upstream = %target, error = %e, "failed to build upstream request");
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };

        match client.request(outbound).await {
            Ok(upstream) => {
                tracing::debug!(upstream = %target, status = upstream.status().as_u16(), "upstream responded");
                let (mut parts, body) = upstream.into_parts();
                headers::strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::warn!(upstream = %target, error = %e, "upstream request failed");
                StatusCode::BAD_GATEWAY.into_response()
            }
        }
    }
}
