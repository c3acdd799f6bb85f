//! Downstream hop: forwards an (authorised) request to the configured upstream.
//!
//! Responsibility:
//! - Rewrite the target URL (upstream base + original path/query)
//! - Copy method, end-to-end headers and body
//! - Hand the upstream status/headers/body back unchanged
//!
//! Route selection is not done here: the gateway has exactly one upstream.

use std::{error::Error as StdError, time::Duration};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, Request, Uri, header},
    response::Response,
};
use http_body_util::LengthLimitError;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("failed to read upstream response: {0}")]
    ResponseBody(#[source] reqwest::Error),
}

// Connection-scoped headers that must not be forwarded in either direction.
static HOP_BY_HOP: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
    body_limit: usize,
}

impl UpstreamClient {
    pub fn new(base_url: Url, timeout: Duration, body_limit: usize) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(UpstreamError::Transport)?;

        Ok(Self {
            client,
            base_url,
            body_limit,
        })
    }

    /// Upstream URL for an inbound request URI: base path + request path, request query.
    pub fn target_url(&self, uri: &Uri) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        if url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidTarget(url.to_string()));
        }

        let path = format!("{}{}", url.path().trim_end_matches('/'), uri.path());
        url.set_path(&path);
        url.set_query(uri.query());
        Ok(url)
    }

    pub async fn forward(&self, req: Request<Body>) -> Result<Response, UpstreamError> {
        let (parts, body) = req.into_parts();
        let url = self.target_url(&parts.uri)?;

        let body = axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(|e| {
                if is_length_limit(&e) {
                    UpstreamError::PayloadTooLarge {
                        limit: self.body_limit,
                    }
                } else {
                    UpstreamError::RequestBody(e)
                }
            })?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        tracing::debug!(method = %parts.method, url = %url, "forwarding to upstream");

        let resp = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    UpstreamError::Transport(e)
                }
            })?;

        let status = resp.status();
        let mut headers = resp.headers().clone();
        strip_hop_by_hop(&mut headers);

        let bytes = resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::ResponseBody(e)
            }
        })?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

// The limit error may sit anywhere in the chain (our `to_bytes` or the
// tower-http body limit wrapping the inbound body).
fn is_length_limit(err: &axum::Error) -> bool {
    let err: &(dyn StdError + 'static) = err;
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers listed in `Connection` are scoped to this hop as well.
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }

    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}
