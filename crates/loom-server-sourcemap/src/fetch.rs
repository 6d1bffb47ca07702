// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Downloading user-hosted source maps.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName};
use reqwest::{Client, ClientBuilder};
use tracing::debug;
use url::Url;

use crate::config::SourceMapConfig;
use crate::error::FetchError;

/// Headers that describe the debugger's connection to the proxy rather than
/// the request itself, plus ones reqwest computes on its own.
static NON_FORWARDED_HEADERS: [HeaderName; 11] = [
	header::CONNECTION,
	header::HOST,
	header::CONTENT_LENGTH,
	header::TRANSFER_ENCODING,
	header::TE,
	header::TRAILER,
	header::UPGRADE,
	header::PROXY_AUTHORIZATION,
	header::PROXY_AUTHENTICATE,
	header::ACCEPT_ENCODING,
	header::CONTENT_TYPE,
];

/// A request for a user source map.
#[derive(Debug, Clone)]
pub struct FetchRequest {
	pub url: Url,
	pub headers: HeaderMap,
	pub timeout: Duration,
}

/// A successful (2xx) source map download.
#[derive(Debug, Clone)]
pub struct FetchResponse {
	pub status: u16,
	pub body: Bytes,
}

/// Fetch collaborator used when a map reference is not inline.
#[async_trait]
pub trait SourceMapFetcher: Send + Sync + 'static {
	async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Type alias for a shared fetcher.
pub type SharedFetcher = Arc<dyn SourceMapFetcher>;

/// [`SourceMapFetcher`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpSourceMapFetcher {
	client: Client,
}

impl HttpSourceMapFetcher {
	/// Creates a fetcher with the standard Loom User-Agent header.
	pub fn new() -> Result<Self, FetchError> {
		Ok(Self::with_client(builder().build()?))
	}

	/// Creates a fetcher honoring the configured User-Agent override.
	pub fn from_config(config: &SourceMapConfig) -> Result<Self, FetchError> {
		let builder = match &config.user_agent {
			Some(ua) => builder_with_user_agent(ua.clone()),
			None => builder(),
		};
		Ok(Self::with_client(builder.build()?))
	}

	/// Wraps an existing client, e.g. one shared with the rest of the proxy.
	pub fn with_client(client: Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl SourceMapFetcher for HttpSourceMapFetcher {
	async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
		let timeout_ms = millis(request.timeout);
		debug!(url = %request.url, timeout_ms, "fetching source map");

		let response = self
			.client
			.get(request.url)
			.headers(forwardable_headers(&request.headers))
			.timeout(request.timeout)
			.send()
			.await
			.map_err(|e| classify(e, timeout_ms))?;

		let status = response.status();
		if !status.is_success() {
			return Err(FetchError::Status(status.as_u16()));
		}

		let body = response
			.bytes()
			.await
			.map_err(|e| classify(e, timeout_ms))?;
		Ok(FetchResponse {
			status: status.as_u16(),
			body,
		})
	}
}

/// Whole milliseconds in `timeout`, saturating at `u64::MAX`.
fn millis(timeout: Duration) -> u64 {
	u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

fn classify(error: reqwest::Error, timeout_ms: u64) -> FetchError {
	if error.is_timeout() {
		FetchError::Timeout(timeout_ms)
	} else {
		FetchError::Request(error)
	}
}

/// Copy the caller's headers minus the ones that must not cross the proxy.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
	let mut forwarded = headers.clone();
	for name in &NON_FORWARDED_HEADERS {
		forwarded.remove(name);
	}
	forwarded
}

/// Creates a client builder with the standard Loom User-Agent header.
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a client builder with a custom User-Agent header.
pub fn builder_with_user_agent(user_agent: impl Into<String>) -> ClientBuilder {
	Client::builder().user_agent(user_agent.into())
}

/// Returns the standard User-Agent for source map downloads.
///
/// Format: `loom-sourcemap/{version}`
pub fn user_agent() -> String {
	format!("loom-sourcemap/{}", env!("CARGO_PKG_VERSION"))
}
