// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for deferred source map operations.

use thiserror::Error;

use crate::types::DeferralId;

/// Errors surfaced by [`crate::DeferredSourceMapStore`].
///
/// Apart from runtime shutdown, every variant is a contract violation or a
/// rewriter failure. Network and decode failures while looking up a
/// user-supplied map never show up here.
#[derive(Debug, Error)]
pub enum SourceMapError {
	#[error("deferral identifier already issued: {0}")]
	DuplicateIdentifier(DeferralId),

	#[error("deferral {0} has neither rewritten source nor a resolved source map")]
	MissingSource(DeferralId),

	#[error("failed to compose source map for {url}: {source}")]
	Compose {
		url: String,
		#[source]
		source: ComposeError,
	},

	/// The runtime shut down before the reconstruction task finished.
	#[error("reconstruction of deferral {0} was cancelled")]
	Cancelled(DeferralId),
}

/// Failure reported by the rewriter while composing the final map.
#[derive(Debug, Error)]
pub enum ComposeError {
	#[error("invalid input source map: {0}")]
	InvalidInputMap(String),

	#[error("transform failed: {0}")]
	Transform(String),

	#[error("failed to serialize source map: {0}")]
	Serialize(#[from] serde_json::Error),
}

/// Failure while fetching a user-hosted source map.
#[derive(Debug, Error)]
pub enum FetchError {
	#[error("invalid source map URL '{reference}': {source}")]
	InvalidUrl {
		reference: String,
		#[source]
		source: url::ParseError,
	},

	#[error("source map fetch timed out after {0} ms")]
	Timeout(u64),

	#[error("source map request failed: {0}")]
	Request(#[from] reqwest::Error),

	#[error("source map server returned status {0}")]
	Status(u16),

	#[error("source map body is not valid JSON: {0}")]
	Decode(#[from] serde_json::Error),
}

/// Failure while decoding an inline `data:` source map reference.
#[derive(Debug, Error)]
pub enum InlineMapError {
	#[error("reference is not a data URL")]
	NotDataUrl,

	#[error("data URL has no payload separator")]
	MissingPayload,

	#[error("invalid base64 payload: {0}")]
	Base64(#[from] base64::DecodeError),

	#[error("inline source map is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),
}

/// Errors from loading source map configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// A value was present but could not be parsed or is out of range.
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, SourceMapError>;
