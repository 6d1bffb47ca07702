// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types shared by the store and its collaborators.

use std::fmt;
use std::sync::Arc;

use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Caller-assigned identifier for a deferral.
///
/// The proxy embeds this token in the rewritten output so a later source map
/// request can be routed back to the right record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeferralId(String);

impl DeferralId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}

impl fmt::Display for DeferralId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for DeferralId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for DeferralId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl AsRef<str> for DeferralId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// An opaque source map payload.
///
/// The store never looks inside; it only hands the value between collaborators.
/// Clones share the same allocation, so a cached map is returned without copying.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceMap(Arc<serde_json::Value>);

impl SourceMap {
	pub fn new(value: serde_json::Value) -> Self {
		Self(Arc::new(value))
	}

	/// Parse a map from raw JSON bytes.
	pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
		serde_json::from_slice(data).map(Self::new)
	}

	pub fn as_value(&self) -> &serde_json::Value {
		&self.0
	}

	/// Returns true if both handles point at the same materialized payload.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}

	pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(&*self.0)
	}
}

impl PartialEq for SourceMap {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other) || self.0 == other.0
	}
}

impl From<serde_json::Value> for SourceMap {
	fn from(value: serde_json::Value) -> Self {
		Self::new(value)
	}
}

/// Request-scoped data forwarded to the fetcher when a user map has to be
/// downloaded, typically the headers of the debugger's map request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
	pub headers: HeaderMap,
}

impl RequestContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_headers(headers: HeaderMap) -> Self {
		Self { headers }
	}
}

/// A candidate record handed to [`crate::DeferredSourceMapStore::defer`].
///
/// A well-formed deferral carries either `rewritten_js` or a
/// `resolved_source_map`. One carrying neither is accepted but fails with
/// [`crate::SourceMapError::MissingSource`] when resolved.
#[derive(Debug, Clone)]
pub struct Deferral {
	pub id: DeferralId,
	pub url: String,
	pub rewritten_js: Option<Arc<str>>,
	pub resolved_source_map: Option<SourceMap>,
}

impl Deferral {
	/// A deferral carrying rewritten JavaScript whose map is built on first
	/// resolution.
	pub fn rewritten(
		id: impl Into<DeferralId>,
		url: impl Into<String>,
		rewritten_js: impl Into<Arc<str>>,
	) -> Self {
		Self {
			id: id.into(),
			url: url.into(),
			rewritten_js: Some(rewritten_js.into()),
			resolved_source_map: None,
		}
	}

	/// A deferral whose map is already materialized.
	pub fn resolved(id: impl Into<DeferralId>, url: impl Into<String>, map: SourceMap) -> Self {
		Self {
			id: id.into(),
			url: url.into(),
			rewritten_js: None,
			resolved_source_map: Some(map),
		}
	}
}

/// Point-in-time view of a held record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferralSnapshot {
	pub id: DeferralId,
	pub url: String,
	/// Whether the rewritten JavaScript is still held.
	pub retains_source: bool,
	/// Whether the composed map has been materialized.
	pub is_resolved: bool,
}
