// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The seam between the store and the JavaScript rewriter.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::ComposeError;
use crate::reference::{decode_data_url, locate_source_mapping_url, MapReference};
use crate::types::SourceMap;

/// Rewriter operations the store needs to rebuild a map on demand.
///
/// Only [`compose_map`](SourceMapRewriter::compose_map) is required; reference
/// discovery and inline decoding default to the standard `sourceMappingURL`
/// conventions.
#[async_trait]
pub trait SourceMapRewriter: Send + Sync + 'static {
	/// Find the map reference embedded in rewritten JavaScript.
	fn locate_map_reference(&self, js: &str) -> Option<MapReference> {
		locate_source_mapping_url(js)
	}

	/// Decode an inline (`data:`) reference. Returns `None` if it can't be decoded.
	fn decode_inline_reference(&self, reference: &MapReference) -> Option<SourceMap> {
		match decode_data_url(reference) {
			Ok(map) => Some(map),
			Err(e) => {
				warn!(error = %e, "failed to decode inline source map");
				None
			}
		}
	}

	/// Build the final map for `url` from the rewritten text and the map of the
	/// code it was rewritten from, if one was found.
	async fn compose_map(
		&self,
		url: &str,
		js: &str,
		input_map: Option<SourceMap>,
	) -> Result<SourceMap, ComposeError>;
}

/// Type alias for a shared rewriter.
pub type SharedRewriter = Arc<dyn SourceMapRewriter>;

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	struct EchoRewriter;

	#[async_trait]
	impl SourceMapRewriter for EchoRewriter {
		async fn compose_map(
			&self,
			url: &str,
			_js: &str,
			input_map: Option<SourceMap>,
		) -> Result<SourceMap, ComposeError> {
			Ok(SourceMap::new(json!({
				"version": 3,
				"file": url,
				"hasInput": input_map.is_some(),
			})))
		}
	}

	#[test]
	fn default_locate_uses_directive() {
		let rewriter = EchoRewriter;
		let reference = rewriter
			.locate_map_reference("a();\n//# sourceMappingURL=a.js.map")
			.unwrap();
		assert_eq!(reference.as_str(), "a.js.map");
	}

	#[test]
	fn default_decode_swallows_errors() {
		let rewriter = EchoRewriter;
		let bad = MapReference::new("data:application/json;base64,%%%");
		assert!(rewriter.decode_inline_reference(&bad).is_none());
	}

	#[tokio::test]
	async fn compose_through_shared_handle() {
		let rewriter: SharedRewriter = Arc::new(EchoRewriter);
		let map = rewriter
			.compose_map("http://x/app.js", "a();", None)
			.await
			.unwrap();
		assert_eq!(map.as_value()["file"], "http://x/app.js");
		assert_eq!(map.as_value()["hasInput"], false);
	}
}
