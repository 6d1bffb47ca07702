// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `sourceMappingURL` discovery and inline map decoding.
//!
//! Rewritten JavaScript may carry a pointer to the map of the code it was
//! produced from. The pointer is either a `data:` URL holding the map itself or
//! a (usually relative) URL that has to be fetched.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;

use crate::error::InlineMapError;
use crate::types::SourceMap;

const DIRECTIVES: [&str; 2] = ["# sourceMappingURL=", "@ sourceMappingURL="];

/// The value of a `sourceMappingURL` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapReference(String);

impl MapReference {
	pub fn new(reference: impl Into<String>) -> Self {
		Self(reference.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Inline references embed the map and never need network I/O.
	pub fn is_inline(&self) -> bool {
		self.0
			.get(..5)
			.is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
	}
}

/// Find the last `sourceMappingURL` directive in `js`.
///
/// Both `//# ...` and the legacy `//@ ...` forms are accepted, as line comments
/// or as single-line block comments. Only trailing directives are meaningful to
/// browsers, so the scan starts from the end of the text.
pub fn locate_source_mapping_url(js: &str) -> Option<MapReference> {
	for line in js.lines().rev() {
		let line = line.trim();
		let body = if let Some(rest) = line.strip_prefix("//") {
			rest
		} else if let Some(rest) = line.strip_prefix("/*") {
			rest.trim_end().strip_suffix("*/").unwrap_or(rest)
		} else {
			continue;
		};

		let body = body.trim_start();
		for directive in DIRECTIVES {
			if let Some(value) = body.strip_prefix(directive) {
				let value = value.split_whitespace().next().unwrap_or("");
				if value.is_empty() {
					return None;
				}
				return Some(MapReference::new(value));
			}
		}
	}
	None
}

/// Decode a `data:` URL into a source map.
///
/// Supports `;base64` payloads (padded or not) and plain JSON payloads.
pub fn decode_data_url(reference: &MapReference) -> Result<SourceMap, InlineMapError> {
	if !reference.is_inline() {
		return Err(InlineMapError::NotDataUrl);
	}

	let rest = &reference.as_str()[5..];
	let (meta, payload) = rest.split_once(',').ok_or(InlineMapError::MissingPayload)?;

	let is_base64 = meta
		.rsplit(';')
		.next()
		.is_some_and(|p| p.eq_ignore_ascii_case("base64"));

	let bytes = if is_base64 {
		let payload = payload.trim();
		match STANDARD.decode(payload) {
			Ok(bytes) => bytes,
			Err(_) => STANDARD_NO_PAD.decode(payload.trim_end_matches('='))?,
		}
	} else {
		payload.as_bytes().to_vec()
	};

	Ok(SourceMap::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn inline_js(map_json: &str) -> String {
		format!(
			"var a = 1;\n//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}\n",
			STANDARD.encode(map_json)
		)
	}

	#[test]
	fn locates_url_reference() {
		let js = "console.log(1);\n//# sourceMappingURL=app.js.map\n";
		let reference = locate_source_mapping_url(js).unwrap();
		assert_eq!(reference.as_str(), "app.js.map");
		assert!(!reference.is_inline());
	}

	#[test]
	fn locates_legacy_and_block_forms() {
		let legacy = "x();\n//@ sourceMappingURL=old.map";
		assert_eq!(
			locate_source_mapping_url(legacy).unwrap().as_str(),
			"old.map"
		);

		let block = "x();\n/*# sourceMappingURL=block.map */";
		assert_eq!(
			locate_source_mapping_url(block).unwrap().as_str(),
			"block.map"
		);
	}

	#[test]
	fn last_directive_wins() {
		let js = "//# sourceMappingURL=first.map\nfoo();\n//# sourceMappingURL=second.map\n";
		assert_eq!(
			locate_source_mapping_url(js).unwrap().as_str(),
			"second.map"
		);
	}

	#[test]
	fn no_directive() {
		assert!(locate_source_mapping_url("let x = 1; // just a comment").is_none());
		assert!(locate_source_mapping_url("").is_none());
	}

	#[test]
	fn empty_directive_is_ignored() {
		assert!(locate_source_mapping_url("//# sourceMappingURL=\n").is_none());
	}

	#[test]
	fn decodes_base64_inline_map() {
		let js = inline_js(r#"{"version":3,"sources":["a.ts"],"mappings":"AAAA"}"#);
		let reference = locate_source_mapping_url(&js).unwrap();
		assert!(reference.is_inline());

		let map = decode_data_url(&reference).unwrap();
		assert_eq!(map.as_value()["sources"][0], "a.ts");
	}

	#[test]
	fn decodes_unpadded_base64() {
		let encoded = STANDARD_NO_PAD.encode(r#"{"version":3}"#);
		let reference = MapReference::new(format!("data:application/json;base64,{encoded}"));
		let map = decode_data_url(&reference).unwrap();
		assert_eq!(map.as_value()["version"], 3);
	}

	#[test]
	fn decodes_plain_json_payload() {
		let reference = MapReference::new(r#"data:application/json,{"version":3}"#);
		let map = decode_data_url(&reference).unwrap();
		assert_eq!(map.as_value()["version"], 3);
	}

	#[test]
	fn scheme_is_case_insensitive() {
		assert!(MapReference::new("DATA:application/json;base64,e30=").is_inline());
	}

	#[test]
	fn rejects_bad_payloads() {
		assert!(matches!(
			decode_data_url(&MapReference::new("app.js.map")),
			Err(InlineMapError::NotDataUrl)
		));
		assert!(matches!(
			decode_data_url(&MapReference::new("data:application/json;base64")),
			Err(InlineMapError::MissingPayload)
		));
		assert!(matches!(
			decode_data_url(&MapReference::new("data:application/json;base64,!!!")),
			Err(InlineMapError::Base64(_))
		));
		let not_json = format!("data:application/json;base64,{}", STANDARD.encode("nope"));
		assert!(matches!(
			decode_data_url(&MapReference::new(not_json)),
			Err(InlineMapError::Json(_))
		));
	}
}

#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn locates_any_trailing_reference(
			code in "[a-z ;=()0-9]{0,40}",
			target in "[a-zA-Z0-9_./-]{1,30}",
		) {
			let js = format!("{code}\n//# sourceMappingURL={target}\n");
			let reference = locate_source_mapping_url(&js).unwrap();
			prop_assert_eq!(reference.as_str(), target.as_str());
		}

		#[test]
		fn inline_payload_survives_encoding(file in "[a-z]{1,12}\\.js") {
			let json = serde_json::json!({"version": 3, "file": file}).to_string();
			let reference = MapReference::new(format!(
				"data:application/json;base64,{}",
				STANDARD.encode(&json)
			));
			let map = decode_data_url(&reference).unwrap();
			prop_assert_eq!(map.as_value()["file"].as_str(), Some(file.as_str()));
		}
	}
}
