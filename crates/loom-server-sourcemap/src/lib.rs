// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deferred source maps for the Loom rewriting proxy.
//!
//! Every script the proxy rewrites could get a source map, but debuggers rarely
//! ask for one. Instead of composing maps eagerly, the proxy records the
//! rewritten text with [`DeferredSourceMapStore::defer`] and builds the map only
//! when [`DeferredSourceMapStore::resolve`] is called for it.
//!
//! This crate provides:
//! - The [`DeferredSourceMapStore`], keeping one live record per URL
//! - `sourceMappingURL` discovery and inline `data:` map decoding
//! - A reqwest-based [`HttpSourceMapFetcher`] for user-hosted maps
//! - Layered [`SourceMapConfig`] with `LOOM_SERVER_SOURCEMAP_*` overrides
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use loom_server_sourcemap::{
//!     Deferral, DeferredSourceMapStore, RequestContext, SourceMapConfig,
//! };
//!
//! let store = DeferredSourceMapStore::with_http_fetcher(
//!     Arc::new(MyRewriter::new()),
//!     SourceMapConfig::from_env()?,
//! )?;
//!
//! // When rewriting a script:
//! let id = store.defer(Deferral::rewritten(next_id(), url, rewritten_js))?;
//!
//! // When the debugger requests the map:
//! if let Some(map) = store.resolve(&id, &RequestContext::with_headers(headers)).await? {
//!     respond_json(map.as_value());
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod reference;
pub mod rewriter;
pub mod stats;
pub mod store;
pub mod types;

pub use config::{SourceMapConfig, SourceMapConfigLayer, DEFAULT_FETCH_TIMEOUT_MS};
pub use error::{ComposeError, ConfigError, FetchError, InlineMapError, Result, SourceMapError};
pub use fetch::{
	FetchRequest, FetchResponse, HttpSourceMapFetcher, SharedFetcher, SourceMapFetcher,
};
pub use reference::{decode_data_url, locate_source_mapping_url, MapReference};
pub use rewriter::{SharedRewriter, SourceMapRewriter};
pub use stats::StoreStats;
pub use store::DeferredSourceMapStore;
pub use types::{Deferral, DeferralId, DeferralSnapshot, RequestContext, SourceMap};
