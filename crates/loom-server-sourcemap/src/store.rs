// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The deferred source map store.
//!
//! The proxy calls [`DeferredSourceMapStore::defer`] for every script it
//! rewrites and [`DeferredSourceMapStore::resolve`] when a debugger asks for the
//! map. Only the newest deferral per URL is kept, and each map is built at most
//! once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn, Instrument};
use url::Url;

use crate::config::SourceMapConfig;
use crate::error::{FetchError, Result, SourceMapError};
use crate::fetch::{FetchRequest, HttpSourceMapFetcher, SharedFetcher};
use crate::reference::MapReference;
use crate::rewriter::SharedRewriter;
use crate::stats::{StoreCounters, StoreStats};
use crate::types::{Deferral, DeferralId, DeferralSnapshot, RequestContext, SourceMap};

/// A held deferral.
///
/// Shared via `Arc` so a reconstruction task keeps working on its record even
/// if the store drops it in the meantime.
struct Record {
	id: DeferralId,
	url: String,
	seq: u64,
	rewritten_js: Mutex<Option<Arc<str>>>,
	resolved: OnceCell<SourceMap>,
}

impl Record {
	fn new(deferral: Deferral, seq: u64) -> Self {
		let Deferral {
			id,
			url,
			rewritten_js,
			resolved_source_map,
		} = deferral;

		// A map that is already known makes the source text dead weight.
		let (rewritten_js, resolved) = match resolved_source_map {
			Some(map) => (None, OnceCell::from(map)),
			None => (rewritten_js, OnceCell::new()),
		};

		Self {
			id,
			url,
			seq,
			rewritten_js: Mutex::new(rewritten_js),
			resolved,
		}
	}

	fn snapshot(&self) -> DeferralSnapshot {
		DeferralSnapshot {
			id: self.id.clone(),
			url: self.url.clone(),
			retains_source: self.rewritten_js.lock().is_some(),
			is_resolved: self.resolved.initialized(),
		}
	}
}

#[derive(Default)]
struct StoreState {
	records: HashMap<DeferralId, Arc<Record>>,
	/// The live identifier for each URL.
	by_url: HashMap<String, DeferralId>,
	/// Insertion order of live records.
	order: BTreeMap<u64, DeferralId>,
	/// Every identifier handed to `defer` since the last reset. Superseded
	/// ids stay here so they can't be reused, which makes this grow until
	/// the next reset.
	issued: HashSet<DeferralId>,
	next_seq: u64,
}

impl StoreState {
	fn remove(&mut self, id: &DeferralId) -> Option<Arc<Record>> {
		let record = self.records.remove(id)?;
		self.order.remove(&record.seq);
		if self.by_url.get(&record.url) == Some(id) {
			self.by_url.remove(&record.url);
		}
		Some(record)
	}
}

struct StoreInner {
	state: Mutex<StoreState>,
	rewriter: SharedRewriter,
	fetcher: SharedFetcher,
	config: SourceMapConfig,
	counters: StoreCounters,
}

/// Lazily reconstructs source maps for rewritten scripts.
///
/// Cloning is cheap and every clone shares the same records.
#[derive(Clone)]
pub struct DeferredSourceMapStore {
	inner: Arc<StoreInner>,
}

impl DeferredSourceMapStore {
	/// Create a store with explicit collaborators.
	pub fn new(rewriter: SharedRewriter, fetcher: SharedFetcher, config: SourceMapConfig) -> Self {
		Self {
			inner: Arc::new(StoreInner {
				state: Mutex::new(StoreState::default()),
				rewriter,
				fetcher,
				config,
				counters: StoreCounters::default(),
			}),
		}
	}

	/// Create a store that downloads user maps over HTTP.
	pub fn with_http_fetcher(
		rewriter: SharedRewriter,
		config: SourceMapConfig,
	) -> std::result::Result<Self, FetchError> {
		let fetcher = HttpSourceMapFetcher::from_config(&config)?;
		Ok(Self::new(rewriter, Arc::new(fetcher), config))
	}

	/// Record a rewritten resource so its map can be built later.
	///
	/// Any record already held for the same URL is dropped first. Returns the
	/// deferral's identifier for the caller to embed downstream.
	///
	/// # Errors
	///
	/// [`SourceMapError::DuplicateIdentifier`] if the identifier was issued
	/// before, whether that record is still pending, resolved, or superseded.
	pub fn defer(&self, deferral: Deferral) -> Result<DeferralId> {
		let mut state = self.inner.state.lock();

		if state.issued.contains(&deferral.id) {
			return Err(SourceMapError::DuplicateIdentifier(deferral.id));
		}

		if let Some(previous) = state.by_url.get(&deferral.url).cloned() {
			if state.remove(&previous).is_some() {
				StoreCounters::incr(&self.inner.counters.superseded);
				debug!(
					previous = %previous,
					id = %deferral.id,
					url = %deferral.url,
					"superseded deferred source map"
				);
			}
		}

		let seq = state.next_seq;
		state.next_seq += 1;

		let record = Arc::new(Record::new(deferral, seq));
		let id = record.id.clone();

		state.issued.insert(id.clone());
		state.by_url.insert(record.url.clone(), id.clone());
		state.order.insert(seq, id.clone());
		state.records.insert(id.clone(), record);

		StoreCounters::incr(&self.inner.counters.deferred);
		debug!(id = %id, held = state.records.len(), "deferred source map");

		Ok(id)
	}

	/// Return the map for `id`, building it on first use.
	///
	/// `Ok(None)` means the store doesn't hold `id`: it was superseded, never
	/// deferred, or cleared by [`reset`](Self::reset). Concurrent calls for the
	/// same identifier share a single reconstruction.
	///
	/// The reconstruction runs on its own task, so dropping this future does
	/// not abandon the work: the map is still cached for the next caller.
	///
	/// # Errors
	///
	/// [`SourceMapError::MissingSource`] for a record with neither source nor
	/// map, [`SourceMapError::Compose`] if the rewriter fails, and
	/// [`SourceMapError::Cancelled`] if the runtime shuts down mid-way. Failing
	/// to fetch the user's own map is not an error.
	#[instrument(skip_all, fields(id = %id))]
	pub async fn resolve(
		&self,
		id: &DeferralId,
		context: &RequestContext,
	) -> Result<Option<SourceMap>> {
		let record = self.inner.state.lock().records.get(id).cloned();
		let Some(record) = record else {
			StoreCounters::incr(&self.inner.counters.misses);
			debug!("no deferred source map held");
			return Ok(None);
		};

		if let Some(map) = record.resolved.get() {
			StoreCounters::incr(&self.inner.counters.cache_hits);
			debug!("serving cached source map");
			return Ok(Some(map.clone()));
		}

		let store = self.clone();
		let context = context.clone();
		let task = tokio::spawn(
			async move {
				let map = record
					.resolved
					.get_or_try_init(|| store.reconstruct(&record, &context))
					.await
					.cloned();
				map
			}
			.in_current_span(),
		);

		match task.await {
			Ok(map) => map.map(Some),
			Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
			Err(_) => Err(SourceMapError::Cancelled(id.clone())),
		}
	}

	/// Drop every record and forget every issued identifier.
	///
	/// Resolutions already in flight still complete for their callers, but
	/// their maps are not reachable afterwards.
	pub fn reset(&self) {
		let mut state = self.inner.state.lock();
		let cleared = state.records.len();
		*state = StoreState::default();
		info!(cleared, "reset deferred source map store");
	}

	/// Number of live records.
	pub fn len(&self) -> usize {
		self.inner.state.lock().records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.state.lock().records.is_empty()
	}

	pub fn contains(&self, id: &DeferralId) -> bool {
		self.inner.state.lock().records.contains_key(id)
	}

	/// Live identifiers, oldest first.
	pub fn ids(&self) -> Vec<DeferralId> {
		self.inner.state.lock().order.values().cloned().collect()
	}

	/// The live identifier for `url`, if any.
	pub fn id_for_url(&self, url: &str) -> Option<DeferralId> {
		self.inner.state.lock().by_url.get(url).cloned()
	}

	pub fn snapshot(&self, id: &DeferralId) -> Option<DeferralSnapshot> {
		let record = self.inner.state.lock().records.get(id).cloned();
		record.map(|r| r.snapshot())
	}

	pub fn stats(&self) -> StoreStats {
		let issued = self.inner.state.lock().issued.len();
		StoreStats {
			issued_ids: u64::try_from(issued).unwrap_or(u64::MAX),
			..self.inner.counters.snapshot()
		}
	}

	pub fn config(&self) -> &SourceMapConfig {
		&self.inner.config
	}

	async fn reconstruct(&self, record: &Record, context: &RequestContext) -> Result<SourceMap> {
		let js = record
			.rewritten_js
			.lock()
			.clone()
			.ok_or_else(|| SourceMapError::MissingSource(record.id.clone()))?;

		let input_map = self.input_map(record, &js, context).await;
		let has_input = input_map.is_some();

		let map = self
			.inner
			.rewriter
			.compose_map(&record.url, &js, input_map)
			.await
			.map_err(|source| SourceMapError::Compose {
				url: record.url.clone(),
				source,
			})?;

		// Only the composed map is kept from here on.
		record.rewritten_js.lock().take();

		StoreCounters::incr(&self.inner.counters.resolved);
		debug!(url = %record.url, has_input, "composed source map");

		Ok(map)
	}

	/// Find the map of the code that was rewritten, if there is one to be had.
	async fn input_map(
		&self,
		record: &Record,
		js: &str,
		context: &RequestContext,
	) -> Option<SourceMap> {
		let rewriter = &self.inner.rewriter;
		let reference = rewriter.locate_map_reference(js)?;

		if reference.is_inline() {
			let map = rewriter.decode_inline_reference(&reference);
			if map.is_some() {
				StoreCounters::incr(&self.inner.counters.inline_decoded);
			}
			return map;
		}

		if !self.inner.config.fetch_enabled {
			debug!(
				reference = reference.as_str(),
				"source map fetching disabled"
			);
			return None;
		}

		match self.fetch_map(&record.url, &reference, context).await {
			Ok(map) => {
				StoreCounters::incr(&self.inner.counters.fetched);
				Some(map)
			}
			Err(e) => {
				StoreCounters::incr(&self.inner.counters.fetch_failures);
				warn!(
					url = %record.url,
					reference = reference.as_str(),
					error = %e,
					"failed to fetch source map, composing without it"
				);
				None
			}
		}
	}

	async fn fetch_map(
		&self,
		url: &str,
		reference: &MapReference,
		context: &RequestContext,
	) -> std::result::Result<SourceMap, FetchError> {
		let target = match Url::parse(url) {
			Ok(base) => base.join(reference.as_str()),
			Err(_) => Url::parse(reference.as_str()),
		}
		.map_err(|source| FetchError::InvalidUrl {
			reference: reference.as_str().to_string(),
			source,
		})?;

		let timeout = self.inner.config.fetch_timeout();
		let request = FetchRequest {
			url: target,
			headers: context.headers.clone(),
			timeout,
		};

		// Bound the call here too, so a custom fetcher can't stall resolution.
		let response = tokio::time::timeout(timeout, self.inner.fetcher.fetch(request))
			.await
			.map_err(|_| FetchError::Timeout(self.inner.config.fetch_timeout_ms))??;

		Ok(SourceMap::from_slice(&response.body)?)
	}
}
