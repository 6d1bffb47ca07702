// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Counters describing store activity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A point-in-time copy of the store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
	/// Records accepted by `defer`.
	pub deferred: u64,
	/// Records dropped because a newer deferral arrived for the same URL.
	pub superseded: u64,
	/// Maps reconstructed (compose succeeded).
	pub resolved: u64,
	/// Resolutions answered from an already materialized map.
	pub cache_hits: u64,
	/// Resolutions for identifiers the store doesn't hold.
	pub misses: u64,
	/// Inline references decoded into an input map.
	pub inline_decoded: u64,
	/// User maps downloaded successfully.
	pub fetched: u64,
	/// User map downloads that failed and were ignored.
	pub fetch_failures: u64,
	/// Identifiers remembered for duplicate detection, superseded ones
	/// included. Only `reset` brings this back down.
	pub issued_ids: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
	pub deferred: AtomicU64,
	pub superseded: AtomicU64,
	pub resolved: AtomicU64,
	pub cache_hits: AtomicU64,
	pub misses: AtomicU64,
	pub inline_decoded: AtomicU64,
	pub fetched: AtomicU64,
	pub fetch_failures: AtomicU64,
}

impl StoreCounters {
	pub fn incr(counter: &AtomicU64) {
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> StoreStats {
		StoreStats {
			deferred: self.deferred.load(Ordering::Relaxed),
			superseded: self.superseded.load(Ordering::Relaxed),
			resolved: self.resolved.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			inline_decoded: self.inline_decoded.load(Ordering::Relaxed),
			fetched: self.fetched.load(Ordering::Relaxed),
			fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
			// The store fills this in from its identifier ledger.
			issued_ids: 0,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn snapshot_reflects_increments() {
		let counters = StoreCounters::default();
		StoreCounters::incr(&counters.deferred);
		StoreCounters::incr(&counters.deferred);
		StoreCounters::incr(&counters.fetch_failures);

		let stats = counters.snapshot();
		assert_eq!(stats.deferred, 2);
		assert_eq!(stats.fetch_failures, 1);
		assert_eq!(stats.resolved, 0);
		assert_eq!(stats.issued_ids, 0);
	}

	#[test]
	fn stats_serialize_as_flat_object() {
		let stats = StoreStats {
			cache_hits: 4,
			..StoreStats::default()
		};
		let json = serde_json::to_value(stats).unwrap();
		assert_eq!(json["cache_hits"], 4);
		assert_eq!(json["misses"], 0);
	}
}
