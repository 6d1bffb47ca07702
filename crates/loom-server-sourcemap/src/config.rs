// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Source map configuration section.
//!
//! Follows the layered pattern used by the server config: a partial
//! [`SourceMapConfigLayer`] per source (TOML, environment), merged in
//! precedence order and finalized into a [`SourceMapConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;

pub const ENV_FETCH_ENABLED: &str = "LOOM_SERVER_SOURCEMAP_FETCH_ENABLED";
pub const ENV_FETCH_TIMEOUT_MS: &str = "LOOM_SERVER_SOURCEMAP_FETCH_TIMEOUT_MS";
pub const ENV_USER_AGENT: &str = "LOOM_SERVER_SOURCEMAP_USER_AGENT";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceMapConfigLayer {
	pub fetch_enabled: Option<bool>,
	pub fetch_timeout_ms: Option<u64>,
	pub user_agent: Option<String>,
}

impl SourceMapConfigLayer {
	/// Read the layer from process environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Read the layer through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

		let fetch_timeout_ms = match var(ENV_FETCH_TIMEOUT_MS) {
			Some(v) => Some(v.parse().map_err(|_| ConfigError::InvalidValue {
				key: ENV_FETCH_TIMEOUT_MS.to_string(),
				message: format!("invalid u64 value '{v}'"),
			})?),
			None => None,
		};

		Ok(Self {
			fetch_enabled: var(ENV_FETCH_ENABLED)
				.map(|v| v.eq_ignore_ascii_case("true") || v == "1"),
			fetch_timeout_ms,
			user_agent: var(ENV_USER_AGENT),
		})
	}

	pub fn merge(&mut self, other: Self) {
		if other.fetch_enabled.is_some() {
			self.fetch_enabled = other.fetch_enabled;
		}
		if other.fetch_timeout_ms.is_some() {
			self.fetch_timeout_ms = other.fetch_timeout_ms;
		}
		if other.user_agent.is_some() {
			self.user_agent = other.user_agent;
		}
	}

	pub fn finalize(self) -> Result<SourceMapConfig, ConfigError> {
		let fetch_timeout_ms = self.fetch_timeout_ms.unwrap_or(DEFAULT_FETCH_TIMEOUT_MS);
		if fetch_timeout_ms == 0 {
			return Err(ConfigError::InvalidValue {
				key: "fetch_timeout_ms".to_string(),
				message: "timeout must be greater than zero".to_string(),
			});
		}

		Ok(SourceMapConfig {
			fetch_enabled: self.fetch_enabled.unwrap_or(true),
			fetch_timeout_ms,
			user_agent: self.user_agent,
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceMapConfig {
	/// Whether URL-form references are downloaded at all.
	pub fetch_enabled: bool,
	/// Upper bound for a single user map download.
	pub fetch_timeout_ms: u64,
	/// Overrides the default Loom user agent on map downloads.
	pub user_agent: Option<String>,
}

impl SourceMapConfig {
	/// Defaults overlaid with the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		SourceMapConfigLayer::from_env()?.finalize()
	}

	pub fn fetch_timeout(&self) -> Duration {
		Duration::from_millis(self.fetch_timeout_ms)
	}
}

impl Default for SourceMapConfig {
	fn default() -> Self {
		Self {
			fetch_enabled: true,
			fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
			user_agent: None,
		}
	}
}
