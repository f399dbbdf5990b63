//! Configuration for the palisade registry.
//!
//! Configuration is written in TOML. Every field has a default, so an empty
//! document is valid:
//!
//! ```toml
//! [removal]
//! workers = 2
//! thread-name = "palisade-removal"
//! drain-timeout-ms = 5000
//!
//! [fetch]
//! request-timeout-ms = 10000
//! executor-window-ms = 500
//! cache-capacity = 256
//! cache-ttl-ms = 30000
//! ```
//!
//! Unknown keys are rejected so typos surface at load time.

mod error;

use std::path::Path;
use std::time::Duration;

pub use error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PalisadeConfig {
	/// Background removal pool.
	pub removal: RemovalConfig,
	/// Type fetcher timeouts and cache.
	pub fetch: FetchConfig,
}

/// Settings for the background removal worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RemovalConfig {
	/// Number of removal workers.
	pub workers: usize,
	/// Worker thread name prefix.
	pub thread_name: String,
	/// How long shutdown waits for queued removals.
	pub drain_timeout_ms: u64,
}

impl Default for RemovalConfig {
	fn default() -> Self {
		Self {
			workers: 2,
			thread_name: "palisade-removal".to_owned(),
			drain_timeout_ms: 5_000,
		}
	}
}

impl RemovalConfig {
	pub fn drain_timeout(&self) -> Duration {
		Duration::from_millis(self.drain_timeout_ms)
	}
}

/// Settings for by-name type resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FetchConfig {
	/// Deadline for one request/response round trip.
	pub request_timeout_ms: u64,
	/// How long executor queries collect replies.
	pub executor_window_ms: u64,
	/// Maximum number of cached declarations.
	pub cache_capacity: usize,
	/// Lifetime of a cached declaration.
	pub cache_ttl_ms: u64,
}

impl Default for FetchConfig {
	fn default() -> Self {
		Self {
			request_timeout_ms: 10_000,
			executor_window_ms: 500,
			cache_capacity: 256,
			cache_ttl_ms: 30_000,
		}
	}
}

impl FetchConfig {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	pub fn executor_window(&self) -> Duration {
		Duration::from_millis(self.executor_window_ms)
	}

	pub fn cache_ttl(&self) -> Duration {
		Duration::from_millis(self.cache_ttl_ms)
	}
}

impl PalisadeConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::from_toml_str(&text)?;
		tracing::debug!(path = %path.display(), "config.loaded");
		Ok(config)
	}

	/// Rejects values that would leave a component unusable.
	pub fn validate(&self) -> Result<()> {
		if self.removal.workers == 0 {
			return Err(ConfigError::Invalid {
				field: "removal.workers",
				reason: "must be at least 1",
			});
		}
		if self.removal.thread_name.is_empty() {
			return Err(ConfigError::Invalid {
				field: "removal.thread-name",
				reason: "must not be empty",
			});
		}
		if self.fetch.cache_capacity == 0 {
			return Err(ConfigError::Invalid {
				field: "fetch.cache-capacity",
				reason: "must be at least 1",
			});
		}
		if self.fetch.request_timeout_ms == 0 {
			return Err(ConfigError::Invalid {
				field: "fetch.request-timeout-ms",
				reason: "must be positive",
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_uses_defaults() {
		assert_eq!(PalisadeConfig::from_toml_str("").unwrap(), PalisadeConfig::default());
	}

	#[test]
	fn partial_sections_keep_other_defaults() {
		let config = PalisadeConfig::from_toml_str(
			r#"
			[removal]
			workers = 4

			[fetch]
			cache-ttl-ms = 100
			"#,
		)
		.unwrap();

		assert_eq!(config.removal.workers, 4);
		assert_eq!(config.removal.thread_name, "palisade-removal");
		assert_eq!(config.fetch.cache_ttl(), Duration::from_millis(100));
		assert_eq!(config.fetch.request_timeout(), Duration::from_secs(10));
	}

	#[test]
	fn rejects_unknown_keys() {
		let err = PalisadeConfig::from_toml_str("[removal]\nworkerz = 3\n").unwrap_err();
		assert!(matches!(err, ConfigError::Toml(_)), "got {err:?}");
	}

	#[test]
	fn rejects_zero_workers() {
		let err = PalisadeConfig::from_toml_str("[removal]\nworkers = 0\n").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "removal.workers", .. }), "got {err:?}");
	}

	#[test]
	fn rejects_zero_cache_capacity() {
		let err = PalisadeConfig::from_toml_str("[fetch]\ncache-capacity = 0\n").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "fetch.cache-capacity", .. }));
	}

	#[test]
	fn loads_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("palisade.toml");
		std::fs::write(&path, "[fetch]\nexecutor-window-ms = 50\n").unwrap();

		let config = PalisadeConfig::load(&path).unwrap();
		assert_eq!(config.fetch.executor_window(), Duration::from_millis(50));
	}

	#[test]
	fn missing_file_reports_path() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("absent.toml");
		match PalisadeConfig::load(&path).unwrap_err() {
			ConfigError::Io { path: reported, .. } => assert_eq!(reported, path),
			other => panic!("unexpected error: {other:?}"),
		}
	}
}
