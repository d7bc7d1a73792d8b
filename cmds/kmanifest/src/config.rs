//! Configuration file support for kmanifest
//!
//! Supports `.kmanifest.yaml` files that can be placed anywhere in the directory
//! hierarchy. kmanifest searches from the manifest file's directory upward to the
//! filesystem root.

use std::{
	collections::HashMap,
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
	client::ConnectOpts,
	decode::{PipelineOpts, DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_CHUNK_HINT},
	resolve::ResourceNames,
};

/// The name of the config file kmanifest looks for
pub const CONFIG_FILE_NAME: &str = ".kmanifest.yaml";

/// Root configuration structure for .kmanifest.yaml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
	/// Kubeconfig context; the current context when unset.
	#[serde(default)]
	pub context: Option<String>,

	/// Kubeconfig path; `$KUBECONFIG` or `~/.kube/config` when unset.
	#[serde(default)]
	pub kubeconfig: Option<PathBuf>,

	#[serde(default)]
	pub resources: ResourcesConfig,

	#[serde(default)]
	pub pipeline: PipelineConfig,
}

/// How kinds map to collection names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesConfig {
	/// Consult the table of well-known kinds before pluralizing.
	#[serde(default = "default_true")]
	pub use_builtin_table: bool,

	/// Explicit kind to resource entries, checked first.
	#[serde(default)]
	pub overrides: HashMap<String, String>,
}

impl Default for ResourcesConfig {
	fn default() -> Self {
		Self {
			use_builtin_table: true,
			overrides: HashMap::new(),
		}
	}
}

fn default_true() -> bool {
	true
}

/// Decoder pipeline tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
	/// Capacity of the channels between pipeline stages.
	#[serde(default = "default_buffer_capacity")]
	pub buffer_capacity: usize,

	/// Upper bound of the initial capacity of a document buffer, in bytes.
	#[serde(default = "default_max_chunk_hint")]
	pub max_chunk_hint: usize,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			buffer_capacity: DEFAULT_BUFFER_CAPACITY,
			max_chunk_hint: DEFAULT_MAX_CHUNK_HINT,
		}
	}
}

fn default_buffer_capacity() -> usize {
	DEFAULT_BUFFER_CAPACITY
}

fn default_max_chunk_hint() -> usize {
	DEFAULT_MAX_CHUNK_HINT
}

impl ToolConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		if let Some(config_path) = find_config_file(start_dir) {
			let config = Self::load_from_file(&config_path)?;
			Ok(Some(config))
		} else {
			Ok(None)
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let config: ToolConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		Ok(config)
	}

	/// Apply command-line values over the file's.
	pub fn with_overrides(mut self, context: Option<String>, kubeconfig: Option<PathBuf>) -> Self {
		if context.is_some() {
			self.context = context;
		}
		if kubeconfig.is_some() {
			self.kubeconfig = kubeconfig;
		}
		self
	}

	pub fn resource_names(&self) -> ResourceNames {
		let names = if self.resources.use_builtin_table {
			ResourceNames::with_builtin_table()
		} else {
			ResourceNames::heuristic()
		};
		self.resources
			.overrides
			.iter()
			.fold(names, |names, (kind, resource)| {
				names.with_override(kind.clone(), resource.clone())
			})
	}

	/// Channel capacities below one are raised to one.
	pub fn pipeline_opts(&self) -> PipelineOpts {
		PipelineOpts {
			buffer_capacity: self.pipeline.buffer_capacity.max(1),
			max_chunk_hint: self.pipeline.max_chunk_hint,
		}
	}

	pub fn connect_opts(&self) -> ConnectOpts {
		ConnectOpts {
			context: self.context.clone(),
			kubeconfig: self.kubeconfig.clone(),
		}
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();

	// Canonicalize if possible to handle relative paths
	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.exists() {
			return Some(config_path);
		}

		match current.parent() {
			Some(parent) if parent != current => current = parent.to_path_buf(),
			_ => break,
		}
	}

	None
}
