//! The kmanifest command.
//!
//! Decodes a multi-document manifest file and prints it, or gets, creates or
//! deletes every resource in it.

use std::{
	fmt,
	io::Write,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{error, info, instrument, Level};

use crate::{
	batch::{log_summary, BatchExecutor, BatchSummary},
	client::ClusterConnection,
	config::ToolConfig,
	decode::{DocumentStream, PipelineOpts},
	manifest::Manifest,
	resolve::Resolver,
	store::{KubeStore, ResourceStore},
	telemetry::parse_level,
};

#[derive(Parser, Debug, Default)]
#[command(name = "kmanifest")]
#[command(about = "Create, inspect or delete the resources of a multi-document manifest")]
pub struct ManifestArgs {
	/// Manifest file holding one or more `---` separated documents
	pub file: Option<PathBuf>,

	/// One of `get`, `create` or `delete`. Prints the decoded documents when omitted
	pub operation: Option<String>,

	/// Kubeconfig context to use instead of the current context
	#[arg(long)]
	pub context: Option<String>,

	/// Path to the kubeconfig file
	#[arg(long)]
	pub kubeconfig: Option<PathBuf>,

	/// Configuration file. Searched upward from the manifest's directory when unset
	#[arg(long)]
	pub config: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error). Overrides RUST_LOG
	#[arg(long, value_parser = parse_level)]
	pub log_level: Option<Level>,
}

/// What to do with the decoded documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	Print,
	Get,
	Create,
	Delete,
}

impl Operation {
	/// Map an operation keyword. `None` for an unknown keyword.
	pub fn from_keyword(keyword: Option<&str>) -> Option<Self> {
		match keyword.unwrap_or_default() {
			"" => Some(Operation::Print),
			"get" => Some(Operation::Get),
			"create" => Some(Operation::Create),
			"delete" => Some(Operation::Delete),
			_ => None,
		}
	}

	pub fn needs_cluster(self) -> bool {
		self != Operation::Print
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Operation::Print => write!(f, "print"),
			Operation::Get => write!(f, "get"),
			Operation::Create => write!(f, "create"),
			Operation::Delete => write!(f, "delete"),
		}
	}
}

/// Run the command.
pub fn run<W: Write>(args: ManifestArgs, writer: W) -> Result<()> {
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")?;

	runtime.block_on(run_async(args, None, writer))
}

/// Run the command inside an existing runtime.
///
/// A `connection` is used as is. Otherwise one is made from the kubeconfig
/// when the operation needs a cluster.
#[instrument(skip_all, fields(file = ?args.file, operation = ?args.operation))]
pub async fn run_async<W: Write>(
	args: ManifestArgs,
	connection: Option<ClusterConnection>,
	mut writer: W,
) -> Result<()> {
	let (Some(file), Some(operation)) = (
		args.file.as_deref(),
		Operation::from_keyword(args.operation.as_deref()),
	) else {
		write_usage(&mut writer)?;
		return Ok(());
	};

	let config = load_config(file, args.config.as_deref())?
		.with_overrides(args.context.clone(), args.kubeconfig.clone());

	let connection = match connection {
		Some(conn) => Some(conn),
		None if operation.needs_cluster() => {
			let conn = ClusterConnection::connect(&config.connect_opts())
				.await
				.context("connecting to Kubernetes cluster")?;
			Some(conn)
		}
		None => None,
	};
	if let Some(conn) = &connection {
		writeln!(
			writer,
			"Connecting to Kubernetes Context {} ({})",
			conn.context(),
			conn.server_version().git_version
		)?;
	}

	let manifests = load_documents(file, config.pipeline_opts(), &mut writer).await?;

	let resolver = Resolver::new(config.resource_names());
	match connection {
		Some(conn) => {
			let store = KubeStore::new(conn.client().clone());
			execute(operation, &manifests, &store, &resolver, &mut writer).await?;
		}
		None => print_documents(&manifests, &mut writer)?,
	}
	Ok(())
}

/// Print usage to `writer`.
pub fn write_usage<W: Write>(writer: &mut W) -> Result<()> {
	let usage = ManifestArgs::command().render_usage();
	writeln!(writer, "{usage}")?;
	Ok(())
}

/// Explicit `--config`, else the nearest `.kmanifest.yaml` above `file`, else defaults.
fn load_config(file: &Path, explicit: Option<&Path>) -> Result<ToolConfig> {
	if let Some(path) = explicit {
		return ToolConfig::load_from_file(path);
	}
	let dir = match file.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent,
		_ => Path::new("."),
	};
	Ok(ToolConfig::load_from_directory(dir)?.unwrap_or_default())
}

/// Decode every document in `file`.
///
/// Documents that fail to decode are reported on `writer` and left out.
pub async fn load_documents<W: Write>(
	file: &Path,
	opts: PipelineOpts,
	writer: &mut W,
) -> Result<Vec<Manifest>> {
	let decoded = DocumentStream::open(file, opts)
		.await
		.with_context(|| format!("opening {}", file.display()))?
		.drain()
		.await;

	for err in &decoded.errors {
		error!(index = err.index(), name = err.name(), error = %err, "skipping document");
		writeln!(writer, "ERROR {} {}", err.name(), err)?;
	}
	tracing::debug!(
		count = decoded.documents.len(),
		skipped = decoded.errors.len(),
		"decoded documents"
	);
	Ok(decoded.documents)
}

/// Write each manifest as a `---` separated YAML document.
pub fn print_documents<W: Write>(manifests: &[Manifest], writer: &mut W) -> Result<()> {
	for manifest in manifests {
		let yaml = manifest
			.to_yaml()
			.with_context(|| format!("rendering {}/{}", manifest.kind(), manifest.name()))?;
		write!(writer, "---\n{yaml}")?;
	}
	Ok(())
}

/// Apply `operation` to `manifests` through `store`.
///
/// Prints the closing summary line. Returns `None` for [`Operation::Print`],
/// which prints the manifests instead of touching the store.
pub async fn execute<S: ResourceStore, W: Write>(
	operation: Operation,
	manifests: &[Manifest],
	store: &S,
	resolver: &Resolver,
	writer: &mut W,
) -> Result<Option<BatchSummary>> {
	let mut executor = BatchExecutor::new(store, resolver, &mut *writer);
	let summary = match operation {
		Operation::Print => {
			print_documents(manifests, executor.into_writer())?;
			return Ok(None);
		}
		Operation::Get => executor.inspect(manifests).await,
		Operation::Create => executor.create(manifests).await,
		Operation::Delete => executor.delete(manifests).await,
	}
	.with_context(|| format!("{operation} aborted"))?;

	log_summary(&operation.to_string(), &summary);
	writeln!(writer, "{operation}: {summary}")?;
	if summary.failed > 0 {
		info!(failed = summary.failed, "some documents were not processed");
	}
	Ok(Some(summary))
}

#[cfg(test)]
mod tests {
	use std::fs;

	use assert_matches::assert_matches;
	use indoc::indoc;
	use rstest::rstest;
	use tempfile::TempDir;

	use super::*;
	use crate::{
		batch::BatchError,
		resolve::ResolveError,
		test_utils::{Call, RecordingStore},
	};

	const TWO_MAPS: &str = indoc! {"
		apiVersion: v1
		kind: ConfigMap
		metadata:
		  name: one
		  namespace: ns1
		---
		apiVersion: v1
		kind: ConfigMap
		metadata:
		  name: two
	"};

	fn write_manifest(dir: &TempDir, content: &str) -> PathBuf {
		let path = dir.path().join("app.yaml");
		fs::write(&path, content).unwrap();
		path
	}

	fn args(file: Option<PathBuf>, operation: Option<&str>) -> ManifestArgs {
		ManifestArgs {
			file,
			operation: operation.map(str::to_string),
			..ManifestArgs::default()
		}
	}

	#[rstest]
	#[case(None, Some(Operation::Print))]
	#[case(Some(""), Some(Operation::Print))]
	#[case(Some("get"), Some(Operation::Get))]
	#[case(Some("create"), Some(Operation::Create))]
	#[case(Some("delete"), Some(Operation::Delete))]
	#[case(Some("apply"), None)]
	#[case(Some("CREATE"), None)]
	fn test_operation_keywords(#[case] keyword: Option<&str>, #[case] expected: Option<Operation>) {
		assert_eq!(Operation::from_keyword(keyword), expected);
	}

	#[test]
	fn test_cli_parses_positionals_and_flags() {
		let args = ManifestArgs::try_parse_from([
			"kmanifest",
			"app.yaml",
			"delete",
			"--context",
			"staging",
			"--log-level",
			"warning",
		])
		.unwrap();

		assert_eq!(args.file, Some(PathBuf::from("app.yaml")));
		assert_eq!(args.operation.as_deref(), Some("delete"));
		assert_eq!(args.context.as_deref(), Some("staging"));
		assert_eq!(args.log_level, Some(Level::WARN));
	}

	#[tokio::test]
	async fn test_missing_file_prints_usage() {
		let mut out = Vec::new();
		run_async(args(None, None), None, &mut out).await.unwrap();

		let out = String::from_utf8(out).unwrap();
		assert!(out.contains("Usage: kmanifest"), "{out}");
	}

	#[tokio::test]
	async fn test_unknown_operation_prints_usage() {
		let dir = TempDir::new().unwrap();
		let path = write_manifest(&dir, TWO_MAPS);

		let mut out = Vec::new();
		run_async(args(Some(path), Some("apply")), None, &mut out)
			.await
			.unwrap();

		let out = String::from_utf8(out).unwrap();
		assert!(out.contains("Usage: kmanifest"), "{out}");
		assert!(!out.contains("---"));
	}

	#[tokio::test]
	async fn test_print_needs_no_cluster() {
		let dir = TempDir::new().unwrap();
		let path = write_manifest(&dir, TWO_MAPS);

		let mut out = Vec::new();
		run_async(args(Some(path), None), None, &mut out)
			.await
			.unwrap();

		let out = String::from_utf8(out).unwrap();
		assert_eq!(out.matches("---\n").count(), 2);
		assert!(out.contains("name: one"));
		assert!(out.contains("name: two"));
		assert!(!out.contains("Connecting"));
	}

	#[tokio::test]
	async fn test_missing_manifest_file_is_fatal() {
		let dir = TempDir::new().unwrap();
		let missing = dir.path().join("nope.yaml");

		let err = run_async(args(Some(missing), None), None, Vec::new())
			.await
			.unwrap_err();
		assert!(err.to_string().starts_with("opening "), "{err}");
	}

	#[tokio::test]
	async fn test_decode_errors_are_reported() {
		let dir = TempDir::new().unwrap();
		let path = write_manifest(
			&dir,
			indoc! {"
				apiVersion: v1
				kind: ConfigMap
				metadata:
				  name: one
				---
				metadata:
				  name: broken
				  labels: [unclosed
				---
				apiVersion: v1
				kind: ConfigMap
				metadata:
				  name: three
			"},
		);

		let mut out = Vec::new();
		let manifests = load_documents(&path, PipelineOpts::default(), &mut out)
			.await
			.unwrap();

		let names: Vec<_> = manifests.iter().map(Manifest::name).collect();
		assert_eq!(names, vec!["one", "three"]);
		let out = String::from_utf8(out).unwrap();
		let line = out.lines().next().unwrap();
		let cause = line
			.strip_prefix("ERROR broken document 1 (\"broken\"): invalid YAML: ")
			.unwrap_or_else(|| panic!("unexpected report: {line}"));
		assert!(!cause.is_empty());
		assert_eq!(out.lines().count(), 1);
	}

	#[tokio::test]
	async fn test_execute_create_prints_summary() {
		let dir = TempDir::new().unwrap();
		let path = write_manifest(&dir, TWO_MAPS);
		let manifests = load_documents(&path, PipelineOpts::default(), &mut Vec::new())
			.await
			.unwrap();

		let store = RecordingStore::new();
		let mut out = Vec::new();
		let summary = execute(
			Operation::Create,
			&manifests,
			&store,
			&Resolver::default(),
			&mut out,
		)
		.await
		.unwrap();

		assert_eq!(summary, Some(BatchSummary { succeeded: 2, failed: 0 }));
		assert_eq!(
			String::from_utf8(out).unwrap(),
			indoc! {"
				{ v1 configmaps}
				ConfigMap/one created
				{ v1 configmaps}
				ConfigMap/two created
				create: 2 succeeded, 0 failed
			"}
		);
	}

	#[tokio::test]
	async fn test_execute_resolution_failure_is_fatal() {
		let manifests = vec![Manifest::new(serde_json::json!({
			"apiVersion": "a/b/c",
			"kind": "Widget",
			"metadata": { "name": "w" }
		}))];

		let store = RecordingStore::new();
		let err = execute(
			Operation::Delete,
			&manifests,
			&store,
			&Resolver::default(),
			&mut Vec::new(),
		)
		.await
		.unwrap_err();

		assert_eq!(err.to_string(), "delete aborted");
		assert_matches!(
			err.downcast_ref::<BatchError>(),
			Some(BatchError::Resolve(ResolveError::MalformedVersion { .. }))
		);
		assert!(store.calls().is_empty());
	}

	#[tokio::test]
	async fn test_execute_print_skips_store() {
		let manifests = vec![Manifest::new(serde_json::json!({
			"apiVersion": "v1",
			"kind": "Namespace",
			"metadata": { "name": "prod" }
		}))];

		let store = RecordingStore::new();
		let mut out = Vec::new();
		let summary = execute(
			Operation::Print,
			&manifests,
			&store,
			&Resolver::default(),
			&mut out,
		)
		.await
		.unwrap();

		assert_eq!(summary, None);
		assert!(store.calls().is_empty());
		assert!(String::from_utf8(out).unwrap().starts_with("---\napiVersion: v1\n"));
	}

	#[tokio::test]
	async fn test_execute_get_records_calls() {
		let manifests = vec![Manifest::new(serde_json::json!({
			"apiVersion": "v1",
			"kind": "Namespace",
			"metadata": { "name": "prod" }
		}))];

		let store = RecordingStore::new();
		let mut out = Vec::new();
		let summary = execute(
			Operation::Get,
			&manifests,
			&store,
			&Resolver::default(),
			&mut out,
		)
		.await
		.unwrap();

		assert_eq!(summary, Some(BatchSummary { succeeded: 0, failed: 1 }));
		assert_eq!(store.calls(), vec![Call::Get("prod".into())]);
	}
}
