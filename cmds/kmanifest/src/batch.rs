//! Ordered batch execution.
//!
//! Each operation walks the decoded manifests once, resolving every document
//! to an endpoint right before it is used. `inspect` and `create` go in file
//! order, `delete` goes in reverse so dependents are removed before the
//! objects they were created after.
//!
//! A store failure is reported for that document and the batch moves on. A
//! resolution failure stops the batch and is returned to the caller, leaving
//! whatever already succeeded in place.

use std::{
	fmt,
	io::{self, Write},
};

use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::{
	manifest::Manifest,
	resolve::{EndpointHandle, ResolveError, Resolver},
	store::{ResourceStore, StoreError},
};

#[derive(Debug, Error)]
pub enum BatchError {
	#[error(transparent)]
	Resolve(#[from] ResolveError),

	#[error("writing batch output")]
	Output(#[from] io::Error),
}

/// Per-document outcome counts of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
	pub succeeded: usize,
	pub failed: usize,
}

impl BatchSummary {
	pub fn total(&self) -> usize {
		self.succeeded + self.failed
	}
}

impl fmt::Display for BatchSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} succeeded, {} failed", self.succeeded, self.failed)
	}
}

/// Applies one operation to a sequence of manifests.
pub struct BatchExecutor<'a, S, W> {
	store: &'a S,
	resolver: &'a Resolver,
	out: W,
}

impl<'a, S: ResourceStore, W: Write> BatchExecutor<'a, S, W> {
	pub fn new(store: &'a S, resolver: &'a Resolver, out: W) -> Self {
		Self {
			store,
			resolver,
			out,
		}
	}

	pub fn into_writer(self) -> W {
		self.out
	}

	/// Fetch every manifest's live object and print it.
	#[instrument(skip_all, fields(count = manifests.len()))]
	pub async fn inspect(&mut self, manifests: &[Manifest]) -> Result<BatchSummary, BatchError> {
		let mut summary = BatchSummary::default();
		for manifest in manifests {
			let handle = self.bind(manifest)?;
			match handle.get(manifest.name()).await {
				Ok(object) => {
					writeln!(self.out, "{object}")?;
					summary.succeeded += 1;
				}
				Err(err) => self.report(&mut summary, "get", manifest, &err)?,
			}
		}
		Ok(summary)
	}

	/// Create every manifest with its full document as the payload.
	#[instrument(skip_all, fields(count = manifests.len()))]
	pub async fn create(&mut self, manifests: &[Manifest]) -> Result<BatchSummary, BatchError> {
		let mut summary = BatchSummary::default();
		for manifest in manifests {
			let handle = self.bind(manifest)?;
			match handle.create(manifest).await {
				Ok(created) => {
					writeln!(self.out, "{}/{} created", created.kind(), created.name())?;
					summary.succeeded += 1;
				}
				Err(err) => self.report(&mut summary, "create", manifest, &err)?,
			}
		}
		Ok(summary)
	}

	/// Delete every manifest by name, last document first.
	#[instrument(skip_all, fields(count = manifests.len()))]
	pub async fn delete(&mut self, manifests: &[Manifest]) -> Result<BatchSummary, BatchError> {
		let mut summary = BatchSummary::default();
		for manifest in manifests.iter().rev() {
			let handle = self.bind(manifest)?;
			match handle.delete(manifest.name()).await {
				Ok(()) => {
					writeln!(self.out, "{}/{} deleted", manifest.kind(), manifest.name())?;
					summary.succeeded += 1;
				}
				Err(err) => self.report(&mut summary, "delete", manifest, &err)?,
			}
		}
		Ok(summary)
	}

	/// Resolve `manifest` and announce the collection it goes to.
	fn bind(&mut self, manifest: &Manifest) -> Result<EndpointHandle<'a, S>, BatchError> {
		let handle = self.resolver.resolve(self.store, manifest)?;
		writeln!(self.out, "{}", handle.endpoint().resource)?;
		debug!(
			resource = %handle.endpoint().resource,
			namespace = handle.endpoint().namespace.as_deref().unwrap_or_default(),
			name = manifest.name(),
			"dispatching"
		);
		Ok(handle)
	}

	fn report(
		&mut self,
		summary: &mut BatchSummary,
		operation: &str,
		manifest: &Manifest,
		err: &StoreError,
	) -> io::Result<()> {
		error!(
			operation,
			kind = manifest.kind(),
			name = manifest.name(),
			error = %err,
			"store call failed"
		);
		writeln!(self.out, "ERROR {} {}", manifest.name(), err)?;
		summary.failed += 1;
		Ok(())
	}
}

/// Log a finished batch.
pub fn log_summary(operation: &str, summary: &BatchSummary) {
	if summary.failed > 0 {
		info!(
			operation,
			succeeded = summary.succeeded,
			failed = summary.failed,
			"batch finished with failures"
		);
	} else {
		info!(operation, succeeded = summary.succeeded, "batch finished");
	}
}
