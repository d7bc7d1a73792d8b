//! Manifest to API endpoint resolution.
//!
//! Resolution is pure: the collection comes from `apiVersion` and `kind`, the
//! scope from `metadata.namespace`. Nothing is looked up on the server and
//! nothing is cached between documents.

use std::collections::HashMap;

use k8s::{
	builtin_resource, correct_resource_name, pluralize, GroupVersion, GroupVersionError,
	GroupVersionResource,
};
use thiserror::Error;
use tracing::debug;

use crate::{
	manifest::Manifest,
	store::{ResourceStore, StoreError},
};

#[derive(Debug, Error)]
pub enum ResolveError {
	#[error("resolving {kind} {name:?}: malformed apiVersion")]
	MalformedVersion {
		kind: String,
		name: String,
		#[source]
		source: GroupVersionError,
	},
}

/// A collection in the store, optionally scoped to a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
	pub resource: GroupVersionResource,
	/// Kind of the objects in the collection, as authored.
	pub kind: String,
	/// `None` addresses the collection cluster-wide.
	pub namespace: Option<String>,
}

impl Endpoint {
	pub fn is_namespaced(&self) -> bool {
		self.namespace.is_some()
	}
}

/// How kinds are turned into collection resource names.
///
/// Lookup order is user overrides, then the built-in table (when enabled),
/// then [`pluralize`]. The correction table is applied to whatever comes out.
#[derive(Debug, Clone, Default)]
pub struct ResourceNames {
	overrides: HashMap<String, String>,
	builtin: bool,
}

impl ResourceNames {
	/// Pluralization only.
	pub fn heuristic() -> Self {
		Self::default()
	}

	/// Consult the table of well-known kinds before pluralizing.
	pub fn with_builtin_table() -> Self {
		Self {
			builtin: true,
			..Self::default()
		}
	}

	/// Map `kind` to `resource` explicitly.
	pub fn with_override(mut self, kind: impl Into<String>, resource: impl Into<String>) -> Self {
		self.overrides.insert(kind.into(), resource.into());
		self
	}

	pub fn resource_for(&self, kind: &str) -> String {
		let named = match self.overrides.get(kind) {
			Some(resource) => resource.clone(),
			None => self
				.builtin
				.then(|| builtin_resource(kind))
				.flatten()
				.map_or_else(|| pluralize(kind), str::to_string),
		};
		correct_resource_name(&named).into_owned()
	}
}

/// Turns manifests into endpoints.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
	names: ResourceNames,
}

impl Resolver {
	pub fn new(names: ResourceNames) -> Self {
		Self { names }
	}

	/// Derive the endpoint for `manifest`.
	pub fn endpoint(&self, manifest: &Manifest) -> Result<Endpoint, ResolveError> {
		let gv = GroupVersion::parse(manifest.api_version()).map_err(|source| {
			ResolveError::MalformedVersion {
				kind: manifest.kind().to_string(),
				name: manifest.name().to_string(),
				source,
			}
		})?;

		let resource = gv.with_resource(self.names.resource_for(manifest.kind()));
		let namespace = Some(manifest.namespace())
			.filter(|ns| !ns.is_empty())
			.map(str::to_string);
		debug!(resource = %resource, namespace = ?namespace, "resolved endpoint");

		Ok(Endpoint {
			resource,
			kind: manifest.kind().to_string(),
			namespace,
		})
	}

	/// Resolve `manifest` and bind the endpoint to `store`.
	pub fn resolve<'s, S: ResourceStore>(
		&self,
		store: &'s S,
		manifest: &Manifest,
	) -> Result<EndpointHandle<'s, S>, ResolveError> {
		Ok(EndpointHandle {
			store,
			endpoint: self.endpoint(manifest)?,
		})
	}
}

/// An endpoint bound to the store client that serves it.
pub struct EndpointHandle<'s, S> {
	store: &'s S,
	endpoint: Endpoint,
}

impl<S: ResourceStore> EndpointHandle<'_, S> {
	pub fn endpoint(&self) -> &Endpoint {
		&self.endpoint
	}

	pub async fn create(&self, payload: &Manifest) -> Result<Manifest, StoreError> {
		self.store.create(&self.endpoint, payload).await
	}

	pub async fn get(&self, name: &str) -> Result<Manifest, StoreError> {
		self.store.get(&self.endpoint, name).await
	}

	pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
		self.store.delete(&self.endpoint, name).await
	}
}
