//! Remote resource store.
//!
//! [`ResourceStore`] is the seam between the batch engine and the cluster.
//! [`KubeStore`] implements it with dynamic kube-rs APIs, so no typed
//! resource definitions are needed for arbitrary kinds.

use kube::{
	api::{Api, DeleteParams, DynamicObject, PostParams},
	core::GroupVersionKind,
	discovery::ApiResource,
	Client,
};
use thiserror::Error;
use tracing::instrument;

use crate::{manifest::Manifest, resolve::Endpoint};

/// Errors returned by a store for a single object.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("{resource} {name:?} not found")]
	NotFound { resource: String, name: String },

	#[error("{resource} {name:?} already exists")]
	AlreadyExists { resource: String, name: String },

	#[error(transparent)]
	Api(Box<kube::Error>),

	#[error("converting manifest to DynamicObject")]
	Payload(#[source] serde_json::Error),
}

impl StoreError {
	fn from_kube(err: kube::Error, endpoint: &Endpoint, name: &str) -> Self {
		match err {
			kube::Error::Api(ref status) if status.code == 404 => StoreError::NotFound {
				resource: endpoint.resource.resource.clone(),
				name: name.to_string(),
			},
			kube::Error::Api(ref status) if status.code == 409 => StoreError::AlreadyExists {
				resource: endpoint.resource.resource.clone(),
				name: name.to_string(),
			},
			other => StoreError::Api(Box::new(other)),
		}
	}
}

/// Create, get and delete objects in a collection.
///
/// Calls are issued one at a time by the batch engine, implementations only
/// need to be safe for sequential reuse.
#[allow(async_fn_in_trait)]
pub trait ResourceStore {
	/// Create `payload` in `endpoint`, returning the stored object.
	async fn create(&self, endpoint: &Endpoint, payload: &Manifest)
		-> Result<Manifest, StoreError>;

	async fn get(&self, endpoint: &Endpoint, name: &str) -> Result<Manifest, StoreError>;

	async fn delete(&self, endpoint: &Endpoint, name: &str) -> Result<(), StoreError>;
}

/// [`ResourceStore`] backed by a Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
	client: Client,
}

impl KubeStore {
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// Dynamic API for the endpoint's collection.
	fn api(&self, endpoint: &Endpoint) -> Api<DynamicObject> {
		let gvr = &endpoint.resource;
		let gvk = GroupVersionKind::gvk(&gvr.group, &gvr.version, &endpoint.kind);
		let ar = ApiResource::from_gvk_with_plural(&gvk, &gvr.resource);
		match &endpoint.namespace {
			Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
			None => Api::all_with(self.client.clone(), &ar),
		}
	}
}

fn to_manifest(object: DynamicObject) -> Result<Manifest, StoreError> {
	serde_json::to_value(object)
		.map(Manifest::new)
		.map_err(StoreError::Payload)
}

impl ResourceStore for KubeStore {
	#[instrument(skip_all, fields(resource = %endpoint.resource, name = %payload.name()))]
	async fn create(
		&self,
		endpoint: &Endpoint,
		payload: &Manifest,
	) -> Result<Manifest, StoreError> {
		let object: DynamicObject =
			serde_json::from_value(payload.as_value().clone()).map_err(StoreError::Payload)?;
		let created = self
			.api(endpoint)
			.create(&PostParams::default(), &object)
			.await
			.map_err(|e| StoreError::from_kube(e, endpoint, payload.name()))?;
		to_manifest(created)
	}

	#[instrument(skip_all, fields(resource = %endpoint.resource, name = %name))]
	async fn get(&self, endpoint: &Endpoint, name: &str) -> Result<Manifest, StoreError> {
		let object = self
			.api(endpoint)
			.get(name)
			.await
			.map_err(|e| StoreError::from_kube(e, endpoint, name))?;
		to_manifest(object)
	}

	#[instrument(skip_all, fields(resource = %endpoint.resource, name = %name))]
	async fn delete(&self, endpoint: &Endpoint, name: &str) -> Result<(), StoreError> {
		self.api(endpoint)
			.delete(name, &DeleteParams::default())
			.await
			.map(|_| ())
			.map_err(|e| StoreError::from_kube(e, endpoint, name))
	}
}
