//! Common test utilities.

use std::{
	collections::HashMap,
	io::{self, ErrorKind, Write},
	sync::Mutex,
};

use crate::{
	manifest::Manifest,
	resolve::Endpoint,
	store::{ResourceStore, StoreError},
};

/// A writer that simulates a broken pipe (SIGPIPE scenario).
pub struct BrokenPipeWriter;

impl Write for BrokenPipeWriter {
	fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
		Err(io::Error::new(ErrorKind::BrokenPipe, "broken pipe"))
	}

	fn flush(&mut self) -> io::Result<()> {
		Err(io::Error::new(ErrorKind::BrokenPipe, "broken pipe"))
	}
}

/// A store call, recorded by object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	Create(String),
	Get(String),
	Delete(String),
}

/// An in-memory store that records every call it receives.
///
/// Objects are keyed by collection, namespace and name. Calls for names in
/// the failure list are recorded and then rejected.
#[derive(Default)]
pub struct RecordingStore {
	objects: Mutex<HashMap<(String, String), Manifest>>,
	calls: Mutex<Vec<Call>>,
	failing: Vec<String>,
}

fn collection_key(endpoint: &Endpoint) -> String {
	format!(
		"{}/{}",
		endpoint.resource,
		endpoint.namespace.as_deref().unwrap_or_default()
	)
}

impl RecordingStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Reject every call made for one of `names`.
	pub fn failing(names: &[&str]) -> Self {
		Self {
			failing: names.iter().map(|n| n.to_string()).collect(),
			..Self::default()
		}
	}

	/// Builder-style method to pre-populate an object.
	pub fn with_object(self, endpoint: &Endpoint, manifest: Manifest) -> Self {
		self.objects.lock().unwrap().insert(
			(collection_key(endpoint), manifest.name().to_string()),
			manifest,
		);
		self
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().unwrap().clone()
	}

	pub fn contains(&self, endpoint: &Endpoint, name: &str) -> bool {
		self.objects
			.lock()
			.unwrap()
			.contains_key(&(collection_key(endpoint), name.to_string()))
	}

	fn record(&self, call: Call, endpoint: &Endpoint, name: &str) -> Result<(), StoreError> {
		self.calls.lock().unwrap().push(call);
		if self.failing.iter().any(|n| n == name) {
			return Err(StoreError::NotFound {
				resource: endpoint.resource.resource.clone(),
				name: name.to_string(),
			});
		}
		Ok(())
	}
}

impl ResourceStore for RecordingStore {
	async fn create(
		&self,
		endpoint: &Endpoint,
		payload: &Manifest,
	) -> Result<Manifest, StoreError> {
		let name = payload.name();
		self.record(Call::Create(name.to_string()), endpoint, name)?;

		let mut objects = self.objects.lock().unwrap();
		let key = (collection_key(endpoint), name.to_string());
		if objects.contains_key(&key) {
			return Err(StoreError::AlreadyExists {
				resource: endpoint.resource.resource.clone(),
				name: name.to_string(),
			});
		}
		objects.insert(key, payload.clone());
		Ok(payload.clone())
	}

	async fn get(&self, endpoint: &Endpoint, name: &str) -> Result<Manifest, StoreError> {
		self.record(Call::Get(name.to_string()), endpoint, name)?;

		self.objects
			.lock()
			.unwrap()
			.get(&(collection_key(endpoint), name.to_string()))
			.cloned()
			.ok_or_else(|| StoreError::NotFound {
				resource: endpoint.resource.resource.clone(),
				name: name.to_string(),
			})
	}

	async fn delete(&self, endpoint: &Endpoint, name: &str) -> Result<(), StoreError> {
		self.record(Call::Delete(name.to_string()), endpoint, name)?;

		self.objects
			.lock()
			.unwrap()
			.remove(&(collection_key(endpoint), name.to_string()))
			.map(|_| ())
			.ok_or_else(|| StoreError::NotFound {
				resource: endpoint.resource.resource.clone(),
				name: name.to_string(),
			})
	}
}
