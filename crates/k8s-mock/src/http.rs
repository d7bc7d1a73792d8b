//! HTTP-based mock Kubernetes server using wiremock.
//!
//! This provides a real HTTP server that can be used with actual kubeconfig-based
//! connections. Objects are kept in memory keyed by (collection path, name).

use std::{
	collections::HashMap,
	sync::{Arc, RwLock},
};

use bon::Builder;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use tracing::{debug, trace};
use wiremock::{
	matchers::{method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use crate::paths::{collection_path, split_object_path};

/// Shared object store: (collection path, name) -> object.
pub type SharedResources = Arc<RwLock<HashMap<(String, String), serde_json::Value>>>;

const RESOURCE_PATHS: &str = r"^/api(s)?/.*";

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	/// Objects the cluster already contains when the server starts.
	#[builder(default)]
	resources: Vec<serde_json::Value>,
	/// Names whose create requests are rejected with 500, to exercise
	/// per-item failure handling.
	#[builder(default)]
	fail_create: Vec<String>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
	resources: SharedResources,
}

/// One request the server answered on a resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
	pub method: String,
	pub path: String,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		debug!(uri = %server.uri(), "Started mock K8s server");

		let mut resources = HashMap::new();
		for manifest in self.resources {
			let name = manifest
				.pointer("/metadata/name")
				.and_then(|n| n.as_str())
				.map(str::to_string);
			if let (Some(collection), Some(name)) = (collection_path(&manifest), name) {
				trace!(collection = %collection, name = %name, "Seeded resource");
				resources.insert((collection, name), manifest);
			}
		}
		let shared = Arc::new(RwLock::new(resources));

		mount_version(&server).await;
		mount_resources(&server, &shared, self.fail_create).await;

		RunningHttpMockK8sServer {
			server,
			resources: shared,
		}
	}
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Look up a stored object by its collection path and name.
	pub fn resource(&self, collection: &str, name: &str) -> Option<serde_json::Value> {
		self.resources
			.read()
			.ok()?
			.get(&(collection.to_string(), name.to_string()))
			.cloned()
	}

	/// Number of objects currently stored.
	pub fn resource_count(&self) -> usize {
		self.resources.read().map(|r| r.len()).unwrap_or_default()
	}

	/// Requests made against `/api` and `/apis` paths, in arrival order.
	pub async fn requests(&self) -> Vec<RecordedRequest> {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.into_iter()
			.filter(|req| {
				let p = req.url.path();
				p.starts_with("/api/") || p.starts_with("/apis/")
			})
			.map(|req| RecordedRequest {
				method: req.method.to_string(),
				path: req.url.path().to_string(),
			})
			.collect()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"major": "1",
			"minor": "31",
			"gitVersion": "v1.31.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-08-13T00:00:00Z",
			"goVersion": "go1.22.5",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

async fn mount_resources(server: &MockServer, resources: &SharedResources, fail_create: Vec<String>) {
	let post_resources = Arc::clone(resources);
	let get_resources = Arc::clone(resources);
	let delete_resources = Arc::clone(resources);

	// POST creates into the collection named by the path
	Mock::given(method("POST"))
		.and(path_regex(RESOURCE_PATHS))
		.respond_with(move |req: &Request| {
			let collection = req.url.path().trim_end_matches('/').to_string();
			let body: serde_json::Value =
				serde_json::from_slice(&req.body).unwrap_or(serde_json::Value::Null);
			let name = body
				.pointer("/metadata/name")
				.and_then(|v| v.as_str())
				.unwrap_or("")
				.to_string();

			if fail_create.contains(&name) {
				return status_response(500, "InternalError", &format!("create of {name} refused"));
			}

			let mut resources = post_resources.write().unwrap();
			let key = (collection, name.clone());
			if resources.contains_key(&key) {
				return status_response(409, "AlreadyExists", &format!("{name} already exists"));
			}
			resources.insert(key, body.clone());
			ResponseTemplate::new(201).set_body_json(body)
		})
		.mount(server)
		.await;

	Mock::given(method("GET"))
		.and(path_regex(RESOURCE_PATHS))
		.respond_with(move |req: &Request| {
			let key = split_object_path(req.url.path());
			match get_resources.read().unwrap().get(&key) {
				Some(object) => ResponseTemplate::new(200).set_body_json(object.clone()),
				None => status_response(404, "NotFound", &format!("{} not found", key.1)),
			}
		})
		.mount(server)
		.await;

	// DELETE answers with the removed object, as the API does for objects
	// without finalizers
	Mock::given(method("DELETE"))
		.and(path_regex(RESOURCE_PATHS))
		.respond_with(move |req: &Request| {
			let key = split_object_path(req.url.path());
			match delete_resources.write().unwrap().remove(&key) {
				Some(object) => ResponseTemplate::new(200).set_body_json(object),
				None => status_response(404, "NotFound", &format!("{} not found", key.1)),
			}
		})
		.mount(server)
		.await;
}

fn status_response(code: u16, reason: &str, message: &str) -> ResponseTemplate {
	ResponseTemplate::new(code).set_body_json(serde_json::json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	}))
}
