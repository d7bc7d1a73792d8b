//! API path derivation for seeded manifests.

use k8s::{builtin_resource, correct_resource_name, pluralize, GroupVersion};

/// Collection path a manifest lives under, e.g.
/// `/apis/apps/v1/namespaces/default/deployments`.
///
/// Manifests without `metadata.namespace` are placed at the cluster-scoped
/// path. Returns `None` when `apiVersion` or `kind` is missing or malformed.
pub fn collection_path(manifest: &serde_json::Value) -> Option<String> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind = manifest.get("kind")?.as_str()?;
	let namespace = manifest
		.pointer("/metadata/namespace")
		.and_then(|n| n.as_str())
		.filter(|n| !n.is_empty());

	let gv = GroupVersion::parse(api_version).ok()?;
	let plural = builtin_resource(kind)
		.map(str::to_string)
		.unwrap_or_else(|| correct_resource_name(&pluralize(kind)).into_owned());

	let base = if gv.group.is_empty() {
		format!("/api/{}", gv.version)
	} else {
		format!("/apis/{}/{}", gv.group, gv.version)
	};

	Some(match namespace {
		Some(ns) => format!("{base}/namespaces/{ns}/{plural}"),
		None => format!("{base}/{plural}"),
	})
}

/// Split `/api/v1/namespaces/default/configmaps/my-config` into
/// (`/api/v1/namespaces/default/configmaps`, `my-config`).
pub(crate) fn split_object_path(path: &str) -> (String, String) {
	let path = path.trim_end_matches('/');
	match path.rsplit_once('/') {
		Some((collection, name)) => (collection.to_string(), name.to_string()),
		None => (path.to_string(), String::new()),
	}
}
