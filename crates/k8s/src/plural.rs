use std::borrow::Cow;

use phf::phf_map;

/// Collection names of well-known kinds, as the API server registers them.
///
/// Mostly kinds the suffix heuristic gets wrong, plus a few common ones so
/// they don't depend on it at all.
static BUILTIN_RESOURCES: phf::Map<&'static str, &'static str> = phf_map! {
	"APIService" => "apiservices",
	"ClusterRole" => "clusterroles",
	"ClusterRoleBinding" => "clusterrolebindings",
	"ComponentStatus" => "componentstatuses",
	"ConfigMap" => "configmaps",
	"CustomResourceDefinition" => "customresourcedefinitions",
	"DaemonSet" => "daemonsets",
	"Deployment" => "deployments",
	"Endpoints" => "endpoints",
	"EndpointSlice" => "endpointslices",
	"HorizontalPodAutoscaler" => "horizontalpodautoscalers",
	"Ingress" => "ingresses",
	"IngressClass" => "ingressclasses",
	"LimitRange" => "limitranges",
	"MutatingWebhookConfiguration" => "mutatingwebhookconfigurations",
	"Namespace" => "namespaces",
	"NetworkPolicy" => "networkpolicies",
	"PersistentVolume" => "persistentvolumes",
	"PersistentVolumeClaim" => "persistentvolumeclaims",
	"Pod" => "pods",
	"PodDisruptionBudget" => "poddisruptionbudgets",
	"PodSecurityPolicy" => "podsecuritypolicies",
	"PriorityClass" => "priorityclasses",
	"ResourceQuota" => "resourcequotas",
	"Role" => "roles",
	"RoleBinding" => "rolebindings",
	"RuntimeClass" => "runtimeclasses",
	"Secret" => "secrets",
	"Service" => "services",
	"ServiceAccount" => "serviceaccounts",
	"StatefulSet" => "statefulsets",
	"StorageClass" => "storageclasses",
	"ValidatingWebhookConfiguration" => "validatingwebhookconfigurations",
};

/// Exact rewrites for names that come out of pluralization wrong.
static CORRECTIONS: phf::Map<&'static str, &'static str> = phf_map! {
	"endpointses" => "endpoints",
	"nodemetricses" => "nodemetrics",
	"podmetricses" => "podmetrics",
};

/// Lower-case `kind` and pluralize it with a suffix heuristic.
///
/// - ends in `s`: append `es` (`ingress` -> `ingresses`)
/// - ends in `policy`: `y` -> `ies` (`networkpolicy` -> `networkpolicies`)
/// - anything else: append `s`
///
/// This is deliberately not a dictionary, run the result through
/// [`correct_resource_name`] to fix the known misses.
pub fn pluralize(kind: &str) -> String {
	let lower = kind.to_lowercase();
	if lower.ends_with('s') {
		format!("{lower}es")
	} else if let Some(stem) = lower.strip_suffix("policy") {
		format!("{stem}policies")
	} else {
		format!("{lower}s")
	}
}

/// Look `kind` up in the table of well-known resources.
pub fn builtin_resource(kind: &str) -> Option<&'static str> {
	BUILTIN_RESOURCES.get(kind).copied()
}

/// Fix resource names the store spells differently than naive pluralization.
///
/// Applied after either pluralization or an explicit kind mapping, so a
/// hand-written `fooPolicys` entry still ends up as `foopolicies`.
pub fn correct_resource_name(resource: &str) -> Cow<'_, str> {
	if let Some(fixed) = CORRECTIONS.get(resource) {
		return Cow::Borrowed(fixed);
	}
	let lower = resource.to_lowercase();
	if let Some(stem) = lower.strip_suffix("policys") {
		return Cow::Owned(format!("{stem}policies"));
	}
	if lower == resource {
		Cow::Borrowed(resource)
	} else {
		Cow::Owned(lower)
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("pod", "pods")]
	#[case("Pod", "pods")]
	#[case("ConfigMap", "configmaps")]
	#[case("ingress", "ingresses")]
	#[case("networkpolicy", "networkpolicies")]
	#[case("PodSecurityPolicy", "podsecuritypolicies")]
	#[case("Endpoints", "endpointses")]
	#[case("Gateway", "gateways")]
	fn test_pluralize(#[case] kind: &str, #[case] expected: &str) {
		assert_eq!(pluralize(kind), expected);
	}

	#[rstest]
	#[case("pod", "pods")]
	#[case("ingress", "ingresses")]
	#[case("podsecuritypolicy", "podsecuritypolicies")]
	#[case("networkpolicy", "networkpolicies")]
	#[case("endpoints", "endpoints")]
	fn test_pluralize_then_correct(#[case] kind: &str, #[case] expected: &str) {
		assert_eq!(correct_resource_name(&pluralize(kind)), expected);
	}

	#[rstest]
	#[case("podsecuritypolicys", "podsecuritypolicies")]
	#[case("FooPolicys", "foopolicies")]
	#[case("endpointses", "endpoints")]
	#[case("Widgets", "widgets")]
	#[case("deployments", "deployments")]
	fn test_correct_resource_name(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(correct_resource_name(input), expected);
	}

	#[test]
	fn test_correct_resource_name_borrows_when_unchanged() {
		assert!(matches!(correct_resource_name("pods"), Cow::Borrowed("pods")));
	}

	#[test]
	fn test_builtin_table_agrees_with_corrections() {
		for (kind, resource) in BUILTIN_RESOURCES.entries() {
			assert_eq!(
				correct_resource_name(resource),
				*resource,
				"builtin entry for {kind} is not in canonical form"
			);
		}
	}

	#[test]
	fn test_builtin_resource() {
		assert_eq!(builtin_resource("Endpoints"), Some("endpoints"));
		assert_eq!(builtin_resource("endpoints"), None);
		assert_eq!(builtin_resource("Widget"), None);
	}
}
