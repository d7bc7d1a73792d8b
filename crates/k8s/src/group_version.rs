use std::fmt;

use thiserror::Error;

/// `apiVersion` could not be split into a group and a version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected GroupVersion string: {0}")]
pub struct GroupVersionError(pub String);

/// API group and version, as found in a manifest's `apiVersion`.
///
/// The core API has an empty group, so `v1` parses to `("", "v1")`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupVersion {
	pub group: String,
	pub version: String,
}

impl GroupVersion {
	/// Parse `[group/]version`.
	///
	/// An empty string and a lone `/` both yield the empty group version,
	/// matching the API machinery's own parser. More than one `/` is an error.
	pub fn parse(api_version: &str) -> Result<Self, GroupVersionError> {
		if api_version.is_empty() || api_version == "/" {
			return Ok(Self::default());
		}

		let mut parts = api_version.split('/');
		match (parts.next(), parts.next(), parts.next()) {
			(Some(version), None, None) => Ok(Self {
				group: String::new(),
				version: version.to_string(),
			}),
			(Some(group), Some(version), None) => Ok(Self {
				group: group.to_string(),
				version: version.to_string(),
			}),
			_ => Err(GroupVersionError(api_version.to_string())),
		}
	}

	/// Attach a collection resource name.
	pub fn with_resource(self, resource: impl Into<String>) -> GroupVersionResource {
		GroupVersionResource {
			group: self.group,
			version: self.version,
			resource: resource.into(),
		}
	}
}

/// A collection of objects in the API: group, version and plural resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
	pub group: String,
	pub version: String,
	pub resource: String,
}

/// Formats as `{group version resource}`, the shape `kubectl` users know from
/// client-go debug output.
impl fmt::Display for GroupVersionResource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{{{} {} {}}}", self.group, self.version, self.resource)
	}
}
