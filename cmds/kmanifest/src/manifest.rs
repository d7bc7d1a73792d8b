//! Decoded manifest documents.
//!
//! A manifest is kept as an untyped JSON value (object keys stay in source
//! order) with typed accessors for the handful of fields the tool routes on.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded resource document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Value);

impl Manifest {
	pub fn new(value: Value) -> Self {
		Self(value)
	}

	/// Walk `path` through nested objects.
	pub fn get(&self, path: &[&str]) -> Option<&Value> {
		path.iter().try_fold(&self.0, |value, key| value.get(key))
	}

	/// String at `path`, or `default` when it is absent or not a string.
	pub fn get_string<'a>(&'a self, path: &[&str], default: &'a str) -> &'a str {
		self.get(path).and_then(Value::as_str).unwrap_or(default)
	}

	pub fn api_version(&self) -> &str {
		self.get_string(&["apiVersion"], "")
	}

	pub fn kind(&self) -> &str {
		self.get_string(&["kind"], "")
	}

	pub fn name(&self) -> &str {
		self.get_string(&["metadata", "name"], "")
	}

	/// Empty when the document does not set one.
	pub fn namespace(&self) -> &str {
		self.get_string(&["metadata", "namespace"], "")
	}

	pub fn as_value(&self) -> &Value {
		&self.0
	}

	pub fn into_value(self) -> Value {
		self.0
	}

	/// Render as a single YAML document, without the leading `---`.
	pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
		serde_yaml::to_string(&self.0)
	}
}

impl From<Value> for Manifest {
	fn from(value: Value) -> Self {
		Self(value)
	}
}

/// Compact JSON.
impl fmt::Display for Manifest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
