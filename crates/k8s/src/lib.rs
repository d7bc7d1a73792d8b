//! Kubernetes naming helpers.
//!
//! Everything in here is pure string manipulation: parsing `apiVersion`
//! into a group and version, and turning a `kind` into the collection
//! resource name used in API paths.

mod group_version;
mod plural;

pub use group_version::{GroupVersion, GroupVersionError, GroupVersionResource};
pub use plural::{builtin_resource, correct_resource_name, pluralize};
