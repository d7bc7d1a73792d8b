//! Mock Kubernetes API server for testing.
//!
//! Serves create/get/delete for arbitrary collections over real HTTP so a
//! `kube::Client` built from the generated kubeconfig can talk to it, and
//! keeps a journal of the requests it handled.

pub mod http;
mod paths;

pub use http::{HttpMockK8sServer, RecordedRequest, RunningHttpMockK8sServer};
pub use paths::collection_path;
