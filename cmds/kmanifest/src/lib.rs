//! kmanifest library.
//!
//! Decodes multi-document manifest files and creates, inspects or deletes the
//! resources they describe.

pub mod batch;
pub mod client;
pub mod commands;
pub mod config;
pub mod decode;
pub mod manifest;
pub mod resolve;
pub mod store;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
