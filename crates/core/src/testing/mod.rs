//! Test doubles for the pipeline's external collaborators.
//!
//! A regular (non-`cfg(test)`) module so integration tests and the server
//! crate's tests can build pipelines against mocks.

mod mock_converter;
mod mock_remote;

pub use mock_converter::{MockConverter, RecordedOperation};
pub use mock_remote::{MockRemoteStore, RecordedUpload};
