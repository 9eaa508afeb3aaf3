//! Drive Provider
//!
//! Client for the remote object store the upload pipeline targets: multipart
//! file creation and public-read permission grants.

pub mod client;
pub mod error;
pub mod types;

pub use client::DriveClient;
pub use error::{DriveError, Result};
pub use types::CreatedFile;
