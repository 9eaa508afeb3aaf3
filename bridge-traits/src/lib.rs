//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that is implemented differently per platform.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`MediaSource`](media::MediaSource) - Resolves local attachment handles to bytes
//!
//! ### Security & Storage
//! - [`SecretStore`](storage::SecretStore) - Credential persistence with a
//!   capability query (secure vs. plain backend)
//!
//! ### Authorization
//! - [`AuthorizationHandoff`](auth::AuthorizationHandoff) - Browser-delegated
//!   authorization leg, resolved synchronously within the initiating flow
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert platform-specific errors to `BridgeError`
//! and provide actionable messages without exposing secret material.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod auth;
pub mod error;
pub mod http;
pub mod media;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use auth::{AuthorizationHandoff, AuthorizationOutcome, UrlLauncher};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use media::{MediaInfo, MediaSource};
pub use storage::{SecretStore, StorageCapability};
