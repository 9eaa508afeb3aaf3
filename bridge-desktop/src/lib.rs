//! Desktop Platform Bridge
//!
//! Native implementations of the platform traits: HTTP over reqwest, secret
//! storage over the OS keyring with a plain-file fallback, filesystem media
//! resolution, and the loopback authorization hand-off.

pub mod handoff;
pub mod http;
pub mod media;
pub mod plain_store;
pub mod probe;
#[cfg(feature = "secure-store")]
pub mod secure_store;

pub use handoff::{LoopbackHandoff, SystemBrowser};
pub use http::ReqwestHttpClient;
pub use media::FsMediaSource;
pub use plain_store::FileSecretStore;
pub use probe::select_secret_store;
#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecretStore;
