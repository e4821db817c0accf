// cmas-api: Async Rust client for the Configuration Manager Admin Service

pub mod client;
pub mod error;
pub mod models;
pub mod odata;
pub mod script_xml;
pub mod transport;
pub mod wmi;

pub use client::AdminClient;
pub use error::Error;
pub use odata::{Filter, NamePattern};
pub use transport::{Credentials, TlsMode, TransportConfig};

// Callers of `AdminClient::invoke` name the verb without a direct reqwest dependency.
pub use reqwest::Method;
