//! Tenant-scoped, credential-stamped API requests for authsync.
//!
//! [`ApiClient`] turns an endpoint plus [`RequestOptions`] into a
//! [`RequestDescriptor`] using the session store's current snapshot, and
//! can send it. Every outcome (success or any [`RequestError`]) carries a
//! [`DebugRecord`] with the credential headers redacted.

mod client;
mod config;
mod debug;
mod error;
mod options;

pub use client::{API_KEY_HEADER, ApiClient, TENANT_HEADER, USER_ID_HEADER};
pub use config::{ApiConfig, CredentialScheme, DEFAULT_API_URL};
pub use debug::{DebugRecord, REDACTED};
pub use error::RequestError;
pub use options::{ApiResponse, RequestDescriptor, RequestOptions};
pub use reqwest::Method;
