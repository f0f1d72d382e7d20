//! HTTP client plumbing shared by the external integrations.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
