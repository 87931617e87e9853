mod cache;
mod client;
mod json;
mod provider;
pub mod types;

pub use client::{ServiceEndpoints, DEFAULT_TIMEOUT_SECS};
pub use provider::AzureProvider;
