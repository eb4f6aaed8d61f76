//! Adapters for the extraction backend: the JSON HTTP API and the
//! WebSocket push channel carrying extraction events.

pub mod client;
pub mod error;
pub mod events;
pub mod types;

pub use client::{TwinClient, DEFAULT_BASE_URL};
pub use error::ClientError;
pub use events::{decode_frame, EventSocket};
pub use types::{AuthorizeResponse, ExtractResponse};
