//! Dilidili API - Bilibili metadata lookup
//!
//! Resolves `BV…` identifiers into a display title and the separate DASH
//! video and audio stream locations the core pipeline downloads.

pub mod errors;
pub mod identifier;
pub mod provider;
pub mod types;

pub use errors::ApiError;
pub use identifier::extract_identifier;
pub use provider::{BilibiliProvider, DEFAULT_API_BASE};
pub use types::{ApiEnvelope, DashInfo, DashStream, PlayUrlData, ViewData};
