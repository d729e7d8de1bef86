//! pix-axum: Axum adapter for pixvault.
//!
//! Exposes an `ObjectService` over HTTP: multipart uploads, listing and
//! streamed downloads, with structured JSON errors and request ids.

pub mod app;
pub mod middlewares;
pub mod rest;
pub mod state;
mod error;
pub use error::PixAxumError;
pub use state::PixAxumState;

pub use app::{axum, axum_with, AxumApp};
