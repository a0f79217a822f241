//! Text extraction for scanned documents via a remote OCR job service.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{OcrClient, OcrError};
