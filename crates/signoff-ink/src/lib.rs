//! Signature capture for Signoff.
//!
//! The UI hands us a raw RGBA pixel buffer from a free-hand drawing canvas;
//! this crate turns it into a compositable PNG (optionally keying a
//! background color to transparent), rejects empty canvases, and persists
//! the result in a per-student filesystem store.

mod buffer;
mod store;

pub use buffer::{render_signature, BackgroundPolicy, PixelBuffer, Rgb};
pub use store::SignatureStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The canvas contains no visible strokes; the caller must re-prompt
    /// instead of recording an empty signature.
    #[error("signature canvas is empty")]
    EmptyCanvas,
    #[error("pixel buffer is {got} bytes but {width}x{height} RGBA needs {expected}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
    #[error("pixel buffer dimensions are zero")]
    EmptyDimensions,
    #[error("identity {0:?} is not usable as a signature file name")]
    InvalidIdentity(String),
    #[error("png encode error: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("png decode error: {0}")]
    Decode(#[from] png::DecodingError),
    #[error("unsupported png pixel layout: {0}")]
    UnsupportedPng(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
