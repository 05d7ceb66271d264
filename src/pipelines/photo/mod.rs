// SPDX-License-Identifier: MPL-2.0

//! Still photo pipeline
//!
//! ```text
//! Camera Backend → Capture → Encoding → Photo Library
//!       ↓
//! Preview continues uninterrupted
//! ```
//!
//! Capture and encoding run on the blocking pool so the preview and the UI
//! never wait on them. Saving is handled by [`crate::storage`].

pub mod encoding;

pub use encoding::{EncodedImage, PhotoEncoder, decode_to_rgba, encode_frame};
