// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for captured frames
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG File   │
//! │ (YUYV/MJPEG) │     │  - YUYV→RGB       │     │              │
//! │              │     │  - Encoding       │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! - [`photo`]: Async JPEG encoding of still captures

pub mod photo;
