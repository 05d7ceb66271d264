// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera hardware and camera access
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Capture Session               │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │   Permission     │  │     Camera      │  │
//! │  │ (portal / /dev)  │  │ (V4L2 / synth)  │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera backends with device enumeration and frame capture
//! - [`permission`]: Camera authorization providers

pub mod camera;
pub mod permission;
