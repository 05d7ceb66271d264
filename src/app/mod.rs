// SPDX-License-Identifier: MPL-2.0

//! Fill light application state
//!
//! - `state`: panel color, brightness, presets and preview filters

mod state;

pub use state::{ColorChannel, FillLightSettings, FilterType, LightColor, PresetLight};
