// SPDX-License-Identifier: GPL-3.0-only

//! Fill light state
//!
//! Everything the user adjusts on screen: the panel color and brightness,
//! the preview filter, mirroring and the flash toggle. None of it touches
//! the capture session; the front end owns it and draws from it.

use crate::constants::{
    BRIGHTNESS_DEFAULT, BRIGHTNESS_MAX, BRIGHTNESS_MIN, BRIGHTNESS_STEP, COLOR_CHANNEL_STEP,
};

/// Linear RGB color with channels in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightColor {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl LightColor {
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Channel values clamped to `0.0..=1.0`
    pub fn clamped(self) -> Self {
        Self {
            red: self.red.clamp(0.0, 1.0),
            green: self.green.clamp(0.0, 1.0),
            blue: self.blue.clamp(0.0, 1.0),
        }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            red: self.red * factor,
            green: self.green * factor,
            blue: self.blue * factor,
        }
        .clamped()
    }

    /// Blend towards `other` by `amount` (0 keeps `self`, 1 gives `other`)
    pub fn mix(self, other: LightColor, amount: f32) -> Self {
        let t = amount.clamp(0.0, 1.0);
        Self {
            red: self.red + (other.red - self.red) * t,
            green: self.green + (other.green - self.green) * t,
            blue: self.blue + (other.blue - self.blue) * t,
        }
    }

    pub fn to_rgb8(self) -> (u8, u8, u8) {
        let c = self.clamped();
        (
            (c.red * 255.0).round() as u8,
            (c.green * 255.0).round() as u8,
            (c.blue * 255.0).round() as u8,
        )
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }
}

/// Color channel for custom editing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
}

/// Fill light presets, all in the pink family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresetLight {
    #[default]
    Natural,
    Warm,
    Cool,
    Peach,
    /// Keeps the current color and unlocks free editing
    Custom,
}

impl PresetLight {
    pub const ALL: [PresetLight; 5] = [
        PresetLight::Natural,
        PresetLight::Warm,
        PresetLight::Cool,
        PresetLight::Peach,
        PresetLight::Custom,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            PresetLight::Natural => "Natural",
            PresetLight::Warm => "Warm",
            PresetLight::Cool => "Cool",
            PresetLight::Peach => "Peach",
            PresetLight::Custom => "Custom",
        }
    }

    pub fn color(&self) -> LightColor {
        match self {
            PresetLight::Natural | PresetLight::Custom => LightColor::new(1.0, 0.9, 0.9),
            PresetLight::Warm => LightColor::new(1.0, 0.85, 0.85),
            PresetLight::Cool => LightColor::new(0.95, 0.9, 0.95),
            PresetLight::Peach => LightColor::new(1.0, 0.8, 0.8),
        }
    }

    /// Preset bound to a number key (1-based)
    pub fn from_index(index: usize) -> Option<PresetLight> {
        index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

/// Preview filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterType {
    #[default]
    None,
    Smooth,
    Fresh,
    Warm,
    Cool,
}

impl FilterType {
    pub const ALL: [FilterType; 5] = [
        FilterType::None,
        FilterType::Smooth,
        FilterType::Fresh,
        FilterType::Warm,
        FilterType::Cool,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            FilterType::None => "Original",
            FilterType::Smooth => "Smooth",
            FilterType::Fresh => "Fresh",
            FilterType::Warm => "Warm",
            FilterType::Cool => "Cool",
        }
    }

    /// Overlay strength
    pub fn intensity(&self) -> f32 {
        match self {
            FilterType::None => 0.0,
            FilterType::Smooth => 0.3,
            FilterType::Fresh => 0.4,
            FilterType::Warm => 0.5,
            FilterType::Cool => 0.4,
        }
    }

    /// Color the preview is blended towards
    pub fn tint(&self) -> LightColor {
        match self {
            FilterType::None | FilterType::Smooth => LightColor::new(1.0, 1.0, 1.0),
            FilterType::Fresh => LightColor::new(0.85, 1.0, 0.9),
            FilterType::Warm => LightColor::new(1.0, 0.8, 0.6),
            FilterType::Cool => LightColor::new(0.7, 0.85, 1.0),
        }
    }

    pub fn next(&self) -> FilterType {
        let index = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    /// Apply the overlay to one preview pixel
    pub fn apply(&self, rgb: (u8, u8, u8)) -> (u8, u8, u8) {
        if *self == FilterType::None {
            return rgb;
        }
        LightColor::from_rgb8(rgb.0, rgb.1, rgb.2)
            .mix(self.tint(), self.intensity())
            .to_rgb8()
    }
}

/// User-adjustable fill light state
#[derive(Debug, Clone, PartialEq)]
pub struct FillLightSettings {
    pub background: LightColor,
    pub brightness: f32,
    pub preset: PresetLight,
    pub filter: FilterType,
    pub mirror: bool,
    pub flash: bool,
    /// Whether the user wants the camera running
    pub camera_active: bool,
}

impl Default for FillLightSettings {
    fn default() -> Self {
        Self {
            background: PresetLight::Natural.color(),
            brightness: BRIGHTNESS_DEFAULT,
            preset: PresetLight::Natural,
            filter: FilterType::None,
            mirror: true,
            flash: false,
            camera_active: true,
        }
    }
}

impl FillLightSettings {
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// Switch preset. `Custom` keeps the current color.
    pub fn select_preset(&mut self, preset: PresetLight) {
        self.preset = preset;
        if preset != PresetLight::Custom {
            self.background = preset.color();
        }
    }

    /// Nudge one color channel. Only allowed on the custom preset.
    pub fn adjust_channel(&mut self, channel: ColorChannel, delta: f32) -> bool {
        if self.preset != PresetLight::Custom {
            return false;
        }
        let value = match channel {
            ColorChannel::Red => &mut self.background.red,
            ColorChannel::Green => &mut self.background.green,
            ColorChannel::Blue => &mut self.background.blue,
        };
        *value = (*value + delta).clamp(0.0, 1.0);
        true
    }

    pub fn step_channel(&mut self, channel: ColorChannel, up: bool) -> bool {
        let delta = if up {
            COLOR_CHANNEL_STEP
        } else {
            -COLOR_CHANNEL_STEP
        };
        self.adjust_channel(channel, delta)
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness.clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX);
    }

    pub fn brighter(&mut self) {
        self.set_brightness(self.brightness + BRIGHTNESS_STEP);
    }

    pub fn dimmer(&mut self) {
        self.set_brightness(self.brightness - BRIGHTNESS_STEP);
    }

    pub fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
    }

    pub fn toggle_mirror(&mut self) {
        self.mirror = !self.mirror;
    }

    pub fn toggle_flash(&mut self) {
        self.flash = !self.flash;
    }

    pub fn toggle_camera(&mut self) -> bool {
        self.camera_active = !self.camera_active;
        self.camera_active
    }

    /// Color the light panel is drawn in
    pub fn panel_color(&self) -> LightColor {
        self.background.scaled(self.brightness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = FillLightSettings::default();
        assert_eq!(settings.preset, PresetLight::Natural);
        assert_eq!(settings.background, LightColor::new(1.0, 0.9, 0.9));
        assert_eq!(settings.brightness, BRIGHTNESS_DEFAULT);
        assert!(settings.mirror);
        assert!(!settings.flash);
        assert!(settings.camera_active);
    }

    #[test]
    fn test_custom_keeps_color() {
        let mut settings = FillLightSettings::default();
        settings.select_preset(PresetLight::Peach);
        settings.select_preset(PresetLight::Custom);
        assert_eq!(settings.background, PresetLight::Peach.color());
    }

    #[test]
    fn test_channels_locked_outside_custom() {
        let mut settings = FillLightSettings::default();
        assert!(!settings.adjust_channel(ColorChannel::Green, -0.2));
        assert_eq!(settings.background, PresetLight::Natural.color());

        settings.select_preset(PresetLight::Custom);
        assert!(settings.adjust_channel(ColorChannel::Green, -0.2));
        assert!((settings.background.green - 0.7).abs() < 1e-6);

        assert!(settings.adjust_channel(ColorChannel::Red, 0.5));
        assert_eq!(settings.background.red, 1.0);
    }

    #[test]
    fn test_brightness_clamped() {
        let mut settings = FillLightSettings::default();
        for _ in 0..40 {
            settings.dimmer();
        }
        assert_eq!(settings.brightness, BRIGHTNESS_MIN);
        for _ in 0..40 {
            settings.brighter();
        }
        assert_eq!(settings.brightness, BRIGHTNESS_MAX);
    }

    #[test]
    fn test_panel_color_scales_with_brightness() {
        let mut settings = FillLightSettings::default();
        settings.set_brightness(0.5);
        let color = settings.panel_color();
        assert!((color.red - 0.5).abs() < 1e-6);
        assert!((color.green - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_filter_cycle_wraps() {
        let mut filter = FilterType::None;
        for _ in 0..FilterType::ALL.len() {
            filter = filter.next();
        }
        assert_eq!(filter, FilterType::None);
    }

    #[test]
    fn test_filter_intensities() {
        let intensities: Vec<f32> = FilterType::ALL.iter().map(|f| f.intensity()).collect();
        assert_eq!(intensities, vec![0.0, 0.3, 0.4, 0.5, 0.4]);
        assert_eq!(FilterType::None.apply((10, 20, 30)), (10, 20, 30));
        assert_eq!(FilterType::Smooth.apply((255, 255, 255)), (255, 255, 255));
    }

    #[test]
    fn test_preset_number_keys() {
        assert_eq!(PresetLight::from_index(1), Some(PresetLight::Natural));
        assert_eq!(PresetLight::from_index(5), Some(PresetLight::Custom));
        assert_eq!(PresetLight::from_index(0), None);
        assert_eq!(PresetLight::from_index(6), None);
    }
}
