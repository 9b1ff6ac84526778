//! Preset interchange format.
//!
//! A preset is a JSON object `{ "name", "description", "settings" }` whose
//! settings block is a flat mirror of the [`EncodingConfig`] fields. Every
//! key is optional: applying a preset overwrites only the values it carries
//! and leaves the rest of the configuration untouched, so presets saved by
//! older versions keep working. Reading and writing the JSON from disk is
//! the caller's concern; this module only defines the shape and the merge.

use serde::{Deserialize, Serialize};

use crate::aspect::Rect;
use crate::config::{
    Codec, Deflicker, DeflickerMode, EncodingConfig, OutputResolution, PatternType, PixelFormat,
    Profile, SpeedPreset, parse_resolution,
};
use crate::error::CoreResult;

/// A named, shareable bundle of encoding settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub name: String,
    pub description: String,
    pub settings: PresetSettings,
}

/// Flat, fully optional mirror of the configurable encoding fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetSettings {
    pub framerate: Option<u32>,
    pub codec: Option<Codec>,
    pub crf: Option<u8>,
    pub preset: Option<SpeedPreset>,
    /// `"original"` or a `WxH` string.
    pub resolution: Option<String>,
    pub profile: Option<Profile>,
    pub level: Option<String>,
    pub pixel_format: Option<PixelFormat>,
    pub movflags_faststart: Option<bool>,
    pub pattern_type: Option<PatternType>,
    pub custom_args: Option<String>,
    pub deflicker_enabled: Option<bool>,
    pub deflicker_mode: Option<DeflickerMode>,
    pub deflicker_size: Option<u32>,
    pub crop_enabled: Option<bool>,
    pub crop_x: Option<u32>,
    pub crop_y: Option<u32>,
    pub crop_w: Option<u32>,
    pub crop_h: Option<u32>,
    pub rotate_angle: Option<f64>,
    pub flip_horizontal: Option<bool>,
    pub flip_vertical: Option<bool>,
}

impl Preset {
    /// Deserializes a preset from its JSON interchange form.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes this preset to pretty-printed JSON.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Captures the shareable parts of a configuration into a preset.
    #[must_use]
    pub fn capture(name: &str, description: &str, config: &EncodingConfig) -> Self {
        let resolution = match config.resolution {
            OutputResolution::Original => "original".to_string(),
            OutputResolution::Preset(w, h) | OutputResolution::Custom(w, h) => {
                format!("{w}x{h}")
            }
        };

        Self {
            name: name.to_string(),
            description: description.to_string(),
            settings: PresetSettings {
                framerate: Some(config.framerate),
                codec: Some(config.codec),
                crf: Some(config.crf),
                preset: Some(config.preset),
                resolution: Some(resolution),
                profile: Some(config.profile),
                level: Some(config.level.clone()),
                pixel_format: Some(config.pixel_format),
                movflags_faststart: Some(config.movflags_faststart),
                pattern_type: Some(config.pattern_type),
                custom_args: Some(config.custom_args.clone()),
                deflicker_enabled: Some(config.deflicker.is_some()),
                deflicker_mode: config.deflicker.map(|d| d.mode),
                deflicker_size: config.deflicker.map(|d| d.size),
                crop_enabled: Some(config.crop.is_some()),
                crop_x: config.crop.map(|r| r.x),
                crop_y: config.crop.map(|r| r.y),
                crop_w: config.crop.map(|r| r.width),
                crop_h: config.crop.map(|r| r.height),
                rotate_angle: config.rotate_angle,
                flip_horizontal: Some(config.flip_horizontal),
                flip_vertical: Some(config.flip_vertical),
            },
        }
    }

    /// Applies this preset to a configuration. Missing keys fall back to the
    /// configuration's current values; unparsable ones are skipped.
    pub fn apply_to(&self, config: &mut EncodingConfig) {
        let s = &self.settings;

        if let Some(framerate) = s.framerate {
            config.framerate = framerate;
        }
        if let Some(codec) = s.codec {
            config.codec = codec;
        }
        if let Some(crf) = s.crf {
            config.crf = crf;
        }
        if let Some(preset) = s.preset {
            config.preset = preset;
        }
        if let Some(resolution) = &s.resolution {
            if resolution == "original" {
                config.resolution = OutputResolution::Original;
            } else if let Ok((w, h)) = parse_resolution(resolution) {
                config.resolution = OutputResolution::Custom(w, h);
            }
        }
        if let Some(profile) = s.profile {
            config.profile = profile;
        }
        if let Some(level) = &s.level {
            config.level = level.clone();
        }
        if let Some(pixel_format) = s.pixel_format {
            config.pixel_format = pixel_format;
        }
        if let Some(faststart) = s.movflags_faststart {
            config.movflags_faststart = faststart;
        }
        if let Some(pattern_type) = s.pattern_type {
            config.pattern_type = pattern_type;
        }
        if let Some(custom_args) = &s.custom_args {
            config.custom_args = custom_args.clone();
        }

        match s.deflicker_enabled {
            Some(true) => {
                let current = config.deflicker.unwrap_or_default();
                config.deflicker = Some(Deflicker {
                    mode: s.deflicker_mode.unwrap_or(current.mode),
                    size: s.deflicker_size.unwrap_or(current.size),
                });
            }
            Some(false) => config.deflicker = None,
            None => {}
        }

        match s.crop_enabled {
            Some(true) => {
                if let (Some(x), Some(y), Some(w), Some(h)) =
                    (s.crop_x, s.crop_y, s.crop_w, s.crop_h)
                {
                    config.crop = Some(Rect::new(x, y, w, h));
                }
            }
            Some(false) => config.crop = None,
            None => {}
        }

        if let Some(angle) = s.rotate_angle {
            config.rotate_angle = if angle == 0.0 { None } else { Some(angle) };
        }
        if let Some(flip) = s.flip_horizontal {
            config.flip_horizontal = flip;
        }
        if let Some(flip) = s.flip_vertical {
            config.flip_vertical = flip;
        }
    }
}
