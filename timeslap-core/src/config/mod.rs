//! Configuration structures and constants for the timeslap-core library.
//!
//! This module provides the encoding configuration the rest of the pipeline
//! reads: codec selection, quality, resolution policy, and the per-filter
//! toggles. The configuration is owned by the calling layer (a GUI or CLI);
//! the core only reads it together with the merged [`SequenceInfo`].
//!
//! [`SequenceInfo`]: crate::sequence::SequenceInfo

mod validation;

use std::ops::RangeInclusive;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aspect::Rect;

pub use validation::{
    ValidationReport, parse_resolution, validate_config, validate_crf, validate_crop,
    validate_framerate, validate_resolution,
};

// Default constants

/// Default frame rate for generated timelapses.
pub const DEFAULT_FRAMERATE: u32 = 25;

/// Default CRF (Constant Rate Factor) quality value.
/// Lower values produce higher quality but larger files.
pub const DEFAULT_CRF: u8 = 18;

/// Default deflicker averaging window size (frames).
pub const DEFAULT_DEFLICKER_SIZE: u32 = 10;

/// Default output file name when the caller does not supply one.
pub const DEFAULT_OUTPUT_FILENAME: &str = "timelapse.mp4";

/// Aspect ratio presets offered for the crop lock, in preference order.
pub const ASPECT_RATIO_PRESETS: &[&str] = &["16:9", "4:3", "1:1", "21:9", "2.39:1", "9:16"];

/// Video codec selector passed to ffmpeg as `-c:v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Libx264,
    Libx265,
    LibsvtAv1,
}

impl Codec {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Libx264 => "libx264",
            Self::Libx265 => "libx265",
            Self::LibsvtAv1 => "libsvtav1",
        }
    }

    /// Valid CRF range for this codec family.
    #[must_use]
    pub fn crf_range(self) -> RangeInclusive<u8> {
        match self {
            Self::Libx264 | Self::Libx265 => 0..=51,
            Self::LibsvtAv1 => 0..=63,
        }
    }
}

/// Named encoder speed preset (x264/x265 vocabulary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl SpeedPreset {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }

    /// SVT-AV1 uses numeric presets 0-13 (lower = slower/better quality).
    #[must_use]
    pub fn svt_av1_preset(self) -> u8 {
        match self {
            Self::Ultrafast => 13,
            Self::Superfast => 12,
            Self::Veryfast => 10,
            Self::Faster => 8,
            Self::Fast => 6,
            Self::Medium => 5,
            Self::Slow => 4,
            Self::Slower => 2,
            Self::Veryslow => 0,
        }
    }
}

/// H.264-style profile name as selected by the caller.
///
/// libx265 does not accept these directly; see [`Profile::h265_profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Baseline,
    Main,
    High,
    High10,
    High422,
    High444,
}

impl Profile {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Main => "main",
            Self::High => "high",
            Self::High10 => "high10",
            Self::High422 => "high422",
            Self::High444 => "high444",
        }
    }

    /// Maps the x264-style profile name to its H.265 equivalent.
    #[must_use]
    pub fn h265_profile(self) -> &'static str {
        match self {
            Self::Baseline | Self::Main | Self::High => "main",
            Self::High10 => "main10",
            Self::High422 => "main422-10",
            Self::High444 => "main444-8",
        }
    }
}

/// Output pixel format, emitted as the final `format=` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Yuv420p,
    Yuv422p,
    Yuv444p,
}

impl PixelFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
        }
    }
}

/// Output resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputResolution {
    /// Keep the source dimensions; no scale filter is emitted.
    Original,
    /// One of the offered fixed resolutions (e.g. 1920x1080).
    Preset(u32, u32),
    /// A user-entered WxH resolution.
    Custom(u32, u32),
}

impl OutputResolution {
    /// Target dimensions, or `None` when the source size is kept.
    #[must_use]
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            Self::Original => None,
            Self::Preset(w, h) | Self::Custom(w, h) => Some((w, h)),
        }
    }
}

/// How the input files are handed to ffmpeg when no concat manifest is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Numeric `%0Nd` pattern inferred from the filenames.
    Sequential,
    /// `glob:` wildcard over the folder.
    Glob,
}

/// Deflicker averaging mode (ffmpeg `deflicker` filter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeflickerMode {
    /// Progressive mean.
    Pm,
    /// Arithmetic mean.
    Am,
}

impl DeflickerMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pm => "pm",
            Self::Am => "am",
        }
    }
}

/// Deflicker filter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deflicker {
    pub mode: DeflickerMode,
    /// Averaging window size in frames.
    pub size: u32,
}

impl Default for Deflicker {
    fn default() -> Self {
        Self {
            mode: DeflickerMode::Pm,
            size: DEFAULT_DEFLICKER_SIZE,
        }
    }
}

/// Aspect-ratio lock mode for interactive crop manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatioMode {
    /// No lock; width and height move independently.
    Free,
    /// Locked to one of [`ASPECT_RATIO_PRESETS`].
    Preset,
    /// Locked to a caller-supplied ratio.
    Custom,
}

/// Aspect-ratio lock state carried alongside the crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatioLock {
    pub mode: AspectRatioMode,
    /// Simplified ratio components; meaningful unless `mode` is `Free`.
    pub ratio: (u32, u32),
}

impl Default for AspectRatioLock {
    fn default() -> Self {
        Self {
            mode: AspectRatioMode::Free,
            ratio: (16, 9),
        }
    }
}

/// Main configuration structure for a single encode.
///
/// Created and owned by the consumer (e.g. a GUI crate) and passed, together
/// with the analyzed [`SequenceInfo`], to [`FfmpegCommandBuilder`] and
/// [`FfmpegEncoder`]. All fields beyond the two folder paths have defaults.
///
/// [`SequenceInfo`]: crate::sequence::SequenceInfo
/// [`FfmpegCommandBuilder`]: crate::command::FfmpegCommandBuilder
/// [`FfmpegEncoder`]: crate::encoder::FfmpegEncoder
#[derive(Debug, Clone)]
pub struct EncodingConfig {
    /// Folder containing the still images.
    pub input_folder: PathBuf,
    /// Folder the output file is written to.
    pub output_folder: PathBuf,
    /// Output file name within `output_folder`.
    pub output_filename: String,

    pub framerate: u32,
    pub codec: Codec,
    pub crf: u8,
    pub preset: SpeedPreset,
    pub resolution: OutputResolution,

    pub profile: Profile,
    /// H.264 level string (e.g. "4.0"); only emitted for libx264.
    pub level: String,
    pub pixel_format: PixelFormat,
    /// Emit `-movflags +faststart` for streaming-friendly output.
    pub movflags_faststart: bool,
    /// Overrides the demuxer start number; `None` leaves it to ffmpeg.
    pub start_number: Option<u64>,
    pub pattern_type: PatternType,
    /// Free-form extra ffmpeg arguments, tokenized with shell-word semantics.
    pub custom_args: String,

    // Filters
    pub deflicker: Option<Deflicker>,
    /// Crop rectangle in already-rotated/flipped coordinates.
    pub crop: Option<Rect>,
    /// Rotation angle in degrees [0, 360); `None` disables rotation.
    pub rotate_angle: Option<f64>,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,

    pub aspect_lock: AspectRatioLock,
}

impl EncodingConfig {
    /// Creates a configuration with default settings for the given folders.
    #[must_use]
    pub fn new(input_folder: PathBuf, output_folder: PathBuf) -> Self {
        Self {
            input_folder,
            output_folder,
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
            framerate: DEFAULT_FRAMERATE,
            codec: Codec::Libx264,
            crf: DEFAULT_CRF,
            preset: SpeedPreset::Medium,
            resolution: OutputResolution::Original,
            profile: Profile::High,
            level: "4.0".to_string(),
            pixel_format: PixelFormat::Yuv420p,
            movflags_faststart: true,
            start_number: None,
            pattern_type: PatternType::Sequential,
            custom_args: String::new(),
            deflicker: None,
            crop: None,
            rotate_angle: None,
            flip_horizontal: false,
            flip_vertical: false,
            aspect_lock: AspectRatioLock::default(),
        }
    }

    /// Full path of the output file.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output_folder.join(&self.output_filename)
    }
}
