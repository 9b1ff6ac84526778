//! Validation of encoding configurations.
//!
//! Configuration errors are caught here, before anything reaches the command
//! builder or the encoder process; an invalid configuration never produces an
//! argument list. Results are collected into a [`ValidationReport`] rather
//! than returned as hard errors, because most of them are user-fixable input
//! problems.

use std::path::Path;

use crate::config::{Codec, EncodingConfig, OutputResolution};
use crate::error::{CoreError, CoreResult};
use crate::sequence::SequenceInfo;

/// Maximum accepted frame rate.
const MAX_FRAMERATE: u32 = 240;

/// Collected validation errors and warnings.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Absorbs another report's findings.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Parses a `WxH` resolution string into dimensions.
pub fn parse_resolution(text: &str) -> CoreResult<(u32, u32)> {
    let malformed =
        || CoreError::Config(format!("resolution must be in WIDTHxHEIGHT form: {text}"));

    let (w_str, h_str) = text.split_once('x').ok_or_else(malformed)?;
    let width: u32 = w_str.parse().map_err(|_| malformed())?;
    let height: u32 = h_str.parse().map_err(|_| malformed())?;
    if width == 0 || height == 0 {
        return Err(malformed());
    }
    Ok((width, height))
}

/// Validates a frame rate value.
#[must_use]
pub fn validate_framerate(framerate: u32) -> ValidationReport {
    let mut report = ValidationReport::new();

    if framerate == 0 {
        report.error("Frame rate must be greater than 0");
    } else if framerate > MAX_FRAMERATE {
        report.error(format!("Frame rate must not exceed {MAX_FRAMERATE}"));
    } else if framerate > 120 {
        report.warning(format!(
            "Very high frame rate ({framerate} fps) can produce large files"
        ));
    }

    report
}

/// Validates a CRF value against the codec's supported range.
#[must_use]
pub fn validate_crf(crf: u8, codec: Codec) -> ValidationReport {
    let mut report = ValidationReport::new();
    let range = codec.crf_range();

    if !range.contains(&crf) {
        report.error(format!(
            "CRF for {} must be between {} and {}",
            codec.as_str(),
            range.start(),
            range.end()
        ));
    }

    report
}

/// Validates an output resolution policy.
#[must_use]
pub fn validate_resolution(resolution: OutputResolution) -> ValidationReport {
    let mut report = ValidationReport::new();

    if let Some((width, height)) = resolution.dimensions() {
        if width > 7680 || height > 4320 {
            report.warning(format!(
                "Very high resolution ({width}x{height}) can cause performance problems"
            ));
        }
        if width % 2 != 0 || height % 2 != 0 {
            report.warning(format!(
                "Resolution {width}x{height} has odd dimensions; the padding filter will be applied"
            ));
        }
    }

    report
}

/// Validates a crop rectangle against the source image bounds.
#[must_use]
pub fn validate_crop(rect: crate::aspect::Rect, image_width: u32, image_height: u32) -> ValidationReport {
    let mut report = ValidationReport::new();

    if rect.width == 0 || rect.height == 0 {
        report.error("Crop width and height must be greater than 0");
    }
    if u64::from(rect.x) + u64::from(rect.width) > u64::from(image_width) {
        report.error(format!(
            "Crop exceeds image width (x={} + width={} > {})",
            rect.x, rect.width, image_width
        ));
    }
    if u64::from(rect.y) + u64::from(rect.height) > u64::from(image_height) {
        report.error(format!(
            "Crop exceeds image height (y={} + height={} > {})",
            rect.y, rect.height, image_height
        ));
    }
    if rect.width % 2 != 0 || rect.height % 2 != 0 {
        report.warning("Crop dimensions are odd; the padding filter will be applied");
    }

    report
}

fn validate_folder(path: &Path, must_exist: bool) -> ValidationReport {
    let mut report = ValidationReport::new();

    if path.as_os_str().is_empty() {
        report.error("Path is empty");
    } else if must_exist && !path.exists() {
        report.error(format!("Folder does not exist: {}", path.display()));
    } else if must_exist && !path.is_dir() {
        report.error(format!("Path is not a folder: {}", path.display()));
    }

    report
}

/// Validates a complete encoding configuration together with the analyzed
/// sequence it was merged with.
#[must_use]
pub fn validate_config(
    config: &EncodingConfig,
    sequence: Option<&SequenceInfo>,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    report.merge(validate_folder(&config.input_folder, true));
    report.merge(validate_folder(&config.output_folder, false));

    if config.output_filename.is_empty() {
        report.error("Output file name is empty");
    } else {
        let known_container = [".mp4", ".mkv", ".avi", ".mov"]
            .iter()
            .any(|ext| config.output_filename.ends_with(ext));
        if !known_container {
            report.warning(format!(
                "Unusual output file extension: {}",
                config.output_filename
            ));
        }
    }

    report.merge(validate_framerate(config.framerate));
    report.merge(validate_crf(config.crf, config.codec));
    report.merge(validate_resolution(config.resolution));

    if !config.custom_args.is_empty() && shell_words::split(&config.custom_args).is_err() {
        report.error("Custom arguments contain unbalanced quoting");
    }

    match sequence {
        Some(sequence) => {
            if let Some(rect) = config.crop {
                report.merge(validate_crop(
                    rect,
                    sequence.image_width,
                    sequence.image_height,
                ));
            }
        }
        None => report.error("No image sequence detected; select an input folder first"),
    }

    report
}
