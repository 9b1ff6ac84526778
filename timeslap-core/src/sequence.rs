//! Image sequence detection and analysis.
//!
//! Scans a folder of still images, infers the numeric naming pattern, detects
//! gaps in the numbering, and probes one representative image for dimensions
//! and format. Also writes the concat demuxer manifest used when gaps make a
//! `%0Nd` pattern unusable.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CoreResult;

/// File extensions treated as sequence frames (matched case-insensitively).
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff"];

/// Name of the concat manifest written next to the input images.
pub const CONCAT_MANIFEST_NAME: &str = "filelist.txt";

/// The one filename shape a sequence may take: `<prefix><digits><.ext>`.
static FILENAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)(\d+)(\.\w+)$").expect("valid filename regex"));

/// Information about a detected image sequence.
#[derive(Debug, Clone)]
pub struct SequenceInfo {
    /// ffmpeg input pattern, e.g. `IMG_%04d.jpg`.
    pub pattern: String,
    /// Number of image files found.
    pub count: usize,
    /// Smallest frame number in the sequence.
    pub start_number: u64,
    /// Largest frame number in the sequence.
    pub end_number: u64,
    /// Width of the representative (first) image; 0 when unreadable.
    pub image_width: u32,
    /// Height of the representative (first) image; 0 when unreadable.
    pub image_height: u32,
    /// Detected image format, e.g. "JPEG"; "UNKNOWN" when unreadable.
    pub image_format: String,
    pub has_gaps: bool,
    /// Missing frame numbers, sorted ascending: `{min..max} \ actual`.
    pub gaps: Vec<u64>,
    /// True when width or height is odd and a pad filter is required.
    pub needs_padding: bool,
    /// True when gaps force concat-manifest input instead of a `%0Nd` pattern.
    pub use_concat: bool,
    /// Path of the generated concat manifest, once materialized.
    pub concat_file: Option<PathBuf>,
}

impl SequenceInfo {
    /// Dimensions as a `WxH` display string.
    #[must_use]
    pub fn dimensions_str(&self) -> String {
        format!("{}x{}", self.image_width, self.image_height)
    }

    /// Frame number range as a display string.
    #[must_use]
    pub fn range_str(&self) -> String {
        format!("{} - {}", self.start_number, self.end_number)
    }
}

/// Detects an image sequence in the given folder.
///
/// Returns `None` for expected, recoverable situations the caller should
/// surface to the user: unreadable or empty folder, no numbered images, or
/// mixed naming patterns (a single encode operates on one homogeneous
/// series). An unreadable individual image does not abort the scan; the
/// dimensions fall back to zero and the format to "UNKNOWN".
#[must_use]
pub fn analyze(folder: &Path) -> Option<SequenceInfo> {
    let files = match list_image_files(folder) {
        Ok(files) => files,
        Err(e) => {
            warn!("Cannot scan input folder {}: {}", folder.display(), e);
            return None;
        }
    };
    if files.is_empty() {
        debug!("No image files found in {}", folder.display());
        return None;
    }

    let (prefix, padding, extension, numbers) = infer_naming_pattern(&files)?;

    let pattern = if padding > 0 {
        format!("{prefix}%0{padding}d{extension}")
    } else {
        format!("{prefix}%d{extension}")
    };

    let (has_gaps, gaps) = detect_gaps(&numbers);
    let (width, height, format) = probe_image(&files[0]);
    let needs_padding = width % 2 != 0 || height % 2 != 0;

    let start_number = numbers.iter().copied().min().unwrap_or(0);
    let end_number = numbers.iter().copied().max().unwrap_or(0);

    debug!(
        "Detected sequence {} in {}: {} frames, {}-{}, gaps: {}",
        pattern,
        folder.display(),
        files.len(),
        start_number,
        end_number,
        has_gaps
    );

    Some(SequenceInfo {
        pattern,
        count: files.len(),
        start_number,
        end_number,
        image_width: width,
        image_height: height,
        image_format: format,
        has_gaps,
        gaps,
        needs_padding,
        // Sequential %0Nd numbering cannot express missing frames.
        use_concat: has_gaps,
        concat_file: None,
    })
}

/// Lists supported image files in the folder, sorted lexicographically.
pub fn list_image_files(folder: &Path) -> CoreResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            if !path.is_file() {
                return None;
            }
            path.extension()
                .and_then(|ext| ext.to_str())
                .filter(|ext| {
                    SUPPORTED_IMAGE_EXTENSIONS
                        .iter()
                        .any(|s| ext.eq_ignore_ascii_case(s))
                })
                .map(|_| path.clone())
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Extracts `(prefix, padding, extension, numbers)` from the file list.
///
/// Returns `None` when no file matches `<prefix><digits><.ext>` or when the
/// files do not share exactly one prefix and one extension.
fn infer_naming_pattern(files: &[PathBuf]) -> Option<(String, usize, String, Vec<u64>)> {
    let mut prefix: Option<&str> = None;
    let mut extension: Option<&str> = None;
    let mut first_digits: Option<&str> = None;
    let mut numbers = Vec::with_capacity(files.len());

    for file in files {
        let name = file.file_name()?.to_str()?;
        let Some(caps) = FILENAME_PATTERN.captures(name) else {
            continue;
        };
        let (this_prefix, digits, this_ext) = (
            caps.get(1)?.as_str(),
            caps.get(2)?.as_str(),
            caps.get(3)?.as_str(),
        );
        let number: u64 = digits.parse().ok()?;

        match (prefix, extension) {
            (None, None) => {
                prefix = Some(this_prefix);
                extension = Some(this_ext);
                first_digits = Some(digits);
            }
            (Some(p), Some(e)) if p == this_prefix && e == this_ext => {}
            _ => {
                debug!("Mixed naming patterns in sequence folder; not supported");
                return None;
            }
        }
        numbers.push(number);
    }

    let prefix = prefix?;
    let extension = extension?;
    // Leading zero on the first file's number means fixed-width padding.
    let digits = first_digits?;
    let padding = if digits.starts_with('0') { digits.len() } else { 0 };

    Some((prefix.to_string(), padding, extension.to_string(), numbers))
}

/// Finds missing numbers in the sequence: `{min..max} \ actual`, sorted.
fn detect_gaps(numbers: &[u64]) -> (bool, Vec<u64>) {
    if numbers.is_empty() {
        return (false, Vec::new());
    }

    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut gaps = Vec::new();
    for pair in sorted.windows(2) {
        for missing in pair[0] + 1..pair[1] {
            gaps.push(missing);
        }
    }

    (!gaps.is_empty(), gaps)
}

/// Reads width, height and format of one image without decoding pixel data.
/// Unreadable images degrade to `(0, 0, "UNKNOWN")` rather than failing.
fn probe_image(path: &Path) -> (u32, u32, String) {
    let reader = match image::ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Cannot open image {}: {}", path.display(), e);
            return (0, 0, "UNKNOWN".to_string());
        }
    };

    let format = reader
        .format()
        .map_or_else(|| "UNKNOWN".to_string(), format_name);

    match reader.into_dimensions() {
        Ok((width, height)) => (width, height, format),
        Err(e) => {
            warn!("Cannot read image dimensions of {}: {}", path.display(), e);
            (0, 0, "UNKNOWN".to_string())
        }
    }
}

fn format_name(format: image::ImageFormat) -> String {
    match format {
        image::ImageFormat::Jpeg => "JPEG".to_string(),
        image::ImageFormat::Png => "PNG".to_string(),
        image::ImageFormat::Tiff => "TIFF".to_string(),
        other => format!("{other:?}").to_uppercase(),
    }
}

/// Writes the concat demuxer manifest for the given images into `dest_dir`,
/// one `file '<absolute path>'` line per frame in sorted order. Backslashes
/// are replaced with forward slashes and embedded single quotes escaped with
/// the `'\''` convention the concat format requires.
pub fn write_concat_manifest(image_files: &[PathBuf], dest_dir: &Path) -> CoreResult<PathBuf> {
    let manifest_path = dest_dir.join(CONCAT_MANIFEST_NAME);

    let mut contents = String::new();
    let mut sorted: Vec<&PathBuf> = image_files.iter().collect();
    sorted.sort();

    for file in sorted {
        let absolute = fs::canonicalize(file)?;
        let safe = absolute
            .to_string_lossy()
            .replace('\\', "/")
            .replace('\'', "'\\''");
        let _ = writeln!(contents, "file '{safe}'");
    }

    let mut out = fs::File::create(&manifest_path)?;
    out.write_all(contents.as_bytes())?;

    debug!(
        "Wrote concat manifest with {} entries to {}",
        image_files.len(),
        manifest_path.display()
    );
    Ok(manifest_path)
}

/// Estimated duration of the resulting video in seconds.
#[must_use]
pub fn estimated_duration(frame_count: usize, framerate: u32) -> f64 {
    if framerate == 0 {
        return 0.0;
    }
    frame_count as f64 / f64::from(framerate)
}

/// Formats a duration as a short human-readable string (e.g. "1m 30s").
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }

    let minutes = (seconds / 60.0) as u64;
    let remaining_seconds = seconds % 60.0;

    if minutes < 60 {
        return format!("{minutes}m {remaining_seconds:.0}s");
    }

    let hours = minutes / 60;
    let remaining_minutes = minutes % 60;
    format!("{hours}h {remaining_minutes}m")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaps_in_sparse_sequence() {
        let (has_gaps, gaps) = detect_gaps(&[1, 2, 5, 6, 9]);
        assert!(has_gaps);
        assert_eq!(gaps, vec![3, 4, 7, 8]);
    }

    #[test]
    fn no_gaps_in_contiguous_sequence() {
        let (has_gaps, gaps) = detect_gaps(&[3, 4, 5, 6]);
        assert!(!has_gaps);
        assert!(gaps.is_empty());
    }

    #[test]
    fn no_gaps_for_empty_or_single() {
        assert_eq!(detect_gaps(&[]), (false, Vec::new()));
        assert_eq!(detect_gaps(&[7]), (false, Vec::new()));
    }

    #[test]
    fn naming_pattern_with_padding() {
        let files = vec![
            PathBuf::from("IMG_0001.jpg"),
            PathBuf::from("IMG_0002.jpg"),
            PathBuf::from("IMG_0003.jpg"),
        ];
        let (prefix, padding, ext, numbers) = infer_naming_pattern(&files).unwrap();
        assert_eq!(prefix, "IMG_");
        assert_eq!(padding, 4);
        assert_eq!(ext, ".jpg");
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn naming_pattern_without_padding() {
        let files = vec![PathBuf::from("frame1.png"), PathBuf::from("frame2.png")];
        let (_, padding, _, _) = infer_naming_pattern(&files).unwrap();
        assert_eq!(padding, 0);
    }

    #[test]
    fn mixed_prefixes_are_rejected() {
        let files = vec![PathBuf::from("IMG_0001.jpg"), PathBuf::from("DSC_0002.jpg")];
        assert!(infer_naming_pattern(&files).is_none());
    }

    #[test]
    fn mixed_extensions_are_rejected() {
        let files = vec![PathBuf::from("IMG_0001.jpg"), PathBuf::from("IMG_0002.png")];
        assert!(infer_naming_pattern(&files).is_none());
    }

    #[test]
    fn duration_estimation() {
        assert!((estimated_duration(250, 25) - 10.0).abs() < f64::EPSILON);
        assert!((estimated_duration(100, 0)).abs() < f64::EPSILON);
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(12.3), "12.3s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3720.0), "1h 2m");
    }
}
