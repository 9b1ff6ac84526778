//! ffmpeg output parsing for progress tracking.
//!
//! [`ProgressParser`] turns raw encoder log lines into structured
//! [`ProgressInfo`]. The total frame count is fixed at construction for the
//! whole run; apart from that, each `parse` call is independent.

use once_cell::sync::Lazy;
use regex::Regex;

static FRAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"frame=\s*(\d+)").expect("valid regex"));
static FPS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"fps=\s*([\d.]+)").expect("valid regex"));
static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(\d+):(\d+):([\d.]+)").expect("valid regex"));
static COMPLETION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)video:\d+ki?b", r"(?i)muxing overhead", r"(?i)conversion successful"]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
});

/// Progress extracted from a single encoder output line.
///
/// Created fresh per parsed line and never mutated afterwards; absent tokens
/// stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressInfo {
    pub current_frame: Option<u64>,
    pub total_frames: Option<u64>,
    /// Instantaneous encoding speed in frames per second.
    pub fps: Option<f64>,
    pub elapsed_seconds: Option<f64>,
    /// 0-100, capped; set only when both frame and total are known.
    pub percentage: Option<u8>,
}

/// Parses ffmpeg output lines for progress information.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    total_frames: Option<u64>,
}

impl ProgressParser {
    /// Creates a parser for a run of `total_frames` frames. Without a total,
    /// frames and timing are still extracted but no percentage is computed.
    #[must_use]
    pub fn new(total_frames: Option<u64>) -> Self {
        Self { total_frames }
    }

    /// Extracts progress tokens from one output line.
    #[must_use]
    pub fn parse(&self, line: &str) -> ProgressInfo {
        let mut info = ProgressInfo::default();

        if let Some(caps) = FRAME_PATTERN.captures(line) {
            info.current_frame = caps[1].parse().ok();
        }
        if let Some(caps) = FPS_PATTERN.captures(line) {
            info.fps = caps[1].parse().ok();
        }
        if let Some(caps) = TIME_PATTERN.captures(line) {
            let hours: f64 = caps[1].parse().unwrap_or(0.0);
            let minutes: f64 = caps[2].parse().unwrap_or(0.0);
            let seconds: f64 = caps[3].parse().unwrap_or(0.0);
            info.elapsed_seconds = Some(hours * 3600.0 + minutes * 60.0 + seconds);
        }

        if let (Some(total), Some(frame)) = (self.total_frames, info.current_frame) {
            if total > 0 {
                info.total_frames = Some(total);
                info.percentage = Some((frame * 100 / total).min(100) as u8);
            }
        }

        info
    }

    /// True once a frame counter appears in the output, i.e. encoding has
    /// actually started.
    #[must_use]
    pub fn encoding_started(&self, text: &str) -> bool {
        FRAME_PATTERN.is_match(text)
    }

    /// True when the text contains the encoder's final statistics markers.
    #[must_use]
    pub fn is_completed(&self, text: &str) -> bool {
        COMPLETION_PATTERNS.iter().any(|p| p.is_match(text))
    }

    /// Estimated seconds remaining, `None` when the total is unknown or the
    /// encoding speed is not positive.
    #[must_use]
    pub fn eta(&self, current_frame: u64, fps: f64) -> Option<f64> {
        let total = self.total_frames?;
        if fps <= 0.0 {
            return None;
        }
        Some((total.saturating_sub(current_frame)) as f64 / fps)
    }

    /// Formats an ETA as a short human-readable string.
    #[must_use]
    pub fn format_eta(seconds: Option<f64>) -> String {
        let Some(seconds) = seconds else {
            return "unknown".to_string();
        };

        if seconds < 60.0 {
            return format!("{}s", seconds as u64);
        }
        let minutes = (seconds / 60.0) as u64;
        let remaining = (seconds % 60.0) as u64;
        if minutes < 60 {
            return format!("{minutes}m {remaining}s");
        }
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}
