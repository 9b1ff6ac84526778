//! Core library for turning folders of still images into timelapse videos by
//! driving an external ffmpeg process.
//!
//! The pipeline runs in a fixed order: [`sequence::analyze`] infers the
//! numbering pattern of the folder (detecting gaps that force concat-manifest
//! input), the caller merges the result into an [`EncodingConfig`],
//! [`FfmpegCommandBuilder`] compiles the deterministic argument list, and
//! [`FfmpegEncoder`] runs the process, streaming parsed progress back through
//! callbacks. [`aspect`] provides the ratio solver shared by crop-filter
//! construction and interactive crop manipulation.
//!
//! The presentation layer, preset storage, and locating the ffmpeg executable
//! are the consumer's concerns; this crate only defines the data contracts it
//! needs from them.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use timeslap_core::{EncoderCallbacks, EncodingConfig, FfmpegEncoder, sequence};
//!
//! let folder = PathBuf::from("/path/to/images");
//! let info = sequence::analyze(&folder).expect("no image sequence found");
//!
//! let mut config = EncodingConfig::new(folder, PathBuf::from("/path/to/output"));
//! config.framerate = 25;
//!
//! let report = timeslap_core::config::validate_config(&config, Some(&info));
//! assert!(report.is_valid(), "{:?}", report.errors);
//!
//! let mut encoder = FfmpegEncoder::new(config, info, "ffmpeg");
//! encoder.set_callbacks(EncoderCallbacks {
//!     on_progress: Some(Box::new(|percent| println!("{percent}%"))),
//!     on_output: None,
//!     on_finished: Some(Box::new(|ok, msg| println!("done: {ok} ({msg})"))),
//! });
//! encoder.start().unwrap();
//! encoder.wait_for_completion();
//! ```

pub mod aspect;
pub mod command;
pub mod config;
pub mod encoder;
pub mod error;
pub mod preset;
pub mod progress;
pub mod sequence;

// Re-exports for public API
pub use aspect::{Anchor, Rect};
pub use command::{FfmpegCommandBuilder, VideoFilter};
pub use config::{Codec, EncodingConfig, OutputResolution, SpeedPreset, ValidationReport};
pub use encoder::{
    CancelHandle, EncoderCallbacks, EncoderState, ErrorInfo, FfmpegEncoder, classify_error,
};
pub use error::{CoreError, CoreResult};
pub use preset::{Preset, PresetSettings};
pub use progress::{ProgressInfo, ProgressParser};
pub use sequence::SequenceInfo;
