//! ffmpeg command construction for timelapse encodes.
//!
//! [`FfmpegCommandBuilder`] compiles an [`EncodingConfig`] and the analyzed
//! [`SequenceInfo`] into the flat argument vector handed to the encoder
//! process. Building is a pure function of its inputs: identical inputs
//! produce byte-identical argument lists, which is what makes the command
//! preview possible without executing anything.
//!
//! Argument order is part of the contract. The image2 demuxer only honors
//! `-framerate`/`-start_number` before `-i`, while the concat demuxer ignores
//! a pre-input frame rate entirely (it is injected as an `fps` filter
//! instead). The filter chain itself is kept as typed [`VideoFilter`]
//! descriptors and serialized only at the boundary, so ordering invariants
//! hold by construction.

use std::path::{Path, PathBuf};

use log::debug;

use crate::aspect::Rect;
use crate::config::{Codec, DeflickerMode, EncodingConfig, PatternType};
use crate::sequence::SequenceInfo;

/// A single stage of the video filter graph, in the order stages may appear.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoFilter {
    /// Frame rate injection for concat input.
    Fps(u32),
    /// Pads odd dimensions up to the next even value.
    PadToEven,
    /// Scales to a fixed output resolution.
    Scale(u32, u32),
    /// Lossless 90-degree-step rotation; 1 = clockwise, 2 = counter-clockwise.
    Transpose(u8),
    /// Arbitrary-angle rotation in degrees, black fill.
    Rotate(f64),
    FlipHorizontal,
    FlipVertical,
    Crop(Rect),
    Deflicker { mode: DeflickerMode, size: u32 },
    /// Output pixel format; always the last stage.
    Format(&'static str),
}

impl VideoFilter {
    /// Serializes this stage to its ffmpeg filter expression.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Fps(rate) => format!("fps={rate}"),
            Self::PadToEven => "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
            Self::Scale(w, h) => format!("scale={w}:{h}"),
            Self::Transpose(direction) => format!("transpose={direction}"),
            Self::Rotate(degrees) => {
                format!("rotate={degrees}*PI/180:c=black:ow='iw':oh='ih'")
            }
            Self::FlipHorizontal => "hflip".to_string(),
            Self::FlipVertical => "vflip".to_string(),
            Self::Crop(rect) => {
                format!("crop={}:{}:{}:{}", rect.width, rect.height, rect.x, rect.y)
            }
            Self::Deflicker { mode, size } => {
                format!("deflicker=mode={}:size={}", mode.as_str(), size)
            }
            Self::Format(pix_fmt) => format!("format={pix_fmt}"),
        }
    }
}

/// Builds the complete ffmpeg argument vector from an encoding configuration.
pub struct FfmpegCommandBuilder<'a> {
    config: &'a EncodingConfig,
    sequence: &'a SequenceInfo,
    ffmpeg_path: &'a Path,
}

impl<'a> FfmpegCommandBuilder<'a> {
    #[must_use]
    pub fn new(
        config: &'a EncodingConfig,
        sequence: &'a SequenceInfo,
        ffmpeg_path: &'a Path,
    ) -> Self {
        Self {
            config,
            sequence,
            ffmpeg_path,
        }
    }

    /// Builds the complete argument vector, executable path first.
    ///
    /// The output file is always overwritten without confirmation (`-y`);
    /// interactive confirmation, if any, is the caller's responsibility.
    #[must_use]
    pub fn build(&self) -> Vec<String> {
        let mut args = vec![
            self.ffmpeg_path.to_string_lossy().into_owned(),
            "-y".to_string(),
        ];

        self.add_input_args(&mut args);
        self.add_filter_args(&mut args);
        self.add_codec_args(&mut args);
        self.add_quality_args(&mut args);
        self.add_output_args(&mut args);

        debug!("Built ffmpeg command: {}", shell_words::join(&args));
        args
    }

    /// Builds the command as a single shell-quoted string for preview.
    #[must_use]
    pub fn build_shell_string(&self) -> String {
        shell_words::join(self.build())
    }

    fn add_input_args(&self, args: &mut Vec<String>) {
        if self.sequence.use_concat {
            // The concat demuxer ignores -framerate before -i; the rate is
            // injected later as an fps filter.
            if let Some(manifest) = &self.sequence.concat_file {
                args.extend([
                    "-f".to_string(),
                    "concat".to_string(),
                    "-safe".to_string(),
                    "0".to_string(),
                    "-i".to_string(),
                    manifest.to_string_lossy().into_owned(),
                ]);
            }
        } else {
            // image2 demuxer: frame rate and start number only count before -i.
            args.extend(["-framerate".to_string(), self.config.framerate.to_string()]);
            if let Some(start) = self.config.start_number {
                args.extend(["-start_number".to_string(), start.to_string()]);
            }
            args.extend(["-i".to_string(), self.input_pattern()]);
        }
    }

    fn input_pattern(&self) -> String {
        match self.config.pattern_type {
            PatternType::Glob => {
                let extension = self
                    .sequence
                    .pattern
                    .rsplit_once('.')
                    .map_or("jpg", |(_, ext)| ext);
                format!(
                    "glob:{}/*.{}",
                    self.config.input_folder.display(),
                    extension
                )
            }
            PatternType::Sequential => self
                .config
                .input_folder
                .join(&self.sequence.pattern)
                .to_string_lossy()
                .into_owned(),
        }
    }

    /// Assembles the filter graph. Stage order is fixed: rotate and flip
    /// precede crop so the crop rectangle is expressed in already-transformed
    /// coordinates; crop precedes deflicker and format because those operate
    /// on the final frame content.
    #[must_use]
    pub fn filter_chain(&self) -> Vec<VideoFilter> {
        let mut filters = Vec::new();

        if self.sequence.use_concat {
            filters.push(VideoFilter::Fps(self.config.framerate));
        }
        if self.sequence.needs_padding {
            filters.push(VideoFilter::PadToEven);
        }
        if let Some((width, height)) = self.config.resolution.dimensions() {
            filters.push(VideoFilter::Scale(width, height));
        }
        if let Some(angle) = self.config.rotate_angle {
            filters.extend(rotate_filters(angle));
        }
        if self.config.flip_horizontal {
            filters.push(VideoFilter::FlipHorizontal);
        }
        if self.config.flip_vertical {
            filters.push(VideoFilter::FlipVertical);
        }
        if let Some(rect) = self.config.crop {
            filters.push(VideoFilter::Crop(rect));
        }
        if let Some(deflicker) = self.config.deflicker {
            filters.push(VideoFilter::Deflicker {
                mode: deflicker.mode,
                size: deflicker.size,
            });
        }
        filters.push(VideoFilter::Format(self.config.pixel_format.as_str()));

        filters
    }

    fn add_filter_args(&self, args: &mut Vec<String>) {
        let rendered: Vec<String> = self.filter_chain().iter().map(VideoFilter::render).collect();
        args.extend(["-vf".to_string(), rendered.join(",")]);
    }

    fn add_codec_args(&self, args: &mut Vec<String>) {
        let codec = self.config.codec;
        args.extend(["-c:v".to_string(), codec.as_str().to_string()]);

        match codec {
            Codec::Libx264 => {
                args.extend(["-preset".to_string(), self.config.preset.as_str().to_string()]);
                args.extend(["-profile:v".to_string(), self.config.profile.as_str().to_string()]);
                args.extend(["-level".to_string(), self.config.level.clone()]);
            }
            Codec::Libx265 => {
                args.extend(["-preset".to_string(), self.config.preset.as_str().to_string()]);
                // x265 takes H.265 profile names and needs the hvc1 tag for
                // player compatibility.
                args.extend([
                    "-profile:v".to_string(),
                    self.config.profile.h265_profile().to_string(),
                ]);
                args.extend(["-tag:v".to_string(), "hvc1".to_string()]);
            }
            Codec::LibsvtAv1 => {
                // Numeric preset; profile/level/tag are auto-detected.
                args.extend([
                    "-preset".to_string(),
                    self.config.preset.svt_av1_preset().to_string(),
                ]);
            }
        }
    }

    fn add_quality_args(&self, args: &mut Vec<String>) {
        // Range is codec-dependent and enforced by config validation upstream.
        args.extend(["-crf".to_string(), self.config.crf.to_string()]);
    }

    fn add_output_args(&self, args: &mut Vec<String>) {
        if self.config.movflags_faststart {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        if !self.config.custom_args.is_empty() {
            // Validated upstream; a still-malformed string contributes nothing.
            args.extend(shell_words::split(&self.config.custom_args).unwrap_or_default());
        }

        args.push(self.config.output_path().to_string_lossy().into_owned());
    }
}

/// Selects the rotation filters for an angle in degrees. Exact 90-degree
/// steps use lossless transposes; anything else falls back to the generic
/// rotate filter.
fn rotate_filters(angle: f64) -> Vec<VideoFilter> {
    if angle == 0.0 {
        Vec::new()
    } else if angle == 90.0 {
        vec![VideoFilter::Transpose(1)]
    } else if angle == 180.0 {
        vec![VideoFilter::Transpose(2), VideoFilter::Transpose(2)]
    } else if angle == 270.0 {
        vec![VideoFilter::Transpose(2)]
    } else {
        vec![VideoFilter::Rotate(angle)]
    }
}

/// Returns the concat manifest path a configuration will use, for callers
/// that want to show it ahead of time.
#[must_use]
pub fn concat_manifest_path(config: &EncodingConfig) -> PathBuf {
    config.input_folder.join(crate::sequence::CONCAT_MANIFEST_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Deflicker, OutputResolution, PixelFormat, SpeedPreset};
    use std::path::PathBuf;

    fn test_sequence() -> SequenceInfo {
        SequenceInfo {
            pattern: "IMG_%04d.jpg".to_string(),
            count: 10,
            start_number: 1,
            end_number: 10,
            image_width: 4000,
            image_height: 3000,
            image_format: "JPEG".to_string(),
            has_gaps: false,
            gaps: Vec::new(),
            needs_padding: false,
            use_concat: false,
            concat_file: None,
        }
    }

    fn test_config() -> EncodingConfig {
        EncodingConfig::new(PathBuf::from("/photos"), PathBuf::from("/out"))
    }

    fn build(config: &EncodingConfig, sequence: &SequenceInfo) -> Vec<String> {
        FfmpegCommandBuilder::new(config, sequence, Path::new("ffmpeg")).build()
    }

    #[test]
    fn sequential_input_shape() {
        let config = test_config();
        let sequence = test_sequence();
        let args = build(&config, &sequence);

        assert_eq!(
            &args[..6],
            &[
                "ffmpeg".to_string(),
                "-y".to_string(),
                "-framerate".to_string(),
                "25".to_string(),
                "-i".to_string(),
                "/photos/IMG_%04d.jpg".to_string(),
            ]
        );
        assert_eq!(args.last().unwrap(), "/out/timelapse.mp4");
    }

    #[test]
    fn build_is_deterministic() {
        let config = test_config();
        let sequence = test_sequence();
        assert_eq!(build(&config, &sequence), build(&config, &sequence));
    }

    #[test]
    fn crf_and_preset_appear_exactly_once() {
        let config = test_config();
        let sequence = test_sequence();
        let args = build(&config, &sequence);

        assert_eq!(args.iter().filter(|a| *a == "-crf").count(), 1);
        assert_eq!(args.iter().filter(|a| *a == "-preset").count(), 1);

        // Quality stage follows the codec stage.
        let codec_pos = args.iter().position(|a| a == "-c:v").unwrap();
        let crf_pos = args.iter().position(|a| a == "-crf").unwrap();
        assert!(codec_pos < crf_pos);
    }

    #[test]
    fn start_number_is_emitted_before_input() {
        let mut config = test_config();
        config.start_number = Some(37);
        let args = build(&config, &test_sequence());

        let start_pos = args.iter().position(|a| a == "-start_number").unwrap();
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert!(start_pos < input_pos);
        assert_eq!(args[start_pos + 1], "37");
    }

    #[test]
    fn concat_input_shape() {
        let config = test_config();
        let mut sequence = test_sequence();
        sequence.has_gaps = true;
        sequence.use_concat = true;
        sequence.concat_file = Some(PathBuf::from("/photos/filelist.txt"));
        let args = build(&config, &sequence);

        let f_pos = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f_pos + 1], "concat");
        assert_eq!(args[f_pos + 2], "-safe");
        assert_eq!(args[f_pos + 3], "0");
        assert!(!args.contains(&"-framerate".to_string()));

        let vf = filter_string(&args);
        assert!(vf.starts_with("fps=25,"));
    }

    #[test]
    fn format_is_last_filter() {
        let mut config = test_config();
        config.deflicker = Some(Deflicker::default());
        config.crop = Some(Rect::new(0, 0, 1920, 1080));
        config.rotate_angle = Some(90.0);
        let args = build(&config, &test_sequence());

        let vf = filter_string(&args);
        assert!(vf.ends_with("format=yuv420p"));
    }

    #[test]
    fn rotate_precedes_crop() {
        let mut config = test_config();
        config.rotate_angle = Some(90.0);
        config.crop = Some(Rect::new(100, 100, 640, 480));
        let args = build(&config, &test_sequence());

        let vf = filter_string(&args);
        let rotate_pos = vf.find("transpose=").unwrap();
        let crop_pos = vf.find("crop=").unwrap();
        assert!(rotate_pos < crop_pos);
        assert!(vf.contains("crop=640:480:100:100"));
    }

    #[test]
    fn rotate_filter_selection() {
        assert_eq!(rotate_filters(0.0), Vec::new());
        assert_eq!(rotate_filters(90.0), vec![VideoFilter::Transpose(1)]);
        assert_eq!(
            rotate_filters(180.0),
            vec![VideoFilter::Transpose(2), VideoFilter::Transpose(2)]
        );
        assert_eq!(rotate_filters(270.0), vec![VideoFilter::Transpose(2)]);
        assert_eq!(rotate_filters(45.0), vec![VideoFilter::Rotate(45.0)]);
        assert_eq!(
            VideoFilter::Rotate(45.0).render(),
            "rotate=45*PI/180:c=black:ow='iw':oh='ih'"
        );
    }

    #[test]
    fn arbitrary_rotation_renders_180_as_double_transpose() {
        let mut config = test_config();
        config.rotate_angle = Some(180.0);
        let vf = filter_string(&build(&config, &test_sequence()));
        assert!(vf.contains("transpose=2,transpose=2"));
    }

    #[test]
    fn padding_filter_for_odd_dimensions() {
        let config = test_config();
        let mut sequence = test_sequence();
        sequence.image_width = 4001;
        sequence.needs_padding = true;
        let vf = filter_string(&build(&config, &sequence));
        assert!(vf.starts_with("pad=ceil(iw/2)*2:ceil(ih/2)*2"));
    }

    #[test]
    fn scale_filter_for_fixed_resolution() {
        let mut config = test_config();
        config.resolution = OutputResolution::Preset(1920, 1080);
        let vf = filter_string(&build(&config, &test_sequence()));
        assert!(vf.contains("scale=1920:1080"));
    }

    #[test]
    fn flip_filters() {
        let mut config = test_config();
        config.flip_horizontal = true;
        config.flip_vertical = true;
        let vf = filter_string(&build(&config, &test_sequence()));
        assert!(vf.contains("hflip,vflip"));
    }

    #[test]
    fn x265_maps_profile_and_tags_hvc1() {
        let mut config = test_config();
        config.codec = Codec::Libx265;
        let args = build(&config, &test_sequence());

        let profile_pos = args.iter().position(|a| a == "-profile:v").unwrap();
        assert_eq!(args[profile_pos + 1], "main");
        let tag_pos = args.iter().position(|a| a == "-tag:v").unwrap();
        assert_eq!(args[tag_pos + 1], "hvc1");
        assert!(!args.contains(&"-level".to_string()));
    }

    #[test]
    fn av1_uses_numeric_preset_without_profile() {
        let mut config = test_config();
        config.codec = Codec::LibsvtAv1;
        config.preset = SpeedPreset::Veryslow;
        let args = build(&config, &test_sequence());

        let preset_pos = args.iter().position(|a| a == "-preset").unwrap();
        assert_eq!(args[preset_pos + 1], "0");
        assert!(!args.contains(&"-profile:v".to_string()));
        assert!(!args.contains(&"-tag:v".to_string()));
    }

    #[test]
    fn custom_args_are_tokenized_with_shell_semantics() {
        let mut config = test_config();
        config.custom_args = "-metadata title='My Timelapse' -threads 4".to_string();
        let args = build(&config, &test_sequence());

        assert!(args.contains(&"title=My Timelapse".to_string()));
        assert!(args.contains(&"-threads".to_string()));
        // Custom args sit between faststart and the output path.
        let threads_pos = args.iter().position(|a| a == "-threads").unwrap();
        assert_eq!(threads_pos + 2, args.len() - 1);
    }

    #[test]
    fn pixel_format_selection() {
        let mut config = test_config();
        config.pixel_format = PixelFormat::Yuv444p;
        let vf = filter_string(&build(&config, &test_sequence()));
        assert!(vf.ends_with("format=yuv444p"));
    }

    fn filter_string(args: &[String]) -> String {
        let vf_pos = args.iter().position(|a| a == "-vf").unwrap();
        args[vf_pos + 1].clone()
    }
}
