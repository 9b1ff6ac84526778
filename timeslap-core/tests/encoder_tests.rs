// timeslap-core/tests/encoder_tests.rs
//
// Drives the encoder against small /bin/sh stand-ins instead of a real
// ffmpeg so the lifecycle can be exercised hermetically.

#![cfg(unix)]

use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tempfile::tempdir;
use timeslap_core::config::EncodingConfig;
use timeslap_core::{EncoderCallbacks, EncoderState, FfmpegEncoder, SequenceInfo, sequence};

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake_ffmpeg");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn fixture(dir: &Path) -> (EncodingConfig, SequenceInfo) {
    let frames = dir.join("frames");
    fs::create_dir(&frames).unwrap();
    for n in 1..=10 {
        File::create(frames.join(format!("IMG_{n:04}.jpg"))).unwrap();
    }
    let config = EncodingConfig::new(frames.clone(), dir.join("out"));
    let info = sequence::analyze(&frames).expect("sequence should be detected");
    (config, info)
}

fn gapped_fixture(dir: &Path) -> (EncodingConfig, SequenceInfo) {
    let frames = dir.join("frames");
    fs::create_dir(&frames).unwrap();
    for n in [1u32, 2, 3, 5, 6] {
        File::create(frames.join(format!("IMG_{n:04}.jpg"))).unwrap();
    }
    let config = EncodingConfig::new(frames.clone(), dir.join("out"));
    let info = sequence::analyze(&frames).expect("sequence should be detected");
    assert!(info.use_concat);
    (config, info)
}

#[derive(Default)]
struct Recorded {
    progress: Vec<u8>,
    output: Vec<String>,
    finished: Vec<(bool, String)>,
}

fn recording_callbacks(recorded: &Arc<Mutex<Recorded>>) -> EncoderCallbacks {
    let progress = Arc::clone(recorded);
    let output = Arc::clone(recorded);
    let finished = Arc::clone(recorded);
    EncoderCallbacks {
        on_progress: Some(Box::new(move |p| {
            progress.lock().unwrap().progress.push(p);
        })),
        on_output: Some(Box::new(move |line| {
            output.lock().unwrap().output.push(line.to_string());
        })),
        on_finished: Some(Box::new(move |ok, msg| {
            finished.lock().unwrap().finished.push((ok, msg.to_string()));
        })),
    }
}

#[test]
fn successful_run_reports_progress_and_completion() {
    let dir = tempdir().unwrap();
    let (config, info) = fixture(dir.path());
    let script = write_script(
        dir.path(),
        "echo \"frame=    5 fps=25.0 time=00:00:00.20 bitrate=N/A speed=1x\"\n\
         echo \"video:100kB audio:0kB subtitle:0kB other streams:0kB\" 1>&2\n\
         exit 0",
    );

    let mut encoder = FfmpegEncoder::new(config, info, script);
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    encoder.set_callbacks(recording_callbacks(&recorded));

    encoder.start().unwrap();
    assert!(encoder.wait_for_completion());
    assert_eq!(encoder.state(), EncoderState::Completed);

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.progress, vec![50]);
    assert!(recorded.output.iter().any(|l| l.contains("frame=")));
    assert_eq!(
        recorded.finished.as_slice(),
        &[(true, "Encoding completed successfully".to_string())]
    );
}

#[test]
fn failing_run_reports_exit_code_and_classified_error() {
    let dir = tempdir().unwrap();
    let (config, info) = fixture(dir.path());
    let script = write_script(
        dir.path(),
        "echo \"Unknown encoder 'libx999'\" 1>&2\nexit 1",
    );

    let mut encoder = FfmpegEncoder::new(config, info, script);
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    encoder.set_callbacks(recording_callbacks(&recorded));

    encoder.start().unwrap();
    assert!(!encoder.wait_for_completion());
    assert_eq!(encoder.state(), EncoderState::Failed);

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.finished.len(), 1);
    let (ok, message) = &recorded.finished[0];
    assert!(!ok);
    assert!(message.contains("code 1"), "message: {message}");
    assert!(message.contains("Unknown encoder"), "message: {message}");
}

#[test]
fn gapped_sequence_materializes_manifest_on_start() {
    let dir = tempdir().unwrap();
    let (config, info) = gapped_fixture(dir.path());
    let input_folder = config.input_folder.clone();
    let script = write_script(dir.path(), "exit 0");

    let mut encoder = FfmpegEncoder::new(config, info, script);
    encoder.start().unwrap();
    assert!(encoder.wait_for_completion());
    assert_eq!(encoder.state(), EncoderState::Completed);

    // start() wrote the manifest next to the images and rebuilt the
    // argument list around it.
    let manifest = input_folder.join("filelist.txt");
    assert!(manifest.is_file());
    let command = encoder.command();
    let format = command.iter().position(|a| a == "-f").unwrap();
    assert_eq!(command[format + 1], "concat");
    assert!(command.iter().any(|a| a.ends_with("filelist.txt")));
}

#[test]
fn manifest_failure_resolves_to_failed_state() {
    let dir = tempdir().unwrap();
    let (mut config, info) = gapped_fixture(dir.path());
    // Force manifest materialization to fail before anything is spawned.
    config.input_folder = dir.path().join("vanished");
    let script = write_script(dir.path(), "exit 0");

    let mut encoder = FfmpegEncoder::new(config, info, script);
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    encoder.set_callbacks(recording_callbacks(&recorded));

    assert!(encoder.start().is_err());
    assert_eq!(encoder.state(), EncoderState::Failed);
    assert!(!encoder.is_running());

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.finished.len(), 1);
    let (ok, message) = &recorded.finished[0];
    assert!(!ok);
    assert!(message.contains("concat manifest"), "message: {message}");
}

#[test]
fn spawn_failure_fails_immediately() {
    let dir = tempdir().unwrap();
    let (config, info) = fixture(dir.path());

    let mut encoder =
        FfmpegEncoder::new(config, info, PathBuf::from("/no/such/ffmpeg/binary"));
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    encoder.set_callbacks(recording_callbacks(&recorded));

    assert!(encoder.start().is_err());
    assert_eq!(encoder.state(), EncoderState::Failed);
    assert!(!encoder.is_running());

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.finished.len(), 1);
    assert!(!recorded.finished[0].0);
}

#[test]
fn cancel_stops_a_running_encode() {
    let dir = tempdir().unwrap();
    let (config, info) = fixture(dir.path());
    // Blocks until one byte ('q') arrives on stdin, then exits non-zero the
    // way a quit ffmpeg does.
    let script = write_script(
        dir.path(),
        "dd bs=1 count=1 >/dev/null 2>/dev/null\nexit 7",
    );

    let mut encoder = FfmpegEncoder::new(config, info, script);
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    encoder.set_callbacks(recording_callbacks(&recorded));

    encoder.start().unwrap();
    let handle = encoder.cancel_handle();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        handle.cancel();
    });

    assert!(!encoder.wait_for_completion());
    canceller.join().unwrap();

    assert_eq!(encoder.state(), EncoderState::Cancelled);
    let recorded = recorded.lock().unwrap();
    assert_eq!(
        recorded.finished.as_slice(),
        &[(false, "Encoding cancelled".to_string())]
    );
}

#[test]
fn cancel_after_exit_is_a_no_op() {
    let dir = tempdir().unwrap();
    let (config, info) = fixture(dir.path());
    let script = write_script(dir.path(), "exit 0");

    let mut encoder = FfmpegEncoder::new(config, info, script);
    encoder.start().unwrap();
    assert!(encoder.wait_for_completion());
    assert_eq!(encoder.state(), EncoderState::Completed);

    encoder.cancel();
    assert_eq!(encoder.state(), EncoderState::Completed);
}
