use ascii_reel::prelude::*;
use ascii_reel::audio::{AudioExtractor, AudioOutput};
use ascii_reel::session::prepare_catalog;
use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const CATALOG: &str = r#"[
    {"id": "tiny-clip", "video": "tiny.mp4", "resolution": [160, 90], "base_scale": 4,
     "frame_count": 6, "frame_rate": 50, "aliases": ["tiny"]}
]"#;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("ascii-reel").unwrap();
    cmd.env_remove("ASCII_REEL_DATA");
    cmd
}

#[test]
fn test_cli_help() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--prepare"))
        .stdout(predicate::str::contains("--scale"));
}

#[test]
fn test_cli_version() {
    bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_unknown_animation() {
    let data = tempdir().unwrap();
    bin()
        .arg("--data-dir")
        .arg(data.path())
        .args(["--animation", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown animation 'does-not-exist'"));

    // nothing is created for an unknown title
    assert_eq!(std::fs::read_dir(data.path()).unwrap().count(), 0);
}

#[test]
fn test_cli_zero_scale() {
    bin()
        .args(["--scale", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Scale must be at least 1"));
}

#[test]
fn test_cli_list_reads_catalog_file() {
    let data = tempdir().unwrap();
    std::fs::write(data.path().join("catalog.json"), CATALOG).unwrap();

    bin()
        .arg("--data-dir")
        .arg(data.path())
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("tiny-clip"))
        .stdout(predicate::str::contains("160x90"));
}

#[test]
fn test_cli_list_builtin_catalog() {
    let data = tempdir().unwrap();
    bin()
        .arg("--data-dir")
        .arg(data.path())
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("chipi-chipi"))
        .stdout(predicate::str::contains("shigure-catcher"));
}

#[test]
fn test_cli_list_reports_undecodable_video() {
    let data = tempdir().unwrap();
    std::fs::write(data.path().join("catalog.json"), CATALOG).unwrap();
    std::fs::create_dir_all(data.path().join("tiny-clip")).unwrap();
    std::fs::write(data.path().join("tiny-clip/tiny.mp4"), b"definitely not a video").unwrap();

    bin()
        .arg("--data-dir")
        .arg(data.path())
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Video decoding error"))
        .stdout(predicate::str::contains("video not found").not());
}

#[test]
fn test_cli_prepare_without_videos_fails_cleanly() {
    let data = tempdir().unwrap();
    std::fs::write(data.path().join("catalog.json"), CATALOG).unwrap();

    bin()
        .arg("--data-dir")
        .arg(data.path())
        .arg("--prepare")
        .timeout(Duration::from_secs(30))
        .assert()
        .failure();

    assert!(!data.path().join("tiny-clip/frames/4").exists());
}

/// Gradient frames whose brightness follows the frame index
struct GradientFrames {
    count: u32,
}

impl FrameSource for GradientFrames {
    fn frame_count(&self) -> u32 {
        self.count
    }

    fn frame_rate(&self) -> u32 {
        50
    }

    fn frame(&mut self, index: u32) -> ascii_reel::Result<RgbImage> {
        let level = (index * 51).min(255) as u8;
        Ok(RgbImage::from_pixel(160, 90, Rgb([level, level, level])))
    }
}

struct FakeExtractor;

impl AudioExtractor for FakeExtractor {
    fn extract(&self, _video: &Path, audio: &Path) -> ascii_reel::Result<()> {
        std::fs::write(audio, b"not really mp3")?;
        Ok(())
    }
}

#[derive(Default)]
struct CountingAudio {
    starts: AtomicUsize,
}

impl AudioOutput for CountingAudio {
    fn play_detached(&self, _path: &Path) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
}

fn open_gradient(source: &SourceDescriptor) -> ascii_reel::Result<GradientFrames> {
    Ok(GradientFrames {
        count: source.frame_count(),
    })
}

#[tokio::test]
async fn test_resolve_render_and_play() {
    let data = tempdir().unwrap();
    std::fs::write(data.path().join("catalog.json"), CATALOG).unwrap();
    let catalog = Catalog::load(data.path(), &|_: &Path| -> ascii_reel::Result<(u32, u32)> {
        panic!("counts are in the catalog")
    })
    .unwrap();
    let source = catalog.get("tiny").unwrap();

    // 160x90 at 16:9 needs ceil(1.78 * 160 / 20) = 15 columns-wise and ceil(90 / 10) = 9 rows-wise
    let decision = ScaleResolver::new().resolve(&source, None, Some(TerminalSize::new(20, 10)));
    assert_eq!(decision.scale, 15);
    assert!(decision.shortfall.is_some());

    let cancel = CancelToken::new();
    let session = PlaybackSession::prepare(
        Arc::clone(&source),
        decision,
        open_gradient,
        &ColoredRasterizer::default(),
        &FakeExtractor,
        &cancel,
    )
    .unwrap();

    assert_eq!(session.frames().len(), 6);
    assert!(data.path().join("tiny-clip/frames/15/5.txt").is_file());
    // first frame is black, last is bright
    assert!(session.frames()[0].contains(' '));
    assert!(session.frames()[5].contains('@'));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        trigger.cancel();
    });

    let audio = CountingAudio::default();
    let mut player = Player::new(Vec::new());
    let summary = player
        .play(session.frames(), source.frame_rate(), source.audio_path(), &audio, &cancel)
        .await
        .unwrap();

    // 6 frames at 50 FPS is 120ms per pass
    assert!(summary.passes_completed >= 1);
    assert!(audio.starts.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_prepare_catalog_then_reload() {
    let data = tempdir().unwrap();
    std::fs::write(data.path().join("catalog.json"), CATALOG).unwrap();
    let catalog = Catalog::load(data.path(), &|_: &Path| -> ascii_reel::Result<(u32, u32)> { Ok((1, 1)) }).unwrap();

    let cancel = CancelToken::new();
    prepare_catalog(&catalog, open_gradient, &ColoredRasterizer::default(), &FakeExtractor, &cancel).unwrap();

    let cache = FrameCache::new(data.path().join("tiny-clip/frames/4"));
    assert!(cache.is_complete(6));
    let first = cache.load(6).unwrap();
    let second = cache.load(6).unwrap();
    assert_eq!(first, second);
}
