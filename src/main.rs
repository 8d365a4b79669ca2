use ascii_reel::audio::{AudioOutput, FfmpegExtractor, NoAudio, RodioOutput};
use ascii_reel::decoder::{self, VideoFrameSource};
use ascii_reel::player::Player;
use ascii_reel::session::{prepare_catalog, PlaybackSession};
use ascii_reel::{CancelToken, Catalog, Cli, ColoredRasterizer, ReelError, ScaleResolver, SourceDescriptor, TerminalSize};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

fn open_frames(source: &SourceDescriptor) -> ascii_reel::Result<VideoFrameSource> {
    VideoFrameSource::open(source.video_path(), source.frame_count(), source.frame_rate())
}

/// Interrupts that land while ffmpeg or the renderer is busy show up as
/// ordinary failures; the token tells them apart.
fn interrupted(result: &ascii_reel::Result<impl Sized>, cancel: &CancelToken) -> bool {
    matches!(result, Err(ReelError::Cancelled)) || (result.is_err() && cancel.is_cancelled())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter())).init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let catalog = Catalog::load(&cli.data_dir, &decoder::probe)
        .with_context(|| format!("Failed to load catalog from {}", cli.data_dir.display()))?;

    if cli.list {
        println!("Animations in {}:", catalog.data_root().display());
        for source in catalog.iter() {
            let (width, height) = source.resolution();
            let probed = decoder::probe(source.video_path())
                .map(|(frames, fps)| format!("{} frames @ {} FPS", frames, fps))
                .unwrap_or_else(|e| e.to_string());
            println!(
                "  {:<16} {}x{}  base scale {:<3} {} frames @ {} FPS  (video: {})",
                source.id(),
                width,
                height,
                source.base_scale(),
                source.frame_count(),
                source.frame_rate(),
                probed
            );
        }
        return Ok(());
    }

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();

    if cli.prepare {
        let token = cancel.clone();
        let result = tokio::task::spawn_blocking(move || {
            prepare_catalog(
                &catalog,
                open_frames,
                &ColoredRasterizer::default(),
                &FfmpegExtractor::default(),
                &token,
            )
        })
        .await
        .context("Prepare task failed")?;

        if interrupted(&result, &cancel) {
            info!("Preparation interrupted");
            return Ok(());
        }
        result.context("Failed to prepare animations")?;
        println!("READY");
        return Ok(());
    }

    let source = catalog.get(&cli.animation)?;
    let decision = ScaleResolver::new().resolve_with(&source, cli.scale, TerminalSize::measure);

    let token = cancel.clone();
    let result = tokio::task::spawn_blocking(move || {
        PlaybackSession::prepare(
            source,
            decision,
            open_frames,
            &ColoredRasterizer::default(),
            &FfmpegExtractor::default(),
            &token,
        )
    })
    .await
    .context("Render task failed")?;

    if interrupted(&result, &cancel) {
        info!("Interrupted before playback");
        return Ok(());
    }
    let session = result.context("Failed to prepare frames")?;

    let audio: Box<dyn AudioOutput> = if cli.mute {
        Box::new(NoAudio)
    } else {
        Box::new(RodioOutput::default())
    };

    let mut player = Player::stdout();
    player.set_loaded();
    player
        .play(
            session.frames(),
            session.source().frame_rate(),
            session.source().audio_path(),
            audio.as_ref(),
            &cancel,
        )
        .await?;

    Ok(())
}
