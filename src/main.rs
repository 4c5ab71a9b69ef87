use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as AnyhowContext, Result};
use clap::Parser;

use indicatif::ProgressStyle;
use tracing::{info, info_span, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::LevelFilter, prelude::*};

use sparse_flow::config::*;
use sparse_flow::detector::Detector;
use sparse_flow::optical_flow::OpticalFlow;
use sparse_flow::sink::{ChannelSink, FrameSink};
use sparse_flow::source::{FrameSource, SyntheticSource};
use sparse_flow::tracker::{CancelToken, Tracker};
use sparse_flow::video::{VideoInput, VideoOutput};
use sparse_flow::visualization::{CvRenderer, Recorder};

#[derive(Parser)]
pub struct Args {
    /// Video to track, omit together with --synthetic
    pub input: Option<String>,
    /// Track a generated sliding square instead of a video file
    #[clap(long)]
    pub synthetic: bool,
    #[clap(long, default_value = "120")]
    pub synthetic_frames: usize,
    #[clap(short, long, default_value = "./output.mp4")]
    pub output: String,
    /// JSON file with tracking parameters, replaces the flags below
    #[clap(long)]
    pub config: Option<String>,
    /// Write run statistics as JSON
    #[clap(long)]
    pub summary: Option<String>,
    /// Record annotated frames and velocity into a rerun file
    #[clap(long)]
    pub rerun: Option<String>,
    #[clap(short, long)]
    pub verbose: bool,
    #[clap(flatten)]
    pub tracking: Config,
}

fn main() -> Result<()> {
    // parse the config
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_json_file(Path::new(path))?,
        None => args.tracking.clone(),
    };
    config.validate()?;

    // setup logging
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .with(level)
        .init();

    let mut source: Box<dyn FrameSource> = match (&args.input, args.synthetic) {
        (Some(_), true) => bail!("pass either an input video or --synthetic, not both"),
        (Some(input), false) => Box::new(VideoInput::new(Path::new(input))?),
        (None, true) => Box::new(
            SyntheticSource::new(args.synthetic_frames, (2, 1)).with_noise(4, config.seed),
        ),
        (None, false) => bail!("no input video given, pass a path or --synthetic"),
    };

    let output_path = PathBuf::from(&args.output);
    let output = VideoOutput::new(&output_path, config.fps);
    let mut sink: Box<dyn FrameSink> = if config.queue_depth > 0 {
        Box::new(ChannelSink::spawn(output, config.queue_depth))
    } else {
        Box::new(output)
    };

    let mut tracker = Tracker::new(
        config.clone(),
        Box::new(Detector::new(&config)),
        Box::new(OpticalFlow::new(&config)?),
        Box::new(CvRenderer::new(&config)),
    )?;
    if let Some(rerun_path) = &args.rerun {
        tracker = tracker.with_observer(Box::new(Recorder::save(Path::new(rerun_path))?));
    }

    // Ctrl-C stops tracking after the current frame, output is still finalized
    let cancel = CancelToken::new();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupted, stopping after the current frame");
        handler_cancel.cancel();
    })
    .context("failed to install the Ctrl-C handler")?;

    let header_span = info_span!("header");
    header_span.pb_set_style(&ProgressStyle::default_bar());
    header_span.pb_set_length(source.frame_count().saturating_sub(1) as u64);
    let header_span_enter = header_span.enter();

    let stats = tracker.run(source.as_mut(), sink.as_mut(), &cancel)?;

    std::mem::drop(header_span_enter);
    std::mem::drop(header_span);

    info!(
        "wrote {} frames to {}, final velocity ({:.3}, {:.3}) px/frame",
        stats.frames_out,
        output_path.display(),
        stats.final_velocity.mean_u,
        stats.final_velocity.mean_v
    );

    if let Some(summary_path) = &args.summary {
        let file = File::create(summary_path)
            .with_context(|| format!("failed to create summary file {summary_path}"))?;
        serde_json::to_writer_pretty(file, &stats)?;
    }

    Ok(())
}
