// SPDX-License-Identifier: MPL-2.0

mod replay;
mod trace;

use std::{path::PathBuf, sync::Arc};

use anadrome_lib::{
    AffineTransform, CropFrame, EngineHandle, NullSurface, Placeholder, SurfaceEvent,
    WallpaperEngine, event_channel, letterbox, start_lock_monitor, start_power_save_monitor,
};
use clap::{Parser, Subcommand};
use eyre::Context;
use tracing_subscriber::prelude::*;

use crate::{replay::Scenario, trace::TraceFactory};

/// Anadrome - Video live wallpaper engine
#[derive(Parser, Debug)]
#[command(name = "anadrome")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image painted until the first video frame is rendered
    #[arg(long, global = true)]
    placeholder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a RON scenario and print the final engine state
    Replay { scenario: PathBuf },

    /// Follow the power profile and session lock with a virtual surface
    Watch {
        #[arg(long, default_value_t = 1080)]
        width: u32,
        #[arg(long, default_value_t = 1920)]
        height: u32,
        /// Clip length reported by the renderer, in seconds
        #[arg(long)]
        clip_secs: Option<f64>,
    },

    /// Print the crop transform for a frame dragged over a video
    Crop {
        #[arg(long)]
        video_width: u32,
        #[arg(long)]
        video_height: u32,
        #[arg(long, default_value_t = 1080.0)]
        view_width: f32,
        #[arg(long, default_value_t = 1920.0)]
        view_height: f32,
        /// Horizontal drag of the frame, in view pixels
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        dx: f32,
        /// Vertical drag of the frame, in view pixels
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        dy: f32,
    },
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    if std::env::var("RUST_SPANTRACE").is_err() {
        unsafe {
            std::env::set_var("RUST_SPANTRACE", "0");
        }
    }

    init_logger();

    let args = Args::parse();

    let placeholder = args
        .placeholder
        .as_deref()
        .map(Placeholder::open)
        .transpose()
        .wrap_err("failed to load placeholder")?;

    match args.command {
        Command::Replay { scenario } => {
            let scenario = Scenario::load(&scenario)?;
            match replay::run(&scenario, placeholder)? {
                Some(state) => {
                    let pretty = ron::ser::PrettyConfig::default();
                    println!("{}", ron::ser::to_string_pretty(&state, pretty)?);
                }
                None => println!("Unbound"),
            }
        }
        Command::Watch {
            width,
            height,
            clip_secs,
        } => watch(width, height, clip_secs, placeholder)?,
        Command::Crop {
            video_width,
            video_height,
            view_width,
            view_height,
            dx,
            dy,
        } => {
            let display = letterbox(view_width, view_height, video_width, video_height);
            let mut frame = CropFrame::new(display);
            let (cx, cy) = frame.frame().centre();
            if frame.press(cx, cy) {
                frame.drag_to(cx + dx, cy + dy);
                frame.release();
            }

            let crop = frame.normalized(video_width, video_height);
            crop.validate()?;
            let transform = AffineTransform::from_crop(&crop);

            println!("display: {display:?}");
            println!("crop: {crop:?}");
            for row in transform.matrix() {
                println!("{:>10.5} {:>10.5} {:>10.5}", row[0], row[1], row[2]);
            }
        }
    }

    Ok(())
}

fn watch(
    width: u32,
    height: u32,
    clip_secs: Option<f64>,
    placeholder: Option<Placeholder>,
) -> eyre::Result<()> {
    let context = anadrome_config::context().wrap_err("failed to open preferences")?;
    let clip = clip_secs.map(std::time::Duration::from_secs_f64);
    let (tx, rx) = event_channel();

    let mut engine = WallpaperEngine::new(Box::new(context), Box::new(TraceFactory::live(clip)));
    if let Some(power) = start_power_save_monitor(Some(tx.clone())) {
        engine = engine.with_power_source(power);
    }
    if let Some(lock) = start_lock_monitor(Some(tx.clone())) {
        engine = engine.with_lock_source(lock);
    }
    if let Some(placeholder) = placeholder {
        engine = engine.with_placeholder(placeholder);
    }

    let handle = EngineHandle::spawn(engine, (tx, rx));
    handle.send(SurfaceEvent::Created(Arc::new(NullSurface::new(width, height))));
    handle.send(SurfaceEvent::VisibilityChanged(true));
    tracing::info!(width, height, "Watching, press Ctrl-C to stop");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(tokio::signal::ctrl_c())?;

    handle.send(SurfaceEvent::Destroyed);
    drop(handle);
    Ok(())
}

fn init_logger() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    let log_format = tracing_subscriber::fmt::format()
        .pretty()
        .without_time()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_thread_names(true);

    let log_filter = tracing_subscriber::fmt::Layer::default()
        .with_writer(std::io::stderr)
        .event_format(log_format)
        .with_filter(tracing_subscriber::filter::filter_fn(move |metadata| {
            metadata.level() == &tracing::Level::ERROR
                || (metadata.target().starts_with("anadrome") && metadata.level() <= &log_level)
        }));

    tracing_subscriber::registry().with(log_filter).init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn crop_accepts_negative_drag() {
        let args = Args::try_parse_from([
            "anadrome",
            "crop",
            "--video-width",
            "1920",
            "--video-height",
            "1080",
            "--dx",
            "-40",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Crop { dx, .. } if dx == -40.0));
    }

    #[test]
    fn placeholder_is_global() {
        let args =
            Args::try_parse_from(["anadrome", "replay", "day.ron", "--placeholder", "cover.png"])
                .unwrap();
        assert_eq!(args.placeholder, Some(PathBuf::from("cover.png")));
    }
}
