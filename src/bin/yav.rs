use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use yav::{compositor, interrupt, screen, Color, DeviceSpec, Image, Viewport};

/// Display a still or animated image on a raw Linux display surface.
#[derive(Parser, Debug)]
#[command(name = "yav", version)]
struct Cli {
    /// Display backend: 'fb[:path]' or 'drm[:[path]][@connector]'.
    /// ':?' prints backend-specific help.
    #[arg(long, default_value = "fb")]
    dev: String,

    /// Image file to display.
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Image placement anchor as fractions; 0 0 puts the image's top-left
    /// corner in the canvas's top-left corner, 1 1 matches the bottom-right
    /// corners.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    anchor: Option<Vec<f32>>,

    /// Image placement fine-tune in pixels.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    offset: Option<Vec<i32>>,

    /// Viewport box (pixel offset plus size) used as the placement canvas
    /// instead of the full surface.
    #[arg(long, num_args = 4, value_names = ["X", "Y", "W", "H"], allow_negative_numbers = true)]
    view: Option<Vec<i32>>,

    /// Viewport anchor as fractions.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    view_anchor: Option<Vec<f32>>,

    /// Override the per-frame delay, in milliseconds.
    #[arg(long, value_name = "MS", conflicts_with = "static_once")]
    time: Option<u64>,

    /// Play the frame sequence N times; omit the value to loop forever.
    #[arg(
        long = "loop",
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = "-1",
        allow_negative_numbers = true,
        conflicts_with = "static_once"
    )]
    loop_count: Option<i64>,

    /// Alpha-blend the image against existing surface content.
    #[arg(short, long)]
    blend: bool,

    /// Force single-frame, single-loop playback.
    #[arg(short = 's', long = "static")]
    static_once: bool,

    /// Clear the surface before drawing, optionally to a hex color
    /// (default opaque black).
    #[arg(short, long, value_name = "COLOR", num_args = 0..=1, default_missing_value = "000000")]
    clear: Option<String>,

    /// Dump backend and format diagnostics.
    #[arg(short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let spec: DeviceSpec = cli.dev.parse()?;
    if spec.wants_help() {
        println!("{}", spec.help());
        return Ok(());
    }

    interrupt::install()?;

    let mut screen = screen::open(&spec)?;

    if cli.view.is_some() || cli.view_anchor.is_some() {
        let mut viewport = Viewport::default();
        if let Some(view) = &cli.view {
            viewport.offset = (view[0], view[1]);
            viewport.size = Some((view[2], view[3]));
        }
        if let Some(anchor) = &cli.view_anchor {
            viewport.anchor = (anchor[0], anchor[1]);
        }
        screen.set_viewport(Some(viewport));
    }

    if cli.verbose {
        println!("{}", screen.describe());
    }

    if let Some(color) = &cli.clear {
        compositor::clear(screen.as_mut(), Color::parse(color)?)?;
    }

    if let Some(path) = &cli.image {
        let mut image = Image::open(path)?;

        if let Some(anchor) = &cli.anchor {
            image.anchor = (anchor[0], anchor[1]);
        }
        if let Some(offset) = &cli.offset {
            image.offset = (offset[0], offset[1]);
        }
        image.blend = cli.blend;
        if let Some(ms) = cli.time {
            image.frame_delay_ms = ms;
        }
        if let Some(count) = cli.loop_count {
            image.loops = count;
        }
        if cli.static_once {
            image.make_static();
        }

        compositor::blit(screen.as_mut(), &image)?;
    }

    Ok(())
}
