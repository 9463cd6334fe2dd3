use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use physical_media_core::{
    texture::DefaultTransport, HeadlessRenderer, MediaAppearance, MediaCatalog, MediaKind,
    MediaModel, PhysicalMediaError, Rgba, TexturePipeline, ViewerConfig, ViewerController,
};
use tracing_subscriber::EnvFilter;
use url::Url;

fn main() -> physical_media_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preview(args) => run_preview(args),
        Commands::Config { output } => run_config(output.as_ref()),
    }
}

fn run_preview(args: PreviewArgs) -> physical_media_core::Result<()> {
    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    let catalog = MediaCatalog::standard();
    let model = catalog.model(args.kind.into())?.clone();

    let mut appearance = MediaAppearance::new(resolve_art(&args.art)?);
    if let Some(color) = &args.color {
        appearance = appearance.with_color(color.parse::<Rgba>()?);
    }
    if let Some(scale) = args.scale {
        appearance = appearance.with_scale(scale);
    }
    tracing::info!(kind = %model.kind, art = %appearance.art_source, "starting preview");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(preview(args, config, model, appearance))
}

async fn preview(
    args: PreviewArgs,
    config: ViewerConfig,
    model: MediaModel,
    appearance: MediaAppearance,
) -> physical_media_core::Result<()> {
    let pipeline = TexturePipeline::new(DefaultTransport::new()?, &config.fetch);
    let renderer = HeadlessRenderer::with_catalog(&MediaCatalog::standard());
    let (controller, handle) = ViewerController::new(model, appearance, config, renderer, pipeline)?;
    let viewer = tokio::spawn(controller.run());

    if let Some((dx, dy)) = args.drag {
        handle.drag_began()?;
        for step in 1..=10u8 {
            let fraction = f32::from(step) / 10.0;
            handle.drag_moved(dx * fraction, dy * fraction)?;
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
        handle.drag_ended()?;
    }

    tokio::time::sleep(Duration::from_secs_f64(args.seconds.max(0.0).min(86_400.0))).await;
    let status = handle.status();
    handle.shutdown()?;

    let renderer = viewer
        .await
        .map_err(|err| PhysicalMediaError::msg(format!("viewer task failed: {err}")))??;

    tracing::info!(
        mode = ?status.mode,
        x_angle = status.rotation.x_angle,
        y_angle = status.rotation.y_angle,
        completed = status.completed_refreshes,
        failed = status.failed_refreshes,
        orientation_updates = renderer.orientation_updates(),
        "preview finished"
    );
    for rebuild in renderer.rebuilds() {
        tracing::info!(
            entity = %rebuild.entity_name,
            scale_factor = rebuild.scale_factor,
            generation = rebuild.generation,
            "rebuild requested"
        );
    }
    Ok(())
}

fn run_config(output: Option<&PathBuf>) -> physical_media_core::Result<()> {
    let json = ViewerConfig::default().to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(?path, "wrote default configuration");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Accepts an absolute URL or a path to a local file.
fn resolve_art(source: &str) -> physical_media_core::Result<Url> {
    if let Ok(url) = Url::parse(source) {
        return Ok(url);
    }
    let path = std::fs::canonicalize(source)?;
    Url::from_file_path(&path)
        .map_err(|_| PhysicalMediaError::msg(format!("cannot address {} as a file url", path.display())))
}

fn parse_drag(value: &str) -> Result<(f32, f32), String> {
    let (dx, dy) = value
        .split_once(',')
        .ok_or_else(|| format!("expected DX,DY, got `{value}`"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f32>()
            .map_err(|err| format!("invalid drag component `{part}`: {err}"))
    };
    Ok((parse(dx)?, parse(dy)?))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive physical media previews", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a headless preview: load the model, fetch the art and animate.
    Preview(PreviewArgs),
    /// Print the default viewer configuration as JSON.
    Config {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct PreviewArgs {
    #[arg(long, value_enum)]
    kind: KindArg,
    /// Album art URL (`http`, `https`, `file`) or local path.
    #[arg(long)]
    art: String,
    /// Primary color as RRGGBB or RRGGBBAA.
    #[arg(long)]
    color: Option<String>,
    /// Relative model scale between 0 and 1.
    #[arg(long)]
    scale: Option<f32>,
    /// JSON configuration overriding the defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// How long to keep the viewer running.
    #[arg(long, default_value_t = 6.0)]
    seconds: f64,
    /// Simulated drag translation, e.g. `120,-40`.
    #[arg(long, value_parser = parse_drag, allow_hyphen_values = true)]
    drag: Option<(f32, f32)>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Vinyl,
    Cd,
    Cassette,
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Vinyl => MediaKind::VinylRecord,
            KindArg::Cd => MediaKind::CompactDisc,
            KindArg::Cassette => MediaKind::CompactCassette,
        }
    }
}
