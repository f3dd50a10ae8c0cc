use std::process::ExitCode;

use anyhow::Result;
use renderer::{PhotoLoader, Viewer};
use tracing_subscriber::EnvFilter;

use crate::bootstrap;
use crate::cli::{Cli, Command, ViewArgs};
use crate::inspect;

pub fn run(args: Cli) -> Result<ExitCode> {
    initialise_tracing(args.log_level.as_deref());

    match args.command {
        Some(Command::Inspect(inspect_args)) => inspect::run(&inspect_args),
        Some(Command::View(view_args)) => run_viewer(&view_args),
        None => run_viewer(&args.view),
    }
}

fn initialise_tracing(directive: Option<&str>) {
    let filter = directive
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    // stdout is reserved for inspect output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_viewer(args: &ViewArgs) -> Result<ExitCode> {
    let config = bootstrap::renderer_config(args)?;

    let initial = match args.file.as_deref() {
        Some(path) => {
            let photo = bootstrap::load_photo(path)?;
            if photo.is_valid() {
                match bootstrap::decode_textures(&photo) {
                    Ok(textures) => Some(textures),
                    Err(err) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %format!("{err:#}"),
                            "failed to decode depth photo payloads"
                        );
                        None
                    }
                }
            } else {
                tracing::warn!(
                    path = %path.display(),
                    missing = ?photo.missing_fields(),
                    "file is not a renderable depth photo"
                );
                None
            }
        }
        None => None,
    };

    tracing::info!(
        photo = ?args.file,
        size = ?config.surface_size,
        gpu_power = ?config.gpu_power,
        vsync = config.vsync,
        "starting depthview"
    );

    let loader: PhotoLoader = Box::new(bootstrap::load_textures);
    Viewer::new(config, loader).run(initial)?;
    Ok(ExitCode::SUCCESS)
}
