use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::GpuPowerPreference;

#[derive(Parser, Debug)]
#[command(
    name = "depthview",
    author,
    version,
    about = "Interactive parallax viewer for depth photos",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub view: ViewArgs,
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Log filter directive (e.g. `debug` or `renderer=trace`); overrides `RUST_LOG`.
    #[arg(long, global = true, value_name = "FILTER", env = "DEPTHVIEW_LOG")]
    pub log_level: Option<String>,
}

#[derive(Parser, Debug, Default)]
pub struct ViewArgs {
    /// Depth photo to open. Without one the window waits for a dropped file.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Directory with `vertex.glsl`, `fragment.glsl`, or `fragment_blur.glsl` overrides.
    #[arg(long, value_name = "DIR", env = "DEPTHVIEW_SHADER_DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Orientation samples (`x y z` per line) from a file, or `-` for stdin.
    #[arg(long, value_name = "PATH|-")]
    pub orientation_feed: Option<String>,

    /// GPU adapter preference: `low` or `high`.
    #[arg(
        long,
        value_name = "POWER",
        value_parser = parse_gpu_power,
        default_value = "low"
    )]
    pub gpu_power: GpuPowerPreference,

    /// Present frames as fast as possible instead of waiting for vblank.
    #[arg(long)]
    pub no_vsync: bool,

    /// Start with the depth-of-field blur enabled.
    #[arg(long)]
    pub blur: bool,

    /// Start by showing the depth map instead of the colour image.
    #[arg(long)]
    pub show_depth: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a depth photo in the interactive viewer.
    View(ViewArgs),
    /// Print the depth metadata of a file as JSON; exits with status 2 if it is not renderable.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// File to inspect.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Emit single-line JSON.
    #[arg(long)]
    pub compact: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" | "integrated" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" | "discrete" => Ok(GpuPowerPreference::High),
        other => Err(format!("invalid GPU power preference '{other}'; use low or high")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_opens_viewer() {
        let cli = Cli::try_parse_from(["depthview", "photo.jpg", "--blur", "--size", "800x600"])
            .expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.view.file, Some(PathBuf::from("photo.jpg")));
        assert!(cli.view.blur);
        assert_eq!(cli.view.size.as_deref(), Some("800x600"));
        assert_eq!(cli.view.gpu_power, GpuPowerPreference::Low);
    }

    #[test]
    fn view_subcommand_takes_the_same_flags() {
        let cli = Cli::try_parse_from([
            "depthview",
            "view",
            "photo.jpg",
            "--gpu-power",
            "high",
            "--orientation-feed",
            "-",
        ])
        .expect("parse");
        let Some(Command::View(view)) = cli.command else {
            panic!("expected view subcommand");
        };
        assert_eq!(view.file, Some(PathBuf::from("photo.jpg")));
        assert_eq!(view.gpu_power, GpuPowerPreference::High);
        assert_eq!(view.orientation_feed.as_deref(), Some("-"));
    }

    #[test]
    fn inspect_subcommand_parses_file() {
        let cli = Cli::try_parse_from(["depthview", "inspect", "photo.jpg", "--compact"])
            .expect("parse");
        let Some(Command::Inspect(args)) = cli.command else {
            panic!("expected inspect subcommand");
        };
        assert_eq!(args.file, PathBuf::from("photo.jpg"));
        assert!(args.compact);
    }

    #[test]
    fn gpu_power_rejects_unknown_values() {
        assert_eq!(parse_gpu_power("HIGH"), Ok(GpuPowerPreference::High));
        assert!(parse_gpu_power("turbo").is_err());
    }
}
