use crate::config::load_config;
use crate::parser::parse_scene;
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::route_dump::write_route_dump;
use crate::routing::{CrossingMode, Router};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "wirepath", version, about = "Orthogonal wire router for schematic scenes")]
pub struct Args {
    /// Scene file (.json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, router and render settings)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f64>,

    /// Height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f64>,

    /// Crossing style, overrides the config file
    #[arg(long = "crossings", value_enum)]
    pub crossings: Option<CrossingArg>,

    /// Log filter, e.g. `debug` or `wirepath=trace`. Falls back to RUST_LOG.
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum CrossingArg {
    Off,
    Bumps,
}

impl From<CrossingArg> for CrossingMode {
    fn from(value: CrossingArg) -> Self {
        match value {
            CrossingArg::Off => CrossingMode::Off,
            CrossingArg::Bumps => CrossingMode::Bumps,
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let mut config = load_config(args.config.as_deref())
        .with_context(|| format!("loading config {:?}", args.config))?;
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    if let Some(crossings) = args.crossings {
        config.router.crossings = crossings.into();
    }

    let input = read_input(args.input.as_deref())?;
    let mut scene = parse_scene(&input)?;
    let router = Router::new(config.router.clone());
    scene.route_all(&router)?;
    tracing::info!(wires = scene.routes().count(), "routed scene");

    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&scene, &config.theme, &config.render);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&scene, &config.theme, &config.render);
            write_output_png(&svg, &output, &config.render)?;
        }
        OutputFormat::Json => {
            write_route_dump(&scene, args.output.as_deref())?;
        }
    }
    Ok(())
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
