use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use vectorize_core::{
    CancellationToken, EdgeVariant, Pipeline, PipelineFactory, QualityPreset, ThreadPoolConfig,
    VectorizeConfig,
};

#[derive(Parser)]
#[command(name = "vectorize", version, about = "Raster image to filled-region SVG")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Vectorize an input image into an SVG file.
    Run {
        input: PathBuf,
        output: PathBuf,

        #[arg(long, value_enum, default_value = "balanced")]
        preset: CliPreset,

        #[arg(long)]
        num_colors: Option<u32>,

        #[arg(long, value_enum)]
        edge: Option<CliEdgeVariant>,

        #[arg(long)]
        max_dimension: Option<u32>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        threads: Option<usize>,
    },
    /// Print the decoded dimensions and format of an input image.
    Inspect { input: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum CliPreset {
    Fast,
    Balanced,
    High,
    Ultra,
}

impl From<CliPreset> for QualityPreset {
    fn from(value: CliPreset) -> Self {
        match value {
            CliPreset::Fast => QualityPreset::Fast,
            CliPreset::Balanced => QualityPreset::Balanced,
            CliPreset::High => QualityPreset::High,
            CliPreset::Ultra => QualityPreset::Ultra,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliEdgeVariant {
    None,
    Sobel,
    Canny,
    AiEnhanced,
}

impl From<CliEdgeVariant> for EdgeVariant {
    fn from(value: CliEdgeVariant) -> Self {
        match value {
            CliEdgeVariant::None => EdgeVariant::None,
            CliEdgeVariant::Sobel => EdgeVariant::Sobel,
            CliEdgeVariant::Canny => EdgeVariant::Canny,
            CliEdgeVariant::AiEnhanced => EdgeVariant::AiEnhanced,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { input, output, preset, num_colors, edge, max_dimension, seed, threads } => {
            run(input, output, preset, num_colors, edge, max_dimension, seed, threads)
        }
        Command::Inspect { input } => inspect(input),
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    input: PathBuf,
    output: PathBuf,
    preset: CliPreset,
    num_colors: Option<u32>,
    edge: Option<CliEdgeVariant>,
    max_dimension: Option<u32>,
    seed: Option<u64>,
    threads: Option<usize>,
) -> Result<()> {
    let bytes = fs::read(&input).with_context(|| format!("reading {}", input.display()))?;

    let mut config: VectorizeConfig = QualityPreset::from(preset).apply();
    if let Some(n) = num_colors {
        config.num_colors = n;
    }
    if let Some(variant) = edge {
        config.edge_variant = variant.into();
    }
    if let Some(max_dim) = max_dimension {
        config.max_dimension = Some(max_dim);
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }

    let thread_config = match threads {
        Some(n) => ThreadPoolConfig::Fixed(n),
        None => ThreadPoolConfig::Auto,
    };
    let factory = PipelineFactory::new(thread_config).context("building thread pool")?;
    let pipeline = Pipeline::new(factory, &config);

    log::info!(
        "vectorizing {} ({} colors, edge={:?})",
        input.display(),
        config.num_colors,
        config.edge_variant
    );

    let result = pipeline
        .run(&bytes, &config, &CancellationToken::new())
        .with_context(|| format!("vectorizing {}", input.display()))?;

    for warning in &result.warnings {
        log::warn!("{warning}");
    }

    fs::write(&output, result.svg).with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn inspect(input: PathBuf) -> Result<()> {
    let (width, height) = image::image_dimensions(&input)
        .with_context(|| format!("reading dimensions of {}", input.display()))?;
    let format = image::ImageFormat::from_path(&input).ok();
    println!("path: {}", input.display());
    println!("dimensions: {width}x{height}");
    match format {
        Some(f) => println!("format: {f:?}"),
        None => println!("format: unknown"),
    }
    Ok(())
}
