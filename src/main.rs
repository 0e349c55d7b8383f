use std::path::PathBuf;

use clap::Parser;

use svgtrace::{
    Color, FillStrategy, PosterizerOptions, RangeDistribution, Steps, Threshold, TraceError,
    TracerOptions, TurnPolicy,
};

#[derive(Parser)]
#[command(name = "svgtrace", about = "Trace raster images into SVG bezier paths")]
struct Cli {
    /// Input image path (PNG, JPEG, BMP, ...)
    #[arg(short, long)]
    input: PathBuf,

    /// Output SVG path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Posterize into layered tonal ranges instead of a single trace
    #[arg(long)]
    posterize: bool,

    /// Fixed luminance threshold 0-255 (Otsu auto-detection if omitted)
    #[arg(short, long)]
    threshold: Option<u8>,

    /// Trace light pixels on a dark background
    #[arg(long)]
    invert: bool,

    /// Drop contours enclosing at most this many pixels
    #[arg(long, default_value = "2")]
    turd_size: u32,

    /// Corner threshold (0 = all corners, up to 1.3334)
    #[arg(long, default_value = "1.0")]
    alpha_max: f64,

    /// Disable the curve optimization pass
    #[arg(long)]
    no_curve_optimization: bool,

    /// Curve optimization tolerance
    #[arg(long, default_value = "0.2")]
    opt_tolerance: f64,

    /// Ambiguity rule: black, white, left, right, minority, majority
    #[arg(long, default_value = "minority")]
    turn_policy: String,

    /// Path fill color (auto picks black or white)
    #[arg(long)]
    color: Option<String>,

    /// Background rect color (transparent if omitted)
    #[arg(long)]
    background: Option<String>,

    /// Output width (source width if omitted)
    #[arg(long)]
    width: Option<u32>,

    /// Output height (source height if omitted)
    #[arg(long)]
    height: Option<u32>,

    /// Posterizer steps: a count ("4") or explicit thresholds ("20,60,120")
    #[arg(long)]
    steps: Option<String>,

    /// Layer color rule: spread, dominant, mean, median
    #[arg(long, default_value = "dominant")]
    fill_strategy: String,

    /// Threshold spacing: auto (Otsu) or equal
    #[arg(long, default_value = "auto")]
    range_distribution: String,
}

fn parse_turn_policy(value: &str) -> Result<TurnPolicy, String> {
    match value {
        "black" => Ok(TurnPolicy::Black),
        "white" => Ok(TurnPolicy::White),
        "left" => Ok(TurnPolicy::Left),
        "right" => Ok(TurnPolicy::Right),
        "minority" => Ok(TurnPolicy::Minority),
        "majority" => Ok(TurnPolicy::Majority),
        other => Err(format!("unknown turn policy '{}'", other)),
    }
}

fn parse_fill_strategy(value: &str) -> Result<FillStrategy, String> {
    match value {
        "spread" => Ok(FillStrategy::Spread),
        "dominant" => Ok(FillStrategy::Dominant),
        "mean" => Ok(FillStrategy::Mean),
        "median" => Ok(FillStrategy::Median),
        other => Err(format!("unknown fill strategy '{}'", other)),
    }
}

fn parse_range_distribution(value: &str) -> Result<RangeDistribution, String> {
    match value {
        "auto" => Ok(RangeDistribution::Auto),
        "equal" => Ok(RangeDistribution::Equal),
        other => Err(format!("unknown range distribution '{}'", other)),
    }
}

fn parse_steps(value: &str) -> Result<Steps, String> {
    if value.contains(',') {
        let stops = value
            .split(',')
            .map(|part| part.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("bad steps list: {}", e))?;
        Ok(Steps::Manual(stops))
    } else {
        let count = value
            .parse::<u32>()
            .map_err(|e| format!("bad step count: {}", e))?;
        Ok(Steps::Count(count))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let tracer_options = TracerOptions {
        turn_policy: parse_turn_policy(&cli.turn_policy)?,
        turd_size: cli.turd_size,
        alpha_max: cli.alpha_max,
        opt_curve: !cli.no_curve_optimization,
        opt_tolerance: cli.opt_tolerance,
        threshold: match cli.threshold {
            Some(t) => Threshold::Fixed(t),
            None => Threshold::Auto,
        },
        black_on_white: !cli.invert,
        color: match cli.color {
            Some(css) => Color::Css(css),
            None => Color::Auto,
        },
        background: match cli.background {
            Some(css) => Color::Css(css),
            None => Color::Transparent,
        },
        width: cli.width,
        height: cli.height,
    };

    let image = image::open(&cli.input)
        .map_err(|e| TraceError::DecodeFailed(e.to_string()))?
        .to_rgba8();

    let svg = if cli.posterize {
        let options = PosterizerOptions {
            tracer: tracer_options,
            steps: match &cli.steps {
                Some(raw) => parse_steps(raw)?,
                None => Steps::Auto,
            },
            fill_strategy: parse_fill_strategy(&cli.fill_strategy)?,
            range_distribution: parse_range_distribution(&cli.range_distribution)?,
        };
        svgtrace::posterize(&image, &options)?
    } else {
        svgtrace::trace(&image, &tracer_options)?
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &svg)?;
            eprintln!("wrote {} ({} bytes)", path.display(), svg.len());
        }
        None => println!("{}", svg),
    }

    Ok(())
}
