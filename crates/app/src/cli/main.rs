//! Triband CLI Application

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use triband_core::domain::{
    BiquadCoeffs, ChainCoefficients, ChainSettings, EqConfig, ParameterStore, Slope,
};

#[derive(Parser)]
#[command(name = "triband")]
#[command(about = "A three-band parametric equalizer", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the designed coefficients of every band
    Coeffs {
        #[command(flatten)]
        overrides: SettingsArgs,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the magnitude response at log-spaced frequencies
    Response {
        #[command(flatten)]
        overrides: SettingsArgs,

        /// Number of frequency points between 20 Hz and 20 kHz
        #[arg(long, default_value_t = 31)]
        points: usize,
    },
    /// Run a test sine through the stereo processor
    Render {
        #[command(flatten)]
        overrides: SettingsArgs,

        /// Test tone frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        tone: f32,

        /// Duration in seconds
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,
    },
    /// Write a default configuration file
    Init {
        /// Destination path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Per-invocation overrides applied on top of the configured settings
#[derive(Args, Default)]
struct SettingsArgs {
    /// Peak center frequency in Hz
    #[arg(long)]
    peak_freq: Option<f32>,

    /// Peak gain in dB
    #[arg(long, allow_hyphen_values = true)]
    peak_gain: Option<f32>,

    /// Peak quality factor
    #[arg(long)]
    peak_q: Option<f32>,

    /// Low-cut corner frequency in Hz
    #[arg(long)]
    low_cut: Option<f32>,

    /// High-cut corner frequency in Hz
    #[arg(long)]
    high_cut: Option<f32>,

    /// Low-cut slope index (0 = 12 dB/oct .. 3 = 48 dB/oct)
    #[arg(long)]
    low_slope: Option<usize>,

    /// High-cut slope index (0 = 12 dB/oct .. 3 = 48 dB/oct)
    #[arg(long)]
    high_slope: Option<usize>,
}

impl SettingsArgs {
    fn apply(&self, mut settings: ChainSettings) -> anyhow::Result<ChainSettings> {
        if let Some(freq) = self.peak_freq {
            settings.peak_freq = freq;
        }
        if let Some(gain) = self.peak_gain {
            settings.peak_gain_db = gain;
        }
        if let Some(q) = self.peak_q {
            settings.peak_quality = q;
        }
        if let Some(freq) = self.low_cut {
            settings.low_cut_freq = freq;
        }
        if let Some(freq) = self.high_cut {
            settings.high_cut_freq = freq;
        }
        if let Some(index) = self.low_slope {
            settings.low_cut_slope = Slope::from_index(index)?;
        }
        if let Some(index) = self.high_slope {
            settings.high_cut_slope = Slope::from_index(index)?;
        }
        Ok(settings)
    }
}

#[derive(Serialize)]
struct CoefficientReport<'a> {
    sample_rate: f32,
    settings: &'a ChainSettings,
    peak: BiquadCoeffs,
    low_cut: &'a [BiquadCoeffs],
    high_cut: &'a [BiquadCoeffs],
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Command::Init { path, force } => init(&path, force).await,
        Command::Coeffs { overrides, json } => {
            let config = load_config(cli.config.as_deref(), &overrides).await?;
            coeffs(&config, json)
        }
        Command::Response { overrides, points } => {
            let config = load_config(cli.config.as_deref(), &overrides).await?;
            response(&config, points)
        }
        Command::Render {
            overrides,
            tone,
            seconds,
        } => {
            let config = load_config(cli.config.as_deref(), &overrides).await?;
            render(&config, tone, seconds)
        }
    }
}

async fn load_config(path: Option<&Path>, overrides: &SettingsArgs) -> anyhow::Result<EqConfig> {
    let mut config = match path {
        Some(path) => EqConfig::load_from_file(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => EqConfig::default(),
    };
    config.settings = overrides.apply(config.settings)?;
    Ok(config)
}

async fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    EqConfig::default().save_to_file(path).await?;
    tracing::info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}

fn coeffs(config: &EqConfig, json: bool) -> anyhow::Result<()> {
    let sample_rate = config.processor.sample_rate;
    let settings = config.settings.sanitized(sample_rate);
    let designed = ChainCoefficients::design(&settings, sample_rate, config.processor.cascade)?;

    if json {
        let report = CoefficientReport {
            sample_rate: sample_rate.hz(),
            settings: &settings,
            peak: designed.peak,
            low_cut: &designed.low_cut,
            high_cut: &designed.high_cut,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "sample rate {} Hz, {:?} cascade",
        sample_rate.hz(),
        config.processor.cascade
    );
    print_stage("peak", &designed.peak);
    for (i, stage) in designed.low_cut.iter().enumerate() {
        print_stage(&format!("low cut [{i}]"), stage);
    }
    for (i, stage) in designed.high_cut.iter().enumerate() {
        print_stage(&format!("high cut [{i}]"), stage);
    }
    Ok(())
}

fn print_stage(label: &str, c: &BiquadCoeffs) {
    println!(
        "{label:<14} b0={:+.8} b1={:+.8} b2={:+.8} a1={:+.8} a2={:+.8}",
        c.b0, c.b1, c.b2, c.a1, c.a2
    );
}

fn response(config: &EqConfig, points: usize) -> anyhow::Result<()> {
    if points < 2 {
        anyhow::bail!("need at least 2 points, got {points}");
    }
    let eq = config.build_equalizer()?;
    let nyquist = eq.sample_rate().nyquist() as f64;

    let (low, high) = (20.0f64, 20000.0f64.min(nyquist));
    let ratio = (high / low).ln() / (points - 1) as f64;
    for i in 0..points {
        let freq = low * (ratio * i as f64).exp();
        let magnitude = eq.magnitude_for_frequency(freq);
        println!("{freq:>10.1} Hz {:>+9.2} dB", to_db(magnitude));
    }
    Ok(())
}

fn render(config: &EqConfig, tone: f32, seconds: f32) -> anyhow::Result<()> {
    let mut eq = config.build_equalizer()?;
    let sample_rate = eq.sample_rate().hz();
    let frames = (seconds.max(0.0) * sample_rate) as usize;
    let block_size = config.processor.block_size;

    let store = ParameterStore::new(config.settings.sanitized(eq.sample_rate()));
    let input: Vec<f32> = (0..frames)
        .map(|i| (2.0 * std::f32::consts::PI * tone * i as f32 / sample_rate).sin() * 0.5)
        .collect();
    let mut left = input.clone();
    let mut right = input.clone();

    for (l, r) in left.chunks_mut(block_size).zip(right.chunks_mut(block_size)) {
        eq.process_block(&store, l, r, sample_rate)?;
    }

    tracing::debug!(frames, block_size, "Rendered test tone");
    println!("tone {tone} Hz, {frames} frames in blocks of {block_size}");
    println!("input  RMS {:+.2} dB", to_db(rms(&input) as f64));
    println!("left   RMS {:+.2} dB", to_db(rms(&left) as f64));
    println!("right  RMS {:+.2} dB", to_db(rms(&right) as f64));
    Ok(())
}

fn rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    (buffer.iter().map(|s| s * s).sum::<f32>() / buffer.len() as f32).sqrt()
}

fn to_db(linear: f64) -> f64 {
    20.0 * linear.max(1e-12).log10()
}
