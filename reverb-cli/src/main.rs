use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use reverb_types::ReverbConfig;
use schroeder_reverb::Reverberator;
use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "reverb-cli")]
#[command(about = "Run mono sample streams through a Schroeder reverberator")]
struct Cli {
    /// JSON reverb configuration, missing fields use the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the sample rate from the configuration
    #[arg(long, global = true)]
    sample_rate: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the impulse response, one sample per line
    Impulse {
        /// Number of samples to render
        #[arg(long, default_value_t = 44100)]
        length: usize,
    },
    /// Read whitespace separated samples from stdin and write the processed samples to stdout
    Process,
    /// Print the default configuration as JSON
    DefaultConfig,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Impulse { length } => {
            let reverb = build_reverb(cli.config.as_deref(), cli.sample_rate)?;
            let mut impulse = vec![0.0f32; length];
            if let Some(first) = impulse.first_mut() {
                *first = 1.0;
            }
            write_samples(&reverb.process_buffer(&impulse)?)
        }
        Commands::Process => {
            let reverb = build_reverb(cli.config.as_deref(), cli.sample_rate)?;
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read samples from stdin")?;
            let samples = parse_samples(&text)?;
            info!("Read {} samples", samples.len());
            write_samples(&reverb.process_buffer(&samples)?)
        }
        Commands::DefaultConfig => {
            let json = serde_json::to_string_pretty(&ReverbConfig::default())?;
            println!("{json}");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, sample_rate: Option<u32>) -> Result<ReverbConfig> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .context(format!("Failed to read config file at: {}", path.display()))?;
            serde_json::from_str(&content)
                .context(format!("Invalid reverb config in: {}", path.display()))?
        }
        None => ReverbConfig::default(),
    };
    if let Some(sample_rate) = sample_rate {
        config.sample_rate = sample_rate;
    }
    Ok(config)
}

fn build_reverb(path: Option<&Path>, sample_rate: Option<u32>) -> Result<Reverberator> {
    let config = load_config(path, sample_rate)?;
    info!(
        "{} combs, {} all-passes at {} Hz, amount {}",
        config.num_combs, config.num_allpasses, config.sample_rate, config.amount
    );
    Reverberator::from_config(&config).context("Failed to configure reverberator")
}

fn parse_samples(text: &str) -> Result<Vec<f32>> {
    text.split_whitespace()
        .enumerate()
        .map(|(index, token)| {
            token
                .parse::<f32>()
                .context(format!("Sample {index} is not a number: {token:?}"))
        })
        .collect()
}

fn write_samples(samples: &[f32]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for sample in samples {
        writeln!(out, "{sample}")?;
    }
    out.flush().context("Failed to write samples to stdout")
}
