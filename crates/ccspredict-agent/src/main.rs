//! ccspredict — collision cross section prediction from molecular structure.
//! Entry point for the command-line binary.

mod config;
mod interactive;
mod service;
mod train;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ccspredict_chem::{rdkit_registry, ProviderRegistry, RdkitToolkit, StructureNormalizer};
use ccspredict_data::convert_ccsbase;

use crate::config::Config;
use crate::service::PredictionService;

#[derive(Parser, Debug)]
#[command(name = "ccspredict", version, about = "Predict ion collision cross sections (Å²) from SMILES or InChI")]
struct Cli {
    /// Configuration file (default: ./ccspredict.toml when present).
    #[arg(long, global = true, env = "CCSPREDICT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train every configured model, report held-out metrics and save them.
    Train {
        /// Data files to use instead of `data.files`.
        #[arg(long = "data")]
        data: Vec<PathBuf>,
        #[arg(long)]
        models_dir: Option<PathBuf>,
        #[arg(long)]
        test_fraction: Option<f64>,
        /// Exit after training instead of opening the prediction prompt.
        #[arg(long)]
        no_interactive: bool,
    },
    /// Predict with saved models. Without inputs, opens the prompt.
    Predict {
        #[arg(long)]
        models_dir: Option<PathBuf>,
        /// SMILES or InChI strings.
        inputs: Vec<String>,
    },
    /// Convert a CCSbase export into the training CSV layout.
    Convert {
        input: PathBuf,
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ccspredict=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("ccspredict {}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Convert { input, output } => {
            let report = convert_ccsbase(&input, &output).await?;
            println!(
                "Wrote {} rows to {} ({} skipped)",
                report.written,
                output.display(),
                report.skipped
            );
        }

        Command::Train {
            data,
            models_dir,
            test_fraction,
            no_interactive,
        } => {
            if !data.is_empty() {
                config.data.files = data;
            }
            if let Some(dir) = models_dir {
                config.output.models_dir = dir;
            }
            if let Some(fraction) = test_fraction {
                config.training.test_fraction = fraction;
            }
            config.validate()?;

            let (normalizer, registry) = chemistry(&config).await?;
            let outcome = train::run_training(&config, normalizer.clone(), registry.clone()).await?;
            print!("{}", train::summary(&outcome));

            if !no_interactive {
                let service = PredictionService::new(
                    normalizer,
                    registry,
                    &config.features.pipeline_config(),
                    outcome.models,
                )?;
                prompt(&service).await?;
            }
        }

        Command::Predict { models_dir, inputs } => {
            if let Some(dir) = models_dir {
                config.output.models_dir = dir;
            }
            let (normalizer, registry) = chemistry(&config).await?;
            let service = PredictionService::load(
                &config.output.models_dir,
                &config.training.models,
                normalizer,
                registry,
                &config.features.pipeline_config(),
            )?;
            if service.is_empty() {
                anyhow::bail!(
                    "No trained models under {}. Run `ccspredict train` first.",
                    config.output.models_dir.display()
                );
            }
            info!(models = ?service.model_names(), "Ready");

            if inputs.is_empty() {
                prompt(&service).await?;
            } else {
                for input in &inputs {
                    println!("{input}");
                    print!("{}", interactive::answer(&service, input).await);
                }
            }
        }
    }

    Ok(())
}

/// RDKit-backed normalizer and descriptor providers.
async fn chemistry(config: &Config) -> anyhow::Result<(Arc<dyn StructureNormalizer>, ProviderRegistry)> {
    let toolkit = RdkitToolkit::new(&config.chemistry.python);
    toolkit.check().await?;
    let registry = rdkit_registry(&toolkit);
    Ok((Arc::new(toolkit), registry))
}

async fn prompt(service: &PredictionService) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    interactive::run_prompt(service, stdin, tokio::io::stdout()).await
}
