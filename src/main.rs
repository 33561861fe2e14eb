use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use aqua_screenkit::config::Config;
use aqua_screenkit::{pfas, CriteriaOptions, ScreeningModel};

#[derive(Parser, Debug)]
#[command(name = "aqua-screen", version, about = "Surface-water screening tools")]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true, env = "AQUA_SCREEN_CONFIG")]
    config: Option<PathBuf>,

    /// Directory that relative input and output paths resolve against
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Screen metal results against hardness-dependent criteria
    Screen {
        /// Sample data CSV
        #[arg(long)]
        samples: Option<PathBuf>,
        /// Criteria coefficient table (xlsx, xls, ods or csv)
        #[arg(long)]
        criteria: Option<PathBuf>,
        /// Worksheet of the criteria table
        #[arg(long)]
        criteria_sheet: Option<String>,
        /// Output spreadsheet, overwritten if present
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Fail on criteria rows with an unrecognized class label
        #[arg(long)]
        strict: bool,
    },
    /// Render the PFAS stacked bar chart
    PfasChart {
        /// Sample exports to union (repeatable)
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
        /// Short-name lookup table
        #[arg(long)]
        lookup: Option<PathBuf>,
        /// Output SVG, overwritten if present
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(p) => format!("loading config {}", p.display()),
        None => "loading default config".to_string(),
    })?;
    if let Some(dir) = cli.base_dir {
        config.base_dir = dir;
    }

    match cli.command {
        Command::Screen {
            samples,
            criteria,
            criteria_sheet,
            output,
            strict,
        } => {
            let cfg = &mut config.screening;
            if let Some(p) = samples {
                cfg.samples = p;
            }
            if let Some(p) = criteria {
                cfg.criteria = p;
            }
            if criteria_sheet.is_some() {
                cfg.criteria_sheet = criteria_sheet;
            }
            if let Some(p) = output {
                cfg.output = p;
            }
            cfg.strict_criteria |= strict;

            let options = CriteriaOptions {
                sheet: cfg.criteria_sheet.clone(),
                strict: cfg.strict_criteria,
            };

            let mut model = ScreeningModel::new(&config.base_dir).with_rename(cfg.rename.clone());
            model
                .load_criteria(&cfg.criteria, &options)
                .with_context(|| format!("loading criteria {}", cfg.criteria.display()))?;
            model
                .load_samples(&cfg.samples)
                .with_context(|| format!("loading samples {}", cfg.samples.display()))?;
            let result = model
                .screen_to_file(&cfg.output)
                .with_context(|| format!("writing {}", cfg.output.display()))?;
            info!(rows = result.height(), "done");
        }
        Command::PfasChart {
            sources,
            lookup,
            output,
        } => {
            let cfg = &mut config.pfas;
            if !sources.is_empty() {
                cfg.sources = sources;
            }
            if let Some(p) = lookup {
                cfg.lookup = p;
            }
            if let Some(p) = output {
                cfg.output = p;
            }
            pfas::run(&config).context("rendering PFAS chart")?;
        }
    }

    Ok(())
}
