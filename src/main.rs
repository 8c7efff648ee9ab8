use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crowdflow::analytics::LogTracker;
use crowdflow::checkout::CheckoutSettings;
use crowdflow::config::Config;
use crowdflow::discovery::{CategoryTreeModel, TopRowFlags};
use crowdflow::replay::{load_catalog, parse_selection, replay_checkout, CheckoutScript};

/// Get the default config file path (~/.config/crowdflow/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("crowdflow")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "crowdflow",
    about = "Replay checkout navigation and preview discovery filters"
)]
struct Args {
    /// Config file (defaults to ~/.config/crowdflow/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scripted checkout session, printing one JSON line per event
    Checkout {
        /// TOML script describing the session
        #[arg(long, value_name = "FILE")]
        script: PathBuf,
    },

    /// Print the filter rows for a category catalog as JSON
    Filters {
        /// JSON array of categories
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Selected filter: all, staff-picks, starred, recommended, social or a category id
        #[arg(long, default_value = "all")]
        selected: String,

        /// Root category rows to tap after activation, in order
        #[arg(long = "tap", value_name = "ROOT_ID")]
        taps: Vec<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    match args.command {
        Command::Checkout { script } => {
            let settings = CheckoutSettings::from_config(&config.checkout)
                .context("Invalid URL in [checkout] config")?;
            let script = CheckoutScript::load(&script)?;

            let entries = replay_checkout(script, settings, &config.checkout.client_id).await?;
            for entry in entries {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }

        Command::Filters {
            catalog,
            selected,
            taps,
        } => {
            let categories = load_catalog(&catalog)?;
            let selected = parse_selection(&selected, &categories)?;

            let mut model = CategoryTreeModel::new(
                TopRowFlags::from(&config.discovery),
                config.discovery.favorite_category_ids.iter().copied(),
                Arc::new(LogTracker),
            );
            model.configure(selected, &categories);

            let snapshot = model.activate()?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);

            for root_id in taps {
                let rows = model.tap_expandable(root_id)?;
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
        }
    }

    Ok(())
}
