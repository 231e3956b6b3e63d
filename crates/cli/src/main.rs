//! pcache maintenance tool.
//!
//! Operates on one cache root directory. JSON results go to stdout, logs to
//! stderr.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pcache_core::{BackendParamsManager, CacheConfig};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pcache")]
#[command(about = "Inspect and maintain a persistent cache directory")]
#[command(version)]
struct Cli {
    /// Cache root directory (overrides PCACHE_ROOT_DIR and the config file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an entry
    Put {
        /// Database name; hashed into a backend key unless --raw-key
        name: String,
        /// Entry key within the database
        key: String,
        /// Entry content (reads stdin if neither --value nor --file is given)
        #[arg(long, conflicts_with = "file")]
        value: Option<String>,
        /// Read entry content from this file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Input signature stored with the entry
        #[arg(long, default_value_t = 0)]
        signature: i64,
        /// Use NAME as the backend key verbatim
        #[arg(long)]
        raw_key: bool,
    },
    /// Look up an entry
    Get {
        name: String,
        key: String,
        /// Write the content to this file instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        raw_key: bool,
    },
    /// Evict least recently modified databases down to a target size
    Trim {
        /// Target footprint in bytes (defaults to the configured target)
        #[arg(long)]
        target: Option<u64>,
    },
    /// Delete every file under the cache root
    Clear,
    /// Report the total size of the cache root
    Footprint,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Put { .. } => "put",
            Commands::Get { .. } => "get",
            Commands::Trim { .. } => "trim",
            Commands::Clear => "clear",
            Commands::Footprint => "footprint",
        }
    }
}

fn read_content(value: Option<String>, file: Option<PathBuf>) -> Result<Vec<u8>> {
    if let Some(value) = value {
        return Ok(value.into_bytes());
    }
    if let Some(path) = file {
        return std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()));
    }
    let mut content = Vec::new();
    std::io::stdin().read_to_end(&mut content).context("failed to read content from stdin")?;
    Ok(content)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = CacheConfig::load().context("failed to load cache configuration")?;
    if let Some(root) = cli.root {
        config.root_dir = root;
    }
    let manager = BackendParamsManager::from_config(&config, Handle::current())
        .with_context(|| format!("failed to prepare cache root {}", config.root_dir.display()))?;

    let command_name = cli.command.name();
    let output = match cli.command {
        Commands::Put { name, key, value, file, signature, raw_key } => {
            let content = read_content(value, file)?;
            let backend_key = commands::backend_key(&name, raw_key);
            serde_json::to_value(commands::put(&manager, &backend_key, &key, &content, signature).await?)?
        }
        Commands::Get { name, key, output, raw_key } => {
            let backend_key = commands::backend_key(&name, raw_key);
            let result = commands::get(&manager, &backend_key, &key).await?;
            let mut json = serde_json::to_value(&result)?;
            if let Some(content) = &result.content {
                match output {
                    Some(path) => {
                        std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?
                    }
                    None => json["content"] = String::from_utf8_lossy(content).into_owned().into(),
                }
            }
            json
        }
        Commands::Trim { target } => {
            let target = target.unwrap_or(config.target_footprint_bytes);
            serde_json::to_value(commands::trim(&manager, target))?
        }
        Commands::Clear => serde_json::to_value(commands::clear(&manager)?)?,
        Commands::Footprint => serde_json::to_value(commands::footprint(&manager, config.target_footprint_bytes))?,
    };

    tracing::info!(command = command_name, root = %config.root_dir.display(), "pcache command completed");
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
