//! CLI command definitions for synth-forge.
//!
//! `serve` runs the REST API, `plugins` prints the plugin catalog and
//! `generate` runs one generation from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing::info;

use crate::api::{self, AppState};
use crate::config::{
    ServerConfig, DEFAULT_API_PREFIX, DEFAULT_DATA_DIR, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SETTINGS_FILE,
};
use crate::export::{export_dataset, write_dataset, ExportFormat};
use crate::generator::{DatasetFormat, DEFAULT_SAMPLE_COUNT};
use crate::registry::{PluginCatalog, PluginKind};
use crate::schema::ConfigMap;
use crate::service::{ForgeService, OneShotRequest};

/// Synthetic dataset generation from documents with pluggable LLMs.
#[derive(Parser)]
#[command(name = "synth-forge")]
#[command(about = "Generate synthetic training datasets from documents with LLMs")]
#[command(version)]
#[command(
    long_about = "synth-forge turns documents (text, JSON, CSV, PDF, web pages) into synthetic datasets \
                  (QA pairs, instructions, conversations, classification, text) with a configurable LLM.\n\n\
                  Example usage:\n  \
                  synth-forge serve --port 8000\n  \
                  synth-forge generate --source '{\"source_id\":\"file_datasource\",\"file_path\":\"notes.txt\"}' \\\n    \
                  --llm @llm.json --format qa --count 20 --output qa.csv"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the REST API server.
    Serve(ServeArgs),

    /// List registered plugins.
    #[command(alias = "ls")]
    Plugins(PluginsArgs),

    /// Generate a dataset in one shot.
    #[command(alias = "gen")]
    Generate(GenerateArgs),
}

/// Arguments for `synth-forge serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "SYNTH_FORGE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to bind.
    #[arg(short, long, env = "SYNTH_FORGE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Root for file-based data sources, uploads and file listings.
    #[arg(long, env = "SYNTH_FORGE_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// JSON file holding saved settings.
    #[arg(long, env = "SYNTH_FORGE_SETTINGS", default_value = DEFAULT_SETTINGS_FILE)]
    pub settings_file: PathBuf,

    /// Mount point of the REST API.
    #[arg(long, default_value = DEFAULT_API_PREFIX)]
    pub api_prefix: String,
}

impl ServeArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            data_dir: self.data_dir.clone(),
            settings_file: self.settings_file.clone(),
            api_prefix: self.api_prefix.clone(),
        }
    }
}

/// Plugin kind filter for `synth-forge plugins`.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Datasources,
    Llms,
    Generators,
}

impl From<KindArg> for PluginKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Datasources => PluginKind::DataSource,
            KindArg::Llms => PluginKind::Llm,
            KindArg::Generators => PluginKind::Generator,
        }
    }
}

/// Arguments for `synth-forge plugins`.
#[derive(Parser, Debug)]
pub struct PluginsArgs {
    /// Only list one kind of plugin.
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,

    /// Print full descriptors as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `synth-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Data source configuration as JSON, or `@path` to a JSON file.
    #[arg(short, long)]
    pub source: String,

    /// LLM configuration as JSON, or `@path` to a JSON file.
    #[arg(long)]
    pub llm: String,

    /// Dataset format (qa, instruction, conversation, classification, text).
    #[arg(short, long, default_value = "qa")]
    pub format: DatasetFormat,

    /// Number of items to generate.
    #[arg(short = 'n', long, default_value_t = DEFAULT_SAMPLE_COUNT)]
    pub count: usize,

    /// Items requested per LLM call.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seed for chunk order and provider sampling.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep the items generated before a provider failure.
    #[arg(long)]
    pub best_effort: bool,

    /// Directory relative file paths are resolved against.
    #[arg(long, env = "SYNTH_FORGE_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Output file. The format follows its extension unless --export-format is given.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export format (json, csv, text).
    #[arg(short = 'e', long)]
    pub export_format: Option<ExportFormat>,
}

impl GenerateArgs {
    /// Generator options from the flags that were given.
    pub fn options(&self) -> ConfigMap {
        let mut options = ConfigMap::new();
        if let Some(batch_size) = self.batch_size {
            options.insert("batch_size".to_string(), batch_size.into());
        }
        if let Some(seed) = self.seed {
            options.insert("seed".to_string(), seed.into());
        }
        if self.best_effort {
            options.insert("best_effort".to_string(), true.into());
        }
        options
    }

    pub fn export_format(&self) -> ExportFormat {
        self.export_format
            .or_else(|| self.output.as_deref().and_then(ExportFormat::from_path))
            .unwrap_or_default()
    }
}

/// Parse CLI arguments and return the Cli struct.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => run_serve_command(args).await,
        Commands::Plugins(args) => run_plugins_command(args),
        Commands::Generate(args) => run_generate_command(args).await,
    }
}

async fn run_serve_command(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.server_config();
    config.validate()?;

    if let Err(e) = crate::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;

    let service = Arc::new(ForgeService::with_builtin_plugins(config.data_dir.clone())?);
    api::serve(AppState::new(service, config)).await
}

fn run_plugins_command(args: PluginsArgs) -> anyhow::Result<()> {
    let catalog = PluginCatalog::builtin(DEFAULT_DATA_DIR)?;
    let kinds: Vec<PluginKind> = match args.kind {
        Some(kind) => vec![kind.into()],
        None => vec![PluginKind::DataSource, PluginKind::Llm, PluginKind::Generator],
    };

    if args.json {
        let mut out = serde_json::Map::new();
        for kind in kinds {
            let descriptors = serde_json::to_value(catalog.list(kind))?;
            out.insert(kind.as_str().to_string(), descriptors);
        }
        println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
        return Ok(());
    }

    for kind in kinds {
        println!("{}:", kind.label());
        for descriptor in catalog.list(kind) {
            let required = descriptor.config_schema.required.join(", ");
            match &descriptor.description {
                Some(description) => println!("  {:<22} {}", descriptor.id, description),
                None => println!("  {:<22} {}", descriptor.id, descriptor.name),
            }
            if !required.is_empty() {
                println!("  {:<22} required: {}", "", required);
            }
            if let Some(models) = descriptor.supported_models.as_ref().filter(|m| !m.is_empty()) {
                println!("  {:<22} models: {}", "", models.join(", "));
            }
        }
    }
    Ok(())
}

/// Reads a JSON object given inline or as `@path`.
fn read_config(raw: &str) -> anyhow::Result<ConfigMap> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("Configuration must be a JSON object")
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let service = ForgeService::with_builtin_plugins(args.data_dir.clone())?;
    let request = OneShotRequest {
        data_source_config: read_config(&args.source)?,
        llm_config: read_config(&args.llm)?,
        dataset_type: args.format,
        sample_size: args.count,
        options: args.options(),
    };

    let start = std::time::Instant::now();
    let (run, datasource_id, llm_id) = service.generate_once(request).await?;
    info!(
        generation_id = %run.generation_id,
        datasource_id = %datasource_id,
        llm_id = %llm_id,
        items = run.dataset.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Generation finished"
    );
    if let Some(error) = &run.dataset.error {
        tracing::warn!(error = %error, "Generation stopped early; keeping partial dataset");
    }

    let format = args.export_format();
    match &args.output {
        Some(path) => {
            write_dataset(&run.dataset, path, format)?;
            info!(path = %path.display(), format = %format, "Dataset written");
        }
        None => print!("{}", export_dataset(&run.dataset, format)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["synth-forge", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.server_config().port, DEFAULT_PORT);
        assert_eq!(args.api_prefix, "/api/v1");
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_generate_args() {
        let cli = Cli::try_parse_from([
            "synth-forge",
            "generate",
            "--source",
            "{}",
            "--llm",
            "{}",
            "-f",
            "instruction",
            "-n",
            "3",
            "--seed",
            "7",
            "-o",
            "out/data.csv",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.format, DatasetFormat::Instruction);
        assert_eq!(args.count, 3);
        assert_eq!(args.export_format(), ExportFormat::Csv);
        assert_eq!(args.options().get("seed"), Some(&serde_json::json!(7)));
        assert!(!args.options().contains_key("best_effort"));
    }

    #[test]
    fn test_explicit_export_format_wins() {
        let cli = Cli::try_parse_from([
            "synth-forge", "gen", "-s", "{}", "--llm", "{}", "-o", "data.csv", "-e", "txt",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.export_format(), ExportFormat::Text);
    }

    #[test]
    fn test_read_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.json");
        std::fs::write(&path, r#"{"provider": "ollama", "model_id": "llama3"}"#).unwrap();
        let config = read_config(&format!("@{}", path.display())).unwrap();
        assert_eq!(config["provider"], "ollama");
        assert!(read_config("[1, 2]").is_err());
    }
}
