use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use lecture_subs::cache::FileStore;
use lecture_subs::estimate::estimate_for_config;
use lecture_subs::notification::LogSink;
use lecture_subs::utils::logger::init_logger;
use lecture_subs::{Pipeline, PipelineConfig, Provider, TaskRequest, TranslationCache};

/// Translate WebVTT lecture subtitles with an LLM.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, short = 'c', global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Translate(TranslateCommand),
    Estimate(EstimateCommand),
    #[command(subcommand)]
    Cache(CacheCommands),
}

/// Translates a .vtt file, reusing the cached translation when there is one.
#[derive(Parser, Debug, Clone)]
struct TranslateCommand {
    /// Source subtitle file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    #[arg(long)]
    course: String,

    #[arg(long)]
    lecture: String,

    #[arg(long)]
    course_name: Option<String>,

    #[arg(long)]
    section_name: Option<String>,

    #[arg(long)]
    lecture_name: Option<String>,

    /// Output file; stdout when omitted
    #[arg(long, short = 'o', value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[arg(long)]
    provider: Option<Provider>,

    #[arg(long)]
    model: Option<String>,

    /// Ignore the cache and translate again
    #[arg(long, short = 'f', default_value_t = false)]
    force: bool,
}

/// Estimates tokens and cost without calling the provider.
#[derive(Parser, Debug, Clone)]
struct EstimateCommand {
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    #[arg(long)]
    provider: Option<Provider>,

    #[arg(long)]
    model: Option<String>,
}

/// Inspect or clear the translation cache
#[derive(Subcommand, Debug, Clone)]
enum CacheCommands {
    Stats,
    List,
    Clear,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if config.cache.cache_dir.is_none() {
        config.cache.cache_dir = Some(FileStore::default_dir().to_string_lossy().to_string());
    }
    Ok(config)
}

fn apply_overrides(config: &mut PipelineConfig, provider: Option<Provider>, model: Option<String>) {
    if let Some(provider) = provider {
        config.translation.provider = provider;
    }
    if let Some(model) = model {
        config.translation.model = model;
    }
}

async fn translate(mut config: PipelineConfig, cmd: TranslateCommand) -> Result<()> {
    apply_overrides(&mut config, cmd.provider, cmd.model.clone());
    let source_text = tokio::fs::read_to_string(&cmd.input)
        .await
        .with_context(|| format!("Failed to read {}", cmd.input.display()))?;

    let cache = Arc::new(TranslationCache::open(config.cache.clone()).await?);
    let request = TaskRequest {
        task_id: None,
        source_text,
        course_id: cmd.course,
        lecture_id: cmd.lecture,
        course_name: cmd.course_name,
        section_name: cmd.section_name,
        lecture_name: cmd.lecture_name,
        provider: config.translation.provider,
        api_key: config.translation.api_key.clone(),
        model: config.translation.model.clone(),
        force: cmd.force,
    };
    let pipeline = Arc::new(Pipeline::new(config, cache, Arc::new(LogSink)));

    let (task_id, handle) = pipeline.submit(request);
    let event = tokio::select! {
        event = handle => event.context("Translation task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling task {}", task_id);
            pipeline.cancel(&task_id);
            bail!("Translation cancelled");
        }
    };

    if event.cancelled {
        bail!("Translation cancelled");
    }
    if !event.success {
        bail!(
            "Translation failed [{}]: {}",
            event.error_code.as_deref().unwrap_or("UNKNOWN"),
            event.error.as_deref().unwrap_or("unknown error")
        );
    }
    if let Some(warning) = &event.error {
        error!("{}", warning);
    }

    let translated = event.translated_vtt.unwrap_or_default();
    match cmd.output {
        Some(path) => {
            tokio::fs::write(&path, translated)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", translated),
    }
    Ok(())
}

async fn estimate(mut config: PipelineConfig, cmd: EstimateCommand) -> Result<()> {
    apply_overrides(&mut config, cmd.provider, cmd.model);
    let source_text = tokio::fs::read_to_string(&cmd.input)
        .await
        .with_context(|| format!("Failed to read {}", cmd.input.display()))?;
    let estimate = estimate_for_config(&source_text, &config.translation)?;
    println!("{}", serde_json::to_string_pretty(&estimate)?);
    Ok(())
}

async fn cache_command(config: PipelineConfig, cmd: CacheCommands) -> Result<()> {
    let cache = TranslationCache::open(config.cache).await?;
    match cmd {
        CacheCommands::Stats => println!("{}", serde_json::to_string_pretty(&cache.stats().await?)?),
        CacheCommands::List => {
            for entry in cache.list().await? {
                println!(
                    "{}\t{}\t{}\t{} tokens",
                    entry.key(),
                    entry.lecture_name.as_deref().unwrap_or("-"),
                    entry.model,
                    entry.tokens_used
                );
            }
        }
        CacheCommands::Clear => {
            let removed = cache.clear().await?;
            println!("Removed {} entries", removed);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Translate(cmd) => translate(config, cmd).await?,
        Commands::Estimate(cmd) => estimate(config, cmd).await?,
        Commands::Cache(cmd) => cache_command(config, cmd).await?,
    }

    Ok(())
}
