//! CLI entry point for the debate engine.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use dissent::config::Config;
use dissent::debate::{DebateEngine, DebateOutcome, DebateSpec, EngineConfig, ReplayPlan};
use dissent::display;
use dissent::providers::{ModelPort, ProviderRouter};
use dissent::store::TranscriptStore;

#[derive(Parser, Debug)]
#[command(
    name = "dissent",
    version,
    about = "Cross-vendor multi-model debate and consensus engine"
)]
struct Cli {
    /// Config file (defaults to $DISSENT_CONFIG, else ~/.config/dissent/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a query to the debate panel and synthesize a final answer.
    Ask {
        query: String,

        /// Comma-separated model aliases (e.g. claude,gpt).
        #[arg(long)]
        panel: Option<String>,

        /// Model alias for the final synthesis.
        #[arg(long)]
        synthesizer: Option<String>,

        /// Reflection rounds (1-3).
        #[arg(long)]
        rounds: Option<u32>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Terminal)]
        output: OutputFormat,

        /// Skip persisting the transcript.
        #[arg(long)]
        no_save: bool,

        /// Include latency, token, and routing stats in terminal output.
        #[arg(long)]
        verbose: bool,

        /// Reference answer stored on the transcript for later comparison.
        /// Never shown to any model.
        #[arg(long)]
        ground_truth: Option<String>,

        /// File whose contents are appended to the initial prompt as context.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Re-synthesize a stored debate, or extend it with more rounds.
    Replay {
        transcript_id: String,

        /// Model alias for the new synthesis.
        #[arg(long)]
        synthesizer: Option<String>,

        /// New total reflection round count (1-3); extends the debate.
        #[arg(long)]
        rounds: Option<u32>,
    },

    /// List stored transcripts.
    List,

    /// Render a stored transcript.
    Show {
        id: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Terminal)]
        output: OutputFormat,
    },

    /// Inspect and test the model configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Probe every configured alias and report routing and latency.
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Terminal,
    Json,
    Markdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask {
            query,
            panel,
            synthesizer,
            rounds,
            output,
            no_save,
            verbose,
            ground_truth,
            file,
        } => {
            run_ask(
                &config,
                query,
                panel,
                synthesizer,
                rounds,
                output,
                no_save,
                verbose,
                ground_truth,
                file,
            )
            .await
        }
        Commands::Replay {
            transcript_id,
            synthesizer,
            rounds,
        } => run_replay(&config, &transcript_id, synthesizer, rounds).await,
        Commands::List => run_list(),
        Commands::Show { id, output } => run_show(&id, output),
        Commands::Config { command } => match command {
            ConfigCommands::Test => run_config_test(&config).await,
        },
    }
}

fn build_engine(config: &Config) -> DebateEngine {
    let router = Arc::new(ProviderRouter::from_config(config));
    let cancel = CancellationToken::new();
    spawn_cancel_on_interrupt(cancel.clone());
    DebateEngine::new(router)
        .with_config(EngineConfig {
            call_timeout: Duration::from_secs(config.defaults.timeout_secs),
        })
        .with_cancellation(cancel)
}

/// Ctrl-C cancels the in-flight round; completed rounds stay on the
/// transcript and are still persisted.
fn spawn_cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; aborting the debate");
            cancel.cancel();
        }
    });
}

#[allow(clippy::too_many_arguments)]
async fn run_ask(
    config: &Config,
    query: String,
    panel: Option<String>,
    synthesizer: Option<String>,
    rounds: Option<u32>,
    output: OutputFormat,
    no_save: bool,
    verbose: bool,
    ground_truth: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let panel: Vec<String> = match panel {
        Some(list) => list
            .split(',')
            .map(|alias| alias.trim().to_string())
            .filter(|alias| !alias.is_empty())
            .collect(),
        None => config.defaults.panel.clone(),
    };
    let synthesizer = synthesizer.unwrap_or_else(|| config.defaults.synthesizer.clone());
    for selector in panel.iter().chain(std::iter::once(&synthesizer)) {
        config.validate_selector(selector)?;
    }

    let context = match file {
        Some(path) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading context file {}", path.display()))?,
        ),
        None => None,
    };

    let display_names: HashMap<String, String> = panel
        .iter()
        .chain(std::iter::once(&synthesizer))
        .map(|id| (id.clone(), config.display_name(id)))
        .collect();

    let mut spec = DebateSpec::new(query, panel, synthesizer)
        .with_rounds(rounds.unwrap_or(config.defaults.rounds))
        .with_display_names(display_names);
    if let Some(context) = context {
        spec = spec.with_context(context);
    }
    if let Some(ground_truth) = ground_truth {
        spec = spec.with_ground_truth(ground_truth);
    }

    let outcome = build_engine(config).run(spec).await?;
    finish(outcome, output, no_save, verbose)
}

async fn run_replay(
    config: &Config,
    transcript_id: &str,
    synthesizer: Option<String>,
    rounds: Option<u32>,
) -> Result<()> {
    if let Some(selector) = &synthesizer {
        config.validate_selector(selector)?;
    }
    let store = TranscriptStore::open_default()?;
    let source = store.load(transcript_id)?;

    let plan = match rounds {
        Some(total) => {
            let completed = source.reflections_completed();
            if total <= completed {
                bail!(
                    "transcript already has {completed} reflection rounds; \
                     --rounds must exceed that to extend"
                );
            }
            ReplayPlan::Extend {
                additional_rounds: total - completed,
                synthesizer_id: synthesizer,
            }
        }
        None => ReplayPlan::Resynthesize {
            synthesizer_id: synthesizer,
        },
    };

    let outcome = build_engine(config).replay(&source, plan).await?;
    finish(outcome, OutputFormat::Terminal, false, false)
}

fn run_list() -> Result<()> {
    let store = TranscriptStore::open_default()?;
    let summaries = store.list()?;
    print!("{}", display::render_listing(&summaries));
    Ok(())
}

fn run_show(id: &str, output: OutputFormat) -> Result<()> {
    let store = TranscriptStore::open_default()?;
    let transcript = store.load(id)?;
    println!("{}", render(&transcript, output, true)?);
    Ok(())
}

async fn run_config_test(config: &Config) -> Result<()> {
    let router = ProviderRouter::from_config(config);
    for alias in config.aliases() {
        let decision = router.route(&alias);
        let path = if decision.via_openrouter {
            "openrouter".to_string()
        } else {
            format!("direct:{}", decision.vendor)
        };
        match router
            .invoke(&alias, "Reply with the single word OK.", Duration::from_secs(30))
            .await
        {
            Ok(completion) => println!(
                "{alias:<12} {path:<20} ok    {:.1}s",
                completion.latency_ms as f64 / 1000.0
            ),
            Err(err) => println!("{alias:<12} {path:<20} FAIL  {err}"),
        }
    }
    Ok(())
}

/// Persist (unless told not to), render, and map an aborted debate to a
/// user-visible error after the partial transcript is safely on disk.
fn finish(
    outcome: DebateOutcome,
    output: OutputFormat,
    no_save: bool,
    verbose: bool,
) -> Result<()> {
    if !no_save {
        let saved = TranscriptStore::open_default()
            .and_then(|store| store.save(&outcome.transcript));
        if let Err(err) = saved {
            warn!("could not save transcript: {err}");
        }
    }

    println!("{}", render(&outcome.transcript, output, verbose)?);

    if !outcome.is_success() {
        bail!(
            "debate aborted: {}",
            outcome.abort_reason.as_deref().unwrap_or("unknown reason")
        );
    }
    Ok(())
}

fn render(
    transcript: &dissent::DebateTranscript,
    output: OutputFormat,
    verbose: bool,
) -> Result<String> {
    Ok(match output {
        OutputFormat::Terminal => display::render_terminal(transcript, verbose),
        OutputFormat::Json => display::render_json(transcript)?,
        OutputFormat::Markdown => display::render_markdown(transcript),
    })
}
